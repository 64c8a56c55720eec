use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Terminal cells taken by one grapheme cluster. Tabs count as 4.
fn cell_width(grapheme: &str) -> usize {
    if grapheme == "\t" {
        4
    } else {
        UnicodeWidthStr::width(grapheme)
    }
}

/// Display width in terminal cells.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(cell_width).sum()
}

/// Clip `s` to `max_cells`, ending in `…` when anything was cut.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for g in s.graphemes(true) {
        let w = cell_width(g);
        if used + w > max_cells - 1 {
            break;
        }
        used += w;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

/// Byte offset of the grapheme after the one at `byte_offset`, or `None`
/// at the end of the string.
pub fn next_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    let rest = s.get(byte_offset..).filter(|r| !r.is_empty())?;
    let len = rest.graphemes(true).next().map_or(0, str::len);
    Some(byte_offset + len)
}

/// Byte offset where the grapheme before `byte_offset` starts, or `None`
/// at the start of the string.
pub fn prev_grapheme_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    let head = s.get(..byte_offset).filter(|h| !h.is_empty())?;
    head.grapheme_indices(true).next_back().map(|(i, _)| i)
}
