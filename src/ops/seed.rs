use crate::model::path::NodePath;
use crate::ops::tree_ops::{TaskTree, TreeError};

/// Seed dataset: (title, description, subtasks as (title, description))
const SEED: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "Finish the project",
        "The project has to be wrapped up by the end of the month.",
        &[
            ("Write the code", "Implement the main feature."),
            ("Run the tests", "Test the code that was written."),
            ("Prepare documentation", "Write the project documentation."),
        ],
    ),
    (
        "Prepare a report",
        "Summarize the work that has been completed.",
        &[
            ("Collect data", "Gather everything the report needs."),
            ("Write conclusions", "Draw conclusions from the collected data."),
        ],
    ),
    (
        "Meet with the team",
        "Hold a meeting to discuss current tasks.",
        &[],
    ),
    (
        "Review code",
        "Run a code review with the team.",
        &[
            ("Check new features", "Go through every new feature."),
            ("Write review comments", "Leave comments on the code."),
        ],
    ),
    (
        "Update documentation",
        "Bring the project documentation up to date.",
        &[],
    ),
];

/// Build the fixed dataset used when nothing has been persisted yet.
pub fn seed_tree() -> Result<TaskTree, TreeError> {
    let mut tree = TaskTree::new();
    for (i, (title, description, subtasks)) in SEED.iter().enumerate() {
        tree.add_task(title, Some(description.to_string()))?;
        for (sub_title, sub_description) in subtasks.iter() {
            tree.add_subtask(
                &NodePath::top(i),
                sub_title,
                Some(sub_description.to_string()),
            )?;
        }
    }
    Ok(tree)
}
