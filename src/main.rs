use clap::Parser;
use tasktree::cli::commands::Cli;
use tasktree::cli::handlers;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        // No subcommand → launch TUI
        None => tasktree::tui::run(cli.project_dir.as_deref()),
        Some(_) => handlers::dispatch(cli),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
