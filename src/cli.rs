//! Command-line surface: a flat flag set, no subcommands.

use clap::Parser;
use std::path::PathBuf;

/// Continuous patch testing against a remote tracker
#[derive(Parser, Debug)]
#[command(name = "patchbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Workspace root holding working copies, logs, and the VERSION file
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Tracker/report server URL
    #[arg(short, long)]
    pub server: String,

    /// Number of cycles to run before exiting (default: run forever)
    #[arg(long)]
    pub count: Option<usize>,

    /// Comma-separated ticket ids to test in order, instead of querying
    #[arg(short, long, value_delimiter = ',')]
    pub tickets: Vec<u64>,

    /// Score and list open tickets without testing anything
    #[arg(short, long)]
    pub list: bool,

    /// Skip the baseline self-test before the main loop
    #[arg(long)]
    pub skip_base: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_minimal() {
        let cli = Cli::try_parse_from(["patchbot", "-s", "http://tracker.test"]).unwrap();
        assert_eq!(cli.server, "http://tracker.test");
        assert_eq!(cli.workspace, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(cli.count.is_none());
        assert!(cli.tickets.is_empty());
        assert!(!cli.list);
        assert!(!cli.skip_base);
    }

    #[test]
    fn test_cli_requires_server() {
        assert!(Cli::try_parse_from(["patchbot"]).is_err());
    }

    #[test]
    fn test_cli_ticket_queue_parsing() {
        let cli = Cli::try_parse_from(["patchbot", "-s", "u", "--tickets", "101,102,7"]).unwrap();
        assert_eq!(cli.tickets, vec![101, 102, 7]);
    }

    #[test]
    fn test_cli_full_surface() {
        let cli = Cli::try_parse_from([
            "patchbot",
            "-c",
            "/etc/patchbot.yml",
            "-w",
            "/srv/patchbot",
            "-s",
            "http://tracker.test",
            "--count",
            "3",
            "--skip-base",
            "--list",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/patchbot.yml")));
        assert_eq!(cli.workspace, PathBuf::from("/srv/patchbot"));
        assert_eq!(cli.count, Some(3));
        assert!(cli.skip_base);
        assert!(cli.list);
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }
}
