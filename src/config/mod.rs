pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "cert-mailer")]
#[command(about = "Generate personalised certificates from a template and roster, and email them")]
pub struct Cli {
    #[arg(short, long, default_value = "cert-mailer.toml")]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Override input.roster")]
    pub roster: Option<PathBuf>,

    #[arg(long, help = "Override input.template")]
    pub template: Option<PathBuf>,

    #[arg(long, help = "Override output.directory")]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Render certificates without sending
    Generate,
    /// Render certificates and email each one (needs [smtp])
    Send,
    /// Render the first record to preview.png and report the layout
    Preview,
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_json_logs_flag() {
        let cli = Cli::try_parse_from(["cert-mailer", "--json-logs", "send"]).unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.command, Command::Send);

        let cli = Cli::try_parse_from(["cert-mailer", "generate"]).unwrap();
        assert!(!cli.json_logs);
    }
}
