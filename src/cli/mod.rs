pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubechan")]
#[command(about = "Relays new YouTube uploads to a Telegram channel as audio", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/tubechan/config.toml or $TUBECHAN_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Sync every interval until stopped (default)
    Run,
    /// Run a single sync cycle and exit
    Once,
    /// List configured feeds with their stored cursors
    Feeds,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_default() {
        let cli = Cli::parse_from(["tubechan"]);
        assert_eq!(cli.command(), Commands::Run);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["tubechan", "once", "--config", "/etc/tubechan.toml"]);
        assert_eq!(cli.command(), Commands::Once);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tubechan.toml")));
    }
}
