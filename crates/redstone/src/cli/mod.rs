pub mod printer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "redstone")]
#[command(about = "Create, run and share local Minecraft servers from an interactive menu")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Directory holding servers, settings and logs
    #[arg(long, env = "REDSTONE_HOME", value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    /// Write debug output to the log file
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Print version
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Show the Playit.gg setup guide
    Tutorial,
    /// Print version
    Version,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn version_line() -> String {
    format!("redstone {}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points() {
        let cli = Cli::try_parse_from(["redstone", "tutorial"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Tutorial));

        let cli = Cli::try_parse_from(["redstone", "-v"]).unwrap();
        assert!(cli.version);

        let cli = Cli::try_parse_from(["redstone", "--home", "/tmp/rs"]).unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/rs")));
        assert_eq!(cli.command, None);
    }
}
