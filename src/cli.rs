// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Pipelines are built in Rust against the library; the binary covers the
//! out-of-band operations that work on an existing run directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `stagehand`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagehand",
    version,
    about = "Maintenance commands for stagehand experiment runs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run config file (TOML).
    ///
    /// Used if it exists; built-in defaults otherwise.
    #[arg(long, value_name = "PATH", default_value = "Stagehand.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGEHAND_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resubmit unfinished stages whose batch jobs are gone.
    Relaunch {
        /// Only report what would be relaunched.
        #[arg(long)]
        test: bool,

        /// Submission attempts per stage directory (overrides the config).
        #[arg(long, value_name = "N")]
        tries: Option<u32>,

        /// Run directories to scan.
        #[arg(required = true, value_name = "DIR")]
        dirs: Vec<PathBuf>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaunch_arguments_parse() {
        let args = CliArgs::try_parse_from([
            "stagehand",
            "--log-level",
            "debug",
            "relaunch",
            "--test",
            "--tries",
            "3",
            "exp/a_000",
            "exp/a_001",
        ])
        .unwrap();

        assert_eq!(args.config, "Stagehand.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        let Command::Relaunch { test, tries, dirs } = args.command;
        assert!(test);
        assert_eq!(tries, Some(3));
        assert_eq!(dirs, vec![PathBuf::from("exp/a_000"), PathBuf::from("exp/a_001")]);
    }

    #[test]
    fn relaunch_needs_a_directory() {
        assert!(CliArgs::try_parse_from(["stagehand", "relaunch"]).is_err());
    }
}
