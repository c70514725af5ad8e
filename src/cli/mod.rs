//! Command-line interface definitions.

pub mod check;
pub mod report;
pub mod run;
pub mod score;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// upwatch - protocol-upgrade risk monitoring.
#[derive(Parser, Debug)]
#[command(name = "upwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest events and publish assessments until interrupted
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),

    /// Score the sentiment of a piece of text
    Score(ScoreArgs),

    /// Print voting patterns and forecast accuracy for a protocol
    Report(ReportArgs),
}

/// Subcommands for `upwatch check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration file
    Config(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,

    /// Keep all state in memory instead of the configured database
    #[arg(long)]
    pub memory: bool,
}

/// Arguments for the `score` subcommand.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Text to score
    pub text: String,

    /// Protocol the text refers to
    #[arg(long)]
    pub protocol: Option<String>,

    /// Engagement weight (likes, reposts, ...)
    #[arg(long, default_value = "1.0")]
    pub engagement: f64,
}

/// Arguments for the `report` subcommand.
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Protocol to report on
    #[arg(long)]
    pub protocol: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn score_parses_text_and_options() {
        let cli = Cli::parse_from(["upwatch", "score", "great upgrade", "--protocol", "aave"]);
        match cli.command {
            Commands::Score(args) => {
                assert_eq!(args.text, "great upgrade");
                assert_eq!(args.protocol.as_deref(), Some("aave"));
                assert_eq!(args.engagement, 1.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn report_requires_protocol() {
        assert!(Cli::try_parse_from(["upwatch", "report"]).is_err());
        let cli = Cli::parse_from(["upwatch", "report", "--protocol", "aave", "-c", "prod.toml"]);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.protocol, "aave");
                assert_eq!(args.config, PathBuf::from("prod.toml"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn check_config_defaults_path() {
        let cli = Cli::parse_from(["upwatch", "check", "config"]);
        match cli.command {
            Commands::Check(CheckCommand::Config(arg)) => {
                assert_eq!(arg.config, PathBuf::from("config.toml"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
