//! Command-line interface for facetrail
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Identify people in videos by face and conversation
#[derive(Parser, Debug)]
#[command(
    name = "facetrail",
    version,
    about = "Identify people in videos by face and conversation"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify the person in a video and record the conversation
    Process {
        /// Video file to process
        video: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List enrolled people
    People,

    /// Show the conversation history of a person
    History {
        /// Person name as enrolled or guessed
        name: String,
    },

    /// Enroll a person from an image containing their face
    Enroll {
        /// Display name
        name: String,

        /// Image file
        image: PathBuf,
    },

    /// Delete old candidate crops from the scratch directory
    PruneCrops {
        /// Minimum age of deleted crops. Examples: 30m, 1h, 2d
        #[arg(long, value_name = "DURATION", default_value = "1h", value_parser = parse_age)]
        older_than: Duration,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse an age such as `90s`, `30m` or `1h30m`.
///
/// Bare numbers are seconds.
fn parse_age(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
