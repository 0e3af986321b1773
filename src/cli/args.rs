//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Collect unique photos and videos from several folders into one
#[derive(Parser, Debug)]
#[command(name = "deduplicate")]
#[command(version)]
#[command(about = "Gather the unique photos and videos of several folders into one")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Source folder to scan (can be specified multiple times)
    #[arg(short, long = "sources", value_name = "FOLDER")]
    pub sources: Vec<PathBuf>,

    /// Destination folder receiving the unique files
    #[arg(short, long, value_name = "FOLDER")]
    pub destination: Option<PathBuf>,

    /// Prefix destination names with the capture time (YYYYMMDDTHHMMSS)
    #[arg(short, long)]
    pub rename: bool,

    /// Move files instead of copying them
    #[arg(short = 'm', long = "move")]
    pub move_files: bool,

    /// Only print what would be done
    #[arg(short = 'l', long)]
    pub simulate: bool,

    /// Number of worker threads (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or create the configuration file at the standard location
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\media_deduplicator\config.toml
    /// - Linux/macOS: ~/.config/media_deduplicator/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Only print the path of the active config file
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}
