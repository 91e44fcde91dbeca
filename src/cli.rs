use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "dir2db", version)]
#[command(about = "Load source files from a directory tree into a local store, recording each file's class name")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Root directory to search.
    #[arg(short = 'p', long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// File name pattern to include, e.g. '/\.(?:php|sql)$/'. Default: names ending in .php.
    #[arg(short = 'r', long, value_name = "REGEX")]
    pub regex: Option<String>,

    /// Path pattern to exclude, e.g. 'vendor|node_modules|private'.
    #[arg(short = 'e', long, value_name = "REGEX")]
    pub exclusions: Option<String>,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(long)]
    pub quiet: bool,

    /// Print store row counts and exit.
    #[arg(long)]
    pub stats: bool,

    /// Write a config template to the config location and exit.
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

impl Cli {
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        if self.verbose {
            Some(log::LevelFilter::Debug)
        } else if self.quiet {
            Some(log::LevelFilter::Warn)
        } else {
            None
        }
    }
}
