//! Command line argument definitions.

use crate::models::config::{Config, DisambiguationMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Media Symlinker - Mirror downloads into a catalog-named symlink library
#[derive(Parser, Debug)]
#[command(name = "media-symlinker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    /// Path to config.toml (default: <config dir>/media_symlinker/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pass over the source directory
    Run {
        #[command(flatten)]
        pass: PassArgs,
    },

    /// Run a pass, then watch the source directory for changes
    Watch {
        #[command(flatten)]
        pass: PassArgs,

        /// Quiet period before a triggered pass, in milliseconds
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,
    },

    /// Manage upstream catalog rows
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Show state store counts
    Status,

    /// Review ambiguous titles queued for a decision
    Pending {
        #[command(subcommand)]
        action: PendingAction,
    },

    /// Run preflight checks only
    Preflight,
}

/// Overrides shared by `run` and `watch`.
#[derive(Args, Debug, Default)]
pub struct PassArgs {
    /// Source directory (overrides config and SRC_DIR)
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Never ask; take the year match or the first candidate
    #[arg(long)]
    pub force: bool,

    /// Route anime to separate destination roots
    #[arg(long)]
    pub split: bool,

    /// How ambiguous titles are settled
    #[arg(long, value_enum, value_name = "MODE")]
    pub disambiguation: Option<DisambiguationMode>,
}

impl PassArgs {
    /// Apply flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref source) = self.source {
            config.source_dir = source.clone();
        }
        if self.force {
            config.resolver.force = true;
        }
        if self.split {
            config.resolver.split = true;
        }
        if let Some(mode) = self.disambiguation {
            config.resolver.disambiguation = mode;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// Load catalog rows from a JSON file
    Import {
        /// JSON array of catalog rows
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum PendingAction {
    /// List unanswered titles
    List,

    /// Answer a queued title
    Resolve {
        /// Pending entry id
        #[arg(value_name = "ID")]
        id: i64,

        /// Shortlist number (1-based) or an id such as imdb-tt0903747
        #[arg(value_name = "ANSWER")]
        answer: String,
    },
}
