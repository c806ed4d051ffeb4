use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vocab-player",
    version,
    about = "Play vocabulary audio category by category and keep resume points"
)]
pub struct Cli {
    /// Vocabulary catalog (JSON). Defaults to $VOCAB_PLAYER_CATALOG or the data directory.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `vocab_player=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn runs_tui(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui(_)))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a category from a row and continue through the following categories.
    Play(PlayArgs),
    /// Continue from a saved resume point (1 = most recent).
    Resume {
        #[arg(default_value_t = 1)]
        index: usize,
    },
    /// Show saved resume points.
    List,
    /// Remove a saved resume point by its position in `list`.
    Forget { index: usize },
    /// Print the deep link of a saved resume point.
    Link {
        #[arg(default_value_t = 1)]
        index: usize,
    },
    /// List collections, or the categories of one collection.
    Categories(CollectionArgs),
    /// Probe every audio locator of a category over HTTP.
    Check(CheckArgs),
    /// Interactive viewer (default).
    Tui(CollectionArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct CollectionArgs {
    /// Two-letter dialect code (si, ha, da, rh, zh).
    #[arg(long)]
    pub dialect: Option<String>,
    /// One-digit level code (5 basic, 1 elementary, 2 intermediate, 3 upper-intermediate, 4 advanced).
    #[arg(long)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct PlayArgs {
    /// Deep link (`dialect=..&level=..&category=..&row=..`), optionally with a URL prefix.
    #[arg(long, conflicts_with_all = ["dialect", "level", "category"])]
    pub link: Option<String>,
    #[command(flatten)]
    pub collection: CollectionArgs,
    /// Category to start in. Defaults to the first category of the collection.
    #[arg(long)]
    pub category: Option<String>,
    /// Row to start from, e.g. `7` or `007`.
    #[arg(long)]
    pub row: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub collection: CollectionArgs,
    #[arg(long)]
    pub category: String,
    /// Attempts per locator for retryable failures.
    #[arg(long, default_value_t = 2)]
    pub attempts: usize,
}
