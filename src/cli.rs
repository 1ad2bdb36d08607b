use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vistos",
    version,
    about = "Browse episode catalogs, track watched episodes and play them with mpv"
)]
pub struct Cli {
    /// Catalog JSON to use instead of the bundled one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List series with their watch progress
    Series,
    /// Show the episode listing of a series
    List { series: String },
    /// Mark an episode as watched
    Mark { series: String, episode: u32 },
    /// Flip the watched state of an episode
    Toggle { series: String, episode: u32 },
    /// Forget all watched episodes of a series
    Reset { series: String },
    /// Print the playable sources derived for an episode
    Resolve { series: String, episode: u32 },
    /// Open the player on an episode
    Play {
        series: String,
        episode: u32,
        #[arg(long)]
        autoplay: bool,
    },
    /// Open a player address such as /digimon/ver/3?autoplay=1 or a listing such as /beyblade
    Open { route: String },
    /// Interactive listing (default)
    Tui { series: Option<String> },
}
