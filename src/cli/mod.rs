//! CLI Module
//!
//! Command-line interface for rendering, saving and playing timelines.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Padtrack - render and play timelines of audio clips and gaps
#[derive(Parser, Debug)]
#[command(name = "padtrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (JSON); defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = "padtrack.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Timeline items are written as `clip:<id-or-path>` or `gap:<seconds>`
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a timeline to a WAV asset and save it as a track
    #[command(name = "render")]
    Render {
        /// Track name
        #[arg(short, long)]
        name: String,

        /// Timeline items in order
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Save a timeline as a track without rendering audio
    #[command(name = "compose")]
    Compose {
        /// Track name
        #[arg(short, long)]
        name: String,

        /// Timeline items in order
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// List saved tracks, most recent first
    #[command(name = "list")]
    List,

    /// List clips available in the clip directory
    #[command(name = "clips")]
    Clips,

    /// Delete a saved track and its asset
    #[command(name = "delete")]
    Delete {
        /// Track id
        id: Uuid,
    },

    /// Check a track's asset against its recorded checksum
    #[command(name = "verify")]
    Verify {
        /// Track id
        id: Uuid,
    },

    /// Remove rendered assets that no saved track references
    #[command(name = "prune")]
    Prune,

    /// Play a timeline live
    #[command(name = "play")]
    Play {
        /// Timeline items in order
        #[arg(required = true)]
        items: Vec<String>,

        /// Restart from the top at the end of each pass
        #[arg(long = "loop")]
        looping: bool,

        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<f64>,
    },

    /// Play a saved track's timeline live
    #[command(name = "play-track")]
    PlayTrack {
        /// Track id
        id: Uuid,

        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<f64>,
    },
}
