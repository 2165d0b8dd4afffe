use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Geolink: relay live GPS positions through a real-time hub.
#[derive(Parser, Debug)]
#[command(name = "geolink", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hub endpoint URL override.
    #[arg(long, global = true)]
    pub hub_url: Option<String>,

    /// Start in mock mode without touching the network.
    #[arg(long, global = true)]
    pub mock: bool,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Track peers reporting to the hub and log the live set.
    Receive,
    /// Share a simulated position every interval.
    Send {
        /// Identity to publish under, e.g. an email address.
        #[arg(long)]
        user: String,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
