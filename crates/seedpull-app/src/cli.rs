//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use seedpull_config::DEFAULT_CONFIG_PATH;

/// Arguments accepted by the `seedpull` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "seedpull",
    version,
    about = "Mirror completed seedbox torrents into a local library"
)]
pub struct Cli {
    /// Path of the JSON configuration document.
    #[arg(long, env = "SEEDPULL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Run a single poll cycle and exit.
    #[arg(long)]
    pub once: bool,
}
