//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use roomdrop_file_share::TransferConfig;

/// Transfer files between two peers of a local in-memory room.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// JSON config file. Defaults to $ROOMDROP_CONFIG, then
    /// ~/.config/roomdrop/config.json.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory received files are saved into.
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Raw bytes per chunk.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Reject inbound files larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub reject_over: Option<u64>,

    /// Files to send.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Args {
    /// Overrides config values with the ones given on the command line.
    pub fn apply(&self, config: &mut TransferConfig) {
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(limit) = self.reject_over {
            config.max_accept_bytes = Some(limit);
        }
    }
}
