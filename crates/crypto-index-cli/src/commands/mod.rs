pub mod calculate;
pub mod periods;
pub mod verify;

use clap::Args;
use std::path::PathBuf;

use crate::config::{self, IndexConfig};

/// Where the index folder and its settings come from.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// TOML configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Index root containing data/index_snapshots and data/prices
    #[arg(long)]
    pub index_folder: Option<PathBuf>,
}

impl StoreArgs {
    /// Configuration file and environment, with `--index-folder` applied on top.
    pub fn load(&self) -> Result<IndexConfig, Box<dyn std::error::Error>> {
        let mut config = config::load_config(self.config.as_deref())?;
        if let Some(folder) = &self.index_folder {
            config.index_folder = folder.clone();
        }
        Ok(config)
    }
}
