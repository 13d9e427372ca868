pub mod assistant;
pub mod capture;
pub mod cli;
pub mod conversation;
pub mod cost;
pub mod gesture;
pub mod panel;
pub mod reveal;
pub mod settings;
pub mod store;
pub mod utils;
pub mod window;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use store::{JsonFileStore, KeyValueStore};

const DATA_DIR_ENV: &str = "LUKA_DATA_DIR";
const DEBUG_ENV: &str = "LUKA_DEBUG";
const STORE_FILE: &str = "luka.json";

pub fn run() -> Result<()> {
    // RUST_LOG still wins over the default level.
    env_logger::Builder::from_default_env()
        .filter_level(if debug_enabled() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let cli = cli::Cli::parse();

    let data_dir = data_dir()?;
    let store_path = data_dir.join(STORE_FILE);
    log::debug!("Using store at {}", store_path.display());
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(store_path)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(cli::execute(cli, store))
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
        .unwrap_or(false)
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("luka"))
        .context("no data directory available; set LUKA_DATA_DIR")
}
