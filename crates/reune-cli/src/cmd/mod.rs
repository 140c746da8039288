pub mod config;
pub mod init;
pub mod serve;
pub mod user;

use anyhow::Context;
use reune_core::config::Config;
use reune_core::Store;
use std::path::Path;

/// Load config and open the configured database.
pub(crate) fn open_store(root: &Path) -> anyhow::Result<Store> {
    let config = Config::load(root).context("failed to load config")?;
    let path = config.database_path(root);
    Store::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}
