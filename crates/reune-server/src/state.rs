use std::path::PathBuf;
use std::sync::Arc;

use reune_core::config::Config;
use reune_core::Store;

use crate::error::AppError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub store: Arc<Store>,
}

impl AppState {
    /// Load `.reune/config.yaml` under `root` and open the configured database.
    pub fn open(root: PathBuf) -> reune_core::Result<Self> {
        let config = Config::load(&root)?;
        let store = Store::open(&config.database_path(&root))?;
        Ok(Self::new(root, config, store))
    }

    pub fn new(root: PathBuf, config: Config, store: Store) -> Self {
        Self {
            root,
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }

    /// Run a blocking store operation off the async runtime.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Store) -> reune_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(AppError::join)??;
        Ok(value)
    }
}
