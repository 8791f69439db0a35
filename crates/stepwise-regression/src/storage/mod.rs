//! Persistence identity shared by the orchestrator and its regressors.
//!
//! A `ModelContext` is a database name plus a handle to a `ModelStore`. Every
//! regressor the stepwise orchestrator creates receives a clone of the
//! orchestrator's context, so the state they persist lives in the same
//! namespace and is removed by the same `erase` chain.
pub mod fs;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use fs::FsStore;
pub use memory::InMemoryStore;

/// Namespaced key/value storage for model state.
pub trait ModelStore: Send + Sync {
    fn put(&self, db_name: &str, key: &str, bytes: &[u8]) -> Result<()>;

    fn get(&self, db_name: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove one entry. Removing a missing entry is not an error.
    fn remove(&self, db_name: &str, key: &str) -> Result<()>;

    /// Keys currently stored under `db_name`, sorted.
    fn keys(&self, db_name: &str) -> Result<Vec<String>>;
}

/// Where model state is kept.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case", tag = "backend")]
pub enum StorageConfig {
    #[default]
    InMemory,
    FileSystem { root: PathBuf },
}

impl StorageConfig {
    pub fn connect(&self) -> Result<Arc<dyn ModelStore>> {
        let store: Arc<dyn ModelStore> = match self {
            StorageConfig::InMemory => Arc::new(InMemoryStore::new()),
            StorageConfig::FileSystem { root } => Arc::new(FsStore::new(root)?),
        };
        Ok(store)
    }
}

/// A named persistent context: database name plus storage backend.
#[derive(Clone)]
pub struct ModelContext {
    db_name: String,
    store: Arc<dyn ModelStore>,
}

impl ModelContext {
    pub fn new(db_name: &str, store: Arc<dyn ModelStore>) -> Self {
        ModelContext {
            db_name: db_name.to_string(),
            store,
        }
    }

    pub fn from_config(db_name: &str, config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(db_name, config.connect()?))
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// True when both contexts address the same database on the same store.
    pub fn same_identity(&self, other: &ModelContext) -> bool {
        self.db_name == other.db_name && Arc::ptr_eq(&self.store, &other.store)
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .with_context(|| format!("Failed to serialize '{}' for {}", key, self.db_name))?;
        self.store.put(&self.db_name, key, &bytes)
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(&self.db_name, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).with_context(|| {
                    format!("Failed to deserialize '{}' for {}", key, self.db_name)
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&self.db_name, key)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys(&self.db_name)
    }
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("db_name", &self.db_name)
            .finish_non_exhaustive()
    }
}
