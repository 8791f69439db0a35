use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::ModelStore;

/// Process-local store. State disappears with the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    databases: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryStore {
    fn put(&self, db_name: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let mut dbs = self
            .databases
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        dbs.entry(db_name.to_string())
            .or_default()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, db_name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let dbs = self
            .databases
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(dbs.get(db_name).and_then(|db| db.get(key)).cloned())
    }

    fn remove(&self, db_name: &str, key: &str) -> Result<()> {
        let mut dbs = self
            .databases
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        if let Some(db) = dbs.get_mut(db_name) {
            db.remove(key);
            if db.is_empty() {
                dbs.remove(db_name);
            }
        }
        Ok(())
    }

    fn keys(&self, db_name: &str) -> Result<Vec<String>> {
        let dbs = self
            .databases
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(dbs
            .get(db_name)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default())
    }
}
