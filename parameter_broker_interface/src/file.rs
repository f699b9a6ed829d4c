//! Broker persisted to a JSON file.
//!
//! Every write replaces the file atomically (write to a sibling temp file,
//! then rename), so a reader in another process never observes a partially
//! written value. Reads go to disk each time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{BrokerError, BrokerResult, ParameterBroker, ParameterEntry, ParameterPath};

type Entries = BTreeMap<ParameterPath, ParameterEntry>;

#[derive(Debug)]
pub struct FileParameterBroker {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileParameterBroker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> BrokerResult<Entries> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Entries::new()),
            Ok(raw) => {
                let list: Vec<ParameterEntry> = serde_json::from_str(&raw)?;
                Ok(list.into_iter().map(|e| (e.path.clone(), e)).collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(BrokerError::Io(e)),
        }
    }

    async fn store(&self, entries: &Entries) -> BrokerResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let list: Vec<&ParameterEntry> = entries.values().collect();
        let json = serde_json::to_vec_pretty(&list)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ParameterBroker for FileParameterBroker {
    async fn put(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> BrokerResult<ParameterEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;

        let (entry, changed) = match entries.get_mut(path) {
            Some(entry) => {
                let changed = entry.overwrite(value, description);
                (entry.clone(), changed)
            }
            None => {
                let entry = ParameterEntry::new(path.clone(), value, description);
                entries.insert(path.clone(), entry.clone());
                (entry, true)
            }
        };
        if changed {
            self.store(&entries).await?;
        }
        debug!("put {} (version {}) to {:?}", path, entry.version, self.path);
        Ok(entry)
    }

    async fn get(&self, path: &ParameterPath) -> BrokerResult<ParameterEntry> {
        self.load()
            .await?
            .remove(path)
            .ok_or_else(|| BrokerError::NotFound(path.clone()))
    }

    async fn list(&self, prefix: &str) -> BrokerResult<Vec<ParameterEntry>> {
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(|e| e.path.as_str().starts_with(prefix))
            .collect())
    }

    async fn delete(&self, path: &ParameterPath) -> BrokerResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let removed = entries.remove(path).is_some();
        if removed {
            self.store(&entries).await?;
        }
        Ok(removed)
    }
}
