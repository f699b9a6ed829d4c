//! In-memory broker for single-process realization and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{BrokerError, BrokerResult, ParameterBroker, ParameterEntry, ParameterPath};

#[derive(Debug, Default)]
pub struct InMemoryParameterBroker {
    entries: RwLock<BTreeMap<ParameterPath, ParameterEntry>>,
}

impl InMemoryParameterBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParameterBroker for InMemoryParameterBroker {
    async fn put(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> BrokerResult<ParameterEntry> {
        let mut entries = self.entries.write().await;
        let entry = match entries.get_mut(path) {
            Some(entry) => {
                entry.overwrite(value, description);
                entry.clone()
            }
            None => {
                let entry = ParameterEntry::new(path.clone(), value, description);
                entries.insert(path.clone(), entry.clone());
                entry
            }
        };
        debug!("put {} (version {})", path, entry.version);
        Ok(entry)
    }

    async fn get(&self, path: &ParameterPath) -> BrokerResult<ParameterEntry> {
        self.entries
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(path.clone()))
    }

    async fn list(&self, prefix: &str) -> BrokerResult<Vec<ParameterEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.path.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, path: &ParameterPath) -> BrokerResult<bool> {
        Ok(self.entries.write().await.remove(path).is_some())
    }
}
