//! Durable key/value exchange between units.
//!
//! A unit publishes the identifiers it produced with [`ParameterBroker::put`];
//! a unit realized later, possibly by a different process, reads them back
//! with [`ParameterBroker::get`]. Reading a path nobody wrote yet fails with
//! [`BrokerError::NotFound`], which is how a realization started out of
//! dependency order is caught before it creates anything.
//!
//! Backends:
//! - [`InMemoryParameterBroker`] (`in-memory` feature): single process
//! - [`FileParameterBroker`] (`file` feature): JSON file on disk
//! - [`ProviderParameterBroker`] (`provider` feature): the provider's
//!   parameter store

use async_trait::async_trait;

pub use platform_shared_types::{ParameterEntry, ParameterPath, ProvisionError};

#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "provider")]
pub mod provider_backed;

#[cfg(feature = "file")]
pub use file::FileParameterBroker;
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryParameterBroker;
#[cfg(feature = "provider")]
pub use provider_backed::ProviderParameterBroker;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("parameter {0} has not been published")]
    NotFound(ParameterPath),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "provider")]
    #[error(transparent)]
    Provider(#[from] provider_interface::ProviderError),
}

impl From<BrokerError> for ProvisionError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotFound(path) => ProvisionError::NotFound(path.to_string()),
            #[cfg(feature = "provider")]
            BrokerError::Provider(e) => ProvisionError::Provider(e),
            other => ProvisionError::Broker(other.to_string()),
        }
    }
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

#[async_trait]
pub trait ParameterBroker: Send + Sync {
    /// Create or overwrite the entry at `path`.
    ///
    /// Writing the same value and description again leaves the entry (and its
    /// version) unchanged.
    async fn put(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> BrokerResult<ParameterEntry>;

    async fn get(&self, path: &ParameterPath) -> BrokerResult<ParameterEntry>;

    /// Entries whose path starts with `prefix`, ordered by path.
    async fn list(&self, prefix: &str) -> BrokerResult<Vec<ParameterEntry>>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, path: &ParameterPath) -> BrokerResult<bool>;

    async fn get_value(&self, path: &ParameterPath) -> BrokerResult<String> {
        Ok(self.get(path).await?.value)
    }
}

/// Behaviour every backend must show, shared by the backend tests.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;

    pub(crate) async fn check(broker: &dyn ParameterBroker) {
        let path = ParameterPath::new("demo-docker", "promRepositoryName");

        let err = broker.get(&path).await.unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(ref p) if p == &path));

        let first = broker
            .put(&path, "demo-prom-app", "The Prom app URI of the ECR repository")
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(broker.get_value(&path).await.unwrap(), "demo-prom-app");

        let same = broker
            .put(&path, "demo-prom-app", "The Prom app URI of the ECR repository")
            .await
            .unwrap();
        assert_eq!(same.version, 1);

        broker
            .put(&path, "demo-prom-app-v2", "The Prom app URI of the ECR repository")
            .await
            .unwrap();
        let latest = broker.get(&path).await.unwrap();
        assert_eq!(latest.value, "demo-prom-app-v2");
        assert_eq!(latest.version, 2);
        assert_eq!(broker.list("/demo-docker/").await.unwrap().len(), 1);

        let other = ParameterPath::new("demo-infra", "vpcId");
        broker.put(&other, "vpc-123", "VPC id").await.unwrap();
        assert_eq!(broker.list("/demo-docker/").await.unwrap().len(), 1);
        assert_eq!(broker.list("/").await.unwrap().len(), 2);

        assert!(broker.delete(&path).await.unwrap());
        assert!(!broker.delete(&path).await.unwrap());
        assert!(matches!(broker.get(&path).await, Err(BrokerError::NotFound(_))));
    }
}
