//! Broker backed by the provider's durable parameter store.

use std::sync::Arc;

use async_trait::async_trait;

use provider_interface::CloudProvider;

use crate::{BrokerError, BrokerResult, ParameterBroker, ParameterEntry, ParameterPath};

#[derive(Clone)]
pub struct ProviderParameterBroker {
    provider: Arc<dyn CloudProvider>,
}

impl ProviderParameterBroker {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ParameterBroker for ProviderParameterBroker {
    async fn put(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> BrokerResult<ParameterEntry> {
        Ok(self.provider.put_parameter(path, value, description).await?)
    }

    async fn get(&self, path: &ParameterPath) -> BrokerResult<ParameterEntry> {
        self.provider
            .get_parameter(path)
            .await?
            .ok_or_else(|| BrokerError::NotFound(path.clone()))
    }

    async fn list(&self, prefix: &str) -> BrokerResult<Vec<ParameterEntry>> {
        Ok(self.provider.list_parameters(prefix).await?)
    }

    async fn delete(&self, path: &ParameterPath) -> BrokerResult<bool> {
        Ok(self.provider.delete_parameter(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use local_provider::LocalProvider;
    use provider_interface::ProviderErrorKind;

    use super::*;

    #[tokio::test]
    async fn satisfies_broker_contract() {
        let broker = ProviderParameterBroker::new(Arc::new(LocalProvider::new()));
        crate::conformance::check(&broker).await;
    }

    #[tokio::test]
    async fn provider_rejections_pass_through() {
        let provider = Arc::new(LocalProvider::new());
        provider.inject_fault("put_parameter", ProviderErrorKind::Permission);
        let broker = ProviderParameterBroker::new(provider);

        let err = broker
            .put(&ParameterPath::new("u", "k"), "v", "d")
            .await
            .unwrap_err();
        match err {
            BrokerError::Provider(e) => assert_eq!(e.kind, ProviderErrorKind::Permission),
            other => panic!("unexpected error: {other}"),
        }
    }
}
