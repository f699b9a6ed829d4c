//! The local provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use platform_shared_types::{
    CapacityProviderKind, CapacityProviderWeight, ChangeKind, ClusterSpec, IdentitySpec,
    ImageSource, NetworkTopology, ParameterEntry, ParameterPath, ProviderError,
    ProviderErrorKind, RegistrySpec, ResourceHandle, ResourceKind, SecurityGroupSpec,
    ServiceDefinition,
};
use provider_interface::{CloudProvider, ProviderResult};

use crate::inventory::{upsert, upsert_cluster, ClusterRecord, Inventory, Record};

/// Configuration for [`LocalProvider`].
#[derive(Debug, Clone)]
pub struct LocalProviderConfig {
    pub account_id: String,
    pub region: String,
    /// Inventory snapshot location. `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            account_id: "000000000000".to_string(),
            region: "us-east-1".to_string(),
            snapshot_path: None,
        }
    }
}

pub struct LocalProvider {
    config: LocalProviderConfig,
    inventory: RwLock<Inventory>,
    /// Operation name -> error kind returned instead of performing it.
    faults: Mutex<HashMap<String, ProviderErrorKind>>,
}

fn new_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..12])
}

fn unavailable(operation: &str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::new(operation, ProviderErrorKind::Unavailable, err.to_string())
}

impl LocalProvider {
    /// Create an in-memory provider with default configuration.
    pub fn new() -> Self {
        Self::with_inventory(LocalProviderConfig::default(), Inventory::default())
    }

    fn with_inventory(config: LocalProviderConfig, inventory: Inventory) -> Self {
        Self {
            config,
            inventory: RwLock::new(inventory),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Create a provider backed by a snapshot file, loading it if it exists.
    pub async fn open(config: LocalProviderConfig) -> ProviderResult<Self> {
        let inventory = match &config.snapshot_path {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| unavailable("open", e))?;
                let inventory: Inventory =
                    serde_json::from_str(&raw).map_err(|e| unavailable("open", e))?;
                info!("Loaded provider snapshot from {:?}", path);
                inventory
            }
            _ => Inventory::default(),
        };
        Ok(Self::with_inventory(config, inventory))
    }

    pub fn config(&self) -> &LocalProviderConfig {
        &self.config
    }

    /// Make every call to `operation` fail with `kind` until cleared.
    pub fn inject_fault(&self, operation: &str, kind: ProviderErrorKind) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation.to_string(), kind);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// A copy of the current inventory.
    pub async fn inventory(&self) -> Inventory {
        self.inventory.read().await.clone()
    }

    pub async fn count(&self, kind: ResourceKind) -> usize {
        self.inventory.read().await.count(kind)
    }

    pub async fn cluster(&self, name: &str) -> Option<ClusterRecord> {
        self.inventory.read().await.clusters.get(name).cloned()
    }

    pub async fn service(&self, cluster: &str, name: &str) -> Option<Record<ServiceDefinition>> {
        self.inventory.read().await.service(cluster, name).cloned()
    }

    fn registry_uri(&self, name: &str) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}",
            self.config.account_id, self.config.region, name
        )
    }

    fn check_fault(&self, operation: &str) -> ProviderResult<()> {
        let kind = self
            .faults
            .lock()
            .ok()
            .and_then(|faults| faults.get(operation).copied());
        match kind {
            Some(kind) => {
                warn!("Injected fault for {}: {}", operation, kind);
                Err(ProviderError::new(operation, kind, "injected fault"))
            }
            None => Ok(()),
        }
    }

    /// Writes `staged` to the snapshot, then makes it the live inventory.
    /// A failed write leaves the live inventory as it was.
    async fn commit(
        &self,
        live: &mut Inventory,
        staged: Inventory,
        operation: &str,
    ) -> ProviderResult<()> {
        if let Some(path) = &self.config.snapshot_path {
            write_snapshot(path, &staged)
                .await
                .map_err(|e| unavailable(operation, e))?;
        }
        *live = staged;
        Ok(())
    }

    fn handle(kind: ResourceKind, id: String, name: &str, change: ChangeKind) -> ResourceHandle {
        ResourceHandle {
            kind,
            id,
            name: name.to_string(),
            uri: None,
            change,
        }
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_snapshot(path: &Path, inventory: &Inventory) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(inventory)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl CloudProvider for LocalProvider {
    async fn ensure_network(
        &self,
        name: &str,
        topology: &NetworkTopology,
    ) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_network";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let (id, change) = upsert(&mut inventory.networks, name, topology, || new_id("vpc"));
        self.commit(&mut live, inventory, OP).await?;

        debug!("Network {} ({}) {:?}", name, id, change);
        Ok(Self::handle(ResourceKind::Network, id, name, change))
    }

    async fn delete_network(&self, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_network";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let Some(network_id) = inventory.networks.get(name).map(|r| r.id.clone()) else {
            return Ok(false);
        };
        let in_use = inventory
            .clusters
            .values()
            .any(|c| c.record.spec.network_id == network_id)
            || inventory
                .security_groups
                .values()
                .any(|g| g.spec.network_id == network_id);
        if in_use {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::Conflict,
                format!("network {name} still has dependent resources"),
            ));
        }

        inventory.networks.remove(name);
        self.commit(&mut live, inventory, OP).await?;
        Ok(true)
    }

    async fn ensure_security_group(
        &self,
        spec: &SecurityGroupSpec,
    ) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_security_group";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        if inventory.network_by_id(&spec.network_id).is_none() {
            return Err(ProviderError::not_found(OP, format!("network {}", spec.network_id)));
        }
        let (id, change) = upsert(&mut inventory.security_groups, &spec.name, spec, || {
            new_id("sg")
        });
        self.commit(&mut live, inventory, OP).await?;

        Ok(Self::handle(ResourceKind::SecurityGroup, id, &spec.name, change))
    }

    async fn delete_security_group(&self, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_security_group";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let Some(group_id) = inventory.security_groups.get(name).map(|r| r.id.clone()) else {
            return Ok(false);
        };
        let in_use = inventory
            .services
            .values()
            .any(|s| s.spec.network_attachment.security_groups.contains(&group_id));
        if in_use {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::Conflict,
                format!("security group {name} is attached to a service"),
            ));
        }

        inventory.security_groups.remove(name);
        self.commit(&mut live, inventory, OP).await?;
        Ok(true)
    }

    async fn ensure_cluster(&self, spec: &ClusterSpec) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_cluster";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        if inventory.network_by_id(&spec.network_id).is_none() {
            return Err(ProviderError::not_found(OP, format!("network {}", spec.network_id)));
        }

        let (id, change) = upsert_cluster(&mut inventory.clusters, spec, || new_id("cluster"));
        self.commit(&mut live, inventory, OP).await?;

        Ok(Self::handle(ResourceKind::Cluster, id, &spec.name, change))
    }

    async fn enable_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProviderKind],
    ) -> ProviderResult<()> {
        const OP: &str = "enable_capacity_providers";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let record = inventory
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| ProviderError::not_found(OP, format!("cluster {cluster}")))?;
        record.enabled_providers.extend(providers.iter().copied());
        self.commit(&mut live, inventory, OP).await
    }

    async fn set_default_capacity_strategy(
        &self,
        cluster: &str,
        strategy: &[CapacityProviderWeight],
    ) -> ProviderResult<()> {
        const OP: &str = "set_default_capacity_strategy";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let record = inventory
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| ProviderError::not_found(OP, format!("cluster {cluster}")))?;
        if let Some(missing) = strategy
            .iter()
            .find(|w| !record.enabled_providers.contains(&w.kind))
        {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::InvalidRequest,
                format!("capacity provider {} is not enabled on {cluster}", missing.kind),
            ));
        }
        record.default_strategy = strategy.to_vec();
        self.commit(&mut live, inventory, OP).await
    }

    async fn delete_cluster(&self, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_cluster";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        if !inventory.clusters.contains_key(name) {
            return Ok(false);
        }
        let prefix = Inventory::service_key(name, "");
        if inventory.services.keys().any(|k| k.starts_with(&prefix)) {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::Conflict,
                format!("cluster {name} still runs services"),
            ));
        }
        inventory.clusters.remove(name);
        self.commit(&mut live, inventory, OP).await?;
        Ok(true)
    }

    async fn ensure_registry(&self, spec: &RegistrySpec) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_registry";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let (id, change) = upsert(&mut inventory.registries, &spec.name, spec, || new_id("repo"));
        self.commit(&mut live, inventory, OP).await?;

        let mut handle = Self::handle(ResourceKind::Registry, id, &spec.name, change);
        handle.uri = Some(self.registry_uri(&spec.name));
        Ok(handle)
    }

    async fn delete_registry(&self, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_registry";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let removed = inventory.registries.remove(name).is_some();
        if removed {
            self.commit(&mut live, inventory, OP).await?;
        }
        Ok(removed)
    }

    async fn ensure_identity(&self, spec: &IdentitySpec) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_identity";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let (id, change) = upsert(&mut inventory.identities, &spec.name, spec, || new_id("role"));
        self.commit(&mut live, inventory, OP).await?;

        Ok(Self::handle(ResourceKind::Identity, id, &spec.name, change))
    }

    async fn delete_identity(&self, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_identity";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let Some(identity_id) = inventory.identities.get(name).map(|r| r.id.clone()) else {
            return Ok(false);
        };
        let in_use = inventory.services.values().any(|s| {
            s.spec.execution_identity == identity_id || s.spec.task_identity == identity_id
        });
        if in_use {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::Conflict,
                format!("identity {name} is used by a service"),
            ));
        }
        inventory.identities.remove(name);
        self.commit(&mut live, inventory, OP).await?;
        Ok(true)
    }

    async fn ensure_service(
        &self,
        cluster: &str,
        definition: &ServiceDefinition,
    ) -> ProviderResult<ResourceHandle> {
        const OP: &str = "ensure_service";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        if !inventory.clusters.contains_key(cluster) {
            return Err(ProviderError::not_found(OP, format!("cluster {cluster}")));
        }
        let attachment = &definition.network_attachment;
        if inventory.network_by_id(&attachment.network_id).is_none() {
            return Err(ProviderError::not_found(
                OP,
                format!("network {}", attachment.network_id),
            ));
        }
        if let Some(group) = attachment
            .security_groups
            .iter()
            .find(|g| !inventory.has_security_group_id(g))
        {
            return Err(ProviderError::not_found(OP, format!("security group {group}")));
        }
        for identity in [&definition.execution_identity, &definition.task_identity] {
            if !inventory.has_identity_id(identity) {
                return Err(ProviderError::not_found(OP, format!("identity {identity}")));
            }
        }
        for container in &definition.containers {
            if let ImageSource::Repository { name, .. } = &container.image {
                if !inventory.registries.contains_key(name) {
                    return Err(ProviderError::not_found(OP, format!("repository {name}")));
                }
            }
        }

        let key = Inventory::service_key(cluster, &definition.name);
        let (id, change) = upsert(&mut inventory.services, &key, definition, || new_id("svc"));
        self.commit(&mut live, inventory, OP).await?;

        info!("Service {} on {} {:?}", definition.name, cluster, change);
        Ok(Self::handle(ResourceKind::Service, id, &definition.name, change))
    }

    async fn delete_service(&self, cluster: &str, name: &str) -> ProviderResult<bool> {
        const OP: &str = "delete_service";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let removed = inventory
            .services
            .remove(&Inventory::service_key(cluster, name))
            .is_some();
        if removed {
            self.commit(&mut live, inventory, OP).await?;
        }
        Ok(removed)
    }

    async fn put_parameter(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> ProviderResult<ParameterEntry> {
        const OP: &str = "put_parameter";
        self.check_fault(OP)?;
        if value.is_empty() {
            return Err(ProviderError::new(
                OP,
                ProviderErrorKind::InvalidRequest,
                format!("parameter {path} must have a non-empty value"),
            ));
        }

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let entry = match inventory.parameters.get_mut(path.as_str()) {
            Some(entry) => {
                entry.overwrite(value, description);
                entry.clone()
            }
            None => {
                let entry = ParameterEntry::new(path.clone(), value, description);
                inventory
                    .parameters
                    .insert(path.as_str().to_string(), entry.clone());
                entry
            }
        };
        self.commit(&mut live, inventory, OP).await?;
        Ok(entry)
    }

    async fn get_parameter(&self, path: &ParameterPath) -> ProviderResult<Option<ParameterEntry>> {
        self.check_fault("get_parameter")?;
        Ok(self.inventory.read().await.parameters.get(path.as_str()).cloned())
    }

    async fn list_parameters(&self, prefix: &str) -> ProviderResult<Vec<ParameterEntry>> {
        self.check_fault("list_parameters")?;
        Ok(self
            .inventory
            .read()
            .await
            .parameters
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn delete_parameter(&self, path: &ParameterPath) -> ProviderResult<bool> {
        const OP: &str = "delete_parameter";
        self.check_fault(OP)?;

        let mut live = self.inventory.write().await;
        let mut inventory = live.clone();
        let removed = inventory.parameters.remove(path.as_str()).is_some();
        if removed {
            self.commit(&mut live, inventory, OP).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use platform_shared_types::{
        CapabilityGrant, ContainerSpec, LogSink, NetworkAttachment, RetentionPolicy, SubnetKind,
    };

    use super::*;

    fn topology() -> NetworkTopology {
        NetworkTopology {
            address_space: "10.0.0.0/16".into(),
            availability_zones: vec!["az1".into()],
            subnets: Vec::new(),
            nat_gateways: Vec::new(),
        }
    }

    fn service(network_id: &str, group: &str, role: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: "otel-jmx-demo".into(),
            cpu: 256,
            memory_mib: 512,
            execution_identity: role.into(),
            task_identity: role.into(),
            containers: vec![ContainerSpec {
                name: "OtelContainer".into(),
                image: ImageSource::repository("demo-otel-app"),
                environment: BTreeMap::new(),
                port_mappings: BTreeSet::from([8080]),
                essential: true,
                logging: LogSink {
                    stream_prefix: "otel-container".into(),
                    retention_days: 7,
                },
            }],
            network_attachment: NetworkAttachment {
                network_id: network_id.into(),
                subnet_kind: SubnetKind::Public,
                assign_public_ip: true,
                security_groups: vec![group.into()],
            },
            desired_count: 1,
        }
    }

    #[tokio::test]
    async fn ensure_is_idempotent_by_name() {
        let provider = LocalProvider::new();
        let spec = RegistrySpec {
            name: "demo-prom-app".into(),
            retention: RetentionPolicy::Destroy,
        };

        let first = provider.ensure_registry(&spec).await.unwrap();
        let second = provider.ensure_registry(&spec).await.unwrap();

        assert_eq!(first.change, ChangeKind::Created);
        assert_eq!(second.change, ChangeKind::Unchanged);
        assert_eq!(first.id, second.id);
        assert_eq!(
            first.uri.as_deref(),
            Some("000000000000.dkr.ecr.us-east-1.amazonaws.com/demo-prom-app")
        );
        assert_eq!(provider.count(ResourceKind::Registry).await, 1);
    }

    #[tokio::test]
    async fn strategy_requires_enabled_providers() {
        let provider = LocalProvider::new();
        let network = provider.ensure_network("vpc", &topology()).await.unwrap();
        provider
            .ensure_cluster(&ClusterSpec {
                name: "jmx-demo".into(),
                network_id: network.id,
                container_insights: true,
            })
            .await
            .unwrap();

        let strategy = [CapacityProviderWeight::new(CapacityProviderKind::Fargate, 1)];
        let err = provider
            .set_default_capacity_strategy("jmx-demo", &strategy)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        provider
            .enable_capacity_providers("jmx-demo", &[CapacityProviderKind::Fargate])
            .await
            .unwrap();
        assert_eq!(
            provider.cluster("jmx-demo").await.unwrap().preferred_provider(),
            None
        );

        provider
            .set_default_capacity_strategy("jmx-demo", &strategy)
            .await
            .unwrap();
        assert_eq!(
            provider.cluster("jmx-demo").await.unwrap().preferred_provider(),
            Some(CapacityProviderKind::Fargate)
        );
    }

    #[tokio::test]
    async fn service_references_are_validated() {
        let provider = LocalProvider::new();
        provider.ensure_network("vpc", &topology()).await.unwrap();
        let network = provider.ensure_network("vpc", &topology()).await.unwrap();
        provider
            .ensure_cluster(&ClusterSpec {
                name: "jmx-demo".into(),
                network_id: network.id.clone(),
                container_insights: true,
            })
            .await
            .unwrap();

        let err = provider
            .ensure_service("jmx-demo", &service(&network.id, "sg-missing", "role-missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotFound);

        let group = provider
            .ensure_security_group(&SecurityGroupSpec {
                name: "svc".into(),
                network_id: network.id.clone(),
                description: "test".into(),
                allow_all_outbound: true,
                ingress: Vec::new(),
            })
            .await
            .unwrap();
        let role = provider
            .ensure_identity(&IdentitySpec {
                name: "task".into(),
                assumed_by: "ecs-tasks.amazonaws.com".into(),
                grants: BTreeSet::from([CapabilityGrant::EmitMetrics]),
            })
            .await
            .unwrap();
        provider
            .ensure_registry(&RegistrySpec {
                name: "demo-otel-app".into(),
                retention: RetentionPolicy::Destroy,
            })
            .await
            .unwrap();

        let handle = provider
            .ensure_service("jmx-demo", &service(&network.id, &group.id, &role.id))
            .await
            .unwrap();
        assert_eq!(handle.change, ChangeKind::Created);

        let err = provider.delete_cluster("jmx-demo").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Conflict);
    }

    #[tokio::test]
    async fn injected_fault_is_returned_until_cleared() {
        let provider = LocalProvider::new();
        provider.inject_fault("ensure_network", ProviderErrorKind::Quota);

        let err = provider.ensure_network("vpc", &topology()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Quota);
        assert_eq!(err.operation, "ensure_network");

        provider.clear_faults();
        assert!(provider.ensure_network("vpc", &topology()).await.is_ok());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocalProviderConfig {
            snapshot_path: Some(dir.path().join("provider.json")),
            ..Default::default()
        };

        let provider = LocalProvider::open(config.clone()).await.unwrap();
        let created = provider.ensure_network("vpc", &topology()).await.unwrap();
        provider
            .put_parameter(&ParameterPath::new("infra", "vpcId"), &created.id, "VPC id")
            .await
            .unwrap();
        drop(provider);

        let reopened = LocalProvider::open(config).await.unwrap();
        let again = reopened.ensure_network("vpc", &topology()).await.unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.change, ChangeKind::Unchanged);
        let entry = reopened
            .get_parameter(&ParameterPath::new("infra", "vpcId"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.value, created.id);
    }

    #[tokio::test]
    async fn failed_snapshot_write_keeps_inventory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "not a directory").unwrap();
        let provider = LocalProvider::open(LocalProviderConfig {
            snapshot_path: Some(blocker.join("provider.json")),
            ..Default::default()
        })
        .await
        .unwrap();

        let err = provider.ensure_network("vpc", &topology()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unavailable);
        assert_eq!(provider.count(ResourceKind::Network).await, 0);

        std::fs::remove_file(&blocker).unwrap();
        let retry = provider.ensure_network("vpc", &topology()).await.unwrap();
        assert_eq!(retry.change, ChangeKind::Created);
        assert_eq!(provider.count(ResourceKind::Network).await, 1);
    }
}
