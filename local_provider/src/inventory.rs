//! Resource inventory held by [`LocalProvider`](crate::LocalProvider).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use platform_shared_types::{
    CapacityProviderKind, CapacityProviderWeight, ChangeKind, ClusterSpec, IdentitySpec,
    NetworkTopology, ParameterEntry, RegistrySpec, ResourceKind, SecurityGroupSpec,
    ServiceDefinition,
};

/// A stored resource and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: String,
    pub spec: T,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T: Clone + PartialEq> Record<T> {
    fn new(id: String, spec: &T) -> Self {
        let now = Utc::now();
        Self {
            id,
            spec: spec.clone(),
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, spec: &T) -> ChangeKind {
        if &self.spec == spec {
            return ChangeKind::Unchanged;
        }
        self.spec = spec.clone();
        self.revision += 1;
        self.updated_at = Utc::now();
        ChangeKind::Updated
    }
}

/// Inserts or updates `spec` under `name`, keeping the existing id.
pub(crate) fn upsert<T: Clone + PartialEq>(
    map: &mut BTreeMap<String, Record<T>>,
    name: &str,
    spec: &T,
    new_id: impl FnOnce() -> String,
) -> (String, ChangeKind) {
    match map.get_mut(name) {
        Some(record) => {
            let change = record.apply(spec);
            (record.id.clone(), change)
        }
        None => {
            let record = Record::new(new_id(), spec);
            let id = record.id.clone();
            map.insert(name.to_string(), record);
            (id, ChangeKind::Created)
        }
    }
}

/// Cluster flavour of [`upsert`]; capacity settings survive spec updates.
pub(crate) fn upsert_cluster(
    map: &mut BTreeMap<String, ClusterRecord>,
    spec: &ClusterSpec,
    new_id: impl FnOnce() -> String,
) -> (String, ChangeKind) {
    match map.get_mut(&spec.name) {
        Some(cluster) => {
            let change = cluster.record.apply(spec);
            (cluster.record.id.clone(), change)
        }
        None => {
            let record = Record::new(new_id(), spec);
            let id = record.id.clone();
            map.insert(
                spec.name.clone(),
                ClusterRecord {
                    record,
                    enabled_providers: BTreeSet::new(),
                    default_strategy: Vec::new(),
                },
            );
            (id, ChangeKind::Created)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    #[serde(flatten)]
    pub record: Record<ClusterSpec>,
    #[serde(default)]
    pub enabled_providers: BTreeSet<CapacityProviderKind>,
    #[serde(default)]
    pub default_strategy: Vec<CapacityProviderWeight>,
}

impl ClusterRecord {
    /// Provider new tasks are placed on: the enabled provider with the highest
    /// positive weight. `None` while no strategy is set.
    pub fn preferred_provider(&self) -> Option<CapacityProviderKind> {
        self.default_strategy
            .iter()
            .filter(|w| w.weight > 0 && self.enabled_providers.contains(&w.kind))
            .fold(None, |best: Option<&CapacityProviderWeight>, w| match best {
                Some(b) if b.weight >= w.weight => Some(b),
                _ => Some(w),
            })
            .map(|w| w.kind)
    }
}

/// Everything the local provider currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub networks: BTreeMap<String, Record<NetworkTopology>>,
    #[serde(default)]
    pub security_groups: BTreeMap<String, Record<SecurityGroupSpec>>,
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterRecord>,
    #[serde(default)]
    pub registries: BTreeMap<String, Record<RegistrySpec>>,
    #[serde(default)]
    pub identities: BTreeMap<String, Record<IdentitySpec>>,
    /// Keyed by `{cluster}/{service}`.
    #[serde(default)]
    pub services: BTreeMap<String, Record<ServiceDefinition>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterEntry>,
}

impl Inventory {
    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Network => self.networks.len(),
            ResourceKind::Cluster => self.clusters.len(),
            ResourceKind::Registry => self.registries.len(),
            ResourceKind::Identity => self.identities.len(),
            ResourceKind::SecurityGroup => self.security_groups.len(),
            ResourceKind::Service => self.services.len(),
            ResourceKind::Parameter => self.parameters.len(),
        }
    }

    pub fn service_key(cluster: &str, name: &str) -> String {
        format!("{cluster}/{name}")
    }

    pub fn service(&self, cluster: &str, name: &str) -> Option<&Record<ServiceDefinition>> {
        self.services.get(&Self::service_key(cluster, name))
    }

    pub(crate) fn network_by_id(&self, id: &str) -> Option<&Record<NetworkTopology>> {
        self.networks.values().find(|r| r.id == id)
    }

    pub(crate) fn has_security_group_id(&self, id: &str) -> bool {
        self.security_groups.values().any(|r| r.id == id)
    }

    pub(crate) fn has_identity_id(&self, id: &str) -> bool {
        self.identities.values().any(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(enabled: &[CapacityProviderKind], strategy: &[(CapacityProviderKind, u32)]) -> ClusterRecord {
        ClusterRecord {
            record: Record::new(
                "cluster-1".into(),
                &ClusterSpec {
                    name: "jmx-demo".into(),
                    network_id: "vpc-1".into(),
                    container_insights: true,
                },
            ),
            enabled_providers: enabled.iter().copied().collect(),
            default_strategy: strategy
                .iter()
                .map(|(k, w)| CapacityProviderWeight::new(*k, *w))
                .collect(),
        }
    }

    #[test]
    fn enabling_without_strategy_places_nothing() {
        let c = cluster(
            &[CapacityProviderKind::Fargate, CapacityProviderKind::FargateSpot],
            &[],
        );
        assert_eq!(c.preferred_provider(), None);
    }

    #[test]
    fn zero_weight_is_never_preferred() {
        let c = cluster(
            &[CapacityProviderKind::Fargate, CapacityProviderKind::FargateSpot],
            &[
                (CapacityProviderKind::FargateSpot, 0),
                (CapacityProviderKind::Fargate, 1),
            ],
        );
        assert_eq!(c.preferred_provider(), Some(CapacityProviderKind::Fargate));
    }

    #[test]
    fn upsert_keeps_id_and_reports_change() {
        let mut map = BTreeMap::new();
        let (id, change) = upsert(&mut map, "a", &1u32, || "id-1".into());
        assert_eq!((id.as_str(), change), ("id-1", ChangeKind::Created));

        let (id, change) = upsert(&mut map, "a", &1u32, || "id-2".into());
        assert_eq!((id.as_str(), change), ("id-1", ChangeKind::Unchanged));

        let (id, change) = upsert(&mut map, "a", &2u32, || "id-3".into());
        assert_eq!((id.as_str(), change), ("id-1", ChangeKind::Updated));
        assert_eq!(map["a"].revision, 2);
    }
}
