//! Network topology, compute cluster and the unit that realizes both.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use platform_shared_types::{
    CapacityProviderKind, CapacityProviderWeight, ClusterSpec, NatGateway, NetworkTopology,
    ProvisionError, Result, Subnet, SubnetKind,
};
use provider_interface::CloudProvider;

use crate::unit::{RealizeContext, Unit, UnitKind, UnitOutputs};

pub const VPC_ID_KEY: &str = "vpcId";
pub const CLUSTER_NAME_KEY: &str = "clusterName";

/// Smallest subnet the provider accepts.
const MAX_SUBNET_PREFIX: u8 = 28;
const MIN_NETWORK_PREFIX: u8 = 16;

fn default_address_space() -> String {
    "10.0.0.0/16".to_string()
}

fn default_availability_zones() -> usize {
    2
}

fn default_nat_gateways() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_address_space")]
    pub address_space: String,
    #[serde(default = "default_availability_zones")]
    pub availability_zones: usize,
    #[serde(default = "default_nat_gateways")]
    pub nat_gateways: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address_space: default_address_space(),
            availability_zones: default_availability_zones(),
            nat_gateways: default_nat_gateways(),
        }
    }
}

fn parse_cidr(cidr: &str) -> Result<(u32, u8)> {
    let invalid = || ProvisionError::config(format!("address space '{cidr}' is not an IPv4 CIDR block"));
    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if !(MIN_NETWORK_PREFIX..=MAX_SUBNET_PREFIX).contains(&prefix) {
        return Err(ProvisionError::config(format!(
            "address space '{cidr}' must have a prefix between /{MIN_NETWORK_PREFIX} and /{MAX_SUBNET_PREFIX}"
        )));
    }
    let base = u32::from(addr);
    let mask = u32::MAX << (32 - prefix);
    if base & !mask != 0 {
        return Err(ProvisionError::config(format!(
            "address space '{cidr}' has host bits set"
        )));
    }
    Ok((base, prefix))
}

/// `zone-a` .. `zone-z`, then `zone-aa`, `zone-ab` and so on.
fn zone_name(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    loop {
        letters.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    let suffix: String = letters.into_iter().rev().collect();
    format!("zone-{suffix}")
}

/// Lays out the network deterministically.
///
/// The address space is split into `2 * availability_zones` equal subnets:
/// public subnets first, one per zone, then private subnets in the same zone
/// order. Gateway `i` sits in public subnet `i % availability_zones` and
/// private subnet `i` egresses through gateway `i % nat_gateways`. The zone
/// count is bounded only by how many subnets the address space can hold.
pub fn build_topology(name: &str, config: &NetworkConfig) -> Result<NetworkTopology> {
    let az_count = config.availability_zones;
    let nat_count = config.nat_gateways;
    if az_count < 1 {
        return Err(ProvisionError::config(
            "at least one availability zone is required",
        ));
    }
    if nat_count < 1 {
        return Err(ProvisionError::config(
            "at least one NAT gateway is required for private subnet egress",
        ));
    }

    let (base, prefix) = parse_cidr(&config.address_space)?;
    let subnet_count = 2 * az_count;
    let extra_bits = (usize::BITS - (subnet_count - 1).leading_zeros()) as u8;
    let subnet_prefix = prefix + extra_bits;
    if subnet_prefix > MAX_SUBNET_PREFIX {
        return Err(ProvisionError::config(format!(
            "address space {} is too small for {subnet_count} subnets",
            config.address_space
        )));
    }
    let subnet_size = 1u32 << (32 - subnet_prefix);
    let cidr_at = |slot: usize| {
        let start = base + subnet_size * slot as u32;
        format!("{}/{}", Ipv4Addr::from(start), subnet_prefix)
    };

    let zones: Vec<String> = (0..az_count).map(zone_name).collect();

    let public: Vec<Subnet> = zones
        .iter()
        .enumerate()
        .map(|(i, zone)| Subnet {
            name: format!("{name}-public-{zone}"),
            zone: zone.clone(),
            kind: SubnetKind::Public,
            cidr: cidr_at(i),
            egress_via: None,
        })
        .collect();

    let nat_gateways: Vec<NatGateway> = (0..nat_count)
        .map(|i| {
            let subnet = &public[i % az_count];
            NatGateway {
                name: format!("{name}-nat-{}", i + 1),
                zone: subnet.zone.clone(),
                subnet: subnet.name.clone(),
            }
        })
        .collect();

    let private = zones.iter().enumerate().map(|(i, zone)| Subnet {
        name: format!("{name}-private-{zone}"),
        zone: zone.clone(),
        kind: SubnetKind::Private,
        cidr: cidr_at(az_count + i),
        egress_via: Some(nat_gateways[i % nat_count].name.clone()),
    });

    let subnets = public.iter().cloned().chain(private).collect();

    Ok(NetworkTopology {
        address_space: config.address_space.clone(),
        availability_zones: zones,
        subnets,
        nat_gateways,
    })
}

/// Ordered capacity provider weights for a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityStrategy(Vec<CapacityProviderWeight>);

impl CapacityStrategy {
    /// At least one entry must carry a positive weight; each provider may
    /// appear once.
    pub fn new(weights: Vec<CapacityProviderWeight>) -> Result<Self> {
        if weights.is_empty() {
            return Err(ProvisionError::config("capacity strategy is empty"));
        }
        if weights.iter().all(|w| w.weight == 0) {
            return Err(ProvisionError::config(
                "capacity strategy needs at least one provider with a positive weight",
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = weights.iter().find(|w| !seen.insert(w.kind)) {
            return Err(ProvisionError::config(format!(
                "capacity provider {} listed twice",
                dup.kind
            )));
        }
        Ok(Self(weights))
    }

    pub fn weights(&self) -> &[CapacityProviderWeight] {
        &self.0
    }

    pub fn providers(&self) -> Vec<CapacityProviderKind> {
        self.0.iter().map(|w| w.kind).collect()
    }
}

/// Enables the strategy's providers on `cluster`, then makes the weights its
/// default placement strategy.
pub async fn attach_capacity_providers(
    provider: &dyn CloudProvider,
    cluster: &str,
    strategy: &CapacityStrategy,
) -> Result<()> {
    provider
        .enable_capacity_providers(cluster, &strategy.providers())
        .await?;
    provider
        .set_default_capacity_strategy(cluster, strategy.weights())
        .await?;
    Ok(())
}

fn default_cluster_name() -> String {
    "jmx-demo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_capacity_providers() -> Vec<CapacityProviderWeight> {
    vec![
        CapacityProviderWeight::new(CapacityProviderKind::Fargate, 1),
        // Kept at zero so spot capacity can be shifted in later.
        CapacityProviderWeight::new(CapacityProviderKind::FargateSpot, 0),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub container_insights: bool,
    #[serde(default = "default_capacity_providers")]
    pub capacity_providers: Vec<CapacityProviderWeight>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            container_insights: true,
            capacity_providers: default_capacity_providers(),
        }
    }
}

/// Realizes the shared network and the cluster running on it.
///
/// Publishes `vpcId` and `clusterName`.
#[derive(Debug, Clone)]
pub struct NetworkUnit {
    name: String,
    network: NetworkConfig,
    cluster: ClusterConfig,
}

impl NetworkUnit {
    pub fn new(name: impl Into<String>, network: NetworkConfig, cluster: ClusterConfig) -> Self {
        Self {
            name: name.into(),
            network,
            cluster,
        }
    }

    pub fn network_name(&self) -> String {
        format!("{}-vpc", self.name)
    }

    pub fn cluster_config(&self) -> &ClusterConfig {
        &self.cluster
    }
}

#[async_trait]
impl Unit for NetworkUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Network
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn realize(&self, ctx: &RealizeContext<'_>) -> Result<UnitOutputs> {
        let network_name = self.network_name();
        let topology = build_topology(&network_name, &self.network)?;
        let strategy = CapacityStrategy::new(self.cluster.capacity_providers.clone())?;
        if self.cluster.name.is_empty() {
            return Err(ProvisionError::config("cluster name must not be empty"));
        }

        let network = ctx.provider.ensure_network(&network_name, &topology).await?;
        info!(
            "Network {} ({}) across {} zones with {} NAT gateways: {:?}",
            network.name,
            network.id,
            topology.availability_zone_count(),
            topology.nat_gateway_count(),
            network.change
        );

        let cluster = ctx
            .provider
            .ensure_cluster(&ClusterSpec {
                name: self.cluster.name.clone(),
                network_id: network.id.clone(),
                container_insights: self.cluster.container_insights,
            })
            .await?;
        attach_capacity_providers(ctx.provider, &cluster.name, &strategy).await?;
        info!("Cluster {} on {}: {:?}", cluster.name, network.id, cluster.change);

        let mut outputs = UnitOutputs::new(&self.name, UnitKind::Network);
        ctx.publish(&mut outputs, VPC_ID_KEY, &network.id, "The ID of the VPC")
            .await?;
        ctx.publish(&mut outputs, CLUSTER_NAME_KEY, &cluster.name, "The name of the ECS cluster")
            .await?;
        outputs.add_output("ClusterName", &cluster.name, "The name of the ECS cluster");
        outputs.add_output("VpcId", &network.id, "The ID of the VPC");
        outputs.resources = vec![network, cluster];
        Ok(outputs)
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn teardown(&self, ctx: &RealizeContext<'_>) -> Result<()> {
        if ctx.provider.delete_cluster(&self.cluster.name).await? {
            info!("Deleted cluster {}", self.cluster.name);
        }
        if ctx.provider.delete_network(&self.network_name()).await? {
            info!("Deleted network {}", self.network_name());
        }
        ctx.unpublish_all(&self.name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use local_provider::LocalProvider;
    use parameter_broker_interface::{InMemoryParameterBroker, ParameterBroker};
    use platform_shared_types::{ParameterPath, ProviderErrorKind, ResourceKind};

    use super::*;
    use crate::unit::Handoff;

    fn config(az: usize, nat: usize) -> NetworkConfig {
        NetworkConfig {
            availability_zones: az,
            nat_gateways: nat,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn default_layout_matches_two_zone_single_nat() {
        let t = build_topology("demo", &NetworkConfig::default()).unwrap();
        assert_eq!(t.availability_zones, vec!["zone-a", "zone-b"]);
        let cidrs: Vec<&str> = t.subnets.iter().map(|s| s.cidr.as_str()).collect();
        assert_eq!(
            cidrs,
            ["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18", "10.0.192.0/18"]
        );
        assert_eq!(t.nat_gateways.len(), 1);
        assert_eq!(t.nat_gateways[0].subnet, "demo-public-zone-a");
        assert!(t.unrouted_private_subnets().is_empty());
    }

    #[test]
    fn zone_and_egress_counts_follow_input() {
        for az in 1..=8 {
            for nat in 1..=az + 2 {
                let t = build_topology("n", &config(az, nat)).unwrap();
                assert_eq!(t.availability_zone_count(), az);
                assert_eq!(t.nat_gateway_count(), nat);
                assert_eq!(t.subnets_of(SubnetKind::Private).count(), az);
                assert!(t.unrouted_private_subnets().is_empty());
            }
        }
    }

    #[test]
    fn private_subnets_spread_over_gateways() {
        let t = build_topology("n", &config(3, 2)).unwrap();
        let egress: Vec<&str> = t
            .subnets_of(SubnetKind::Private)
            .filter_map(|s| s.egress_via.as_deref())
            .collect();
        assert_eq!(egress, ["n-nat-1", "n-nat-2", "n-nat-1"]);
    }

    #[test]
    fn more_gateways_than_zones_wrap_over_public_subnets() {
        let t = build_topology("n", &config(1, 2)).unwrap();
        assert_eq!(t.nat_gateway_count(), 2);
        let placed: Vec<&str> = t.nat_gateways.iter().map(|g| g.subnet.as_str()).collect();
        assert_eq!(placed, ["n-public-zone-a", "n-public-zone-a"]);
        let egress: Vec<&str> = t
            .subnets_of(SubnetKind::Private)
            .filter_map(|s| s.egress_via.as_deref())
            .collect();
        assert_eq!(egress, ["n-nat-1"]);

        let t = build_topology("n", &config(2, 3)).unwrap();
        let placed: Vec<&str> = t.nat_gateways.iter().map(|g| g.subnet.as_str()).collect();
        assert_eq!(placed, ["n-public-zone-a", "n-public-zone-b", "n-public-zone-a"]);
    }

    #[test]
    fn zone_count_is_bounded_by_address_space() {
        let t = build_topology("n", &config(30, 1)).unwrap();
        assert_eq!(t.availability_zone_count(), 30);
        assert_eq!(t.availability_zones[25], "zone-z");
        assert_eq!(t.availability_zones[26], "zone-aa");
        let names: std::collections::BTreeSet<&str> =
            t.subnets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), 60);

        let small = NetworkConfig {
            address_space: "10.0.0.0/24".into(),
            ..config(16, 1)
        };
        assert!(build_topology("n", &small).unwrap_err().is_config());
    }

    #[test]
    fn layout_is_deterministic() {
        let a = build_topology("n", &config(3, 3)).unwrap();
        let b = build_topology("n", &config(3, 3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_counts_and_address_spaces() {
        assert!(build_topology("n", &config(0, 1)).unwrap_err().is_config());
        assert!(build_topology("n", &config(2, 0)).unwrap_err().is_config());

        for space in ["10.0.0.0", "10.0.0.1/16", "10.0.0.0/8", "nonsense/16", "10.0.0.0/28"] {
            let cfg = NetworkConfig {
                address_space: space.into(),
                ..NetworkConfig::default()
            };
            assert!(build_topology("n", &cfg).unwrap_err().is_config(), "{space}");
        }
    }

    #[test]
    fn capacity_strategy_validation() {
        use CapacityProviderKind::*;
        assert!(CapacityStrategy::new(vec![]).unwrap_err().is_config());
        assert!(CapacityStrategy::new(vec![CapacityProviderWeight::new(Fargate, 0)])
            .unwrap_err()
            .is_config());
        assert!(CapacityStrategy::new(vec![
            CapacityProviderWeight::new(Fargate, 1),
            CapacityProviderWeight::new(Fargate, 2),
        ])
        .unwrap_err()
        .is_config());
        let ok = CapacityStrategy::new(default_capacity_providers()).unwrap();
        assert_eq!(ok.providers(), vec![Fargate, FargateSpot]);
    }

    #[tokio::test]
    async fn enable_and_strategy_are_separate_steps() {
        let provider = LocalProvider::new();
        let network = provider
            .ensure_network("n", &build_topology("n", &NetworkConfig::default()).unwrap())
            .await
            .unwrap();
        provider
            .ensure_cluster(&ClusterSpec {
                name: "jmx-demo".into(),
                network_id: network.id,
                container_insights: true,
            })
            .await
            .unwrap();

        provider
            .enable_capacity_providers("jmx-demo", &[CapacityProviderKind::Fargate])
            .await
            .unwrap();
        let enabled = provider.cluster("jmx-demo").await.unwrap();
        assert_eq!(enabled.preferred_provider(), None);

        let strategy = CapacityStrategy::new(default_capacity_providers()).unwrap();
        attach_capacity_providers(&provider, "jmx-demo", &strategy)
            .await
            .unwrap();
        let cluster = provider.cluster("jmx-demo").await.unwrap();
        assert_eq!(cluster.default_strategy, default_capacity_providers());
        assert_eq!(cluster.preferred_provider(), Some(CapacityProviderKind::Fargate));
    }

    #[tokio::test]
    async fn unit_publishes_network_and_cluster() {
        let provider = LocalProvider::new();
        let broker = InMemoryParameterBroker::new();
        let upstream = BTreeMap::new();
        let ctx = RealizeContext {
            provider: &provider,
            broker: &broker,
            handoff: Handoff::Broker,
            upstream: &upstream,
        };
        let unit = NetworkUnit::new("demo-infra", NetworkConfig::default(), ClusterConfig::default());

        let outputs = unit.realize(&ctx).await.unwrap();
        let vpc_id = outputs.output("VpcId").unwrap().to_string();
        assert!(vpc_id.starts_with("vpc-"));
        assert_eq!(outputs.output("ClusterName").unwrap(), "jmx-demo");
        assert_eq!(
            broker
                .get_value(&ParameterPath::new("demo-infra", VPC_ID_KEY))
                .await
                .unwrap(),
            vpc_id
        );

        unit.teardown(&ctx).await.unwrap();
        assert_eq!(provider.count(ResourceKind::Network).await, 0);
        assert_eq!(provider.count(ResourceKind::Cluster).await, 0);
        assert!(broker.list("/demo-infra/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_makes_no_provider_calls() {
        let provider = LocalProvider::new();
        provider.inject_fault("ensure_network", ProviderErrorKind::Permission);
        let broker = InMemoryParameterBroker::new();
        let upstream = BTreeMap::new();
        let ctx = RealizeContext {
            provider: &provider,
            broker: &broker,
            handoff: Handoff::Broker,
            upstream: &upstream,
        };
        let unit = NetworkUnit::new("demo-infra", config(1, 2), ClusterConfig::default());

        // A provider call would have surfaced the injected fault instead.
        assert!(unit.realize(&ctx).await.unwrap_err().is_config());
    }
}
