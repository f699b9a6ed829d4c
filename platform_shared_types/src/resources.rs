//! Resource specs and handles passed across the provider boundary.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of resources the provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Cluster,
    Registry,
    Identity,
    SecurityGroup,
    Service,
    Parameter,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Network => "network",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Registry => "registry",
            ResourceKind::Identity => "identity",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::Service => "service",
            ResourceKind::Parameter => "parameter",
        };
        f.write_str(s)
    }
}

/// What an `ensure_*` call did to the underlying resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Unchanged,
}

/// Stable reference to a provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    /// Addressable location, set for registries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub change: ChangeKind,
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetKind {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub zone: String,
    pub kind: SubnetKind,
    pub cidr: String,
    /// NAT gateway used for egress; private subnets only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_via: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatGateway {
    pub name: String,
    pub zone: String,
    /// Public subnet hosting the gateway.
    pub subnet: String,
}

/// Address space, zones, subnets and egress of the shared network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub address_space: String,
    pub availability_zones: Vec<String>,
    pub subnets: Vec<Subnet>,
    pub nat_gateways: Vec<NatGateway>,
}

impl NetworkTopology {
    pub fn availability_zone_count(&self) -> usize {
        self.availability_zones.len()
    }

    pub fn nat_gateway_count(&self) -> usize {
        self.nat_gateways.len()
    }

    pub fn subnets_of(&self, kind: SubnetKind) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(move |s| s.kind == kind)
    }

    /// Private subnets whose egress does not resolve to a NAT gateway.
    pub fn unrouted_private_subnets(&self) -> Vec<&str> {
        self.subnets_of(SubnetKind::Private)
            .filter(|s| {
                s.egress_via
                    .as_deref()
                    .map(|nat| !self.nat_gateways.iter().any(|g| g.name == nat))
                    .unwrap_or(true)
            })
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Source of traffic allowed by a security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
}

impl Peer {
    pub fn is_open(&self) -> bool {
        match self {
            Peer::AnyIpv4 => true,
            Peer::Cidr(cidr) => cidr == "0.0.0.0/0",
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => f.write_str("0.0.0.0/0"),
            Peer::Cidr(cidr) => f.write_str(cidr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub peer: Peer,
    pub protocol: Protocol,
    pub port: u16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub network_id: String,
    pub description: String,
    pub allow_all_outbound: bool,
    pub ingress: Vec<SecurityGroupRule>,
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapacityProviderKind {
    #[serde(rename = "FARGATE")]
    Fargate,
    #[serde(rename = "FARGATE_SPOT")]
    FargateSpot,
}

impl fmt::Display for CapacityProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityProviderKind::Fargate => f.write_str("FARGATE"),
            CapacityProviderKind::FargateSpot => f.write_str("FARGATE_SPOT"),
        }
    }
}

/// One entry of a capacity provider strategy. Weight 0 keeps the provider
/// available without ever preferring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProviderWeight {
    pub kind: CapacityProviderKind,
    pub weight: u32,
}

impl CapacityProviderWeight {
    pub const fn new(kind: CapacityProviderKind, weight: u32) -> Self {
        Self { kind, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub network_id: String,
    pub container_insights: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// What happens to a registry and its images on teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Delete the registry and its images. Not suitable for production.
    #[default]
    Destroy,
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub name: String,
    pub retention: RetentionPolicy,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityGrant {
    PullImages,
    WriteLogs,
    EmitMetrics,
}

impl CapabilityGrant {
    /// Managed policy granting the capability.
    pub fn managed_policy(&self) -> &'static str {
        match self {
            CapabilityGrant::PullImages | CapabilityGrant::WriteLogs => {
                "service-role/AmazonECSTaskExecutionRolePolicy"
            }
            CapabilityGrant::EmitMetrics => "CloudWatchAgentServerPolicy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub name: String,
    pub assumed_by: String,
    pub grants: BTreeSet<CapabilityGrant>,
}

impl IdentitySpec {
    pub fn managed_policies(&self) -> BTreeSet<&'static str> {
        self.grants.iter().map(CapabilityGrant::managed_policy).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(egress: Option<&str>) -> NetworkTopology {
        NetworkTopology {
            address_space: "10.0.0.0/16".into(),
            availability_zones: vec!["az1".into()],
            subnets: vec![
                Subnet {
                    name: "public-az1".into(),
                    zone: "az1".into(),
                    kind: SubnetKind::Public,
                    cidr: "10.0.0.0/17".into(),
                    egress_via: None,
                },
                Subnet {
                    name: "private-az1".into(),
                    zone: "az1".into(),
                    kind: SubnetKind::Private,
                    cidr: "10.0.128.0/17".into(),
                    egress_via: egress.map(str::to_string),
                },
            ],
            nat_gateways: vec![NatGateway {
                name: "nat-az1".into(),
                zone: "az1".into(),
                subnet: "public-az1".into(),
            }],
        }
    }

    #[test]
    fn private_subnet_without_nat_is_reported() {
        assert!(topology(Some("nat-az1")).unrouted_private_subnets().is_empty());
        assert_eq!(topology(None).unrouted_private_subnets(), vec!["private-az1"]);
        assert_eq!(topology(Some("nat-az9")).unrouted_private_subnets(), vec!["private-az1"]);
    }

    #[test]
    fn capacity_provider_kind_uses_provider_names() {
        let json = serde_json::to_string(&CapacityProviderWeight::new(
            CapacityProviderKind::FargateSpot,
            0,
        ))
        .unwrap();
        assert_eq!(json, r#"{"kind":"FARGATE_SPOT","weight":0}"#);
    }

    #[test]
    fn execution_grants_map_to_managed_policies() {
        let spec = IdentitySpec {
            name: "exec".into(),
            assumed_by: "ecs-tasks.amazonaws.com".into(),
            grants: [
                CapabilityGrant::PullImages,
                CapabilityGrant::WriteLogs,
                CapabilityGrant::EmitMetrics,
            ]
            .into_iter()
            .collect(),
        };
        let policies = spec.managed_policies();
        assert_eq!(policies.len(), 2);
        assert!(policies.contains("CloudWatchAgentServerPolicy"));
    }

    #[test]
    fn open_peers() {
        assert!(Peer::AnyIpv4.is_open());
        assert!(Peer::Cidr("0.0.0.0/0".into()).is_open());
        assert!(!Peer::Cidr("10.0.0.0/8".into()).is_open());
    }
}
