//! Types shared by every crate of the provisioning workspace.
//!
//! - [`error`]: the error taxonomy (`Config`, `NotFound`, `Provider`)
//! - [`params`]: parameter paths and entries exchanged between units
//! - [`resources`]: specs and handles crossing the provider boundary
//! - [`service`]: service, container and network attachment definitions

pub mod error;
pub mod params;
pub mod resources;
pub mod service;

pub use error::{ProviderError, ProviderErrorKind, ProvisionError, Result};
pub use params::{ParameterEntry, ParameterPath};
pub use resources::{
    CapabilityGrant, CapacityProviderKind, CapacityProviderWeight, ChangeKind, ClusterSpec,
    IdentitySpec, NatGateway, NetworkTopology, Peer, Protocol, RegistrySpec, ResourceHandle,
    ResourceKind, RetentionPolicy, SecurityGroupRule, SecurityGroupSpec, Subnet, SubnetKind,
};
pub use service::{
    ContainerSpec, ImageSource, LogSink, NetworkAttachment, ServiceDefinition,
};
