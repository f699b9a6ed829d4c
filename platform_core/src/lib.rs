//! Provisioning core for the observability platform.
//!
//! Three kinds of [`Unit`] make up a deployment:
//!
//! - [`RegistryUnit`]: the two image registries
//! - [`NetworkUnit`]: the network topology and the compute cluster
//! - [`ApplicationUnit`]: identities, the service security group and the two
//!   telemetry services, each with a collector sidecar configured by
//!   [`PipelineConfigBuilder`]
//!
//! Units hand identifiers to each other through a
//! [`ParameterBroker`](parameter_broker_interface::ParameterBroker), or, when
//! realized in the same pass with [`Handoff::Direct`], through the in-memory
//! outputs of the producing unit. [`UnitGraph`] orders and realizes them.

pub mod application;
pub mod driver;
pub mod network;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod unit;

pub use application::{ApplicationConfig, ApplicationUnit, IngressConfig};
pub use driver::{RealizationReport, UnitFailure, UnitGraph};
pub use network::{
    attach_capacity_providers, build_topology, CapacityStrategy, ClusterConfig, NetworkConfig,
    NetworkUnit,
};
pub use pipeline::{DeclarationMatcher, PipelineConfig, PipelineConfigBuilder, SourceKind};
pub use registry::{provision_registry, RegistryConfig, RegistryUnit, RepositorySlot};
pub use service::{ServiceInputs, ServiceProvisioner, ServiceVariantConfig};
pub use unit::{Handoff, OutputValue, RealizeContext, Unit, UnitKind, UnitOutputs};

pub use platform_shared_types::{ProvisionError, Result};
