//! The provider boundary.
//!
//! Units never talk to cloud APIs directly; every resource they declare is
//! created, updated or deleted through a [`CloudProvider`]. `ensure_*` calls
//! are upserts keyed by resource name, so realizing the same declaration twice
//! yields the same resource with [`ChangeKind::Unchanged`].

use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};

pub use platform_shared_types::{
    CapacityProviderKind, CapacityProviderWeight, ChangeKind, ClusterSpec, IdentitySpec,
    NetworkTopology, ParameterEntry, ParameterPath, ProviderError, ProviderErrorKind,
    RegistrySpec, ResourceHandle, ResourceKind, SecurityGroupSpec, ServiceDefinition,
};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[async_trait]
pub trait CloudProvider: DowncastSync {
    // --- network -----------------------------------------------------------

    async fn ensure_network(
        &self,
        name: &str,
        topology: &NetworkTopology,
    ) -> ProviderResult<ResourceHandle>;

    /// Returns `false` if the network did not exist.
    async fn delete_network(&self, name: &str) -> ProviderResult<bool>;

    async fn ensure_security_group(&self, spec: &SecurityGroupSpec)
        -> ProviderResult<ResourceHandle>;

    async fn delete_security_group(&self, name: &str) -> ProviderResult<bool>;

    // --- cluster -----------------------------------------------------------

    async fn ensure_cluster(&self, spec: &ClusterSpec) -> ProviderResult<ResourceHandle>;

    /// Makes capacity providers available to the cluster. Has no effect on
    /// placement until a strategy references them.
    async fn enable_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProviderKind],
    ) -> ProviderResult<()>;

    /// Sets the default placement strategy. Every referenced provider must
    /// already be enabled.
    async fn set_default_capacity_strategy(
        &self,
        cluster: &str,
        strategy: &[CapacityProviderWeight],
    ) -> ProviderResult<()>;

    async fn delete_cluster(&self, name: &str) -> ProviderResult<bool>;

    // --- registry ----------------------------------------------------------

    async fn ensure_registry(&self, spec: &RegistrySpec) -> ProviderResult<ResourceHandle>;

    /// Deletes the registry together with any images it holds.
    async fn delete_registry(&self, name: &str) -> ProviderResult<bool>;

    // --- identity ----------------------------------------------------------

    async fn ensure_identity(&self, spec: &IdentitySpec) -> ProviderResult<ResourceHandle>;

    async fn delete_identity(&self, name: &str) -> ProviderResult<bool>;

    // --- service -----------------------------------------------------------

    async fn ensure_service(
        &self,
        cluster: &str,
        definition: &ServiceDefinition,
    ) -> ProviderResult<ResourceHandle>;

    async fn delete_service(&self, cluster: &str, name: &str) -> ProviderResult<bool>;

    // --- durable parameters ------------------------------------------------

    async fn put_parameter(
        &self,
        path: &ParameterPath,
        value: &str,
        description: &str,
    ) -> ProviderResult<ParameterEntry>;

    async fn get_parameter(&self, path: &ParameterPath) -> ProviderResult<Option<ParameterEntry>>;

    async fn list_parameters(&self, prefix: &str) -> ProviderResult<Vec<ParameterEntry>>;

    async fn delete_parameter(&self, path: &ParameterPath) -> ProviderResult<bool>;
}

impl_downcast!(sync CloudProvider);
