//! In-process implementation of the provider boundary.
//!
//! [`LocalProvider`] keeps every resource in memory, keyed by name, and can
//! optionally persist its inventory to a JSON snapshot so that units realized
//! by separate invocations see each other's resources. It validates the
//! references a real provider would validate (a service's cluster, network,
//! security groups, identities and repositories must exist) and supports
//! fault injection for tests.

pub mod inventory;
pub mod provider;

pub use inventory::{ClusterRecord, Inventory, Record};
pub use provider::{LocalProvider, LocalProviderConfig};

pub use provider_interface::{CloudProvider, ProviderResult};
