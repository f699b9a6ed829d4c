//! Service and container definitions handed to the provider.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::resources::SubnetKind;

/// Where a container image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// An image in one of the platform's own registries.
    Repository { name: String, tag: String },
    /// A fully qualified public image reference.
    Public { uri: String },
}

impl ImageSource {
    pub fn repository(name: impl Into<String>) -> Self {
        ImageSource::Repository {
            name: name.into(),
            tag: "latest".to_string(),
        }
    }

    pub fn public(uri: impl Into<String>) -> Self {
        ImageSource::Public { uri: uri.into() }
    }

    pub fn is_repository(&self) -> bool {
        matches!(self, ImageSource::Repository { .. })
    }
}

/// Log destination of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSink {
    pub stream_prefix: String,
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageSource,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub port_mappings: BTreeSet<u16>,
    pub essential: bool,
    pub logging: LogSink,
}

/// How a service joins the shared network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    pub network_id: String,
    pub subnet_kind: SubnetKind,
    pub assign_public_ip: bool,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    /// CPU units (1024 = one vCPU).
    pub cpu: u32,
    pub memory_mib: u32,
    pub execution_identity: String,
    pub task_identity: String,
    pub containers: Vec<ContainerSpec>,
    pub network_attachment: NetworkAttachment,
    pub desired_count: u32,
}

impl ServiceDefinition {
    /// Containers running an image from the platform's registries.
    pub fn workload_containers(&self) -> impl Iterator<Item = &ContainerSpec> {
        self.containers.iter().filter(|c| c.image.is_repository())
    }

    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}
