use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parameter_broker_interface::ParameterBroker;
use platform_core::registry::validate_repository_name;
use platform_core::{
    build_topology, ApplicationConfig, ApplicationUnit, CapacityStrategy, ClusterConfig, Handoff,
    NetworkConfig, NetworkUnit, PipelineConfig, RegistryConfig, RegistryUnit, ServiceInputs,
    UnitGraph,
};
use platform_shared_types::{Peer, ProvisionError, Result, RetentionPolicy};
use provider_interface::CloudProvider;

use crate::error::{ConfigLoadError, ConfigResult};
use crate::paths::default_config_path;

pub const DEFAULT_DEPLOYMENT: &str = "ecs-fargate-jmx-demo";
/// Environment variable overriding the deployment name from the file.
pub const DEPLOYMENT_ENV: &str = "PLATFORM_DEPLOYMENT";

fn default_deployment() -> String {
    DEFAULT_DEPLOYMENT.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Demo,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Demo => "demo",
            Environment::Production => "production",
        })
    }
}

/// Registry settings. Repository names default to `{deployment}-prom-app`
/// and `{deployment}-otel-app`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prom_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otel_repository: Option<String>,
}

/// A default that is fine for a demo but not for production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeDefault {
    /// Registries and their images are deleted on teardown.
    DestroyRegistries,
    /// The service ingress rule admits the whole internet.
    OpenIngress { port: u16 },
}

impl fmt::Display for UnsafeDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeDefault::DestroyRegistries => {
                f.write_str("registries are destroyed with their images on teardown")
            }
            UnsafeDefault::OpenIngress { port } => {
                write!(f, "service port {port} is open to {}", Peer::AnyIpv4)
            }
        }
    }
}

/// Names of the three units of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitNames {
    pub registry: String,
    pub network: String,
    pub application: String,
}

impl UnitNames {
    pub fn for_deployment(deployment: &str) -> Self {
        Self {
            registry: format!("{deployment}-docker"),
            network: format!("{deployment}-infra"),
            application: format!("{deployment}-app"),
        }
    }

    /// In dependency order.
    pub fn all(&self) -> [&str; 3] {
        [&self.registry, &self.network, &self.application]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default)]
    pub environment: Environment,
    /// Accept destroy-on-teardown registries and open ingress in production.
    #[serde(default)]
    pub allow_unsafe_defaults: bool,
    #[serde(default)]
    pub handoff: Handoff,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub application: ApplicationConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployment: default_deployment(),
            environment: Environment::default(),
            allow_unsafe_defaults: false,
            handoff: Handoff::default(),
            registry: RegistrySettings::default(),
            network: NetworkConfig::default(),
            cluster: ClusterConfig::default(),
            application: ApplicationConfig::default(),
        }
    }
}

impl DeploymentConfig {
    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!("Loaded deployment {} from {:?}", config.deployment, path);
        Ok(config)
    }

    /// Loads `path` when given (it must exist). Otherwise loads the default
    /// config file if there is one, and falls back to the built-in demo
    /// deployment.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No deployment file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Writes the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let io = |source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(io)
    }

    /// Replaces the deployment name when `deployment` is set and not blank.
    pub fn with_deployment_override(mut self, deployment: Option<String>) -> Self {
        if let Some(name) = deployment.filter(|n| !n.trim().is_empty()) {
            if name != self.deployment {
                debug!("Deployment name overridden: {} -> {}", self.deployment, name);
            }
            self.deployment = name;
        }
        self
    }

    pub fn unit_names(&self) -> UnitNames {
        UnitNames::for_deployment(&self.deployment)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let defaults = RegistryConfig::for_deployment(&self.deployment);
        RegistryConfig {
            prom_repository: self
                .registry
                .prom_repository
                .clone()
                .unwrap_or(defaults.prom_repository),
            otel_repository: self
                .registry
                .otel_repository
                .clone()
                .unwrap_or(defaults.otel_repository),
            retention: self.registry.retention,
        }
    }

    /// Unsafe defaults this configuration carries, whatever the environment.
    pub fn unsafe_defaults(&self) -> Vec<UnsafeDefault> {
        let mut found = Vec::new();
        if self.registry.retention == RetentionPolicy::Destroy {
            found.push(UnsafeDefault::DestroyRegistries);
        }
        if self.application.ingress.is_open() {
            found.push(UnsafeDefault::OpenIngress {
                port: self.application.ingress.port,
            });
        }
        found
    }

    /// Checks everything that can be checked without a provider.
    ///
    /// In production, unsafe defaults are rejected unless
    /// `allow_unsafe_defaults` is set. Otherwise they are logged and returned.
    pub fn validate(&self) -> Result<Vec<UnsafeDefault>> {
        validate_deployment_name(&self.deployment)?;

        let registry = self.registry_config();
        validate_repository_name(&registry.prom_repository)?;
        validate_repository_name(&registry.otel_repository)?;
        if registry.prom_repository == registry.otel_repository {
            return Err(ProvisionError::config(
                "prom and otel repositories must be distinct",
            ));
        }

        let names = self.unit_names();
        build_topology(&format!("{}-vpc", names.network), &self.network)?;
        if self.cluster.name.is_empty() {
            return Err(ProvisionError::config("cluster name must not be empty"));
        }
        CapacityStrategy::new(self.cluster.capacity_providers.clone())?;

        self.validate_services()?;

        let unsafe_defaults = self.unsafe_defaults();
        if unsafe_defaults.is_empty() {
            return Ok(unsafe_defaults);
        }
        if self.environment == Environment::Production && !self.allow_unsafe_defaults {
            let reasons: Vec<String> = unsafe_defaults.iter().map(|u| u.to_string()).collect();
            return Err(ProvisionError::config(format!(
                "refusing unsafe defaults in production ({}); set allow_unsafe_defaults = true to accept them",
                reasons.join("; ")
            )));
        }
        for item in &unsafe_defaults {
            warn!("{} deployment {}: {}", self.environment, self.deployment, item);
        }
        Ok(unsafe_defaults)
    }

    /// Assembles every service against placeholder identifiers, so container
    /// and sizing mistakes surface before anything is created.
    fn validate_services(&self) -> Result<()> {
        let provisioner = self.application.provisioner();
        let registry = self.registry_config();
        let pipelines: Vec<(String, PipelineConfig)> = self.application.pipelines()?;
        for (variant, (_, pipeline)) in self.application.services.iter().zip(&pipelines) {
            provisioner.assemble(
                variant,
                &ServiceInputs {
                    execution_identity: "execution-identity",
                    task_identity: "task-identity",
                    network_id: "network",
                    security_group: "security-group",
                    workload_repository: registry.repository(variant.repository),
                    pipeline,
                },
            )?;
        }
        Ok(())
    }

    /// Validates the configuration and builds the deployment's unit graph.
    pub fn build_graph(
        &self,
        provider: Arc<dyn CloudProvider>,
        broker: Arc<dyn ParameterBroker>,
    ) -> Result<UnitGraph> {
        self.validate()?;
        let names = self.unit_names();
        let mut graph = UnitGraph::new(provider, broker).with_handoff(self.handoff);
        graph.add_unit(RegistryUnit::new(&names.registry, self.registry_config()))?;
        graph.add_unit(NetworkUnit::new(
            &names.network,
            self.network.clone(),
            self.cluster.clone(),
        ))?;
        graph.add_unit(ApplicationUnit::new(
            &names.application,
            &names.registry,
            &names.network,
            self.application.clone(),
        ))?;
        Ok(graph)
    }
}

/// Lowercase letters, digits and single hyphens; starts with a letter.
static DEPLOYMENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*$").expect("deployment name pattern is valid")
});

fn validate_deployment_name(name: &str) -> Result<()> {
    if !DEPLOYMENT_NAME.is_match(name) {
        return Err(ProvisionError::config(format!(
            "deployment name '{name}' must start with a lowercase letter and contain only \
             lowercase letters, digits and single '-' separators"
        )));
    }
    Ok(())
}
