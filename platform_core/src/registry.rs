//! Image registries for the two telemetry variants.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use platform_shared_types::{
    ProvisionError, RegistrySpec, ResourceHandle, Result, RetentionPolicy,
};
use provider_interface::CloudProvider;

use crate::unit::{RealizeContext, Unit, UnitKind, UnitOutputs};

pub const PROM_REPOSITORY_KEY: &str = "promRepositoryName";
pub const OTEL_REPOSITORY_KEY: &str = "otelRepositoryName";

/// Which of the two registries a service pulls its workload image from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositorySlot {
    Prom,
    Otel,
}

impl RepositorySlot {
    /// Logical name the registry unit publishes the repository name under.
    pub fn parameter_key(&self) -> &'static str {
        match self {
            RepositorySlot::Prom => PROM_REPOSITORY_KEY,
            RepositorySlot::Otel => OTEL_REPOSITORY_KEY,
        }
    }
}

static REPOSITORY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$")
        .expect("repository name pattern is valid")
});

pub fn validate_repository_name(name: &str) -> Result<()> {
    if name.len() < 2 || name.len() > 256 || !REPOSITORY_NAME.is_match(name) {
        return Err(ProvisionError::config(format!(
            "'{name}' is not a valid repository name"
        )));
    }
    Ok(())
}

/// Creates (or confirms) one registry.
pub async fn provision_registry(
    provider: &dyn CloudProvider,
    name: &str,
    retention: RetentionPolicy,
) -> Result<ResourceHandle> {
    validate_repository_name(name)?;
    let handle = provider
        .ensure_registry(&RegistrySpec {
            name: name.to_string(),
            retention,
        })
        .await?;
    info!("Registry {} ({}): {:?}", handle.name, handle.id, handle.change);
    Ok(handle)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub prom_repository: String,
    pub otel_repository: String,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

impl RegistryConfig {
    /// Names derived from the deployment id: `{id}-prom-app`, `{id}-otel-app`.
    pub fn for_deployment(deployment: &str) -> Self {
        Self {
            prom_repository: format!("{deployment}-prom-app"),
            otel_repository: format!("{deployment}-otel-app"),
            retention: RetentionPolicy::default(),
        }
    }

    pub fn repository(&self, slot: RepositorySlot) -> &str {
        match slot {
            RepositorySlot::Prom => &self.prom_repository,
            RepositorySlot::Otel => &self.otel_repository,
        }
    }
}

/// Provisions both registries and publishes their names.
#[derive(Debug, Clone)]
pub struct RegistryUnit {
    name: String,
    config: RegistryConfig,
}

impl RegistryUnit {
    pub fn new(name: impl Into<String>, config: RegistryConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

#[async_trait]
impl Unit for RegistryUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Registry
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn realize(&self, ctx: &RealizeContext<'_>) -> Result<UnitOutputs> {
        validate_repository_name(&self.config.prom_repository)?;
        validate_repository_name(&self.config.otel_repository)?;
        if self.config.prom_repository == self.config.otel_repository {
            return Err(ProvisionError::config(
                "prom and otel repositories must be distinct",
            ));
        }
        if self.config.retention == RetentionPolicy::Destroy {
            warn!("Registries will be deleted with their images on teardown");
        }

        let retention = self.config.retention;
        let prom = provision_registry(ctx.provider, &self.config.prom_repository, retention).await?;
        let otel = provision_registry(ctx.provider, &self.config.otel_repository, retention).await?;

        let mut outputs = UnitOutputs::new(&self.name, UnitKind::Registry);
        ctx.publish(
            &mut outputs,
            PROM_REPOSITORY_KEY,
            &prom.name,
            "The Prom app URI of the ECR repository",
        )
        .await?;
        ctx.publish(
            &mut outputs,
            OTEL_REPOSITORY_KEY,
            &otel.name,
            "The Otel app URI of the ECR repository",
        )
        .await?;

        if let Some(uri) = &prom.uri {
            outputs.add_output("jmxRepositoryURI", uri, "The JMX app URI of the ECR repository");
        }
        if let Some(uri) = &otel.uri {
            outputs.add_output("otelRepositoryURI", uri, "The Otel app URI of the ECR repository");
        }
        outputs.resources = vec![prom, otel];
        Ok(outputs)
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn teardown(&self, ctx: &RealizeContext<'_>) -> Result<()> {
        match self.config.retention {
            RetentionPolicy::Destroy => {
                for name in [&self.config.prom_repository, &self.config.otel_repository] {
                    if ctx.provider.delete_registry(name).await? {
                        info!("Deleted registry {} and its images", name);
                    }
                }
            }
            RetentionPolicy::Retain => {
                info!(
                    "Retaining registries {} and {}",
                    self.config.prom_repository, self.config.otel_repository
                );
            }
        }
        ctx.unpublish_all(&self.name).await?;
        Ok(())
    }
}
