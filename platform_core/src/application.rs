//! The application unit: identities, the service security group and the
//! telemetry services.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use platform_shared_types::{
    CapabilityGrant, IdentitySpec, Peer, Protocol, ProvisionError, Result, SecurityGroupRule,
    SecurityGroupSpec, ServiceDefinition,
};

use crate::network::{CLUSTER_NAME_KEY, VPC_ID_KEY};
use crate::pipeline::{PipelineConfig, PipelineConfigBuilder};
use crate::service::{ServiceInputs, ServiceProvisioner, ServiceVariantConfig, DEFAULT_COLLECTOR_IMAGE};
use crate::unit::{RealizeContext, Unit, UnitKind, UnitOutputs};

pub const TASK_SERVICE_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
/// Cluster the services were placed on, published for teardown.
const DEPLOYED_CLUSTER_KEY: &str = "clusterName";

fn default_ingress_port() -> u16 {
    80
}

fn default_ingress_peer() -> Peer {
    Peer::AnyIpv4
}

fn default_ingress_description() -> String {
    "Allow HTTP traffic".to_string()
}

/// The one ingress rule shared by every service. Open to the internet by
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    #[serde(default = "default_ingress_port")]
    pub port: u16,
    #[serde(default = "default_ingress_peer")]
    pub peer: Peer,
    #[serde(default = "default_ingress_description")]
    pub description: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            port: default_ingress_port(),
            peer: default_ingress_peer(),
            description: default_ingress_description(),
        }
    }
}

impl IngressConfig {
    pub fn is_open(&self) -> bool {
        self.peer.is_open()
    }
}

fn default_namespace() -> String {
    "ecs-jmx-demo".to_string()
}

fn default_collector_image() -> String {
    DEFAULT_COLLECTOR_IMAGE.to_string()
}

fn default_services() -> Vec<ServiceVariantConfig> {
    vec![ServiceVariantConfig::scrape(), ServiceVariantConfig::push()]
}

fn default_cpu() -> u32 {
    256
}

fn default_memory() -> u32 {
    512
}

fn default_desired_count() -> u32 {
    1
}

fn default_log_retention_days() -> u32 {
    7
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Metrics namespace; also names the log group `/aws/ecs/{namespace}`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_collector_image")]
    pub collector_image: String,
    #[serde(default)]
    pub ingress: IngressConfig,
    #[serde(default = "default_services")]
    pub services: Vec<ServiceVariantConfig>,
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    #[serde(default = "default_memory")]
    pub memory_mib: u32,
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            collector_image: default_collector_image(),
            ingress: IngressConfig::default(),
            services: default_services(),
            cpu: default_cpu(),
            memory_mib: default_memory(),
            desired_count: default_desired_count(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl ApplicationConfig {
    pub fn provisioner(&self) -> ServiceProvisioner {
        ServiceProvisioner {
            collector_image: self.collector_image.clone(),
            cpu: self.cpu,
            memory_mib: self.memory_mib,
            desired_count: self.desired_count,
            log_retention_days: self.log_retention_days,
            assign_public_ip: true,
        }
    }

    /// One pipeline per configured service, in service order.
    pub fn pipelines(&self) -> Result<Vec<(String, PipelineConfig)>> {
        if self.services.is_empty() {
            return Err(ProvisionError::config("no services configured"));
        }
        let mut names = BTreeSet::new();
        let mut pipelines = Vec::with_capacity(self.services.len());
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(ProvisionError::config(format!(
                    "service {} is configured twice",
                    service.name
                )));
            }
            let pipeline =
                PipelineConfigBuilder::new(&service.name, &self.namespace).build(service.source)?;
            pipelines.push((service.name.clone(), pipeline));
        }
        Ok(pipelines)
    }
}

/// Deploys the telemetry services onto the network unit's cluster, pulling
/// workload images from the registry unit's repositories.
#[derive(Debug, Clone)]
pub struct ApplicationUnit {
    name: String,
    registry_unit: String,
    network_unit: String,
    config: ApplicationConfig,
}

impl ApplicationUnit {
    pub fn new(
        name: impl Into<String>,
        registry_unit: impl Into<String>,
        network_unit: impl Into<String>,
        config: ApplicationConfig,
    ) -> Self {
        Self {
            name: name.into(),
            registry_unit: registry_unit.into(),
            network_unit: network_unit.into(),
            config,
        }
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    fn execution_identity(&self) -> IdentitySpec {
        IdentitySpec {
            name: format!("{}-TaskExecutionRole", self.name),
            assumed_by: TASK_SERVICE_PRINCIPAL.to_string(),
            grants: BTreeSet::from([
                CapabilityGrant::PullImages,
                CapabilityGrant::WriteLogs,
                CapabilityGrant::EmitMetrics,
            ]),
        }
    }

    fn task_identity(&self) -> IdentitySpec {
        IdentitySpec {
            name: format!("{}-TaskRole", self.name),
            assumed_by: TASK_SERVICE_PRINCIPAL.to_string(),
            grants: BTreeSet::from([CapabilityGrant::EmitMetrics]),
        }
    }

    fn security_group_name(&self) -> String {
        format!("{}-ServiceSecurityGroup", self.name)
    }

    fn security_group(&self, network_id: &str) -> SecurityGroupSpec {
        SecurityGroupSpec {
            name: self.security_group_name(),
            network_id: network_id.to_string(),
            description: "Security group for Fargate service".to_string(),
            allow_all_outbound: true,
            ingress: vec![SecurityGroupRule {
                peer: self.config.ingress.peer.clone(),
                protocol: Protocol::Tcp,
                port: self.config.ingress.port,
                description: self.config.ingress.description.clone(),
            }],
        }
    }
}

#[async_trait]
impl Unit for ApplicationUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Application
    }

    fn depends_on(&self) -> Vec<String> {
        vec![self.registry_unit.clone(), self.network_unit.clone()]
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn realize(&self, ctx: &RealizeContext<'_>) -> Result<UnitOutputs> {
        // Everything that can fail without touching the provider happens
        // first, so a missing upstream value leaves nothing behind.
        let pipelines = self.config.pipelines()?;
        let provisioner = self.config.provisioner();
        for variant in &self.config.services {
            provisioner.validate(variant)?;
        }
        if self.config.ingress.is_open() {
            warn!(
                "Service ingress on port {} is open to {}",
                self.config.ingress.port, self.config.ingress.peer
            );
        }

        let network_id = ctx.resolve(&self.network_unit, VPC_ID_KEY).await?;
        let cluster = ctx.resolve(&self.network_unit, CLUSTER_NAME_KEY).await?;
        let mut repositories = BTreeMap::new();
        for slot in self.config.services.iter().map(|s| s.repository) {
            if !repositories.contains_key(&slot) {
                let name = ctx.resolve(&self.registry_unit, slot.parameter_key()).await?;
                repositories.insert(slot, name);
            }
        }

        let execution = ctx.provider.ensure_identity(&self.execution_identity()).await?;
        let task = ctx.provider.ensure_identity(&self.task_identity()).await?;
        let group = ctx
            .provider
            .ensure_security_group(&self.security_group(&network_id))
            .await?;

        let mut definitions: Vec<ServiceDefinition> = Vec::with_capacity(pipelines.len());
        for (variant, (_, pipeline)) in self.config.services.iter().zip(&pipelines) {
            let repository = repositories.get(&variant.repository).ok_or_else(|| {
                ProvisionError::not_found(format!("repository for service {}", variant.name))
            })?;
            let inputs = ServiceInputs {
                execution_identity: &execution.id,
                task_identity: &task.id,
                network_id: &network_id,
                security_group: &group.id,
                workload_repository: repository,
                pipeline,
            };
            definitions.push(provisioner.assemble(variant, &inputs)?);
        }

        let mut outputs = UnitOutputs::new(&self.name, UnitKind::Application);
        ctx.publish(
            &mut outputs,
            DEPLOYED_CLUSTER_KEY,
            &cluster,
            "Cluster the application services run on",
        )
        .await?;

        let mut resources = vec![execution, task, group];
        for definition in &definitions {
            let handle = provisioner.realize(ctx.provider, &cluster, definition).await?;
            outputs.add_output(
                &definition.name,
                &handle.id,
                format!("Service {} on {cluster}", definition.name),
            );
            resources.push(handle);
        }
        info!(
            "Application {} runs {} services on {}",
            self.name,
            definitions.len(),
            cluster
        );
        outputs.resources = resources;
        Ok(outputs)
    }

    #[instrument(skip_all, fields(unit = %self.name))]
    async fn teardown(&self, ctx: &RealizeContext<'_>) -> Result<()> {
        let cluster = match ctx.lookup(&self.name, DEPLOYED_CLUSTER_KEY).await? {
            Some(cluster) => cluster,
            None => {
                info!("Application {} was never deployed", self.name);
                return Ok(());
            }
        };

        for service in &self.config.services {
            if ctx.provider.delete_service(&cluster, &service.name).await? {
                info!("Deleted service {} from {}", service.name, cluster);
            }
        }
        ctx.provider
            .delete_security_group(&self.security_group_name())
            .await?;
        for identity in [self.execution_identity(), self.task_identity()] {
            ctx.provider.delete_identity(&identity.name).await?;
        }
        ctx.unpublish_all(&self.name).await?;
        Ok(())
    }
}
