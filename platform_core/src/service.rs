//! Service assembly: a workload container plus its collector sidecar.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use platform_shared_types::{
    ContainerSpec, ImageSource, LogSink, NetworkAttachment, ProvisionError, ResourceHandle,
    Result, ServiceDefinition, SubnetKind,
};
use provider_interface::CloudProvider;

use crate::pipeline::{PipelineConfig, SourceKind};
use crate::registry::RepositorySlot;

pub const DEFAULT_COLLECTOR_IMAGE: &str =
    "public.ecr.aws/aws-observability/aws-otel-collector:v0.43.2";
/// X-Ray, StatsD, OTLP gRPC and OTLP HTTP.
pub const COLLECTOR_PORTS: [u16; 4] = [2000, 8125, 4317, 4318];
/// Environment variable the collector reads its configuration from.
pub const COLLECTOR_CONFIG_ENV: &str = "AOT_CONFIG_CONTENT";
pub const COLLECTOR_SERVICE_NAME_ENV: &str = "SERVICE_NAME";
const OTLP_HTTP_LOCAL: &str = "http://localhost:4318";

/// One telemetry service: which registry its workload comes from and how
/// the collector gets the workload's metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceVariantConfig {
    pub name: String,
    pub source: SourceKind,
    pub repository: RepositorySlot,
    pub workload_container: String,
    pub collector_container: String,
    pub workload_stream_prefix: String,
    pub collector_stream_prefix: String,
    pub workload_ports: BTreeSet<u16>,
    /// Added to (and overriding) the source kind's default environment.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl ServiceVariantConfig {
    /// OTLP push variant.
    pub fn push() -> Self {
        Self {
            name: "otel-jmx-demo".to_string(),
            source: SourceKind::Push,
            repository: RepositorySlot::Otel,
            workload_container: "OtelContainer".to_string(),
            collector_container: "OtelCollectorContainer".to_string(),
            workload_stream_prefix: "otel-container".to_string(),
            collector_stream_prefix: "ecs-otel".to_string(),
            workload_ports: BTreeSet::from([8080]),
            environment: BTreeMap::new(),
        }
    }

    /// Prometheus scrape variant.
    pub fn scrape() -> Self {
        Self {
            name: "prom-jmx-demo".to_string(),
            source: SourceKind::Scrape,
            repository: RepositorySlot::Prom,
            workload_container: "PromContainer".to_string(),
            collector_container: "PromCollectorContainer".to_string(),
            workload_stream_prefix: "prom-container".to_string(),
            collector_stream_prefix: "ecs-prom".to_string(),
            workload_ports: BTreeSet::from([8080, 9404]),
            environment: BTreeMap::new(),
        }
    }

    pub fn workload_environment(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if self.source == SourceKind::Push {
            for (key, value) in [
                ("OTEL_JMX_TARGET_SYSTEM", "jvm".to_string()),
                ("AWS_JMX_ENABLED", "true".to_string()),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", OTLP_HTTP_LOCAL.to_string()),
                ("AWS_JMX_EXPORTER_METRICS_ENDPOINT", OTLP_HTTP_LOCAL.to_string()),
                ("OTEL_SERVICE_NAME", self.name.clone()),
                ("OTEL_RESOURCE_ATTRIBUTES", format!("service.name={}", self.name)),
            ] {
                env.insert(key.to_string(), value);
            }
        }
        env.extend(self.environment.clone());
        env
    }
}

/// Identifiers a service is assembled from. All of them are resolved before
/// assembly.
#[derive(Debug, Clone)]
pub struct ServiceInputs<'a> {
    pub execution_identity: &'a str,
    pub task_identity: &'a str,
    pub network_id: &'a str,
    pub security_group: &'a str,
    pub workload_repository: &'a str,
    pub pipeline: &'a PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProvisioner {
    pub collector_image: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub desired_count: u32,
    pub log_retention_days: u32,
    pub assign_public_ip: bool,
}

impl Default for ServiceProvisioner {
    fn default() -> Self {
        Self {
            collector_image: DEFAULT_COLLECTOR_IMAGE.to_string(),
            cpu: 256,
            memory_mib: 512,
            desired_count: 1,
            log_retention_days: 7,
            assign_public_ip: true,
        }
    }
}

impl ServiceProvisioner {
    /// Checks the sizing and the variant's container layout. Pure: no
    /// provider calls.
    pub fn validate(&self, variant: &ServiceVariantConfig) -> Result<()> {
        if self.cpu == 0 || self.memory_mib == 0 {
            return Err(ProvisionError::config(format!(
                "service {} needs non-zero cpu and memory",
                variant.name
            )));
        }
        if self.collector_image.is_empty() {
            return Err(ProvisionError::config("collector image must not be empty"));
        }
        if variant.workload_container == variant.collector_container {
            return Err(ProvisionError::config(format!(
                "service {} uses the same name for both containers",
                variant.name
            )));
        }
        // Containers of a task share one network namespace.
        if let Some(port) = variant
            .workload_ports
            .iter()
            .find(|p| COLLECTOR_PORTS.contains(*p))
        {
            return Err(ProvisionError::config(format!(
                "workload port {port} of {} collides with the collector",
                variant.name
            )));
        }
        Ok(())
    }

    /// Builds the service definition. Pure: no provider calls.
    pub fn assemble(
        &self,
        variant: &ServiceVariantConfig,
        inputs: &ServiceInputs<'_>,
    ) -> Result<ServiceDefinition> {
        self.validate(variant)?;
        inputs.pipeline.validate()?;

        let workload = ContainerSpec {
            name: variant.workload_container.clone(),
            image: ImageSource::repository(inputs.workload_repository),
            environment: variant.workload_environment(),
            port_mappings: variant.workload_ports.clone(),
            essential: true,
            logging: LogSink {
                stream_prefix: variant.workload_stream_prefix.clone(),
                retention_days: self.log_retention_days,
            },
        };

        let collector = ContainerSpec {
            name: variant.collector_container.clone(),
            image: ImageSource::public(&self.collector_image),
            environment: BTreeMap::from([
                (COLLECTOR_CONFIG_ENV.to_string(), inputs.pipeline.to_json()?),
                (COLLECTOR_SERVICE_NAME_ENV.to_string(), variant.name.clone()),
            ]),
            port_mappings: COLLECTOR_PORTS.into_iter().collect(),
            essential: true,
            logging: LogSink {
                stream_prefix: variant.collector_stream_prefix.clone(),
                retention_days: self.log_retention_days,
            },
        };

        Ok(ServiceDefinition {
            name: variant.name.clone(),
            cpu: self.cpu,
            memory_mib: self.memory_mib,
            execution_identity: inputs.execution_identity.to_string(),
            task_identity: inputs.task_identity.to_string(),
            containers: vec![workload, collector],
            network_attachment: NetworkAttachment {
                network_id: inputs.network_id.to_string(),
                subnet_kind: SubnetKind::Public,
                assign_public_ip: self.assign_public_ip,
                security_groups: vec![inputs.security_group.to_string()],
            },
            desired_count: self.desired_count,
        })
    }

    pub async fn realize(
        &self,
        provider: &dyn CloudProvider,
        cluster: &str,
        definition: &ServiceDefinition,
    ) -> Result<ResourceHandle> {
        debug!(
            "Realizing {} with {} containers on {}",
            definition.name,
            definition.containers.len(),
            cluster
        );
        let handle = provider.ensure_service(cluster, definition).await?;
        info!("Service {} ({}): {:?}", handle.name, handle.id, handle.change);
        Ok(handle)
    }
}
