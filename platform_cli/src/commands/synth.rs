//! Synth command - show what a deployment would create, without creating it.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use local_provider::LocalProvider;
use parameter_broker_interface::InMemoryParameterBroker;
use platform_config::DeploymentConfig;
use platform_core::service::COLLECTOR_CONFIG_ENV;
use platform_core::{build_topology, NetworkConfig, NetworkUnit, PipelineConfig};
use platform_shared_types::{NetworkTopology, Subnet, SubnetKind};

use super::Context;
use crate::error::CliError;
use crate::output::{self, print_data, print_document, section};
use crate::state::LocalState;
use crate::OutputFormat;

/// Arguments for the synth command.
#[derive(Args)]
pub struct SynthArgs {
    /// Only show this service's collector configuration
    #[arg(short, long)]
    service: Option<String>,

    /// Read the collector configuration carried by the deployed services
    /// instead of generating it
    #[arg(long)]
    deployed: bool,
}

#[cfg(test)]
impl SynthArgs {
    pub(crate) fn deployed() -> Self {
        Self {
            service: None,
            deployed: true,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct PlanRow {
    #[tabled(rename = "Wave")]
    wave: usize,
    #[tabled(rename = "Unit")]
    unit: String,
}

#[derive(Debug, Serialize, Tabled)]
struct SubnetRow {
    #[tabled(rename = "Subnet")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "CIDR")]
    cidr: String,
    #[tabled(rename = "Egress")]
    egress: String,
}

impl From<&Subnet> for SubnetRow {
    fn from(subnet: &Subnet) -> Self {
        Self {
            name: subnet.name.clone(),
            kind: match subnet.kind {
                SubnetKind::Public => "public",
                SubnetKind::Private => "private",
            }
            .to_string(),
            zone: subnet.zone.clone(),
            cidr: subnet.cidr.clone(),
            egress: subnet
                .egress_via
                .clone()
                .unwrap_or_else(|| "internet".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthDocument {
    deployment: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    plan: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topology: Option<NetworkTopology>,
    pipelines: BTreeMap<String, PipelineConfig>,
}

/// Execute the synth command.
pub async fn execute(args: SynthArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let config = ctx.load_config()?;

    let document = if args.deployed {
        deployed_document(&config, ctx, args.service.as_deref()).await?
    } else {
        generated_document(&config, args.service.as_deref())?
    };

    if format != OutputFormat::Table {
        print_document(&document, format)?;
        return Ok(());
    }

    if !document.plan.is_empty() {
        section("Units");
        let rows: Vec<PlanRow> = document
            .plan
            .iter()
            .enumerate()
            .flat_map(|(i, wave)| {
                wave.iter().map(move |unit| PlanRow {
                    wave: i + 1,
                    unit: unit.clone(),
                })
            })
            .collect();
        print_data(&rows, format)?;
    }
    if let Some(topology) = &document.topology {
        section(&format!("Network {}", topology.address_space));
        let rows: Vec<SubnetRow> = topology.subnets.iter().map(SubnetRow::from).collect();
        print_data(&rows, format)?;
    }
    for (service, pipeline) in &document.pipelines {
        section(&format!("Collector configuration for {service}"));
        print_document(pipeline, format)?;
    }
    Ok(())
}

fn generated_document(
    config: &DeploymentConfig,
    only: Option<&str>,
) -> Result<SynthDocument, CliError> {
    // Nothing is realized, so in-memory backends are enough for planning.
    let graph = config.build_graph(
        Arc::new(LocalProvider::new()),
        Arc::new(InMemoryParameterBroker::new()),
    )?;
    let names = config.unit_names();
    let network = NetworkUnit::new(&names.network, NetworkConfig::default(), Default::default());
    let topology = build_topology(&network.network_name(), &config.network)?;

    let pipelines: BTreeMap<String, PipelineConfig> = config
        .application
        .pipelines()?
        .into_iter()
        .filter(|(service, _)| only.map_or(true, |name| name == service.as_str()))
        .collect();
    if let Some(name) = only {
        if pipelines.is_empty() {
            return Err(unknown_service(name));
        }
    }

    Ok(SynthDocument {
        deployment: config.deployment.clone(),
        plan: graph.plan()?,
        topology: Some(topology),
        pipelines,
    })
}

async fn deployed_document(
    config: &DeploymentConfig,
    ctx: &Context,
    only: Option<&str>,
) -> Result<SynthDocument, CliError> {
    if let Some(name) = only {
        if !config.application.services.iter().any(|v| v.name == name) {
            return Err(unknown_service(name));
        }
    }
    let state = LocalState::open(ctx.state_paths(config)?).await?;
    let mut pipelines = BTreeMap::new();
    for variant in &config.application.services {
        if only.is_some_and(|name| name != variant.name) {
            continue;
        }
        let Some(record) = state
            .provider
            .service(&config.cluster.name, &variant.name)
            .await
        else {
            output::warn(&format!("Service {} is not deployed", variant.name));
            continue;
        };
        let blob = record
            .spec
            .container(&variant.collector_container)
            .and_then(|c| c.environment.get(COLLECTOR_CONFIG_ENV))
            .ok_or_else(|| {
                CliError::state_error(format!(
                    "service {} carries no collector configuration",
                    variant.name
                ))
            })?;
        pipelines.insert(variant.name.clone(), PipelineConfig::from_json(blob)?);
    }

    Ok(SynthDocument {
        deployment: config.deployment.clone(),
        plan: Vec::new(),
        topology: None,
        pipelines,
    })
}

fn unknown_service(name: &str) -> CliError {
    CliError::config_error(format!("no service named '{name}' in this deployment"))
}
