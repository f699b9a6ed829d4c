//! Destroy command - tear the deployment down.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use platform_shared_types::RetentionPolicy;

use super::Context;
use crate::error::CliError;
use crate::output::{self, print_data};
use crate::state::{read_outputs, write_outputs, LocalState};
use crate::OutputFormat;

/// Arguments for the destroy command.
#[derive(Args, Default)]
pub struct DestroyArgs {
    /// Confirm removal of every resource of the deployment
    #[arg(short, long)]
    yes: bool,
}

#[cfg(test)]
impl DestroyArgs {
    pub(crate) fn confirmed() -> Self {
        Self { yes: true }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct TeardownRow {
    #[tabled(rename = "Step")]
    step: usize,
    #[tabled(rename = "Unit")]
    unit: String,
}

/// Execute the destroy command.
pub async fn execute(args: DestroyArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    if !args.yes {
        return Err(CliError::config_error(format!(
            "destroy removes every resource of deployment '{}'; re-run with --yes",
            config.deployment
        ))
        .into());
    }

    let state = LocalState::open(ctx.state_paths(&config)?).await?;
    let mut graph = config.build_graph(state.provider.clone(), state.broker.clone())?;

    output::info(&format!("Destroying {}...", config.deployment));
    let mut saved = read_outputs(&state.paths).await?;
    let torn_down = graph.teardown_all().await?;
    for unit in &torn_down {
        saved.remove(unit);
    }
    write_outputs(&state.paths, &saved).await?;

    let rows: Vec<TeardownRow> = torn_down
        .into_iter()
        .enumerate()
        .map(|(i, unit)| TeardownRow { step: i + 1, unit })
        .collect();
    print_data(&rows, format)?;

    if config.registry.retention == RetentionPolicy::Retain {
        let registry = config.registry_config();
        output::info(&format!(
            "Registries {} and {} were retained",
            registry.prom_repository, registry.otel_repository
        ));
    }
    output::success(&format!("Deployment '{}' destroyed", config.deployment));
    Ok(())
}
