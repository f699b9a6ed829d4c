//! Deploy command - realize the deployment's units.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use platform_core::{Handoff, UnitOutputs};
use platform_shared_types::ChangeKind;

use super::Context;
use crate::error::CliError;
use crate::output::{self, print_data};
use crate::state::{read_outputs, write_outputs, LocalState};
use crate::OutputFormat;

/// Arguments for the deploy command.
#[derive(Args, Default)]
pub struct DeployArgs {
    /// Realize only this unit. Its dependencies must have been deployed
    /// already.
    #[arg(short, long)]
    unit: Option<String>,

    /// How units read their dependencies' values (broker or direct)
    #[arg(long, value_parser = parse_handoff)]
    handoff: Option<Handoff>,
}

#[cfg(test)]
impl DeployArgs {
    pub(crate) fn unit(name: &str) -> Self {
        Self {
            unit: Some(name.to_string()),
            handoff: None,
        }
    }
}

fn parse_handoff(s: &str) -> std::result::Result<Handoff, String> {
    s.parse().map_err(|e: platform_core::ProvisionError| e.to_string())
}

/// One line of the deploy report.
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct UnitRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
}

impl UnitRow {
    fn realized(outputs: &UnitOutputs) -> Self {
        let count = |change: ChangeKind| {
            outputs
                .resources
                .iter()
                .filter(|r| r.change == change)
                .count()
        };
        Self {
            unit: outputs.unit.clone(),
            kind: outputs.kind.to_string(),
            status: "realized".to_string(),
            created: count(ChangeKind::Created),
            updated: count(ChangeKind::Updated),
            unchanged: count(ChangeKind::Unchanged),
        }
    }

    fn not_realized(unit: &str, status: &str) -> Self {
        Self {
            unit: unit.to_string(),
            kind: "-".to_string(),
            status: status.to_string(),
            created: 0,
            updated: 0,
            unchanged: 0,
        }
    }
}

/// Execute the deploy command.
pub async fn execute(args: DeployArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = ctx.load_config()?;
    if let Some(handoff) = args.handoff {
        config.handoff = handoff;
    }

    let state = LocalState::open(ctx.state_paths(&config)?).await?;
    let mut graph = config.build_graph(state.provider.clone(), state.broker.clone())?;
    for item in config.unsafe_defaults() {
        output::warn(&format!("Unsafe default accepted: {item}"));
    }

    let mut saved = read_outputs(&state.paths).await?;
    let mut rows = Vec::new();
    let mut failures = Vec::new();

    match &args.unit {
        Some(unit) => {
            output::info(&format!("Deploying unit '{}' of {}...", unit, config.deployment));
            let outputs = graph.realize_unit(unit).await?.clone();
            rows.push(UnitRow::realized(&outputs));
            saved.insert(unit.clone(), outputs);
        }
        None => {
            output::info(&format!("Deploying {}...", config.deployment));
            let report = graph.realize_all().await?;
            for name in &report.realized {
                let outputs = graph.outputs(name)?.clone();
                rows.push(UnitRow::realized(&outputs));
                saved.insert(name.clone(), outputs);
            }
            for failure in &report.failed {
                rows.push(UnitRow::not_realized(&failure.unit, "failed"));
                failures.push(format!("{}: {}", failure.unit, failure.error));
            }
            for name in &report.skipped {
                rows.push(UnitRow::not_realized(name, "skipped"));
            }
        }
    }

    write_outputs(&state.paths, &saved).await?;
    print_data(&rows, format)?;

    if !failures.is_empty() {
        for failure in &failures {
            output::error(failure);
        }
        return Err(CliError::state_error(format!(
            "{} unit(s) failed; fix the cause and run deploy again",
            failures.len()
        ))
        .into());
    }
    output::success(&format!("Deployment '{}' is up to date", config.deployment));
    Ok(())
}
