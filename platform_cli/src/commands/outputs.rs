//! Outputs command - show what realized units produced.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{self, print_data};
use crate::state::{read_outputs, OutputsFile};
use crate::OutputFormat;

/// Arguments for the outputs command.
#[derive(Args)]
pub struct OutputsArgs {
    /// Only show outputs of this unit
    #[arg(short, long)]
    unit: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct OutputRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Output")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn rows(outputs: &OutputsFile, only: Option<&str>) -> Vec<OutputRow> {
    outputs
        .values()
        .filter(|o| only.map_or(true, |unit| unit == o.unit))
        .flat_map(|o| {
            o.outputs.iter().map(|(key, output)| OutputRow {
                unit: o.unit.clone(),
                key: key.clone(),
                value: output.value.clone(),
                description: output.description.clone(),
            })
        })
        .collect()
}

/// Execute the outputs command.
pub async fn execute(args: OutputsArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let outputs = read_outputs(&ctx.state_paths(&config)?).await?;
    if outputs.is_empty() {
        output::info(&format!(
            "Nothing deployed for '{}' yet. Run 'platformctl deploy' first.",
            config.deployment
        ));
    }
    print_data(&rows(&outputs, args.unit.as_deref()), format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use platform_core::{UnitKind, UnitOutputs};

    use super::*;

    #[test]
    fn rows_follow_unit_then_key_order() {
        let mut infra = UnitOutputs::new("demo-infra", UnitKind::Network);
        infra.add_output("VpcId", "vpc-1", "The ID of the VPC");
        infra.add_output("ClusterName", "jmx-demo", "The name of the ECS cluster");
        let mut docker = UnitOutputs::new("demo-docker", UnitKind::Registry);
        docker.add_output("jmxRepositoryURI", "uri", "The JMX app URI of the ECR repository");
        let file = OutputsFile::from([
            ("demo-infra".to_string(), infra),
            ("demo-docker".to_string(), docker),
        ]);

        let all: Vec<String> = rows(&file, None).into_iter().map(|r| r.key).collect();
        assert_eq!(all, vec!["jmxRepositoryURI", "ClusterName", "VpcId"]);

        let infra_only = rows(&file, Some("demo-infra"));
        assert_eq!(infra_only.len(), 2);
        assert!(infra_only.iter().all(|r| r.unit == "demo-infra"));
    }
}
