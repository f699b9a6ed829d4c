//! Init command - write a deployment file.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use platform_config::{default_config_path, DeploymentConfig};

use super::Context;
use crate::error::CliError;
use crate::output::{self, print_item};
use crate::OutputFormat;

/// Arguments for the init command.
#[derive(Args, Default)]
pub struct InitArgs {
    /// Overwrite an existing deployment file
    #[arg(short, long)]
    force: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct InitSummary {
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "File")]
    file: String,
}

/// Execute the init command.
pub async fn execute(args: InitArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => default_config_path().ok_or_else(|| {
            CliError::config_error("no configuration directory on this platform; pass --config")
        })?,
    };
    if path.exists() && !args.force {
        return Err(CliError::config_error(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    let config = DeploymentConfig::default().with_deployment_override(ctx.deployment.clone());
    config.validate()?;
    config.save(&path)?;

    output::success(&format!("Wrote deployment file {}", path.display()));
    output::info("Registries are destroyed on teardown and port 80 is open to the internet by default. Review the file before deploying to production.");
    print_item(
        &InitSummary {
            deployment: config.deployment,
            environment: config.environment.to_string(),
            file: path.display().to_string(),
        },
        format,
    )?;
    Ok(())
}
