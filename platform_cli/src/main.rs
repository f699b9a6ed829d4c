//! platformctl - provisions the JMX telemetry platform.
//!
//! State lives under the state directory, one subdirectory per deployment,
//! so `deploy` can be run unit by unit across invocations.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use observability::{init_tracing, LogFormat, TracingConfig};
use platform_config::DEPLOYMENT_ENV;

mod commands;
mod error;
mod output;
mod state;

use commands::Context;

/// Provision the observability platform: registries, network and cluster,
/// and the telemetry services.
#[derive(Parser)]
#[command(name = "platformctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Deployment file [default: <config dir>/platformctl/deployment.toml]
    #[arg(short, long, global = true, env = "PLATFORM_CONFIG")]
    config: Option<PathBuf>,

    /// Deployment name, overriding the one in the file
    #[arg(short, long, global = true, env = DEPLOYMENT_ENV)]
    deployment: Option<String>,

    /// Directory holding provider and parameter state [default: <data dir>/platformctl]
    #[arg(long, global = true, env = "PLATFORM_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Log format
    #[arg(long, global = true, default_value = "text", value_parser = parse_log_format)]
    log_format: LogFormat,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a deployment file with the default settings
    Init(commands::init::InitArgs),

    /// Realize the deployment (all units, or one)
    Deploy(commands::deploy::DeployArgs),

    /// Tear the deployment down in reverse dependency order
    Destroy(commands::destroy::DestroyArgs),

    /// Show the unit plan, subnet layout and collector configuration
    Synth(commands::synth::SynthArgs),

    /// Show the outputs of realized units
    Outputs(commands::outputs::OutputsArgs),

    /// List published parameters
    Params(commands::params::ParamsArgs),
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

fn parse_log_format(s: &str) -> std::result::Result<LogFormat, String> {
    s.parse().map_err(|e: observability::TracingError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(
        &TracingConfig::default()
            .with_format(cli.log_format)
            .with_level(cli.log_level.clone()),
    )?;

    let ctx = Context {
        config_path: cli.config,
        deployment: cli.deployment,
        state_dir: cli.state_dir,
    };
    let format = cli.output;

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, &ctx, format).await,
        Commands::Deploy(args) => commands::deploy::execute(args, &ctx, format).await,
        Commands::Destroy(args) => commands::destroy::execute(args, &ctx, format).await,
        Commands::Synth(args) => commands::synth::execute(args, &ctx, format).await,
        Commands::Outputs(args) => commands::outputs::execute(args, &ctx, format).await,
        Commands::Params(args) => commands::params::execute(args, &ctx, format).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "platformctl",
            "deploy",
            "--unit",
            "demo-infra",
            "-o",
            "json",
            "--deployment",
            "demo",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.deployment.as_deref(), Some("demo"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Deploy(_)));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["platformctl", "--log-format", "xml", "params"]).is_err());
    }
}
