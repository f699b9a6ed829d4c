//! Params command - list parameters published by the units.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use parameter_broker_interface::{FileParameterBroker, ParameterBroker, ParameterEntry};

use super::Context;
use crate::output::print_data;
use crate::OutputFormat;

/// Arguments for the params command.
#[derive(Args)]
pub struct ParamsArgs {
    /// Only list paths starting with this prefix, e.g. /my-deployment-infra/
    #[arg(default_value = "/")]
    prefix: String,
}

#[derive(Debug, Serialize, Tabled)]
struct ParamRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "Modified")]
    #[tabled(display_with = "display_time")]
    last_modified: DateTime<Utc>,
    #[tabled(rename = "Description")]
    description: String,
}

fn display_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

impl From<ParameterEntry> for ParamRow {
    fn from(entry: ParameterEntry) -> Self {
        Self {
            path: entry.path.to_string(),
            value: entry.value,
            version: entry.version,
            last_modified: entry.last_modified,
            description: entry.description,
        }
    }
}

/// Execute the params command.
pub async fn execute(args: ParamsArgs, ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let paths = ctx.state_paths(&config)?;
    let broker = FileParameterBroker::new(paths.parameters());
    let rows: Vec<ParamRow> = broker
        .list(&args.prefix)
        .await?
        .into_iter()
        .map(ParamRow::from)
        .collect();
    print_data(&rows, format)?;
    Ok(())
}
