//! Local deployment state: provider snapshot, parameters and unit outputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use local_provider::{LocalProvider, LocalProviderConfig};
use parameter_broker_interface::FileParameterBroker;
use platform_config::StatePaths;
use platform_core::UnitOutputs;
use platform_shared_types::ProvisionError;

use crate::error::CliError;

/// Outputs of every realized unit, by unit name.
pub type OutputsFile = BTreeMap<String, UnitOutputs>;

pub struct LocalState {
    pub paths: StatePaths,
    pub provider: Arc<LocalProvider>,
    pub broker: Arc<FileParameterBroker>,
}

impl LocalState {
    pub async fn open(paths: StatePaths) -> Result<Self, CliError> {
        tokio::fs::create_dir_all(paths.root()).await?;
        let provider = LocalProvider::open(LocalProviderConfig {
            snapshot_path: Some(paths.provider_snapshot()),
            ..LocalProviderConfig::default()
        })
        .await
        .map_err(ProvisionError::from)?;
        let broker = FileParameterBroker::new(paths.parameters());
        debug!("Opened state in {:?}", paths.root());
        Ok(Self {
            paths,
            provider: Arc::new(provider),
            broker: Arc::new(broker),
        })
    }
}

/// Missing file reads as no outputs.
pub async fn read_outputs(paths: &StatePaths) -> Result<OutputsFile, CliError> {
    let path = paths.outputs();
    match tokio::fs::read_to_string(&path).await {
        Ok(raw) if raw.trim().is_empty() => Ok(OutputsFile::new()),
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
            CliError::state_error(format!("{} is not a valid outputs file: {e}", path.display()))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OutputsFile::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn write_outputs(paths: &StatePaths, outputs: &OutputsFile) -> Result<(), CliError> {
    let path = paths.outputs();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(outputs)?).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
}
