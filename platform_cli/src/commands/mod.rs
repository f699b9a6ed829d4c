//! Subcommands. Each exposes an `Args` struct and an `execute` function.

use std::path::PathBuf;

use platform_config::{default_state_dir, DeploymentConfig, StatePaths};

use crate::error::CliError;

pub mod deploy;
pub mod destroy;
pub mod init;
pub mod outputs;
pub mod params;
pub mod synth;

/// Global options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub deployment: Option<String>,
    pub state_dir: Option<PathBuf>,
}

impl Context {
    pub fn load_config(&self) -> Result<DeploymentConfig, CliError> {
        let config = DeploymentConfig::load_or_default(self.config_path.as_deref())?
            .with_deployment_override(self.deployment.clone());
        Ok(config)
    }

    pub fn state_paths(&self, config: &DeploymentConfig) -> Result<StatePaths, CliError> {
        let dir = match &self.state_dir {
            Some(dir) => dir.clone(),
            None => default_state_dir().ok_or_else(|| {
                CliError::config_error("no data directory on this platform; pass --state-dir")
            })?,
        };
        Ok(StatePaths::new(&dir, &config.deployment))
    }
}
