use std::path::PathBuf;

use platform_shared_types::ProvisionError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,

    #[error(transparent)]
    Invalid(#[from] ProvisionError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigLoadError>;
