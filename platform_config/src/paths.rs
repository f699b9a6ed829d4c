use std::path::{Path, PathBuf};

/// Directory name used under the platform's config and data directories.
pub const APP_DIR: &str = "platformctl";
const CONFIG_FILE: &str = "deployment.toml";

/// `<config_dir>/platformctl/deployment.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// `<data_local_dir>/platformctl`
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR))
}

/// Where one deployment keeps its local state between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// State of `deployment` under `state_dir`.
    pub fn new(state_dir: &Path, deployment: &str) -> Self {
        Self {
            root: state_dir.join(deployment),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the local provider's inventory.
    pub fn provider_snapshot(&self) -> PathBuf {
        self.root.join("provider.json")
    }

    /// File-backed parameter broker.
    pub fn parameters(&self) -> PathBuf {
        self.root.join("parameters.json")
    }

    /// Unit outputs of the last realization.
    pub fn outputs(&self) -> PathBuf {
        self.root.join("outputs.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_files_live_under_the_deployment() {
        let paths = StatePaths::new(Path::new("/var/lib/platformctl"), "demo");
        assert_eq!(paths.root(), Path::new("/var/lib/platformctl/demo"));
        assert_eq!(
            paths.parameters(),
            PathBuf::from("/var/lib/platformctl/demo/parameters.json")
        );
        assert!(paths.provider_snapshot().ends_with("demo/provider.json"));
        assert!(paths.outputs().ends_with("demo/outputs.json"));
    }

    #[test]
    fn default_config_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("platformctl/deployment.toml"));
        }
    }
}
