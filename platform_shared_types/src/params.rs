//! Parameters exchanged between units realized at different times.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path of a parameter, namespaced by the producing unit: `/{unit}/{logical}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterPath(String);

impl ParameterPath {
    pub fn new(unit: &str, logical_name: &str) -> Self {
        Self(format!("/{unit}/{logical_name}"))
    }

    /// Prefix shared by every parameter a unit publishes.
    pub fn unit_prefix(unit: &str) -> String {
        format!("/{unit}/")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The producing unit's name.
    pub fn unit(&self) -> &str {
        self.0
            .trim_start_matches('/')
            .split_once('/')
            .map(|(unit, _)| unit)
            .unwrap_or("")
    }

    pub fn logical_name(&self) -> &str {
        self.0
            .trim_start_matches('/')
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or("")
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored parameter. `version` starts at 1 and grows on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub path: ParameterPath,
    pub value: String,
    pub description: String,
    pub version: u64,
    pub last_modified: DateTime<Utc>,
}

impl ParameterEntry {
    pub fn new(path: ParameterPath, value: &str, description: &str) -> Self {
        Self {
            path,
            value: value.to_string(),
            description: description.to_string(),
            version: 1,
            last_modified: Utc::now(),
        }
    }

    /// Applies a write on top of this entry.
    ///
    /// Returns `false` when the value and description are unchanged, in which
    /// case the entry (and its version) is left alone.
    pub fn overwrite(&mut self, value: &str, description: &str) -> bool {
        if self.value == value && self.description == description {
            return false;
        }
        self.value = value.to_string();
        self.description = description.to_string();
        self.version += 1;
        self.last_modified = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_namespaced_by_unit() {
        let path = ParameterPath::new("ecs-fargate-jmx-demo-docker", "promRepositoryName");
        assert_eq!(path.as_str(), "/ecs-fargate-jmx-demo-docker/promRepositoryName");
        assert_eq!(path.unit(), "ecs-fargate-jmx-demo-docker");
        assert_eq!(path.logical_name(), "promRepositoryName");
        assert!(path
            .as_str()
            .starts_with(&ParameterPath::unit_prefix("ecs-fargate-jmx-demo-docker")));
    }

    #[test]
    fn overwrite_bumps_version_only_on_change() {
        let mut entry = ParameterEntry::new(ParameterPath::new("u", "k"), "v1", "d");
        assert!(!entry.overwrite("v1", "d"));
        assert_eq!(entry.version, 1);

        assert!(entry.overwrite("v2", "d"));
        assert_eq!(entry.version, 2);
        assert_eq!(entry.value, "v2");
    }
}
