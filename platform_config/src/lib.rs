//! Deployment configuration for `platformctl`.
//!
//! A deployment is described by one TOML file. Every field has a default, so
//! an empty file (or no file at all) describes the demo deployment:
//!
//! ```toml
//! deployment = "ecs-fargate-jmx-demo"
//! environment = "demo"
//! handoff = "broker"
//!
//! [network]
//! address_space = "10.0.0.0/16"
//! availability_zones = 2
//! nat_gateways = 1
//!
//! [registry]
//! retention = "destroy"
//! ```

mod deployment;
mod error;
mod paths;

pub use deployment::{
    DeploymentConfig, Environment, RegistrySettings, UnitNames, UnsafeDefault,
    DEFAULT_DEPLOYMENT, DEPLOYMENT_ENV,
};
pub use error::{ConfigLoadError, ConfigResult};
pub use paths::{default_config_path, default_state_dir, StatePaths, APP_DIR};
