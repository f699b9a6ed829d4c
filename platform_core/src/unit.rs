//! The unit abstraction shared by every provisioning step.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parameter_broker_interface::{BrokerError, ParameterBroker};
use platform_shared_types::{ParameterPath, ProvisionError, ResourceHandle, Result};
use provider_interface::CloudProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Registry,
    Network,
    Application,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitKind::Registry => "registry",
            UnitKind::Network => "network",
            UnitKind::Application => "application",
        })
    }
}

/// How a unit reads the values its dependencies produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handoff {
    /// Read published parameters from the broker. Works across passes and
    /// processes.
    #[default]
    Broker,
    /// Read the outputs of units realized earlier in the same pass.
    Direct,
}

impl std::str::FromStr for Handoff {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "broker" => Ok(Handoff::Broker),
            "direct" => Ok(Handoff::Direct),
            other => Err(ProvisionError::config(format!(
                "unknown handoff mode '{other}' (expected broker or direct)"
            ))),
        }
    }
}

/// An operator-facing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: String,
    pub description: String,
}

/// Everything a realized unit produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutputs {
    pub unit: String,
    pub kind: UnitKind,
    /// Logical name -> value, as written to the broker.
    #[serde(default)]
    pub published: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputValue>,
    #[serde(default)]
    pub resources: Vec<ResourceHandle>,
}

impl UnitOutputs {
    pub fn new(unit: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            unit: unit.into(),
            kind,
            published: BTreeMap::new(),
            outputs: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    pub fn add_output(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.outputs.insert(
            key.into(),
            OutputValue {
                value: value.into(),
                description: description.into(),
            },
        );
    }

    pub fn output(&self, key: &str) -> Result<&str> {
        self.outputs
            .get(key)
            .map(|o| o.value.as_str())
            .ok_or_else(|| ProvisionError::not_found(format!("output {key} of unit {}", self.unit)))
    }

    pub fn published_value(&self, key: &str) -> Result<&str> {
        self.published.get(key).map(String::as_str).ok_or_else(|| {
            ProvisionError::not_found(format!("{} (not published by this pass)", ParameterPath::new(&self.unit, key)))
        })
    }
}

/// What a unit sees while it is realized or torn down.
pub struct RealizeContext<'a> {
    pub provider: &'a dyn CloudProvider,
    pub broker: &'a dyn ParameterBroker,
    pub handoff: Handoff,
    /// Outputs of units already realized in this pass, by unit name.
    pub upstream: &'a BTreeMap<String, UnitOutputs>,
}

impl<'a> RealizeContext<'a> {
    /// Value `key` published by unit `producer`.
    ///
    /// Fails with `NotFound` when the producer has not committed it yet.
    pub async fn resolve(&self, producer: &str, key: &str) -> Result<String> {
        match self.handoff {
            Handoff::Broker => {
                let path = ParameterPath::new(producer, key);
                Ok(self.broker.get_value(&path).await?)
            }
            Handoff::Direct => {
                let outputs = self.upstream.get(producer).ok_or_else(|| {
                    ProvisionError::not_found(format!(
                        "unit {producer} has not been realized in this pass"
                    ))
                })?;
                outputs.published_value(key).map(str::to_string)
            }
        }
    }

    /// Reads a parameter straight from the broker, whatever the handoff
    /// mode. `None` if it was never written.
    pub async fn lookup(&self, unit: &str, key: &str) -> Result<Option<String>> {
        match self.broker.get(&ParameterPath::new(unit, key)).await {
            Ok(entry) => Ok(Some(entry.value)),
            Err(BrokerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `value` under `/{unit}/{key}` and records it in `outputs`.
    pub async fn publish(
        &self,
        outputs: &mut UnitOutputs,
        key: &str,
        value: &str,
        description: &str,
    ) -> Result<()> {
        let path = ParameterPath::new(&outputs.unit, key);
        let entry = self.broker.put(&path, value, description).await?;
        debug!("Published {} (version {})", path, entry.version);
        outputs.published.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Removes every parameter under `/{unit}/`. Returns how many were removed.
    pub async fn unpublish_all(&self, unit: &str) -> Result<usize> {
        let entries = self.broker.list(&ParameterPath::unit_prefix(unit)).await?;
        let mut removed = 0;
        for entry in entries {
            if self.broker.delete(&entry.path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
pub trait Unit: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> UnitKind;

    /// Names of the units whose outputs this one consumes.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    async fn realize(&self, ctx: &RealizeContext<'_>) -> Result<UnitOutputs>;

    async fn teardown(&self, ctx: &RealizeContext<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use local_provider::LocalProvider;
    use parameter_broker_interface::InMemoryParameterBroker;

    use super::*;

    #[tokio::test]
    async fn broker_handoff_reads_published_values() {
        let provider = LocalProvider::new();
        let broker = InMemoryParameterBroker::new();
        let upstream = BTreeMap::new();
        let ctx = RealizeContext {
            provider: &provider,
            broker: &broker,
            handoff: Handoff::Broker,
            upstream: &upstream,
        };

        let err = ctx.resolve("demo-infra", "vpcId").await.unwrap_err();
        assert!(err.is_not_found());

        let mut outputs = UnitOutputs::new("demo-infra", UnitKind::Network);
        ctx.publish(&mut outputs, "vpcId", "vpc-1", "The ID of the VPC")
            .await
            .unwrap();
        assert_eq!(ctx.resolve("demo-infra", "vpcId").await.unwrap(), "vpc-1");
        assert_eq!(outputs.published_value("vpcId").unwrap(), "vpc-1");

        assert_eq!(ctx.unpublish_all("demo-infra").await.unwrap(), 1);
        assert!(ctx.resolve("demo-infra", "vpcId").await.is_err());
    }

    #[tokio::test]
    async fn direct_handoff_reads_same_pass_outputs() {
        let provider = LocalProvider::new();
        let broker = InMemoryParameterBroker::new();
        let mut produced = UnitOutputs::new("demo-infra", UnitKind::Network);
        produced.published.insert("clusterName".into(), "jmx-demo".into());
        let upstream = BTreeMap::from([("demo-infra".to_string(), produced)]);
        let ctx = RealizeContext {
            provider: &provider,
            broker: &broker,
            handoff: Handoff::Direct,
            upstream: &upstream,
        };

        assert_eq!(ctx.resolve("demo-infra", "clusterName").await.unwrap(), "jmx-demo");
        assert!(ctx.resolve("demo-infra", "vpcId").await.unwrap_err().is_not_found());
        assert!(ctx.resolve("demo-docker", "x").await.unwrap_err().is_not_found());
    }

    #[test]
    fn output_lookup() {
        let mut outputs = UnitOutputs::new("demo-docker", UnitKind::Registry);
        outputs.add_output("jmxRepositoryURI", "uri", "The JMX app URI of the ECR repository");
        assert_eq!(outputs.output("jmxRepositoryURI").unwrap(), "uri");
        assert!(outputs.output("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn handoff_parses() {
        assert_eq!("direct".parse::<Handoff>().unwrap(), Handoff::Direct);
        assert!("carrier-pigeon".parse::<Handoff>().unwrap_err().is_config());
    }
}
