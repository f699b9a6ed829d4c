//! Collector pipeline configuration: model, validation and synthesis.

mod builder;
pub mod model;

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use platform_shared_types::{ProvisionError, Result};

pub use builder::{
    PipelineConfigBuilder, BATCH_PROCESSOR, EMF_EXPORTER, LABEL_PROCESSOR, OTLP_RECEIVER,
    PROMETHEUS_RECEIVER,
};
pub use model::{Exporter, MetricDeclaration, PipelineConfig, Processor, Receiver};

/// How the collector obtains the workload's metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The workload pushes OTLP to the collector.
    Push,
    /// The collector scrapes a Prometheus endpoint exposed by the workload.
    Scrape,
}

impl FromStr for SourceKind {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" | "otlp" => Ok(SourceKind::Push),
            "scrape" | "prometheus" => Ok(SourceKind::Scrape),
            other => Err(ProvisionError::config(format!(
                "unknown metric source kind '{other}' (expected push or scrape)"
            ))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Push => "push",
            SourceKind::Scrape => "scrape",
        })
    }
}

fn compile_selector(selector: &str) -> Result<Regex> {
    Regex::new(selector).map_err(|e| {
        ProvisionError::config(format!("invalid metric name selector '{selector}': {e}"))
    })
}

/// Compiled metric name selectors of a pipeline, in declaration order.
///
/// Build it once with [`PipelineConfig::declaration_matcher`] and reuse it
/// for every lookup.
#[derive(Debug)]
pub struct DeclarationMatcher<'a> {
    rules: Vec<(Regex, &'a MetricDeclaration)>,
}

impl<'a> DeclarationMatcher<'a> {
    /// The declaration deciding the dimensions of `metric`: the first one,
    /// in the first exporter, with a selector matching the name.
    pub fn declaration_for(&self, metric: &str) -> Option<&'a MetricDeclaration> {
        self.rules
            .iter()
            .find(|(selector, _)| selector.is_match(metric))
            .map(|(_, declaration)| *declaration)
    }
}

impl PipelineConfig {
    /// Checks that the metrics pipeline only names stages that exist and
    /// that every metric selector compiles.
    pub fn validate(&self) -> Result<()> {
        let wiring = &self.service.pipelines.metrics;
        if wiring.receivers.is_empty() || wiring.exporters.is_empty() {
            return Err(ProvisionError::config(
                "metrics pipeline needs at least one receiver and one exporter",
            ));
        }
        check_wired("receiver", &wiring.receivers, |id| self.receivers.contains_key(id))?;
        check_wired("processor", &wiring.processors, |id| self.processors.contains_key(id))?;
        check_wired("exporter", &wiring.exporters, |id| self.exporters.contains_key(id))?;

        self.declaration_matcher()?;
        Ok(())
    }

    /// Compiles every metric name selector once.
    pub fn declaration_matcher(&self) -> Result<DeclarationMatcher<'_>> {
        let mut rules = Vec::new();
        for exporter in self.exporters.values() {
            let Exporter::AwsEmf(emf) = exporter;
            for declaration in &emf.metric_declarations {
                for selector in &declaration.metric_name_selectors {
                    rules.push((compile_selector(selector)?, declaration));
                }
            }
        }
        Ok(DeclarationMatcher { rules })
    }

    /// Compact JSON, as passed to the collector through its environment.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Position of `processor` in the metrics pipeline.
    pub fn processor_position(&self, processor: &str) -> Option<usize> {
        self.service
            .pipelines
            .metrics
            .processors
            .iter()
            .position(|p| p == processor)
    }
}

fn check_wired(stage: &str, ids: &[String], exists: impl Fn(&str) -> bool) -> Result<()> {
    match ids.iter().find(|id| !exists(id)) {
        Some(missing) => Err(ProvisionError::config(format!(
            "metrics pipeline references undefined {stage} '{missing}'"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parsing() {
        assert_eq!("push".parse::<SourceKind>().unwrap(), SourceKind::Push);
        assert_eq!("prometheus".parse::<SourceKind>().unwrap(), SourceKind::Scrape);
        assert!("pull".parse::<SourceKind>().unwrap_err().is_config());
    }

    #[test]
    fn dangling_stage_is_rejected() {
        let mut config = PipelineConfigBuilder::new("svc", "ns").build(SourceKind::Push).unwrap();
        config.service.pipelines.metrics.processors.push("resource".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("undefined processor 'resource'"));
    }

    #[test]
    fn bad_selector_is_rejected() {
        let mut config = PipelineConfigBuilder::new("svc", "ns").build(SourceKind::Scrape).unwrap();
        let Exporter::AwsEmf(emf) = config.exporters.get_mut(EMF_EXPORTER).unwrap();
        emf.metric_declarations[0].metric_name_selectors = vec!["(".into()];
        assert!(config.validate().unwrap_err().is_config());
        assert!(config.declaration_matcher().unwrap_err().is_config());
    }

    #[test]
    fn json_round_trip_preserves_stage_variants() {
        for kind in [SourceKind::Push, SourceKind::Scrape] {
            let config = PipelineConfigBuilder::new("svc", "ns").build(kind).unwrap();
            let parsed = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
            assert_eq!(parsed, config);
            assert!(matches!(parsed.processors[BATCH_PROCESSOR], Processor::Batch(_)));
        }
    }

    #[test]
    fn from_json_rejects_dangling_references() {
        let raw = r#"{
            "receivers": {"otlp": {"protocols": {"grpc": {"endpoint": "0.0.0.0:4317"}, "http": {"endpoint": "0.0.0.0:4318"}}}},
            "processors": {},
            "exporters": {},
            "service": {"pipelines": {"metrics": {"receivers": ["otlp"], "processors": [], "exporters": ["awsemf"]}}}
        }"#;
        assert!(PipelineConfig::from_json(raw).unwrap_err().is_config());
    }
}
