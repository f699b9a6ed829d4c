//! Serde model of the collector configuration document.
//!
//! Field names follow the collector's own configuration keys, so
//! `serde_json::to_string` of a [`PipelineConfig`] is the blob handed to the
//! collector container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub receivers: BTreeMap<String, Receiver>,
    pub processors: BTreeMap<String, Processor>,
    pub exporters: BTreeMap<String, Exporter>,
    pub service: ServiceSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSection {
    pub pipelines: Pipelines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipelines {
    pub metrics: PipelineWiring,
}

/// Stage ids in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineWiring {
    pub receivers: Vec<String>,
    pub processors: Vec<String>,
    pub exporters: Vec<String>,
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Receiver {
    Otlp(OtlpReceiver),
    Prometheus(PrometheusReceiver),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpReceiver {
    pub protocols: OtlpProtocols,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtlpProtocols {
    pub grpc: Endpoint,
    pub http: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusReceiver {
    pub config: ScrapeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSettings {
    pub scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub job_name: String,
    pub sample_limit: u32,
    pub scrape_interval: String,
    pub metrics_path: String,
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

/// Variant order matters for deserialization: `batch` accepts any object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Processor {
    MetricsTransform(MetricsTransformProcessor),
    Batch(BatchProcessor),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProcessor {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTransformProcessor {
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Metric name pattern.
    pub include: String,
    pub action: String,
    pub operations: Vec<TransformOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOperation {
    pub action: String,
    pub new_label: String,
    pub new_value: String,
}

// ---------------------------------------------------------------------------
// Exporters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exporter {
    AwsEmf(EmfExporter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmfExporter {
    pub namespace: String,
    pub log_group_name: String,
    pub dimension_rollup_option: String,
    pub resource_to_telemetry_conversion: ResourceConversion,
    /// Evaluated in order; the first declaration whose selector matches a
    /// metric decides its dimensions.
    pub metric_declarations: Vec<MetricDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConversion {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDeclaration {
    pub dimensions: Vec<Vec<String>>,
    pub metric_name_selectors: Vec<String>,
}

impl MetricDeclaration {
    pub fn new(dimensions: &[&str], selector: &str) -> Self {
        Self {
            dimensions: vec![dimensions.iter().map(|d| d.to_string()).collect()],
            metric_name_selectors: vec![selector.to_string()],
        }
    }
}
