use std::collections::BTreeMap;

use platform_shared_types::Result;

use super::model::{
    BatchProcessor, EmfExporter, Endpoint, MetricDeclaration, MetricsTransformProcessor,
    OtlpProtocols, OtlpReceiver, PipelineWiring, Pipelines, PrometheusReceiver,
    ResourceConversion, ScrapeConfig, ScrapeSettings, ServiceSection, StaticConfig, Transform,
    TransformOperation,
};
use super::{Exporter, PipelineConfig, Processor, Receiver, SourceKind};

pub const OTLP_RECEIVER: &str = "otlp";
pub const PROMETHEUS_RECEIVER: &str = "prometheus";
pub const LABEL_PROCESSOR: &str = "metricstransform";
pub const BATCH_PROCESSOR: &str = "batch";
pub const EMF_EXPORTER: &str = "awsemf";

/// Label added to every metric, carrying the service name.
pub const SERVICE_NAME_LABEL: &str = "ServiceName";

const OTLP_GRPC_ENDPOINT: &str = "0.0.0.0:4317";
const OTLP_HTTP_ENDPOINT: &str = "0.0.0.0:4318";

const SCRAPE_JOB: &str = "jmx-metrics";
const SCRAPE_TARGET: &str = "localhost:9404";
const SCRAPE_INTERVAL: &str = "15s";
const SCRAPE_PATH: &str = "/metrics";
const SCRAPE_SAMPLE_LIMIT: u32 = 10_000;

/// Synthesizes the collector configuration for one service.
///
/// ```
/// use platform_core::{PipelineConfigBuilder, SourceKind};
///
/// let config = PipelineConfigBuilder::new("otel-jmx-demo", "ecs-jmx-demo")
///     .build(SourceKind::Push)
///     .unwrap();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    service_name: String,
    namespace: String,
    scrape_target: String,
    scrape_interval: String,
    sample_limit: u32,
}

impl PipelineConfigBuilder {
    pub fn new(service_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            namespace: namespace.into(),
            scrape_target: SCRAPE_TARGET.to_string(),
            scrape_interval: SCRAPE_INTERVAL.to_string(),
            sample_limit: SCRAPE_SAMPLE_LIMIT,
        }
    }

    pub fn scrape_target(mut self, target: impl Into<String>) -> Self {
        self.scrape_target = target.into();
        self
    }

    pub fn scrape_interval(mut self, interval: impl Into<String>) -> Self {
        self.scrape_interval = interval.into();
        self
    }

    pub fn sample_limit(mut self, limit: u32) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Builds from a textual source kind; unknown kinds are a `ConfigError`.
    pub fn build_str(self, source_kind: &str) -> Result<PipelineConfig> {
        self.build(source_kind.parse()?)
    }

    pub fn build(self, source_kind: SourceKind) -> Result<PipelineConfig> {
        let (receiver_id, receiver) = match source_kind {
            SourceKind::Push => (OTLP_RECEIVER, self.otlp_receiver()),
            SourceKind::Scrape => (PROMETHEUS_RECEIVER, self.prometheus_receiver()),
        };

        let processors = BTreeMap::from([
            (LABEL_PROCESSOR.to_string(), self.label_processor()),
            (BATCH_PROCESSOR.to_string(), Processor::Batch(BatchProcessor::default())),
        ]);

        let config = PipelineConfig {
            receivers: BTreeMap::from([(receiver_id.to_string(), receiver)]),
            processors,
            exporters: BTreeMap::from([(EMF_EXPORTER.to_string(), self.emf_exporter(source_kind))]),
            service: ServiceSection {
                pipelines: Pipelines {
                    metrics: PipelineWiring {
                        receivers: vec![receiver_id.to_string()],
                        // Labels must be in place before metrics are batched.
                        processors: vec![LABEL_PROCESSOR.to_string(), BATCH_PROCESSOR.to_string()],
                        exporters: vec![EMF_EXPORTER.to_string()],
                    },
                },
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn otlp_receiver(&self) -> Receiver {
        Receiver::Otlp(OtlpReceiver {
            protocols: OtlpProtocols {
                grpc: Endpoint {
                    endpoint: OTLP_GRPC_ENDPOINT.to_string(),
                },
                http: Endpoint {
                    endpoint: OTLP_HTTP_ENDPOINT.to_string(),
                },
            },
        })
    }

    fn prometheus_receiver(&self) -> Receiver {
        Receiver::Prometheus(PrometheusReceiver {
            config: ScrapeSettings {
                scrape_configs: vec![ScrapeConfig {
                    job_name: SCRAPE_JOB.to_string(),
                    sample_limit: self.sample_limit,
                    scrape_interval: self.scrape_interval.clone(),
                    metrics_path: SCRAPE_PATH.to_string(),
                    static_configs: vec![StaticConfig {
                        targets: vec![self.scrape_target.clone()],
                        labels: BTreeMap::from([(
                            "service".to_string(),
                            self.service_name.clone(),
                        )]),
                    }],
                }],
            },
        })
    }

    fn label_processor(&self) -> Processor {
        Processor::MetricsTransform(MetricsTransformProcessor {
            transforms: vec![Transform {
                include: ".*".to_string(),
                action: "update".to_string(),
                operations: vec![TransformOperation {
                    action: "add_label".to_string(),
                    new_label: SERVICE_NAME_LABEL.to_string(),
                    new_value: self.service_name.clone(),
                }],
            }],
        })
    }

    fn emf_exporter(&self, source_kind: SourceKind) -> Exporter {
        let metric_declarations = match source_kind {
            SourceKind::Push => vec![
                MetricDeclaration::new(&[SERVICE_NAME_LABEL, "jvm.memory.type"], "jvm.memory.*"),
                MetricDeclaration::new(&[SERVICE_NAME_LABEL, "OTelLib"], ".+"),
                MetricDeclaration::new(&[SERVICE_NAME_LABEL], ".+"),
            ],
            SourceKind::Scrape => vec![
                MetricDeclaration::new(&[SERVICE_NAME_LABEL], ".+"),
                MetricDeclaration::new(&[SERVICE_NAME_LABEL, "OTelLib"], ".+"),
            ],
        };
        Exporter::AwsEmf(EmfExporter {
            namespace: self.namespace.clone(),
            log_group_name: format!("/aws/ecs/{}", self.namespace),
            dimension_rollup_option: "NoDimensionRollup".to_string(),
            resource_to_telemetry_conversion: ResourceConversion { enabled: true },
            metric_declarations,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn emf(config: &PipelineConfig) -> &EmfExporter {
        let Exporter::AwsEmf(emf) = &config.exporters[EMF_EXPORTER];
        emf
    }

    #[test]
    fn push_scenario() {
        let config = PipelineConfigBuilder::new("otel-jmx-demo", "ecs-jmx-demo")
            .build(SourceKind::Push)
            .unwrap();

        let emf = emf(&config);
        assert_eq!(emf.log_group_name, "/aws/ecs/ecs-jmx-demo");
        assert_eq!(emf.namespace, "ecs-jmx-demo");
        assert_eq!(
            emf.metric_declarations[0].dimensions,
            vec![vec!["ServiceName".to_string(), "jvm.memory.type".to_string()]]
        );
        assert_eq!(emf.metric_declarations[0].metric_name_selectors, vec!["jvm.memory.*"]);
        assert_eq!(emf.metric_declarations.len(), 3);

        let blob: Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(
            blob["receivers"]["otlp"]["protocols"],
            json!({"grpc": {"endpoint": "0.0.0.0:4317"}, "http": {"endpoint": "0.0.0.0:4318"}})
        );
        assert_eq!(
            blob["service"]["pipelines"]["metrics"],
            json!({
                "receivers": ["otlp"],
                "processors": ["metricstransform", "batch"],
                "exporters": ["awsemf"]
            })
        );
        assert_eq!(blob["processors"]["batch"], json!({}));
        assert_eq!(
            blob["exporters"]["awsemf"]["resource_to_telemetry_conversion"],
            json!({"enabled": true})
        );
        assert_eq!(
            blob["exporters"]["awsemf"]["dimension_rollup_option"],
            "NoDimensionRollup"
        );
    }

    #[test]
    fn scrape_scenario() {
        let config = PipelineConfigBuilder::new("prom-jmx-demo", "ecs-jmx-demo")
            .build(SourceKind::Scrape)
            .unwrap();

        let blob: Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        let scrape = &blob["receivers"]["prometheus"]["config"]["scrape_configs"][0];
        assert_eq!(scrape["job_name"], "jmx-metrics");
        assert_eq!(scrape["scrape_interval"], "15s");
        assert_eq!(scrape["sample_limit"], 10000);
        assert_eq!(scrape["metrics_path"], "/metrics");
        assert_eq!(
            scrape["static_configs"],
            json!([{"targets": ["localhost:9404"], "labels": {"service": "prom-jmx-demo"}}])
        );

        let declarations = &emf(&config).metric_declarations;
        assert_eq!(declarations[0], MetricDeclaration::new(&["ServiceName"], ".+"));
        assert_eq!(declarations[1], MetricDeclaration::new(&["ServiceName", "OTelLib"], ".+"));
    }

    #[test]
    fn label_injection_precedes_batching() {
        for kind in [SourceKind::Push, SourceKind::Scrape] {
            let config = PipelineConfigBuilder::new("svc", "ns").build(kind).unwrap();
            let label = config.processor_position(LABEL_PROCESSOR).unwrap();
            let batch = config.processor_position(BATCH_PROCESSOR).unwrap();
            assert!(label < batch, "{kind}");

            let Processor::MetricsTransform(transform) = &config.processors[LABEL_PROCESSOR] else {
                panic!("label processor has the wrong shape");
            };
            let op = &transform.transforms[0].operations[0];
            assert_eq!(transform.transforms[0].include, ".*");
            assert_eq!((op.new_label.as_str(), op.new_value.as_str()), ("ServiceName", "svc"));
        }
    }

    #[test]
    fn wiring_resolves_for_empty_names() {
        for kind in [SourceKind::Push, SourceKind::Scrape] {
            for (service, namespace) in [("", ""), ("svc", ""), ("", "ns")] {
                let config = PipelineConfigBuilder::new(service, namespace)
                    .build(kind)
                    .unwrap();
                assert!(config.validate().is_ok());
            }
        }
    }

    #[test]
    fn unknown_source_kind_is_config_error() {
        let err = PipelineConfigBuilder::new("svc", "ns")
            .build_str("statsd")
            .unwrap_err();
        assert!(err.is_config());
        assert!(PipelineConfigBuilder::new("svc", "ns").build_str("scrape").is_ok());
    }

    #[test]
    fn first_matching_declaration_wins() {
        let push = PipelineConfigBuilder::new("svc", "ns").build(SourceKind::Push).unwrap();
        let matcher = push.declaration_matcher().unwrap();
        let heap = matcher.declaration_for("jvm.memory.used").unwrap();
        assert_eq!(heap.dimensions[0], vec!["ServiceName", "jvm.memory.type"]);
        let threads = matcher.declaration_for("jvm.threads.count").unwrap();
        assert_eq!(threads.dimensions[0], vec!["ServiceName", "OTelLib"]);

        let scrape = PipelineConfigBuilder::new("svc", "ns").build(SourceKind::Scrape).unwrap();
        let matcher = scrape.declaration_matcher().unwrap();
        let any = matcher.declaration_for("jvm_memory_bytes_used").unwrap();
        assert_eq!(any.dimensions[0], vec!["ServiceName"]);
    }

    #[test]
    fn scrape_overrides() {
        let config = PipelineConfigBuilder::new("svc", "ns")
            .scrape_target("localhost:9100")
            .scrape_interval("30s")
            .sample_limit(500)
            .build(SourceKind::Scrape)
            .unwrap();
        let Receiver::Prometheus(prom) = &config.receivers[PROMETHEUS_RECEIVER] else {
            panic!("expected a prometheus receiver");
        };
        let scrape = &prom.config.scrape_configs[0];
        assert_eq!(scrape.static_configs[0].targets, vec!["localhost:9100"]);
        assert_eq!(scrape.scrape_interval, "30s");
        assert_eq!(scrape.sample_limit, 500);
    }
}
