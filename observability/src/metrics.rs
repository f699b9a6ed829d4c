//! Realization metrics.
//!
//! Names:
//! - `platform_units_realized_total{unit, kind}`
//! - `platform_unit_failures_total{unit, kind}`
//! - `platform_parameters_written_total{unit}`
//! - `platform_unit_realize_seconds{unit, kind}`

use std::time::Duration;

use metrics::{counter, histogram};

pub const UNITS_REALIZED: &str = "platform_units_realized_total";
pub const UNIT_FAILURES: &str = "platform_unit_failures_total";
pub const PARAMETERS_WRITTEN: &str = "platform_parameters_written_total";
pub const UNIT_REALIZE_SECONDS: &str = "platform_unit_realize_seconds";

/// Thin recorder front-end used by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealizationMetrics;

impl RealizationMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn unit_realized(&self, unit: &str, kind: &str, elapsed: Duration) {
        counter!(UNITS_REALIZED, "unit" => unit.to_string(), "kind" => kind.to_string())
            .increment(1);
        histogram!(UNIT_REALIZE_SECONDS, "unit" => unit.to_string(), "kind" => kind.to_string())
            .record(elapsed.as_secs_f64());
    }

    pub fn unit_failed(&self, unit: &str, kind: &str) {
        counter!(UNIT_FAILURES, "unit" => unit.to_string(), "kind" => kind.to_string())
            .increment(1);
    }

    pub fn parameters_written(&self, unit: &str, count: u64) {
        if count > 0 {
            counter!(PARAMETERS_WRITTEN, "unit" => unit.to_string()).increment(count);
        }
    }
}
