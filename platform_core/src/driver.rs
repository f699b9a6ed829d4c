//! Orders units by dependency and realizes each once.
//!
//! Units are grouped into waves: every unit in a wave depends only on units
//! of earlier waves. A wave's units run concurrently and the next wave starts
//! only once all of them finished, which is the barrier that keeps the
//! application unit from reading parameters nobody committed yet.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use observability::RealizationMetrics;
use parameter_broker_interface::ParameterBroker;
use platform_shared_types::{ProvisionError, Result};
use provider_interface::CloudProvider;

use crate::unit::{Handoff, RealizeContext, Unit, UnitKind, UnitOutputs};

#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub error: ProvisionError,
}

/// Result of one [`UnitGraph::realize_all`] pass.
#[derive(Debug, Default)]
pub struct RealizationReport {
    /// In realization order.
    pub realized: Vec<String>,
    pub failed: Vec<UnitFailure>,
    /// Units not attempted because a dependency failed.
    pub skipped: Vec<String>,
}

impl RealizationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// The first failure, if any.
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.failed.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.realized),
        }
    }
}

pub struct UnitGraph {
    provider: Arc<dyn CloudProvider>,
    broker: Arc<dyn ParameterBroker>,
    handoff: Handoff,
    units: BTreeMap<String, Arc<dyn Unit>>,
    outputs: BTreeMap<String, UnitOutputs>,
    metrics: RealizationMetrics,
}

impl UnitGraph {
    pub fn new(provider: Arc<dyn CloudProvider>, broker: Arc<dyn ParameterBroker>) -> Self {
        Self {
            provider,
            broker,
            handoff: Handoff::default(),
            units: BTreeMap::new(),
            outputs: BTreeMap::new(),
            metrics: RealizationMetrics::new(),
        }
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = handoff;
        self
    }

    pub fn handoff(&self) -> Handoff {
        self.handoff
    }

    pub fn add_unit(&mut self, unit: impl Unit + 'static) -> Result<()> {
        let name = unit.name().to_string();
        if name.is_empty() {
            return Err(ProvisionError::config("unit name must not be empty"));
        }
        if self.units.contains_key(&name) {
            return Err(ProvisionError::config(format!("unit {name} is defined twice")));
        }
        self.units.insert(name, Arc::new(unit));
        Ok(())
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    /// Name of the unit of `kind`, if the graph has exactly one.
    pub fn unit_of_kind(&self, kind: UnitKind) -> Result<&str> {
        let mut matching = self.units.values().filter(|u| u.kind() == kind);
        match (matching.next(), matching.next()) {
            (Some(unit), None) => Ok(unit.name()),
            (None, _) => Err(ProvisionError::not_found(format!("no {kind} unit in the graph"))),
            (Some(_), Some(_)) => Err(ProvisionError::config(format!(
                "more than one {kind} unit in the graph"
            ))),
        }
    }

    /// Dependency waves, each sorted by unit name.
    ///
    /// Fails with `ConfigError` on a dependency that is not part of the graph
    /// or on a cycle.
    pub fn plan(&self) -> Result<Vec<Vec<String>>> {
        let mut pending: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (name, unit) in &self.units {
            let deps: BTreeSet<String> = unit.depends_on().into_iter().collect();
            if let Some(missing) = deps.iter().find(|d| !self.units.contains_key(*d)) {
                return Err(ProvisionError::config(format!(
                    "unit {name} depends on unknown unit {missing}"
                )));
            }
            pending.insert(name.as_str(), deps);
        }

        let mut waves = Vec::new();
        let mut done: BTreeSet<String> = BTreeSet::new();
        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .iter()
                .filter(|(_, deps)| deps.is_subset(&done))
                .map(|(name, _)| name.to_string())
                .collect();
            if ready.is_empty() {
                let stuck: Vec<&str> = pending.keys().copied().collect();
                return Err(ProvisionError::config(format!(
                    "dependency cycle between units {}",
                    stuck.join(", ")
                )));
            }
            for name in &ready {
                pending.remove(name.as_str());
                done.insert(name.clone());
            }
            waves.push(ready);
        }
        Ok(waves)
    }

    /// Realizes every unit not yet realized by this graph.
    ///
    /// A failing unit stops its dependents; units that do not depend on it
    /// still run. Outputs of realized units stay available either way.
    pub async fn realize_all(&mut self) -> Result<RealizationReport> {
        let waves = self.plan()?;
        let mut report = RealizationReport::default();
        let mut blocked: BTreeSet<String> = BTreeSet::new();

        for wave in waves {
            let mut runnable = Vec::new();
            for name in wave {
                if self.outputs.contains_key(&name) {
                    continue;
                }
                let unit = self.units[&name].clone();
                if unit.depends_on().iter().any(|d| blocked.contains(d)) {
                    warn!("Skipping {} because a dependency failed", name);
                    blocked.insert(name.clone());
                    report.skipped.push(name);
                    continue;
                }
                runnable.push(unit);
            }
            if runnable.is_empty() {
                continue;
            }

            let results = {
                let ctx = self.context();
                join_all(runnable.iter().map(|unit| self.run_unit(unit.as_ref(), &ctx))).await
            };

            for (unit, result) in runnable.iter().zip(results) {
                let name = unit.name().to_string();
                match result {
                    Ok(outputs) => {
                        self.outputs.insert(name.clone(), outputs);
                        report.realized.push(name);
                    }
                    Err(error) => {
                        blocked.insert(name.clone());
                        report.failed.push(UnitFailure { unit: name, error });
                    }
                }
            }
        }
        Ok(report)
    }

    /// Realizes a single unit. Its dependencies are expected to have been
    /// realized already, in this pass or an earlier one.
    pub async fn realize_unit(&mut self, name: &str) -> Result<&UnitOutputs> {
        let unit = self
            .units
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionError::config(format!("unknown unit {name}")))?;
        let outputs = {
            let ctx = self.context();
            self.run_unit(unit.as_ref(), &ctx).await?
        };
        self.outputs.insert(name.to_string(), outputs);
        self.outputs(name)
    }

    /// Outputs of a unit realized by this graph.
    pub fn outputs(&self, name: &str) -> Result<&UnitOutputs> {
        self.outputs
            .get(name)
            .ok_or_else(|| ProvisionError::not_found(format!("unit {name} has not been realized")))
    }

    pub fn all_outputs(&self) -> impl Iterator<Item = &UnitOutputs> {
        self.outputs.values()
    }

    /// Tears every unit down in reverse dependency order. Stops at the first
    /// failure.
    pub async fn teardown_all(&mut self) -> Result<Vec<String>> {
        let waves = self.plan()?;
        let mut torn_down = Vec::new();
        for wave in waves.into_iter().rev() {
            for name in wave.into_iter().rev() {
                let unit = self.units[&name].clone();
                {
                    let ctx = self.context();
                    unit.teardown(&ctx).await.map_err(|e| {
                        error!("Teardown of {} failed: {}", name, e);
                        e
                    })?;
                }
                info!("Tore down {}", name);
                self.outputs.remove(&name);
                torn_down.push(name);
            }
        }
        Ok(torn_down)
    }

    fn context(&self) -> RealizeContext<'_> {
        RealizeContext {
            provider: self.provider.as_ref(),
            broker: self.broker.as_ref(),
            handoff: self.handoff,
            upstream: &self.outputs,
        }
    }

    async fn run_unit(&self, unit: &dyn Unit, ctx: &RealizeContext<'_>) -> Result<UnitOutputs> {
        let kind = unit.kind().to_string();
        let started = Instant::now();
        info!("Realizing {} ({})", unit.name(), kind);
        match unit.realize(ctx).await {
            Ok(outputs) => {
                let elapsed = started.elapsed();
                self.metrics.unit_realized(unit.name(), &kind, elapsed);
                self.metrics
                    .parameters_written(unit.name(), outputs.published.len() as u64);
                info!("Realized {} in {:?}", unit.name(), elapsed);
                Ok(outputs)
            }
            Err(e) => {
                self.metrics.unit_failed(unit.name(), &kind);
                error!("Realizing {} failed: {}", unit.name(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use local_provider::LocalProvider;
    use parameter_broker_interface::InMemoryParameterBroker;

    use super::*;

    struct Probe {
        name: String,
        deps: Vec<String>,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.into(),
                deps: deps.iter().map(|d| d.to_string()).collect(),
                fail: false,
                log: log.clone(),
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl Unit for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> UnitKind {
            UnitKind::Registry
        }

        fn depends_on(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn realize(&self, ctx: &RealizeContext<'_>) -> Result<UnitOutputs> {
            self.log.lock().unwrap().push(format!("realize {}", self.name));
            if self.fail {
                return Err(ProvisionError::config("forced failure"));
            }
            let mut outputs = UnitOutputs::new(&self.name, UnitKind::Registry);
            ctx.publish(&mut outputs, "marker", "1", "marker value").await?;
            Ok(outputs)
        }

        async fn teardown(&self, _ctx: &RealizeContext<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("teardown {}", self.name));
            Ok(())
        }
    }

    fn graph() -> UnitGraph {
        UnitGraph::new(
            Arc::new(LocalProvider::new()),
            Arc::new(InMemoryParameterBroker::new()),
        )
    }

    #[test]
    fn plan_groups_independent_units() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("app", &["infra", "docker"], &log)).unwrap();
        g.add_unit(Probe::new("infra", &[], &log)).unwrap();
        g.add_unit(Probe::new("docker", &[], &log)).unwrap();

        assert_eq!(
            g.plan().unwrap(),
            vec![vec!["docker".to_string(), "infra".to_string()], vec!["app".to_string()]]
        );
    }

    #[test]
    fn plan_rejects_cycles_and_unknown_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("a", &["b"], &log)).unwrap();
        g.add_unit(Probe::new("b", &["a"], &log)).unwrap();
        assert!(g.plan().unwrap_err().is_config());

        let mut g = graph();
        g.add_unit(Probe::new("a", &["ghost"], &log)).unwrap();
        assert!(g.plan().unwrap_err().to_string().contains("unknown unit ghost"));
    }

    #[test]
    fn duplicate_unit_names_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("a", &[], &log)).unwrap();
        assert!(g.add_unit(Probe::new("a", &[], &log)).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn each_unit_realizes_once_per_graph() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("a", &[], &log)).unwrap();
        g.add_unit(Probe::new("b", &["a"], &log)).unwrap();

        assert!(g.outputs("a").unwrap_err().is_not_found());
        let report = g.realize_all().await.unwrap();
        assert_eq!(report.realized, vec!["a", "b"]);
        let again = g.realize_all().await.unwrap();
        assert!(again.realized.is_empty());
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(g.outputs("b").unwrap().published["marker"], "1");
    }

    #[tokio::test]
    async fn failure_blocks_only_dependents() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("docker", &[], &log).failing()).unwrap();
        g.add_unit(Probe::new("infra", &[], &log)).unwrap();
        g.add_unit(Probe::new("app", &["docker", "infra"], &log)).unwrap();
        g.add_unit(Probe::new("dashboard", &["app"], &log)).unwrap();

        let report = g.realize_all().await.unwrap();
        assert_eq!(report.realized, vec!["infra"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].unit, "docker");
        assert_eq!(report.skipped, vec!["app", "dashboard"]);
        assert!(g.outputs("infra").is_ok());
        assert!(report.into_result().unwrap_err().is_config());
    }

    #[tokio::test]
    async fn teardown_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut g = graph();
        g.add_unit(Probe::new("docker", &[], &log)).unwrap();
        g.add_unit(Probe::new("infra", &[], &log)).unwrap();
        g.add_unit(Probe::new("app", &["docker", "infra"], &log)).unwrap();
        g.realize_all().await.unwrap();

        let order = g.teardown_all().await.unwrap();
        assert_eq!(order, vec!["app", "infra", "docker"]);
        assert!(g.outputs("app").is_err());
    }
}
