//! Optimization session service
//!
//! Loads the tree and build documents, builds the engine pool from
//! settings, and runs the optimizer with settings and per-run overrides.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::application::cancel::CancellationToken;
use crate::application::evaluator::EvaluatorAdapter;
use crate::application::neighbors::NeighborConfig;
use crate::application::objective::{Objective, ObjectiveMetric, ObjectiveSelector};
use crate::application::optimizer::{HillClimbingOptimizer, RunLimits, RunReport, RunRequest};
use crate::application::progress::ProgressSink;
use crate::application::error::RunFailure;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{Allocation, NodeId, TreeGraph};
use crate::infrastructure::engines::{CommandEngine, StatSumEngine};
use crate::infrastructure::loader::{self, BuildDocument};
use crate::infrastructure::traits::{CommandRunner, EvaluationResult, FileSystem, ScoringEngine};
use crate::infrastructure::InfraError;

/// Command-line values that win over settings for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOverrides {
    pub metric: Option<String>,
    /// Unspent points; falls back to the build document's `points`
    pub points: Option<u32>,
    pub currency: Option<u32>,
    pub respec: bool,
    pub iterations: Option<usize>,
    pub timeout_secs: Option<u64>,
    /// Merged over `[objective.weights]`
    pub weights: BTreeMap<String, f64>,
}

/// A loaded tree plus the build to improve.
#[derive(Debug, Clone)]
pub struct Session {
    pub graph: Arc<TreeGraph>,
    pub build: BuildDocument,
}

/// One-shot score of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub objective: Objective,
    pub result: EvaluationResult,
}

/// Orchestrates a full optimization session.
pub struct OptimizeService {
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
}

impl OptimizeService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        settings: Arc<Settings>,
    ) -> Self {
        Self { fs, cmd, settings }
    }

    /// Load and validate both documents.
    #[instrument(level = "debug", skip(self))]
    pub fn load_session(&self, tree: &Path, build: &Path) -> ApplicationResult<Session> {
        let graph = loader::load_graph(self.fs.as_ref(), tree).map_err(from_infra)?;
        let build = loader::load_build(self.fs.as_ref(), build).map_err(from_infra)?;
        graph.class_start(&build.class)?;
        info!(
            "loaded tree {} ({} nodes), build {} ({} allocated)",
            tree.display(),
            graph.len(),
            build.class,
            build.allocated.len()
        );
        Ok(Session {
            graph: Arc::new(graph),
            build,
        })
    }

    /// One engine per configured instance.
    pub fn engines(&self, graph: &Arc<TreeGraph>) -> Vec<Box<dyn ScoringEngine>> {
        let instances = self.settings.engine.instances.max(1);
        match &self.settings.engine.command {
            Some(command) => {
                debug!("engine: {} x{}", command, instances);
                (0..instances)
                    .map(|_| {
                        Box::new(CommandEngine::new(
                            Arc::clone(&self.cmd),
                            command.clone(),
                            self.settings.engine.args.clone(),
                        )) as Box<dyn ScoringEngine>
                    })
                    .collect()
            }
            None => {
                debug!("engine: built-in stat sum x{}", instances);
                (0..instances)
                    .map(|_| Box::new(StatSumEngine::new(Arc::clone(graph))) as Box<dyn ScoringEngine>)
                    .collect()
            }
        }
    }

    /// Objective from settings, with the overrides applied.
    pub fn selector(&self, overrides: &RunOverrides) -> ApplicationResult<ObjectiveSelector> {
        let name = overrides
            .metric
            .as_deref()
            .unwrap_or(&self.settings.objective.metric);
        let metric: ObjectiveMetric = name.parse().map_err(ApplicationError::InvalidRequest)?;

        let mut weights = self.settings.objective.weights.clone();
        weights.extend(overrides.weights.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(ObjectiveSelector::new(metric).with_weights(weights))
    }

    /// Translate settings and overrides into a run request.
    pub fn build_request(
        &self,
        session: &Session,
        overrides: &RunOverrides,
        cancel: CancellationToken,
    ) -> ApplicationResult<RunRequest> {
        let o = &self.settings.optimizer;
        let points = overrides.points.or(session.build.points).unwrap_or(0);

        let limits = RunLimits {
            patience: o.patience,
            iteration_cap: overrides.iterations.unwrap_or(o.iteration_cap),
            timeout: Duration::from_secs(overrides.timeout_secs.unwrap_or(o.timeout_secs)),
        };
        let neighbors = NeighborConfig {
            respec: o.respec || overrides.respec,
            lookahead: o.lookahead,
            top_k: o.top_k,
        };

        Ok(RunRequest::new(
            session.build.class.clone(),
            session.build.node_ids(),
            self.selector(overrides)?,
            points,
        )
        .with_currency(overrides.currency.unwrap_or(0))
        .with_neighbors(neighbors)
        .with_respec(o.respec || overrides.respec, o.respec_cost)
        .with_limits(limits)
        .with_excluded(to_node_set(&o.excluded_nodes))
        .with_protected(to_node_set(&o.protected_nodes))
        .with_cancel(cancel))
    }

    /// Run one optimization end to end.
    #[instrument(level = "debug", skip(self, overrides, progress, cancel))]
    pub fn optimize(
        &self,
        tree: &Path,
        build: &Path,
        overrides: &RunOverrides,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> ApplicationResult<RunReport> {
        let session = self.load_session(tree, build)?;
        let request = self.build_request(&session, overrides, cancel)?;
        let evaluator = Arc::new(EvaluatorAdapter::new(self.engines(&session.graph))?);

        let optimizer =
            HillClimbingOptimizer::new(Arc::clone(&session.graph), evaluator).with_progress(progress);
        Ok(optimizer.run(&request)?)
    }

    /// Score the build once, without optimizing.
    #[instrument(level = "debug", skip(self, overrides))]
    pub fn evaluate(
        &self,
        tree: &Path,
        build: &Path,
        overrides: &RunOverrides,
    ) -> ApplicationResult<Evaluation> {
        let session = self.load_session(tree, build)?;
        let selector = self.selector(overrides)?;
        let start = session.graph.class_start(&session.build.class)?;
        let allocation = Allocation::new(&session.graph, start, session.build.node_ids())?;

        // one call, one engine
        let engines = self.engines(&session.graph).into_iter().take(1).collect();
        let evaluator = EvaluatorAdapter::new(engines)?;
        let result = evaluator
            .evaluate(&session.build.class, &allocation)
            .map_err(RunFailure::BaselineEvaluationFailed)?;

        Ok(Evaluation {
            objective: selector.select(&result),
            result,
        })
    }
}

fn to_node_set(ids: &[u32]) -> BTreeSet<NodeId> {
    ids.iter().copied().map(NodeId).collect()
}

/// Keep document and I/O failures distinguishable above this layer.
fn from_infra(e: InfraError) -> ApplicationError {
    match e {
        InfraError::Application(e) => e,
        InfraError::Document { path, message } => ApplicationError::InvalidDocument { path, message },
        InfraError::Io { context, source } => ApplicationError::Io { context, source },
    }
}
