//! Scoring engine implementations
//!
//! - [`StatSumEngine`]: in-process, additive over node stats
//! - [`CommandEngine`]: one external process per call, JSON over stdin/stdout

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::{NodeId, TreeGraph};
use crate::infrastructure::traits::{
    BuildConfiguration, CommandRunner, EngineError, EvaluationResult, ScoringEngine,
};

/// Reserved output key carrying the engine's own primary objective.
pub const OBJECTIVE_KEY: &str = "objective";

/// Deterministic engine: every metric is the sum of the matching stat
/// magnitudes over all allocated nodes. Every stat tag of the graph is
/// reported, so a tag no allocated node carries scores 0.
#[derive(Debug, Clone)]
pub struct StatSumEngine {
    graph: Arc<TreeGraph>,
    tags: BTreeSet<String>,
}

impl StatSumEngine {
    pub fn new(graph: Arc<TreeGraph>) -> Self {
        let tags = graph
            .nodes()
            .flat_map(|node| node.stats.keys().cloned())
            .collect();
        Self { graph, tags }
    }
}

impl ScoringEngine for StatSumEngine {
    fn score(&mut self, config: &BuildConfiguration) -> Result<EvaluationResult, EngineError> {
        let mut metrics: BTreeMap<String, f64> =
            self.tags.iter().map(|tag| (tag.clone(), 0.0)).collect();
        for &id in &config.nodes {
            let node = self
                .graph
                .node(NodeId(id))
                .map_err(|e| EngineError::Failed(e.to_string()))?;
            for (tag, value) in &node.stats {
                *metrics.entry(tag.clone()).or_insert(0.0) += value;
            }
        }
        trace!("stat-sum: {} nodes -> {} metrics", config.nodes.len(), metrics.len());
        Ok(EvaluationResult::from_metrics(metrics))
    }
}

/// Runs an external scorer per call.
///
/// The build configuration is written to stdin as JSON; stdout must hold a
/// flat JSON object of numeric metrics. An `objective` key, if present,
/// becomes the primary objective. `null` values are treated as absent.
pub struct CommandEngine {
    runner: Arc<dyn CommandRunner>,
    command: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            runner,
            command: command.into(),
            args,
        }
    }

    /// Parse scorer stdout into an [`EvaluationResult`].
    pub fn parse_output(stdout: &str) -> Result<EvaluationResult, EngineError> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(stdout.trim())
            .map_err(|e| EngineError::MalformedOutput(e.to_string()))?;

        let mut result = EvaluationResult::default();
        for (key, value) in raw {
            let number = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| {
                    EngineError::MalformedOutput(format!("{key}: not representable as f64"))
                })?,
                other => {
                    return Err(EngineError::MalformedOutput(format!(
                        "{key}: expected number, got {other}"
                    )))
                }
            };
            if key == OBJECTIVE_KEY {
                result.objective = Some(number);
            } else {
                result.metrics.insert(key, number);
            }
        }
        Ok(result)
    }
}

impl ScoringEngine for CommandEngine {
    fn score(&mut self, config: &BuildConfiguration) -> Result<EvaluationResult, EngineError> {
        let input =
            serde_json::to_string(config).map_err(|e| EngineError::Failed(e.to_string()))?;
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();

        let output = self
            .runner
            .run_with_stdin(&self.command, &args, &input)
            .map_err(|e| EngineError::Unavailable(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("scorer {} failed: {}", self.command, stderr.trim());
            return Err(EngineError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Self::parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}
