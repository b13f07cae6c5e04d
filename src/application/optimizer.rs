//! Steepest-ascent hill climbing over tree allocations.
//!
//! States: `Initializing -> EvaluatingBaseline -> Iterating -> terminal`,
//! where terminal is one of [`TerminalStatus`]. Stop conditions are only
//! checked between cycles, so a run always ends on a consistent
//! allocation/budget pair.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::application::cancel::CancellationToken;
use crate::application::error::{EvaluationError, RunFailure};
use crate::application::evaluator::EvaluatorAdapter;
use crate::application::neighbors::{NeighborConfig, NeighborGenerator};
use crate::application::objective::{Objective, ObjectiveSelector};
use crate::application::progress::{NullProgress, ProgressEvent, ProgressSink};
use crate::domain::{
    Allocation, BudgetState, BudgetTracker, MoveCost, MoveKind, NodeId, TreeGraph,
};

/// Hard stops and convergence threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLimits {
    /// Consecutive non-improving cycles tolerated before converging;
    /// 0 is treated as 1
    pub patience: usize,
    /// Maximum accepted moves
    pub iteration_cap: usize,
    pub timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            patience: 3,
            iteration_cap: 500,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Everything one optimization run needs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub class: String,
    /// Starting allocation; the class start is added implicitly
    pub allocation: Vec<NodeId>,
    pub selector: ObjectiveSelector,
    /// Unspent points this run may allocate
    pub points_limit: u32,
    pub currency_limit: u32,
    /// Currency per respec move
    pub respec_cost: u32,
    pub neighbors: NeighborConfig,
    pub limits: RunLimits,
    pub excluded: BTreeSet<NodeId>,
    pub protected: BTreeSet<NodeId>,
    pub cancel: CancellationToken,
}

impl RunRequest {
    pub fn new(
        class: impl Into<String>,
        allocation: Vec<NodeId>,
        selector: ObjectiveSelector,
        points_limit: u32,
    ) -> Self {
        Self {
            class: class.into(),
            allocation,
            selector,
            points_limit,
            currency_limit: 0,
            respec_cost: 1,
            neighbors: NeighborConfig::default(),
            limits: RunLimits::default(),
            excluded: BTreeSet::new(),
            protected: BTreeSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_currency(mut self, currency_limit: u32) -> Self {
        self.currency_limit = currency_limit;
        self
    }

    pub fn with_respec(mut self, enabled: bool, cost: u32) -> Self {
        self.neighbors.respec = enabled;
        self.respec_cost = cost;
        self
    }

    pub fn with_neighbors(mut self, neighbors: NeighborConfig) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_excluded(mut self, excluded: BTreeSet<NodeId>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_protected(mut self, protected: BTreeSet<NodeId>) -> Self {
        self.protected = protected;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Converged,
    TimedOut,
    Cancelled,
    Failed,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalStatus::Converged => "converged",
            TerminalStatus::TimedOut => "timed out",
            TerminalStatus::Cancelled => "cancelled",
            TerminalStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    EvaluatingBaseline,
    Iterating,
    Done(TerminalStatus),
}

/// One accepted move, with the budget right after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedMove {
    pub iteration: usize,
    pub kind: MoveKind,
    pub cost: MoveCost,
    pub objective: f64,
    pub improvement: f64,
    pub budget: BudgetState,
}

/// Final result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub starting_objective: f64,
    pub final_objective: f64,
    pub final_allocation: Vec<NodeId>,
    /// Accepted moves
    pub iterations: usize,
    /// Loop passes, improving or not
    pub cycles: usize,
    pub status: TerminalStatus,
    pub elapsed_seconds: f64,
    pub points_used: u32,
    pub currency_used: u32,
    pub accepted: Vec<AcceptedMove>,
}

/// Mutable per-run state; owned by exactly one run.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    pub allocation: Allocation,
    pub budget: BudgetState,
    pub best_objective: f64,
    pub iterations: usize,
    pub cycles: usize,
    pub non_improving: usize,
    pub phase: Phase,
    pub accepted: Vec<AcceptedMove>,
}

enum CycleOutcome {
    Improved,
    NotImproved,
    NoCandidates,
}

/// Orchestrates generation, evaluation, selection and termination.
pub struct HillClimbingOptimizer {
    graph: Arc<TreeGraph>,
    evaluator: Arc<EvaluatorAdapter>,
    progress: Arc<dyn ProgressSink>,
}

impl HillClimbingOptimizer {
    pub fn new(graph: Arc<TreeGraph>, evaluator: Arc<EvaluatorAdapter>) -> Self {
        Self {
            graph,
            evaluator,
            progress: Arc::new(NullProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Run to a terminal state.
    ///
    /// Fails only on malformed graph references or an unscoreable baseline;
    /// single candidate failures are skipped.
    #[instrument(level = "debug", skip_all, fields(class = %request.class, metric = %request.selector.metric()))]
    pub fn run(&self, request: &RunRequest) -> Result<RunReport, RunFailure> {
        let started = Instant::now();
        let start = self.graph.class_start(&request.class)?;
        let allocation = Allocation::new(&self.graph, start, request.allocation.iter().copied())?;
        for &id in request.excluded.iter().chain(request.protected.iter()) {
            self.graph.node(id)?;
        }

        let mut state = OptimizationState {
            allocation,
            budget: BudgetState::new(request.points_limit, request.currency_limit),
            best_objective: f64::NEG_INFINITY,
            iterations: 0,
            cycles: 0,
            non_improving: 0,
            phase: Phase::Initializing,
            accepted: Vec::new(),
        };
        debug!(phase = ?state.phase, "run: points={} currency={}", request.points_limit, request.currency_limit);

        // zero would end a run right after an improving cycle
        let patience = request.limits.patience.max(1);

        let tracker = BudgetTracker::new(request.respec_cost);
        let generator = NeighborGenerator::new(
            Arc::clone(&self.graph),
            request.selector.clone(),
            tracker,
            request.neighbors.clone(),
        )
        .with_excluded(request.excluded.clone())
        .with_protected(request.protected.clone());

        state.phase = Phase::EvaluatingBaseline;
        debug!(phase = ?state.phase, "scoring {} allocated nodes", state.allocation.len());
        let baseline = self
            .evaluator
            .evaluate(&request.class, &state.allocation)
            .map_err(RunFailure::BaselineEvaluationFailed)?;
        let starting_objective = match request.selector.select(&baseline) {
            Objective::Score(v) => v,
            Objective::Disqualified(reason) => {
                return Err(RunFailure::BaselineEvaluationFailed(
                    EvaluationError::Disqualified(reason),
                ))
            }
        };
        info!(
            "baseline {} = {:.3} ({} nodes)",
            request.selector.metric(),
            starting_objective,
            state.allocation.len()
        );
        state.best_objective = starting_objective;
        state.phase = Phase::Iterating;

        let status = loop {
            if let Some(status) = self.check_stop(request, &state, started) {
                break status;
            }

            let outcome = self.cycle(request, &generator, &tracker, &mut state)?;
            let message = match outcome {
                CycleOutcome::Improved => state
                    .accepted
                    .last()
                    .map(|m| format!("accepted {} (+{:.3})", m.kind, m.improvement))
                    .unwrap_or_default(),
                CycleOutcome::NotImproved => format!(
                    "no improvement ({}/{})",
                    state.non_improving, patience
                ),
                CycleOutcome::NoCandidates => "no legal moves".to_string(),
            };
            self.publish(&state, started, message);

            match outcome {
                CycleOutcome::NoCandidates => break TerminalStatus::Converged,
                _ if state.non_improving >= patience => {
                    break TerminalStatus::Converged
                }
                _ => {}
            }
        };

        state.phase = Phase::Done(status);
        self.publish(&state, started, format!("{}", status));
        info!(
            "run {}: {} -> {:.3} after {} moves / {} cycles",
            status, starting_objective, state.best_objective, state.iterations, state.cycles
        );

        Ok(RunReport {
            starting_objective,
            final_objective: state.best_objective,
            final_allocation: state.allocation.nodes().iter().copied().collect(),
            iterations: state.iterations,
            cycles: state.cycles,
            status,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            points_used: state.budget.points_used,
            currency_used: state.budget.currency_used,
            accepted: state.accepted,
        })
    }

    fn check_stop(
        &self,
        request: &RunRequest,
        state: &OptimizationState,
        started: Instant,
    ) -> Option<TerminalStatus> {
        if request.cancel.is_cancelled() {
            debug!("cancellation requested after {} moves", state.iterations);
            return Some(TerminalStatus::Cancelled);
        }
        if state.iterations >= request.limits.iteration_cap {
            debug!("iteration cap {} reached", request.limits.iteration_cap);
            return Some(TerminalStatus::TimedOut);
        }
        if started.elapsed() >= request.limits.timeout {
            debug!("timeout {:?} reached", request.limits.timeout);
            return Some(TerminalStatus::TimedOut);
        }
        None
    }

    fn cycle(
        &self,
        request: &RunRequest,
        generator: &NeighborGenerator,
        tracker: &BudgetTracker,
        state: &mut OptimizationState,
    ) -> Result<CycleOutcome, RunFailure> {
        state.cycles += 1;
        let candidates = generator.generate(&state.allocation, &state.budget)?;
        if candidates.is_empty() {
            return Ok(CycleOutcome::NoCandidates);
        }

        let mut allocations: Vec<Allocation> = candidates
            .iter()
            .map(|c| state.allocation.with_move(&c.kind))
            .collect();
        let results = self.evaluator.evaluate_all(&request.class, &allocations);

        // (index, score, budget after); first in rank order wins exact ties
        let mut best: Option<(usize, f64, BudgetState)> = None;
        let mut skipped = 0usize;
        for (i, (candidate, result)) in candidates.iter().zip(results).enumerate() {
            let score = match result {
                Ok(eval) => match request.selector.select(&eval) {
                    Objective::Score(v) => v,
                    Objective::Disqualified(reason) => {
                        debug!("skip {}: {}", candidate.kind, reason);
                        skipped += 1;
                        continue;
                    }
                },
                Err(e) => {
                    warn!("skip {}: {}", candidate.kind, e);
                    skipped += 1;
                    continue;
                }
            };
            if score <= state.best_objective {
                continue;
            }
            let Ok(budget) = tracker.apply(candidate, &state.budget) else {
                continue;
            };
            if best.as_ref().map_or(true, |(_, s, _)| score > *s) {
                best = Some((i, score, budget));
            }
        }
        debug!(
            "cycle {}: {} candidates, {} skipped",
            state.cycles,
            candidates.len(),
            skipped
        );

        let Some((index, score, budget)) = best else {
            state.non_improving += 1;
            return Ok(CycleOutcome::NotImproved);
        };

        let candidate = &candidates[index];
        let improvement = score - state.best_objective;
        state.allocation = allocations.swap_remove(index);
        state.budget = budget;
        state.best_objective = score;
        state.iterations += 1;
        state.non_improving = 0;
        info!(
            "move {}: {} -> {:.3} (+{:.3})",
            state.iterations, candidate.kind, score, improvement
        );
        state.accepted.push(AcceptedMove {
            iteration: state.iterations,
            kind: candidate.kind.clone(),
            cost: candidate.cost,
            objective: score,
            improvement,
            budget,
        });
        Ok(CycleOutcome::Improved)
    }

    fn publish(&self, state: &OptimizationState, started: Instant, message: String) {
        self.progress.publish(ProgressEvent {
            iteration: state.iterations,
            best_objective: state.best_objective,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            message,
        });
    }
}
