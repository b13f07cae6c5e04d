//! Bounded evaluation pool around the external scoring engines.
//!
//! Each engine instance is owned by exactly one call at a time: instances
//! sit in a fixed-capacity channel and are checked out per evaluation, so
//! the channel doubles as the semaphore capping concurrent engine calls.
//! The rayon pool has one thread per instance.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam::channel::{bounded, Receiver, Sender};
use rayon::prelude::*;
use tracing::trace;

use crate::application::error::{ApplicationError, ApplicationResult, EvaluationError};
use crate::domain::Allocation;
use crate::infrastructure::traits::{BuildConfiguration, EvaluationResult, ScoringEngine};

type Engine = Box<dyn ScoringEngine>;

/// Sole touchpoint with the scoring engines. Each call is one-shot: a
/// failure is reported, never retried.
pub struct EvaluatorAdapter {
    pool: rayon::ThreadPool,
    idle: Receiver<Engine>,
    returns: Sender<Engine>,
    capacity: usize,
}

impl EvaluatorAdapter {
    /// Pool sized to the number of engine instances.
    pub fn new(engines: Vec<Engine>) -> ApplicationResult<Self> {
        let capacity = engines.len();
        if capacity == 0 {
            return Err(ApplicationError::InvalidRequest(
                "at least one scoring engine instance is required".to_string(),
            ));
        }

        let (returns, idle) = bounded(capacity);
        for engine in engines {
            returns
                .send(engine)
                .map_err(|_| ApplicationError::InvalidRequest("engine queue closed".to_string()))?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("scorer-{i}"))
            .build()
            .map_err(|e| ApplicationError::OperationFailed {
                context: "build evaluator pool".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            pool,
            idle,
            returns,
            capacity,
        })
    }

    /// Number of engine instances, and so the maximum parallelism.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Score one allocation.
    pub fn evaluate(
        &self,
        class: &str,
        allocation: &Allocation,
    ) -> Result<EvaluationResult, EvaluationError> {
        let config = BuildConfiguration {
            class: class.to_string(),
            nodes: allocation.to_ids(),
        };
        self.score(&config)
    }

    /// Score many allocations in parallel; results keep the input order.
    pub fn evaluate_all(
        &self,
        class: &str,
        allocations: &[Allocation],
    ) -> Vec<Result<EvaluationResult, EvaluationError>> {
        self.pool.install(|| {
            allocations
                .par_iter()
                .map(|allocation| self.evaluate(class, allocation))
                .collect()
        })
    }

    fn score(&self, config: &BuildConfiguration) -> Result<EvaluationResult, EvaluationError> {
        let mut engine = self.idle.recv().map_err(|_| EvaluationError::PoolClosed)?;
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.score(config)));

        // capacity == number of engines, so this never blocks
        let _ = self.returns.send(engine);
        trace!("scored {} nodes in {:?}", config.nodes.len(), started.elapsed());

        match outcome {
            Ok(result) => result.map_err(EvaluationError::from),
            Err(payload) => Err(EvaluationError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
