//! Test support: one-time tracing setup and small fixture builders.

use std::collections::BTreeMap;
use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{GraphResult, Node, NodeKind, TreeGraph, TreeGraphBuilder};
use crate::infrastructure::traits::{BuildConfiguration, EngineError, EvaluationResult};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");

    let noisy_modules = ["rayon"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else if let Err(e) = subscriber.try_init() {
        if env::var("RUST_LOG").is_ok() {
            eprintln!("Error: Failed to set up logging: {}", e);
        }
    }
}

/// Path `0 - 1 - 2 - ... - n` with class "witch" starting at 0; node `i`
/// carries `damage = values[i - 1]`.
pub fn line_graph(values: &[f64]) -> GraphResult<TreeGraph> {
    let mut builder = TreeGraphBuilder::new()
        .node(Node::new(0, NodeKind::Normal).with_name("start"))
        .class_start("witch", 0);
    for (i, value) in values.iter().enumerate() {
        let id = i as u32 + 1;
        builder = builder
            .node(Node::new(id, NodeKind::Normal).with_stat("damage", *value))
            .edge(id - 1, id);
    }
    builder.build()
}

/// Metrics `{damage: sum}` over a per-node value table; unknown ids score 0.
pub fn table_score(
    values: &BTreeMap<u32, f64>,
    config: &BuildConfiguration,
) -> Result<EvaluationResult, EngineError> {
    let total: f64 = config
        .nodes
        .iter()
        .map(|id| values.get(id).copied().unwrap_or(0.0))
        .sum();
    Ok(EvaluationResult::from_metrics(BTreeMap::from([(
        "damage".to_string(),
        total,
    )])))
}
