//! Objective extraction and heuristic stat weights.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::Node;
use crate::infrastructure::traits::EvaluationResult;

/// Which value of an evaluation is maximized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveMetric {
    /// The engine's own `objective` field
    Primary,
    /// A named metric field
    Field(String),
}

impl FromStr for ObjectiveMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err("empty metric name".to_string()),
            "primary" | "objective" => Ok(ObjectiveMetric::Primary),
            other => Ok(ObjectiveMetric::Field(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectiveMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveMetric::Primary => write!(f, "objective"),
            ObjectiveMetric::Field(name) => write!(f, "{}", name),
        }
    }
}

/// Scalar extracted from one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Objective {
    Score(f64),
    /// Missing or non-finite: can never be chosen as an improvement
    Disqualified(String),
}

impl Objective {
    pub fn score(&self) -> Option<f64> {
        match self {
            Objective::Score(v) => Some(*v),
            Objective::Disqualified(_) => None,
        }
    }
}

/// Maps an evaluation to the run's objective and weighs stat tags for the
/// neighbor heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveSelector {
    metric: ObjectiveMetric,
    weights: BTreeMap<String, f64>,
}

impl ObjectiveSelector {
    /// Selector for `metric`, weighting only the stat tag of the same name.
    pub fn new(metric: ObjectiveMetric) -> Self {
        let mut weights = BTreeMap::new();
        if let ObjectiveMetric::Field(name) = &metric {
            weights.insert(name.clone(), 1.0);
        }
        Self { metric, weights }
    }

    /// Replace the heuristic weights. An empty map keeps the defaults.
    pub fn with_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        if !weights.is_empty() {
            self.weights = weights;
        }
        self
    }

    pub fn metric(&self) -> &ObjectiveMetric {
        &self.metric
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn select(&self, result: &EvaluationResult) -> Objective {
        let value = match &self.metric {
            ObjectiveMetric::Primary => result.objective,
            ObjectiveMetric::Field(name) => result.metric(name),
        };
        match value {
            None => Objective::Disqualified(format!("metric '{}' missing", self.metric)),
            Some(v) if !v.is_finite() => {
                Objective::Disqualified(format!("metric '{}' is {}", self.metric, v))
            }
            Some(v) => Objective::Score(v),
        }
    }

    /// Sum of the weights of the node's stat tags.
    pub fn heuristic(&self, node: &Node) -> f64 {
        node.stats
            .keys()
            .filter_map(|tag| self.weights.get(tag))
            .sum()
    }

    /// Whether any of the node's stat tags carries a non-zero weight.
    ///
    /// Without weights (the engine's own objective, nothing configured)
    /// every node is relevant and ranks by id alone.
    pub fn is_relevant(&self, node: &Node) -> bool {
        if self.weights.is_empty() {
            return true;
        }
        node.stats
            .keys()
            .any(|tag| self.weights.get(tag).is_some_and(|w| *w != 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodeKind;

    fn result(pairs: &[(&str, f64)]) -> EvaluationResult {
        EvaluationResult::from_metrics(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn given_nan_metric_when_selecting_then_disqualified() {
        let selector = ObjectiveSelector::new("damage".parse().unwrap());
        assert!(matches!(
            selector.select(&result(&[("damage", f64::NAN)])),
            Objective::Disqualified(_)
        ));
        assert!(matches!(
            selector.select(&result(&[("life", 1.0)])),
            Objective::Disqualified(_)
        ));
        assert_eq!(
            selector.select(&result(&[("damage", 7.0)])),
            Objective::Score(7.0)
        );
    }

    #[test]
    fn given_primary_metric_when_selecting_then_reads_objective_field() {
        let selector = ObjectiveSelector::new(ObjectiveMetric::Primary);
        let mut eval = result(&[("damage", 1.0)]);
        eval.objective = Some(42.0);
        assert_eq!(selector.select(&eval), Objective::Score(42.0));
        assert!(selector.weights().is_empty());
    }

    #[test]
    fn given_weights_when_scoring_node_then_sums_matching_tags() {
        let selector = ObjectiveSelector::new("damage".parse().unwrap()).with_weights(
            [("damage".to_string(), 2.0), ("crit".to_string(), 0.5)]
                .into_iter()
                .collect(),
        );
        let node = crate::domain::Node::new(1, NodeKind::Notable)
            .with_stat("damage", 10.0)
            .with_stat("crit", 3.0)
            .with_stat("life", 5.0);
        assert_eq!(selector.heuristic(&node), 2.5);
        assert!(selector.is_relevant(&node));
        let travel = crate::domain::Node::new(2, NodeKind::Normal).with_stat("life", 5.0);
        assert!(!selector.is_relevant(&travel));
    }

    #[test]
    fn given_no_weights_when_checking_relevance_then_every_node_counts() {
        let selector = ObjectiveSelector::new(ObjectiveMetric::Primary);
        let bare = crate::domain::Node::new(3, NodeKind::Normal);
        assert!(selector.is_relevant(&bare));
        assert_eq!(selector.heuristic(&bare), 0.0);
    }
}
