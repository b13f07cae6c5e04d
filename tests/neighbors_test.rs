//! Tests for NeighborGenerator pruning and ranking

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rstest::{fixture, rstest};

use treeclimb::application::{NeighborConfig, NeighborGenerator, ObjectiveSelector};
use treeclimb::domain::{
    Allocation, BudgetState, BudgetTracker, MoveKind, Node, NodeId, NodeKind, TreeGraph,
};

fn add(ids: &[u32]) -> MoveKind {
    MoveKind::Add {
        nodes: ids.iter().copied().map(NodeId).collect(),
    }
}

fn damage() -> ObjectiveSelector {
    ObjectiveSelector::new("damage".parse().unwrap())
}

//         1*               (* = damage)
//         |
//   5 --- 0 --- 2 - 3 - 4*   (4: notable)
//   | \         |
//   |  +-- 7* --+            (7: notable, one hop from both 2 and 5)
//   9 - 10 - 8*              (8: keystone, 3 hops past 5)
#[fixture]
fn tree() -> Arc<TreeGraph> {
    let graph = TreeGraph::builder()
        .node(Node::new(0, NodeKind::Normal).with_name("start"))
        .node(Node::new(1, NodeKind::Normal).with_stat("damage", 5.0))
        .node(Node::new(2, NodeKind::Normal).with_stat("life", 5.0))
        .node(Node::new(3, NodeKind::Normal).with_stat("life", 5.0))
        .node(Node::new(4, NodeKind::Notable).with_stat("damage", 20.0))
        .node(Node::new(5, NodeKind::Normal).with_stat("life", 5.0))
        .node(Node::new(7, NodeKind::Notable).with_stat("damage", 20.0))
        .node(Node::new(8, NodeKind::Keystone).with_stat("damage", 50.0))
        .node(Node::new(9, NodeKind::Normal))
        .node(Node::new(10, NodeKind::Normal))
        .edge(0, 1)
        .edge(0, 2)
        .edge(2, 3)
        .edge(3, 4)
        .edge(0, 5)
        .edge(2, 7)
        .edge(5, 7)
        .edge(5, 9)
        .edge(9, 10)
        .edge(10, 8)
        .class_start("witch", 0)
        .build()
        .unwrap();
    Arc::new(graph)
}

fn generator(graph: &Arc<TreeGraph>, config: NeighborConfig) -> NeighborGenerator {
    NeighborGenerator::new(Arc::clone(graph), damage(), BudgetTracker::default(), config)
}

fn kinds(graph: &Arc<TreeGraph>, generator: &NeighborGenerator, budget: BudgetState) -> Vec<MoveKind> {
    let root = Allocation::root(graph, NodeId(0)).unwrap();
    generator
        .generate(&root, &budget)
        .unwrap()
        .into_iter()
        .map(|m| m.kind)
        .collect()
}

// ============================================================
// Level 1: relevance and travel moves
// ============================================================

#[rstest]
fn given_irrelevant_frontier_when_generating_then_only_unique_paths_to_targets_survive(
    tree: Arc<TreeGraph>,
) {
    // Arrange
    let generator = generator(&tree, NeighborConfig::default());

    // Act
    let moves = kinds(&tree, &generator, BudgetState::new(10, 0));

    // Assert: 2 leads uniquely to notable 4; 7 has two shortest routes and
    // keystone 8 is out of range, so 5 yields nothing
    assert_eq!(moves, vec![add(&[1]), add(&[2, 3, 4])]);
}

#[rstest]
fn given_longer_lookahead_when_generating_then_far_keystone_is_reachable(tree: Arc<TreeGraph>) {
    let config = NeighborConfig {
        lookahead: 3,
        ..NeighborConfig::default()
    };
    let generator = generator(&tree, config);

    let moves = kinds(&tree, &generator, BudgetState::new(10, 0));

    assert!(moves.contains(&add(&[5, 9, 10, 8])), "moves: {:?}", moves);
}

#[rstest]
fn given_zero_lookahead_when_generating_then_no_travel_moves(tree: Arc<TreeGraph>) {
    let config = NeighborConfig {
        lookahead: 0,
        ..NeighborConfig::default()
    };
    let moves = kinds(&tree, &generator(&tree, config), BudgetState::new(10, 0));
    assert_eq!(moves, vec![add(&[1])]);
}

#[rstest]
fn given_excluded_path_node_when_generating_then_travel_is_blocked(tree: Arc<TreeGraph>) {
    let generator = generator(&tree, NeighborConfig::default())
        .with_excluded(BTreeSet::from([NodeId(3)]));

    let moves = kinds(&tree, &generator, BudgetState::new(10, 0));

    assert_eq!(moves, vec![add(&[1])]);
}

// ============================================================
// Level 2: budget filter and top-K
// ============================================================

#[rstest]
fn given_small_budget_when_generating_then_unaffordable_paths_dropped(tree: Arc<TreeGraph>) {
    let moves = kinds(
        &tree,
        &generator(&tree, NeighborConfig::default()),
        BudgetState::new(2, 0),
    );
    assert_eq!(moves, vec![add(&[1])]);
}

#[rstest]
fn given_top_k_when_generating_then_truncates_after_ranking(tree: Arc<TreeGraph>) {
    let config = NeighborConfig {
        top_k: 1,
        ..NeighborConfig::default()
    };
    let moves = kinds(&tree, &generator(&tree, config), BudgetState::new(10, 0));
    assert_eq!(moves, vec![add(&[1])]);
}

#[rstest]
fn given_no_points_when_generating_then_empty(tree: Arc<TreeGraph>) {
    let moves = kinds(
        &tree,
        &generator(&tree, NeighborConfig::default()),
        BudgetState::new(0, 0),
    );
    assert!(moves.is_empty());
}

#[rstest]
fn given_same_inputs_when_generating_twice_then_identical_order(tree: Arc<TreeGraph>) {
    let generator = generator(&tree, NeighborConfig::default());
    let first = kinds(&tree, &generator, BudgetState::new(10, 0));
    let second = kinds(&tree, &generator, BudgetState::new(10, 0));
    assert_eq!(first, second);
}

// ============================================================
// Respec
// ============================================================

//   0 - 1 - 2 - 3
//   |
//   4 (crit)
fn respec_tree() -> Arc<TreeGraph> {
    Arc::new(
        TreeGraph::builder()
            .node(Node::new(0, NodeKind::Normal))
            .node(Node::new(1, NodeKind::Normal).with_stat("damage", 1.0))
            .node(Node::new(2, NodeKind::Normal).with_stat("damage", 1.0))
            .node(Node::new(3, NodeKind::Normal).with_stat("damage", 1.0))
            .node(Node::new(4, NodeKind::Notable).with_stat("crit", 1.0))
            .edge(0, 1)
            .edge(1, 2)
            .edge(2, 3)
            .edge(0, 4)
            .class_start("witch", 0)
            .build()
            .unwrap(),
    )
}

fn respec_generator(graph: &Arc<TreeGraph>) -> NeighborGenerator {
    let selector = damage().with_weights(BTreeMap::from([
        ("damage".to_string(), 1.0),
        ("crit".to_string(), 3.0),
    ]));
    let config = NeighborConfig {
        respec: true,
        ..NeighborConfig::default()
    };
    NeighborGenerator::new(Arc::clone(graph), selector, BudgetTracker::new(1), config)
}

#[test]
fn given_respec_enabled_when_generating_then_leaf_is_swapped_for_better_node() {
    // Arrange
    let graph = respec_tree();
    let allocation = Allocation::new(&graph, NodeId(0), [NodeId(1), NodeId(2)]).unwrap();
    let generator = respec_generator(&graph);

    // Act: no unspent points, one currency
    let moves = generator
        .generate(&allocation, &BudgetState::new(0, 1))
        .unwrap();

    // Assert: 1 is a cut vertex, so only 2 can go
    assert_eq!(moves.len(), 1);
    assert_eq!(
        moves[0].kind,
        MoveKind::Respec {
            remove: NodeId(2),
            add: NodeId(4)
        }
    );
    assert_eq!(moves[0].heuristic, 2.0);
}

#[test]
fn given_protected_node_when_generating_then_never_respecced() {
    let graph = respec_tree();
    let allocation = Allocation::new(&graph, NodeId(0), [NodeId(1), NodeId(2)]).unwrap();
    let generator = respec_generator(&graph).with_protected(BTreeSet::from([NodeId(2)]));

    let moves = generator
        .generate(&allocation, &BudgetState::new(0, 1))
        .unwrap();

    assert!(moves.iter().all(|m| !m.kind.is_respec()));
}

#[test]
fn given_no_currency_when_generating_then_respec_moves_dropped() {
    let graph = respec_tree();
    let allocation = Allocation::new(&graph, NodeId(0), [NodeId(1), NodeId(2)]).unwrap();

    let moves = respec_generator(&graph)
        .generate(&allocation, &BudgetState::new(1, 0))
        .unwrap();

    assert!(!moves.is_empty());
    assert!(moves.iter().all(|m| !m.kind.is_respec()));
}
