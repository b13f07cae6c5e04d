//! Tests for the tree and build document loader

use std::path::Path;

use tempfile::TempDir;

use treeclimb::application::ApplicationError;
use treeclimb::domain::{GraphError, NodeId, NodeKind};
use treeclimb::infrastructure::loader::{load_build, load_graph};
use treeclimb::infrastructure::traits::RealFileSystem;
use treeclimb::infrastructure::InfraError;

#[test]
fn given_tree_document_when_loading_then_builds_graph() {
    // Act
    let graph = load_graph(&RealFileSystem, Path::new("tests/resources/trees/small.json")).unwrap();

    // Assert
    assert_eq!(graph.len(), 5);
    assert_eq!(graph.class_start("witch").unwrap(), NodeId(1));
    let notable = graph.node(NodeId(4)).unwrap();
    assert_eq!(notable.kind, NodeKind::Notable);
    assert_eq!(notable.name, "Arcane Potency");
    assert_eq!(notable.stats.get("damage"), Some(&30.0));
    assert!(graph.neighbors(NodeId(1)).unwrap().contains(&NodeId(3)));
}

#[test]
fn given_edge_to_unknown_node_when_loading_then_graph_error() {
    let result = load_graph(
        &RealFileSystem,
        Path::new("tests/resources/trees/dangling_edge.json"),
    );

    assert!(matches!(
        result,
        Err(InfraError::Application(ApplicationError::Graph(
            GraphError::InvalidEdge { .. }
        )))
    ));
}

#[test]
fn given_build_without_points_when_loading_then_points_absent() {
    let build = load_build(&RealFileSystem, Path::new("tests/resources/builds/partial.json")).unwrap();

    assert_eq!(build.class, "witch");
    assert_eq!(build.node_ids(), vec![NodeId(2)]);
    assert_eq!(build.points, None);
}

#[test]
fn given_truncated_json_when_loading_then_document_error_names_path() {
    let path = Path::new("tests/resources/builds/truncated.json");

    let err = load_build(&RealFileSystem, path).unwrap_err();

    match err {
        InfraError::Document { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected document error, got {other:?}"),
    }
}

#[test]
fn given_missing_file_when_loading_then_io_error() {
    let temp = TempDir::new().unwrap();

    let result = load_graph(&RealFileSystem, &temp.path().join("absent.json"));

    assert!(matches!(result, Err(InfraError::Io { .. })));
}
