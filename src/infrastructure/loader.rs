//! JSON documents for tree graphs and builds
//!
//! Graph document:
//! ```json
//! {
//!   "nodes": [{"id": 1, "name": "Start", "kind": "normal", "stats": {}, "position": [0, 0]}],
//!   "edges": [[1, 2]],
//!   "classes": {"witch": 1}
//! }
//! ```
//!
//! Build document: `{"class": "witch", "allocated": [1, 2, 3], "points": 12}`,
//! where `points` is the number of unspent points.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::domain::{Node, NodeId, NodeKind, TreeGraph};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
    #[serde(default)]
    pub position: Option<(f32, f32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<(u32, u32)>,
    #[serde(default)]
    pub classes: BTreeMap<String, u32>,
}

impl GraphDocument {
    /// Build the immutable graph; reference errors surface as graph errors.
    pub fn into_graph(self) -> Result<TreeGraph, ApplicationError> {
        let mut builder = TreeGraph::builder();
        for doc in self.nodes {
            let mut node = Node::new(doc.id, doc.kind);
            if let Some(name) = doc.name {
                node = node.with_name(name);
            }
            if let Some((x, y)) = doc.position {
                node = node.with_position(x, y);
            }
            node.stats = doc.stats;
            builder.add_node(node);
        }
        for (a, b) in self.edges {
            builder.add_edge(a, b);
        }
        for (class, start) in self.classes {
            builder.add_class_start(class, start);
        }
        Ok(builder.build()?)
    }
}

/// A saved build: class plus allocated node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDocument {
    pub class: String,
    #[serde(default)]
    pub allocated: Vec<u32>,
    #[serde(default)]
    pub points: Option<u32>,
}

impl BuildDocument {
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.allocated.iter().copied().map(NodeId).collect()
    }
}

fn read_document<T>(fs: &dyn FileSystem, path: &Path) -> InfraResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs
        .read_to_string(path)
        .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| InfraError::Document {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and validate a tree graph document.
#[instrument(level = "debug", skip(fs))]
pub fn load_graph(fs: &dyn FileSystem, path: &Path) -> InfraResult<TreeGraph> {
    let doc: GraphDocument = read_document(fs, path)?;
    let graph = doc.into_graph()?;
    debug!("load_graph: {} nodes, {} classes", graph.len(), graph.classes().count());
    Ok(graph)
}

/// Load a build document. Node ids are validated later, against the graph.
#[instrument(level = "debug", skip(fs))]
pub fn load_build(fs: &dyn FileSystem, path: &Path) -> InfraResult<BuildDocument> {
    read_document(fs, path)
}
