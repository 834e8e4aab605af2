use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::workflow::{Edge, WorkflowArtifact, WorkflowNode};

/// Structural difference between two artifact versions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesSummary {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub nodes_modified: usize,
    pub connections_added: usize,
    pub connections_removed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_nodes: Vec<String>,
}

impl ChangesSummary {
    pub fn is_empty(&self) -> bool {
        self.nodes_added == 0
            && self.nodes_removed == 0
            && self.nodes_modified == 0
            && self.connections_added == 0
            && self.connections_removed == 0
    }
}

/// Type and parameters define a node's behaviour; position changes are cosmetic.
fn behaviour_differs(before: &WorkflowNode, after: &WorkflowNode) -> bool {
    before.node_type != after.node_type
        || before.type_version != after.type_version
        || before.parameters != after.parameters
}

/// Nodes are matched by name, connections by their full port tuple.
pub fn compute_changes(prior: &WorkflowArtifact, next: &WorkflowArtifact) -> ChangesSummary {
    let before: BTreeMap<&str, &WorkflowNode> =
        prior.nodes.iter().map(|node| (node.name.as_str(), node)).collect();
    let after: BTreeMap<&str, &WorkflowNode> =
        next.nodes.iter().map(|node| (node.name.as_str(), node)).collect();

    let mut summary = ChangesSummary::default();
    for (name, node) in &after {
        match before.get(name) {
            None => summary.added_nodes.push(name.to_string()),
            Some(old) if behaviour_differs(old, node) => summary.modified_nodes.push(name.to_string()),
            Some(_) => {}
        }
    }
    summary.removed_nodes = before
        .keys()
        .filter(|name| !after.contains_key(*name))
        .map(|name| name.to_string())
        .collect();

    let old_edges: BTreeSet<Edge> = prior.edges().into_iter().collect();
    let new_edges: BTreeSet<Edge> = next.edges().into_iter().collect();

    summary.nodes_added = summary.added_nodes.len();
    summary.nodes_removed = summary.removed_nodes.len();
    summary.nodes_modified = summary.modified_nodes.len();
    summary.connections_added = new_edges.difference(&old_edges).count();
    summary.connections_removed = old_edges.difference(&new_edges).count();
    summary
}
