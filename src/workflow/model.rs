use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Output type (usually `main`) -> output index -> targets, keyed by source node name.
pub type ConnectionMap = BTreeMap<String, BTreeMap<String, Vec<Vec<ConnectionTarget>>>>;

pub const MAIN_PORT: &str = "main";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type", default = "default_port_type")]
    pub port_type: String,
    #[serde(default)]
    pub index: usize,
}

fn default_port_type() -> String {
    MAIN_PORT.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowNode {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(rename = "typeVersion", default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<Value>,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: [f64; 2],
}

// Shape problems in these fields are reported by validation as warnings, so
// loading must not reject them.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(id) => Some(id),
        other => Some(other.to_string()),
    })
}

fn lenient_position<'de, D>(deserializer: D) -> std::result::Result<[f64; 2], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let coords = raw
        .as_array()
        .filter(|coords| coords.len() == 2)
        .and_then(|coords| Some([coords[0].as_f64()?, coords[1].as_f64()?]));
    Ok(coords.unwrap_or_default())
}

// A `null` output slot loads as an output with no targets.
fn lenient_connections<'de, D>(deserializer: D) -> std::result::Result<ConnectionMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, BTreeMap<String, Vec<Option<Vec<ConnectionTarget>>>>> =
        BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(source, outputs)| {
            let outputs = outputs
                .into_iter()
                .map(|(port, slots)| (port, slots.into_iter().map(Option::unwrap_or_default).collect()))
                .collect();
            (source, outputs)
        })
        .collect())
}

fn empty_parameters() -> Value {
    Value::Object(Default::default())
}

impl WorkflowNode {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: node_type.into(),
            type_version: None,
            parameters: empty_parameters(),
            position: [0.0, 0.0],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = [x, y];
        self
    }
}

/// One flattened connection between two node ports.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub source: String,
    pub output_type: String,
    pub output_index: usize,
    pub target: String,
    pub input_type: String,
    pub input_index: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowArtifact {
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    #[serde(default, deserialize_with = "lenient_connections")]
    pub connections: ConnectionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl WorkflowArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: ConnectionMap::new(),
            settings: None,
        }
    }

    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Wires `source`'s first main output to `target`'s first main input.
    pub fn connect(mut self, source: &str, target: &str) -> Self {
        let outputs = self
            .connections
            .entry(source.to_string())
            .or_default()
            .entry(MAIN_PORT.to_string())
            .or_default();
        if outputs.is_empty() {
            outputs.push(Vec::new());
        }
        outputs[0].push(ConnectionTarget {
            node: target.to_string(),
            port_type: MAIN_PORT.to_string(),
            index: 0,
        });
        self
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn node(&self, name: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (source, outputs) in &self.connections {
            for (output_type, slots) in outputs {
                for (output_index, targets) in slots.iter().enumerate() {
                    for target in targets {
                        edges.push(Edge {
                            source: source.clone(),
                            output_type: output_type.clone(),
                            output_index,
                            target: target.node.clone(),
                            input_type: target.port_type.clone(),
                            input_index: target.index,
                        });
                    }
                }
            }
        }
        edges
    }

    /// Hex SHA-256 of the canonical (key-sorted) JSON encoding.
    pub fn content_hash(&self) -> Result<String> {
        let canonical = serde_json::to_vec(&self.to_value()?)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> WorkflowArtifact {
        WorkflowArtifact::new("demo")
            .with_node(WorkflowNode::new("Start", "n8n-nodes-base.manualTrigger"))
            .with_node(WorkflowNode::new("Fetch", "n8n-nodes-base.httpRequest").at(200.0, 0.0))
            .connect("Start", "Fetch")
    }

    #[test]
    fn parses_common_workflow_dialect() {
        let value = json!({
            "name": "demo",
            "nodes": [
                {"id": "a1", "name": "Start", "type": "n8n-nodes-base.manualTrigger", "typeVersion": 1, "position": [0, 0], "parameters": {}},
                {"name": "Fetch", "type": "n8n-nodes-base.httpRequest", "position": [200, 0]}
            ],
            "connections": {
                "Start": {"main": [[{"node": "Fetch", "type": "main", "index": 0}]]}
            }
        });
        let artifact = WorkflowArtifact::from_value(value).unwrap();
        assert_eq!(artifact.nodes.len(), 2);
        assert_eq!(artifact.nodes[0].id.as_deref(), Some("a1"));
        assert_eq!(artifact.edges().len(), 1);
        assert_eq!(artifact.edges()[0].target, "Fetch");
    }

    #[test]
    fn tolerates_ill_shaped_optional_fields() {
        let artifact = WorkflowArtifact::from_value(json!({
            "name": "loose",
            "nodes": [{"id": 7, "name": "A", "type": "x.set", "position": "top-left"}]
        }))
        .unwrap();
        assert_eq!(artifact.nodes[0].id.as_deref(), Some("7"));
        assert_eq!(artifact.nodes[0].position, [0.0, 0.0]);
    }

    #[test]
    fn null_output_slots_load_as_empty() {
        let artifact = WorkflowArtifact::from_value(json!({
            "name": "gaps",
            "nodes": [
                {"name": "If", "type": "n8n-nodes-base.if"},
                {"name": "Set", "type": "n8n-nodes-base.set"}
            ],
            "connections": {"If": {"main": [null, [{"node": "Set", "type": "main", "index": 0}]]}}
        }))
        .unwrap();
        assert!(artifact.connections["If"]["main"][0].is_empty());
        let edges = artifact.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].output_index, 1);
    }

    #[test]
    fn content_hash_is_stable_and_content_sensitive() {
        let first = sample().content_hash().unwrap();
        assert_eq!(first, sample().content_hash().unwrap());
        assert_eq!(first.len(), 64);

        let changed = sample().with_node(WorkflowNode::new("Extra", "n8n-nodes-base.set"));
        assert_ne!(first, changed.content_hash().unwrap());
    }
}
