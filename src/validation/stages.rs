use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::policy::NodePolicy;
use super::result::{Finding, FindingCategory};
use super::schema::{Schema, SchemaViolation};

/// What a stage reports back to the chain.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub findings: Vec<Finding>,
    pub nodes_checked: Option<usize>,
    pub connections_checked: Option<usize>,
}

impl StageOutput {
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
}

pub trait ValidationStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// A fatal stage that reports errors stops the chain.
    fn is_fatal(&self) -> bool {
        false
    }

    fn check(&self, document: &Value, policy: &NodePolicy, output: &mut StageOutput);
}

/// Top-level fields and their shapes.
pub struct StructuralStage {
    schema: Schema,
}

impl Default for StructuralStage {
    fn default() -> Self {
        Self {
            schema: Schema::workflow(),
        }
    }
}

impl ValidationStage for StructuralStage {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn is_fatal(&self) -> bool {
        true
    }

    fn check(&self, document: &Value, _policy: &NodePolicy, output: &mut StageOutput) {
        if !document.is_object() {
            output.push(Finding::hard(
                FindingCategory::Structure,
                "structure.not_object",
                "workflow document must be a JSON object",
            ));
            return;
        }

        for violation in self.schema.violations(document) {
            let finding = match &violation {
                SchemaViolation::Missing { .. } => Finding::hard(
                    FindingCategory::Structure,
                    "structure.missing_field",
                    format!("required field `{}` is missing", violation.path()),
                ),
                SchemaViolation::WrongType { expected, .. } => Finding::hard(
                    FindingCategory::Structure,
                    "structure.invalid_type",
                    format!("field `{}` must be {}", violation.path(), expected),
                ),
            };
            output.push(finding);
        }

        if let Some(nodes) = document.get("nodes").and_then(Value::as_array) {
            if nodes.is_empty() {
                output.push(Finding::hard(
                    FindingCategory::Structure,
                    "structure.empty_workflow",
                    "workflow contains no nodes",
                ));
            }
        }

        if let Some(name) = document.get("name").and_then(Value::as_str) {
            if name.trim().is_empty() {
                output.push(Finding::soft(
                    FindingCategory::Structure,
                    "structure.empty_name",
                    "workflow name is empty",
                ));
            }
        }
    }
}

/// Identity, type tag, and per-node field shapes.
#[derive(Default)]
pub struct NodeStage;

impl ValidationStage for NodeStage {
    fn name(&self) -> &'static str {
        "nodes"
    }

    fn check(&self, document: &Value, policy: &NodePolicy, output: &mut StageOutput) {
        let Some(nodes) = document.get("nodes").and_then(Value::as_array) else {
            return;
        };
        output.nodes_checked = Some(nodes.len());

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for (idx, node) in nodes.iter().enumerate() {
            let Some(object) = node.as_object() else {
                output.push(Finding::hard(
                    FindingCategory::Node,
                    "node.invalid_shape",
                    format!("node at index {idx} is not an object"),
                ));
                continue;
            };

            let name = match object.get("name").and_then(Value::as_str) {
                Some(name) if !name.trim().is_empty() => name,
                _ => {
                    output.push(Finding::hard(
                        FindingCategory::Node,
                        "node.missing_name",
                        format!("node at index {idx} has no name"),
                    ));
                    continue;
                }
            };

            if !names.insert(name) {
                output.push(
                    Finding::hard(
                        FindingCategory::Node,
                        "node.duplicate_name",
                        format!("node name `{name}` is used more than once"),
                    )
                    .on_node(name),
                );
            }

            if let Some(id) = object.get("id").filter(|id| !id.is_null()) {
                let id = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
                if !ids.insert(id.clone()) {
                    output.push(
                        Finding::hard(
                            FindingCategory::Node,
                            "node.duplicate_id",
                            format!("node id `{id}` is used more than once"),
                        )
                        .on_node(name),
                    );
                }
            }

            match object.get("type").and_then(Value::as_str) {
                Some(node_type) if !node_type.trim().is_empty() => {
                    if !policy.is_known_type(node_type) {
                        output.push(
                            Finding::soft(
                                FindingCategory::Node,
                                "node.unknown_type",
                                format!("node `{name}` has unrecognized type `{node_type}`"),
                            )
                            .on_node(name),
                        );
                    }
                }
                _ => output.push(
                    Finding::hard(
                        FindingCategory::Node,
                        "node.missing_type",
                        format!("node `{name}` has no type"),
                    )
                    .on_node(name),
                ),
            }

            if let Some(position) = object.get("position") {
                let valid = position
                    .as_array()
                    .map(|coords| coords.len() == 2 && coords.iter().all(Value::is_number))
                    .unwrap_or(false);
                if !valid {
                    output.push(
                        Finding::soft(
                            FindingCategory::Node,
                            "node.invalid_position",
                            format!("node `{name}` position must be [x, y]"),
                        )
                        .on_node(name),
                    );
                }
            }

            if let Some(parameters) = object.get("parameters") {
                if !parameters.is_object() {
                    output.push(
                        Finding::soft(
                            FindingCategory::Node,
                            "node.invalid_parameters",
                            format!("node `{name}` parameters must be an object"),
                        )
                        .on_node(name),
                    );
                }
            }
        }
    }
}

/// Referential integrity of the connection map plus the isolated-node rule.
#[derive(Default)]
pub struct ConnectionStage;

impl ConnectionStage {
    fn check_target(
        &self,
        source: &str,
        target: &Value,
        node_types: &HashMap<&str, &str>,
        policy: &NodePolicy,
        connected: &mut HashSet<String>,
        output: &mut StageOutput,
    ) {
        let Some(node) = target.get("node").and_then(Value::as_str) else {
            output.push(
                Finding::hard(
                    FindingCategory::Connection,
                    "connection.unknown_target",
                    format!("connection from `{source}` has no target node"),
                )
                .on_node(source),
            );
            return;
        };

        if node_types.contains_key(node) {
            connected.insert(source.to_string());
            connected.insert(node.to_string());
        } else {
            output.push(
                Finding::hard(
                    FindingCategory::Connection,
                    "connection.unknown_target",
                    format!("connection from `{source}` targets unknown node `{node}`"),
                )
                .on_node(source),
            );
        }

        if let Some(port_type) = target.get("type") {
            if !port_type.is_string() {
                output.push(
                    Finding::hard(
                        FindingCategory::Connection,
                        "connection.invalid_port",
                        format!("connection `{source}` -> `{node}` has invalid input type {port_type}"),
                    )
                    .on_node(source),
                );
            }
        }

        if let Some(index) = target.get("index") {
            let in_range = index
                .as_u64()
                .map(|idx| idx as usize <= policy.max_input_index)
                .unwrap_or(false);
            if !in_range {
                output.push(
                    Finding::hard(
                        FindingCategory::Connection,
                        "connection.invalid_port",
                        format!("connection `{source}` -> `{node}` has invalid input index {index}"),
                    )
                    .on_node(source),
                );
            }
        }
    }
}

impl ValidationStage for ConnectionStage {
    fn name(&self) -> &'static str {
        "connections"
    }

    fn check(&self, document: &Value, policy: &NodePolicy, output: &mut StageOutput) {
        let node_types: HashMap<&str, &str> = document
            .get("nodes")
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|node| {
                        let name = node.get("name")?.as_str()?;
                        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
                        Some((name, node_type))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut connected = HashSet::new();
        let mut checked = 0usize;

        if let Some(connections) = document.get("connections").and_then(Value::as_object) {
            for (source, outputs) in connections {
                if !node_types.contains_key(source.as_str()) {
                    output.push(
                        Finding::hard(
                            FindingCategory::Connection,
                            "connection.unknown_source",
                            format!("connections declared for unknown node `{source}`"),
                        )
                        .on_node(source.as_str()),
                    );
                }

                let Some(outputs) = outputs.as_object() else {
                    output.push(
                        Finding::hard(
                            FindingCategory::Connection,
                            "connection.invalid_port",
                            format!("outputs of `{source}` must be keyed by port type"),
                        )
                        .on_node(source.as_str()),
                    );
                    continue;
                };

                for (port_type, slots) in outputs {
                    let Some(slots) = slots.as_array() else {
                        output.push(
                            Finding::hard(
                                FindingCategory::Connection,
                                "connection.invalid_port",
                                format!("port `{port_type}` of `{source}` must be a list of outputs"),
                            )
                            .on_node(source.as_str()),
                        );
                        continue;
                    };
                    for (slot, targets) in slots.iter().enumerate() {
                        // A null slot is an output with nothing attached.
                        if targets.is_null() {
                            continue;
                        }
                        let Some(targets) = targets.as_array() else {
                            checked += 1;
                            output.push(
                                Finding::hard(
                                    FindingCategory::Connection,
                                    "connection.invalid_port",
                                    format!(
                                        "output {slot} of `{source}` port `{port_type}` must be a list of targets"
                                    ),
                                )
                                .on_node(source.as_str()),
                            );
                            continue;
                        };
                        for target in targets {
                            checked += 1;
                            self.check_target(
                                source,
                                target,
                                &node_types,
                                policy,
                                &mut connected,
                                output,
                            );
                        }
                    }
                }
            }
        }
        output.connections_checked = Some(checked);

        let mut names: Vec<_> = node_types.iter().collect();
        names.sort();
        for (name, node_type) in names {
            if connected.contains(*name) || policy.is_trigger_capable(node_type) {
                continue;
            }
            output.push(
                Finding::soft(
                    FindingCategory::Connection,
                    "connection.isolated_node",
                    format!("node `{name}` has no inbound or outbound connections"),
                )
                .on_node(*name),
            );
        }
    }
}
