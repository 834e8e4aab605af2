use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    Strict,
    #[default]
    Lenient,
}

/// Node type table consulted by the node and connection stages.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodePolicy {
    /// Type tags that may stand alone without connections.
    #[serde(default = "default_trigger_types")]
    pub trigger_types: Vec<String>,
    /// Suffixes of the last type segment that mark a trigger (`manualTrigger`).
    #[serde(default = "default_trigger_suffixes")]
    pub trigger_suffixes: Vec<String>,
    /// Allow-list of recognized type tags. Empty accepts any non-empty tag.
    #[serde(default)]
    pub known_types: Vec<String>,
    #[serde(default = "default_max_input_index")]
    pub max_input_index: usize,
}

fn default_trigger_types() -> Vec<String> {
    vec![
        "n8n-nodes-base.webhook".to_string(),
        "n8n-nodes-base.start".to_string(),
        "n8n-nodes-base.cron".to_string(),
        "n8n-nodes-base.interval".to_string(),
    ]
}

fn default_trigger_suffixes() -> Vec<String> {
    vec!["Trigger".to_string()]
}

fn default_max_input_index() -> usize {
    32
}

impl Default for NodePolicy {
    fn default() -> Self {
        Self {
            trigger_types: default_trigger_types(),
            trigger_suffixes: default_trigger_suffixes(),
            known_types: Vec::new(),
            max_input_index: default_max_input_index(),
        }
    }
}

impl NodePolicy {
    pub fn is_trigger_capable(&self, node_type: &str) -> bool {
        if self.trigger_types.iter().any(|t| t == node_type) {
            return true;
        }
        let last = node_type.rsplit('.').next().unwrap_or(node_type).to_lowercase();
        self.trigger_suffixes
            .iter()
            .any(|suffix| last.ends_with(&suffix.to_lowercase()))
    }

    pub fn is_known_type(&self, node_type: &str) -> bool {
        self.known_types.is_empty() || self.known_types.iter().any(|t| t == node_type)
    }

    pub fn with_trigger_type(mut self, node_type: impl Into<String>) -> Self {
        self.trigger_types.push(node_type.into());
        self
    }

    pub fn with_known_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_types = types.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub policy: NodePolicy,
}

impl ValidationConfig {
    pub fn mode(&self) -> ValidationMode {
        if self.strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_detection_uses_table_and_suffix() {
        let policy = NodePolicy::default();
        assert!(policy.is_trigger_capable("n8n-nodes-base.webhook"));
        assert!(policy.is_trigger_capable("n8n-nodes-base.manualTrigger"));
        assert!(policy.is_trigger_capable("@acme/nodes.orderTrigger"));
        assert!(!policy.is_trigger_capable("n8n-nodes-base.httpRequest"));

        let custom = NodePolicy::default().with_trigger_type("acme.poller");
        assert!(custom.is_trigger_capable("acme.poller"));
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let policy = NodePolicy::default();
        assert!(policy.is_known_type("anything.at.all"));
        let restricted = policy.with_known_types(["n8n-nodes-base.set"]);
        assert!(restricted.is_known_type("n8n-nodes-base.set"));
        assert!(!restricted.is_known_type("n8n-nodes-base.code"));
    }
}
