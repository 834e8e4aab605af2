use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::policy::ValidationMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Structure,
    Node,
    Connection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single reported problem. Also used for warnings (`severity == Warning`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub category: FindingCategory,
    pub severity: Severity,
    pub message: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Raw stage output before the stage mode decides its severity.
///
/// Hard findings are errors in every mode; soft findings are downgraded to
/// warnings under [`ValidationMode::Lenient`].
#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    pub category: FindingCategory,
    pub code: &'static str,
    pub message: String,
    pub node: Option<String>,
    pub hard: bool,
}

impl Finding {
    pub fn hard(category: FindingCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            node: None,
            hard: true,
        }
    }

    pub fn soft(category: FindingCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            hard: false,
            ..Self::hard(category, code, message)
        }
    }

    pub fn on_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub(crate) fn resolve(self, mode: ValidationMode) -> ValidationError {
        let severity = if self.hard || mode == ValidationMode::Strict {
            Severity::Error
        } else {
            Severity::Warning
        };
        ValidationError {
            category: self.category,
            severity,
            message: self.message,
            code: self.code.to_string(),
            node: self.node,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub nodes_checked: usize,
    pub connections_checked: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub stages_run: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    /// Deduplicates by (category, node, message), keeping the first occurrence,
    /// then splits by severity.
    pub(crate) fn assemble(findings: Vec<ValidationError>, mut summary: ValidationSummary) -> Self {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for finding in findings {
            let key = (finding.category, finding.node.clone(), finding.message.clone());
            if !seen.insert(key) {
                continue;
            }
            match finding.severity {
                Severity::Error => errors.push(finding),
                Severity::Warning => warnings.push(finding),
            }
        }
        summary.error_count = errors.len();
        summary.warning_count = warnings.len();
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            summary,
        }
    }

    pub fn error_codes(&self) -> Vec<&str> {
        self.errors.iter().map(|error| error.code.as_str()).collect()
    }

    pub fn warning_codes(&self) -> Vec<&str> {
        self.warnings.iter().map(|warning| warning.code.as_str()).collect()
    }
}
