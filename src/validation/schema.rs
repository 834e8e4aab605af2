use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape description for JSON documents.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SchemaKind {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "array")]
    Array { items: Box<Schema> },
    #[serde(rename = "object")]
    Object {
        properties: BTreeMap<String, Schema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
    },
    #[serde(rename = "any")]
    Any,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    #[serde(flatten)]
    pub kind: SchemaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaViolation {
    Missing { path: Vec<String> },
    WrongType { path: Vec<String>, expected: &'static str },
}

impl SchemaViolation {
    pub fn path(&self) -> String {
        let path = match self {
            SchemaViolation::Missing { path } | SchemaViolation::WrongType { path, .. } => path,
        };
        if path.is_empty() {
            "$".to_string()
        } else {
            format!("$.{}", path.join("."))
        }
    }
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn object<I>(properties: I, required: &[&str]) -> Self
    where
        I: IntoIterator<Item = (&'static str, Schema)>,
    {
        Self::new(SchemaKind::Object {
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            required: required.iter().map(|name| name.to_string()).collect(),
        })
    }

    /// Top-level shape of a workflow document.
    pub fn workflow() -> Self {
        Self::object(
            [
                ("name", Schema::new(SchemaKind::String)),
                (
                    "nodes",
                    Schema::new(SchemaKind::Array {
                        items: Box::new(Schema::new(SchemaKind::Any)),
                    }),
                ),
                (
                    "connections",
                    Schema::object(std::iter::empty(), &[]),
                ),
            ],
            &["name", "nodes"],
        )
        .with_description("workflow document")
    }

    /// Collects every violation instead of stopping at the first one.
    pub fn violations(&self, value: &Value) -> Vec<SchemaViolation> {
        let mut found = Vec::new();
        collect(self, value, &mut Vec::new(), &mut found);
        found
    }
}

fn collect(schema: &Schema, value: &Value, path: &mut Vec<String>, found: &mut Vec<SchemaViolation>) {
    let expected = match &schema.kind {
        SchemaKind::Boolean if !value.is_boolean() => Some("boolean"),
        SchemaKind::Integer if !(value.is_i64() || value.is_u64()) => Some("integer"),
        SchemaKind::Number if !value.is_number() => Some("number"),
        SchemaKind::String if !value.is_string() => Some("string"),
        SchemaKind::Array { .. } if !value.is_array() => Some("array"),
        SchemaKind::Object { .. } if !value.is_object() => Some("object"),
        _ => None,
    };
    if let Some(expected) = expected {
        found.push(SchemaViolation::WrongType {
            path: path.clone(),
            expected,
        });
        return;
    }

    match (&schema.kind, value) {
        (SchemaKind::Array { items }, Value::Array(array)) => {
            for (idx, element) in array.iter().enumerate() {
                path.push(idx.to_string());
                collect(items, element, path, found);
                path.pop();
            }
        }
        (SchemaKind::Object { properties, required }, Value::Object(object)) => {
            for key in required {
                if !object.contains_key(key) {
                    let mut missing = path.clone();
                    missing.push(key.clone());
                    found.push(SchemaViolation::Missing { path: missing });
                }
            }
            for (key, sub_schema) in properties {
                if let Some(val) = object.get(key) {
                    path.push(key.clone());
                    collect(sub_schema, val, path, found);
                    path.pop();
                }
            }
        }
        _ => {}
    }
}
