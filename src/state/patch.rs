use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ForgeError, Result};

/// One RFC 6902 style operation with a JSON pointer path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

pub(crate) fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Recursively merges `partial` into `target`. Objects merge, `null` removes
/// the key, anything else replaces.
pub fn merge(target: &mut Value, partial: &Value) {
    match (target, partial) {
        (Value::Object(target), Value::Object(partial)) => {
            for (key, value) in partial {
                if value.is_null() {
                    target.remove(key);
                } else if let Some(existing) = target.get_mut(key) {
                    merge(existing, value);
                } else {
                    let mut fresh = Value::Object(Map::new());
                    merge(&mut fresh, value);
                    target.insert(key.clone(), fresh);
                }
            }
        }
        (target, partial) => *target = strip_nulls(partial),
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Operations turning `before` into `after`. Objects are diffed per key;
/// arrays and scalars are replaced whole.
pub fn diff(before: &Value, after: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at(before, after, String::new(), &mut ops);
    ops
}

fn diff_at(before: &Value, after: &Value, path: String, ops: &mut Vec<PatchOp>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                let child = format!("{}/{}", path, escape_token(key));
                match new.get(key) {
                    Some(new_value) => diff_at(old_value, new_value, child, ops),
                    None => ops.push(PatchOp::Remove { path: child }),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    ops.push(PatchOp::Add {
                        path: format!("{}/{}", path, escape_token(key)),
                        value: new_value.clone(),
                    });
                }
            }
        }
        (old, new) if old != new => ops.push(PatchOp::Replace {
            path,
            value: new.clone(),
        }),
        _ => {}
    }
}

/// Applies object-level operations produced by [`diff`].
pub fn apply(snapshot: &mut Value, ops: &[PatchOp]) -> Result<()> {
    for op in ops {
        let tokens: Vec<String> = op
            .path()
            .split('/')
            .skip(1)
            .map(unescape_token)
            .collect();
        let Some((last, parents)) = tokens.split_last() else {
            match op {
                PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                    *snapshot = value.clone()
                }
                PatchOp::Remove { .. } => *snapshot = Value::Null,
            }
            continue;
        };

        let mut cursor = &mut *snapshot;
        for token in parents {
            cursor = cursor
                .as_object_mut()
                .and_then(|object| object.get_mut(token))
                .ok_or_else(|| ForgeError::Serialization(format!("patch path `{}` does not exist", op.path())))?;
        }
        let object = cursor
            .as_object_mut()
            .ok_or_else(|| ForgeError::Serialization(format!("patch parent of `{}` is not an object", op.path())))?;
        match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                object.insert(last.clone(), value.clone());
            }
            PatchOp::Remove { .. } => {
                object.remove(last);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_reports_changed_paths() {
        let before = json!({"a": 1, "b": {"c": true, "d": "x"}, "gone": 0});
        let after = json!({"a": 2, "b": {"c": true, "d": "y"}, "new/key": [1]});
        let ops = diff(&before, &after);
        assert_eq!(
            ops,
            vec![
                PatchOp::Replace { path: "/a".into(), value: json!(2) },
                PatchOp::Replace { path: "/b/d".into(), value: json!("y") },
                PatchOp::Remove { path: "/gone".into() },
                PatchOp::Add { path: "/new~1key".into(), value: json!([1]) },
            ]
        );

        let mut rebuilt = before.clone();
        apply(&mut rebuilt, &ops).unwrap();
        assert_eq!(rebuilt, after);
    }

    #[test]
    fn merge_deep_merges_and_null_removes() {
        let mut state = json!({"a": {"x": 1, "y": 2}, "b": 1});
        merge(&mut state, &json!({"a": {"y": 3, "z": null}, "b": null, "c": "new"}));
        assert_eq!(state, json!({"a": {"x": 1, "y": 3}, "c": "new"}));
    }

    #[test]
    fn op_serializes_with_op_tag() {
        let op = PatchOp::Remove { path: "/a".into() };
        assert_eq!(serde_json::to_value(&op).unwrap(), json!({"op": "remove", "path": "/a"}));
    }
}
