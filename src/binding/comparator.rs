//! # Structural Comparator
//!
//! Deep equality over nested key/value structures, used to check whether a persisted
//! Secret already holds a desired payload.
//!
//! Persisted Secrets store values as base64 text while a desired [`Payload`] holds raw
//! bytes, so the desired side is encoded with [`Value::from_payload`] before comparing.

use crate::binding::payload::Payload;
use base64::{engine::general_purpose, Engine as _};
use std::collections::BTreeMap;
use std::fmt;

/// Nested value compared by [`compare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(Vec<u8>),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Encode a payload the way a persisted Secret stores its `data`
    #[must_use]
    pub fn from_payload(payload: &Payload) -> Self {
        Value::Mapping(
            payload
                .iter()
                .map(|(k, v)| {
                    let encoded = general_purpose::STANDARD.encode(v);
                    (k.to_string(), Value::Scalar(encoded.into_bytes()))
                })
                .collect(),
        )
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }
}

/// JSON scalars become their textual form; `null` becomes an empty scalar.
impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Scalar(Vec::new()),
            serde_json::Value::Bool(b) => Value::Scalar(b.to_string().into_bytes()),
            serde_json::Value::Number(n) => Value::Scalar(n.to_string().into_bytes()),
            serde_json::Value::String(s) => Value::Scalar(s.as_bytes().to_vec()),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// How keys present only on the existing side are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonMode {
    /// Both sides must hold exactly the same keys
    #[default]
    Exact,
    /// The existing side may hold keys the desired side does not
    Subset,
}

impl std::str::FromStr for ComparisonMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ComparisonMode::Exact),
            "subset" => Ok(ComparisonMode::Subset),
            other => Err(format!("unknown comparison mode '{other}' (expected exact or subset)")),
        }
    }
}

/// Outcome of a comparison; on failure carries the first mismatching path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub success: bool,
    pub mismatch: Option<Mismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Dotted path to the offending entry; empty for the root
    pub path: String,
    pub reason: MismatchReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// Desired key absent from the existing side
    Missing,
    /// Existing key absent from the desired side (exact mode only)
    Unexpected,
    /// Values differ
    Differs,
    /// Value kinds differ, e.g. sequence vs scalar
    TypeMismatch {
        existing: &'static str,
        desired: &'static str,
    },
    /// Sequences differ in length
    LengthMismatch { existing: usize, desired: usize },
    /// The existing object could not be read
    Absent,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        match &self.reason {
            MismatchReason::Missing => write!(f, "{path}: missing from existing"),
            MismatchReason::Unexpected => write!(f, "{path}: not in desired"),
            MismatchReason::Differs => write!(f, "{path}: values differ"),
            MismatchReason::TypeMismatch { existing, desired } => {
                write!(f, "{path}: {existing} vs {desired}")
            }
            MismatchReason::LengthMismatch { existing, desired } => {
                write!(f, "{path}: length {existing} vs {desired}")
            }
            MismatchReason::Absent => write!(f, "{path}: existing object unavailable"),
        }
    }
}

impl ComparisonResult {
    #[must_use]
    pub fn same() -> Self {
        Self {
            success: true,
            mismatch: None,
        }
    }

    #[must_use]
    pub fn differs(path: impl Into<String>, reason: MismatchReason) -> Self {
        Self {
            success: false,
            mismatch: Some(Mismatch {
                path: path.into(),
                reason,
            }),
        }
    }

    /// Path of the first mismatch, if any
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.mismatch.as_ref().map(|m| m.path.as_str())
    }
}

/// Compare an existing structure against a desired one
///
/// Never fails; inputs that cannot match yield `success == false`.
#[must_use]
pub fn compare(existing: &Value, desired: &Value, mode: ComparisonMode) -> ComparisonResult {
    compare_at("", existing, desired, mode)
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn compare_at(path: &str, existing: &Value, desired: &Value, mode: ComparisonMode) -> ComparisonResult {
    match (existing, desired) {
        (Value::Scalar(a), Value::Scalar(b)) => {
            if a == b {
                ComparisonResult::same()
            } else {
                ComparisonResult::differs(path, MismatchReason::Differs)
            }
        }
        (Value::Sequence(a), Value::Sequence(b)) => {
            if a.len() != b.len() {
                return ComparisonResult::differs(
                    path,
                    MismatchReason::LengthMismatch {
                        existing: a.len(),
                        desired: b.len(),
                    },
                );
            }
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                let result = compare_at(&format!("{path}[{i}]"), x, y, mode);
                if !result.success {
                    return result;
                }
            }
            ComparisonResult::same()
        }
        (Value::Mapping(a), Value::Mapping(b)) => {
            for (key, want) in b {
                let child = join(path, key);
                let Some(have) = a.get(key) else {
                    return ComparisonResult::differs(child, MismatchReason::Missing);
                };
                let result = compare_at(&child, have, want, mode);
                if !result.success {
                    return result;
                }
            }
            if mode == ComparisonMode::Exact {
                if let Some(extra) = a.keys().find(|k| !b.contains_key(*k)) {
                    return ComparisonResult::differs(join(path, extra), MismatchReason::Unexpected);
                }
            }
            ComparisonResult::same()
        }
        (a, b) => ComparisonResult::differs(
            path,
            MismatchReason::TypeMismatch {
                existing: a.type_name(),
                desired: b.type_name(),
            },
        ),
    }
}
