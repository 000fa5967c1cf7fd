//! Typed argument values.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A coerced argument value.
///
/// Serializes to plain JSON: strings, numbers, booleans, objects, arrays and
/// `null` for [`TypedValue::Absent`].
///
/// # Examples
///
/// ```
/// use argspec_core::TypedValue;
///
/// let list = TypedValue::List(vec![TypedValue::Int(1), TypedValue::Int(2)]);
/// assert_eq!(serde_json::to_string(&list).unwrap(), "[1,2]");
/// assert_eq!(serde_json::to_string(&TypedValue::Absent).unwrap(), "null");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Dict(BTreeMap<String, String>),
    Path(PathBuf),
    List(Vec<TypedValue>),
    /// Optional argument that was neither supplied nor defaulted.
    Absent,
}

impl TypedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns floats, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Number of elements for lists and dicts, 1 for other present values.
    pub fn len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Dict(map) => map.len(),
            Self::Absent => 0,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Dict(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Self::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Absent => f.write_str("<absent>"),
        }
    }
}
