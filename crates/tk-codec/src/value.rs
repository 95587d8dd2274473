use std::fmt;

use serde_json::{Number, Value};

/// A single non-container field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A custom tiddler field value.
///
/// Nested objects, and arrays holding anything but scalars, are kept as
/// their compact JSON text in [`FieldValue::String`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Scalar>),
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => match items.iter().map(Scalar::from_json).collect() {
                Some(scalars) => Self::List(scalars),
                None => Self::String(value.to_string()),
            },
            Value::Object(_) => Self::String(value.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Scalar::to_json).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_map_directly() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(42)), FieldValue::from(42i64));
        assert_eq!(FieldValue::from_json(&json!("x")), FieldValue::from("x"));
    }

    #[test]
    fn scalar_arrays_become_lists() {
        let v = FieldValue::from_json(&json!(["a", 1, false, null]));
        assert_eq!(
            v,
            FieldValue::List(vec![
                Scalar::String("a".into()),
                Scalar::Number(1.into()),
                Scalar::Bool(false),
                Scalar::Null,
            ])
        );
        assert_eq!(v.to_json(), json!(["a", 1, false, null]));
    }

    #[test]
    fn nested_containers_are_kept_as_json_text() {
        assert_eq!(
            FieldValue::from_json(&json!({"k": [1, 2]})),
            FieldValue::from(r#"{"k":[1,2]}"#)
        );
        assert_eq!(
            FieldValue::from_json(&json!([[1], 2])),
            FieldValue::from("[[1],2]")
        );
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Scalar::String("a b".into()).to_string(), "a b");
        assert_eq!(Scalar::Number(Number::from(7)).to_string(), "7");
        assert_eq!(Scalar::Null.to_string(), "null");
    }
}
