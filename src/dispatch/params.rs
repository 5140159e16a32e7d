//! Loosely-typed RPC parameters and their resolution into typed SQL binds.
//!
//! Clients send a flat JSON array. Each element is either a raw scalar, whose
//! PostgreSQL type is inferred, or an object `{"value": .., "type": ".."}`
//! carrying an explicit type name. Every value is bound as nullable text and
//! cast in SQL (`$n::TYPE`), so PostgreSQL performs the conversion.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::DispatchError;

static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*\.)?[A-Za-z_][A-Za-z0-9_]*( [A-Za-z_][A-Za-z0-9_]*){0,3}( ?\(\d+(, ?\d+)?\))?(\[\])*$",
    )
    .expect("type name pattern")
});

/// One element of the `params` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum RpcParam {
    /// Raw JSON value; the SQL type is inferred from its shape.
    Scalar(Value),
    /// `{value, type}` pair with an explicit PostgreSQL type name.
    Typed { value: Value, type_name: String },
}

impl From<Value> for RpcParam {
    fn from(raw: Value) -> Self {
        if let Value::Object(map) = &raw {
            if let Some(Value::String(type_name)) = map.get("type") {
                return RpcParam::Typed {
                    value: map.get("value").cloned().unwrap_or(Value::Null),
                    type_name: type_name.clone(),
                };
            }
        }
        RpcParam::Scalar(raw)
    }
}

impl RpcParam {
    /// The carried value, regardless of how its type is determined.
    pub fn value(&self) -> &Value {
        match self {
            RpcParam::Scalar(value) => value,
            RpcParam::Typed { value, .. } => value,
        }
    }

    /// Resolve into the text bound at `$position` and the type it is cast to.
    /// Positions are 1-based, matching the placeholders.
    pub fn resolve(&self, position: usize) -> Result<BoundParam, DispatchError> {
        match self {
            RpcParam::Scalar(value) => Ok(BoundParam {
                text: scalar_text(value),
                sql_type: SqlType::infer(value),
            }),
            RpcParam::Typed { value, type_name } => {
                let sql_type = SqlType::parse(type_name).ok_or_else(|| DispatchError::InvalidType {
                    position,
                    type_name: type_name.clone(),
                })?;
                let text = match value {
                    Value::Array(items) if sql_type.is_array() => Some(array_literal(items)),
                    other => scalar_text(other),
                };
                Ok(BoundParam { text, sql_type })
            }
        }
    }
}

/// A PostgreSQL type name that is safe to use in a cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SqlType(String);

impl SqlType {
    pub fn boolean() -> Self {
        Self("BOOLEAN".to_string())
    }

    pub fn integer() -> Self {
        Self("INTEGER".to_string())
    }

    pub fn numeric() -> Self {
        Self("NUMERIC".to_string())
    }

    pub fn text() -> Self {
        Self("TEXT".to_string())
    }

    /// Validate a client-supplied type name. Runs of whitespace collapse to a
    /// single space so `timestamp   with time zone` is accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        TYPE_NAME.is_match(&normalized).then_some(Self(normalized))
    }

    /// boolean→BOOLEAN, integral number→INTEGER, fractional number→NUMERIC,
    /// everything else→TEXT.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::boolean(),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::integer(),
            Value::Number(_) => Self::numeric(),
            _ => Self::text(),
        }
    }

    pub fn is_array(&self) -> bool {
        self.0.ends_with("[]")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved parameter: text representation (None binds SQL NULL) plus cast.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub text: Option<String>,
    pub sql_type: SqlType,
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Render a JSON array as a PostgreSQL array literal, e.g. `{1,NULL,"a b"}`.
fn array_literal(items: &[Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(nested) => array_literal(nested),
            Value::Object(_) => quote_element(&item.to_string()),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
