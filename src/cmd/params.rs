/*!
params.rs - typed argument mapper for passthrough endpoints.

Each endpoint declares an ordered parameter list in a compact notation:

    "item_id"          required string
    "quantity:int"     required integer
    "target_id?"       optional string
    "enable?:bool"     optional boolean

`build_body` binds positional CLI values by index, overlays `name=value`
pairs (named wins), coerces per declared type, and reports every missing
required name at once. Named keys the endpoint does not declare are
passed through as strings so newer server parameters stay reachable.
*/

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::api::Body;

/* ---- Parameter Specs ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
}

impl ParamSpec {
    /// Parse one entry of the compact notation. Unknown type suffixes fall
    /// back to string.
    pub fn parse(notation: &str) -> Self {
        let (head, ty) = match notation.rsplit_once(':') {
            Some((head, "int")) => (head, ParamType::Integer),
            Some((head, "bool")) => (head, ParamType::Boolean),
            Some((head, _)) => (head, ParamType::String),
            None => (notation, ParamType::String),
        };
        let required = !head.ends_with('?');
        ParamSpec {
            name: head.trim_end_matches('?').to_string(),
            ty,
            required,
        }
    }

    pub fn parse_all(notations: &[&str]) -> Vec<ParamSpec> {
        notations.iter().map(|n| ParamSpec::parse(n)).collect()
    }
}

/// `<name>` for required, `[name]` for optional, space separated.
pub fn usage_args(specs: &[ParamSpec]) -> String {
    specs
        .iter()
        .map(|s| {
            if s.required {
                format!("<{}>", s.name)
            } else {
                format!("[{}]", s.name)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/* ---- Errors ---- */

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing required argument(s): {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("invalid {expected} value for '{name}': {value:?}")]
    InvalidType {
        name: String,
        value: String,
        expected: ParamType,
    },
}

/* ---- Body Building ---- */

/// Build a request body from positional and named CLI values.
pub fn build_body(
    specs: &[ParamSpec],
    positional: &[String],
    named: &HashMap<String, String>,
) -> Result<Body, ArgError> {
    let mut raw: HashMap<&str, &str> = HashMap::new();

    for (i, value) in positional.iter().enumerate() {
        match specs.get(i) {
            Some(spec) => {
                raw.insert(spec.name.as_str(), value.as_str());
            }
            None => warn!("extra argument ignored: {value}"),
        }
    }
    for (key, value) in named {
        raw.insert(key.as_str(), value.as_str());
    }

    let missing: Vec<String> = specs
        .iter()
        .filter(|s| s.required && !raw.contains_key(s.name.as_str()))
        .map(|s| s.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ArgError::MissingRequired(missing));
    }

    let mut body = Body::new();
    for spec in specs {
        if let Some(value) = raw.remove(spec.name.as_str()) {
            body.insert(spec.name.clone(), coerce_value(spec, value)?);
        }
    }

    // Whatever is left was named but not declared.
    for (key, value) in raw {
        body.insert(key.to_string(), Value::String(value.to_string()));
    }

    Ok(body)
}

/// Coerce a raw CLI string into the JSON value the spec declares.
pub fn coerce_value(spec: &ParamSpec, raw: &str) -> Result<Value, ArgError> {
    let invalid = || ArgError::InvalidType {
        name: spec.name.clone(),
        value: raw.to_string(),
        expected: spec.ty,
    };
    match spec.ty {
        ParamType::String => Ok(Value::String(raw.to_string())),
        ParamType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid()),
        ParamType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
    }
}

/* ---- Tests ---- */
