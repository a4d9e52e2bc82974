//! Declared input schemas and argument validation.

use serde_json::{json, Map, Value};
use tm_domain::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Boolean,
}

impl ParamKind {
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
    /// Advertised default for optional parameters.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required_string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            required: true,
            description,
            default: None,
        }
    }

    pub fn optional_bool(name: &'static str, description: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Boolean,
            required: false,
            description,
            default: Some(Value::Bool(default)),
        }
    }
}

/// Check `arguments` against `params`.
///
/// `null` is treated as an empty object. Every required parameter must be
/// present and, for strings, non-blank; every present declared parameter
/// must have the declared type. All offending fields are reported together.
/// Undeclared fields are ignored.
pub fn validate(params: &[ParamSpec], arguments: &Value) -> Result<Map<String, Value>> {
    let empty = Map::new();
    let map = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(Error::InvalidArguments {
                fields: Vec::new(),
                message: format!("arguments must be an object, got {}", type_name(other)),
            })
        }
    };

    let mut missing = Vec::new();
    let mut mistyped = Vec::new();

    for param in params {
        match map.get(param.name) {
            None | Some(Value::Null) if param.required => missing.push(param.name),
            None | Some(Value::Null) => {}
            Some(value) if !param.kind.matches(value) => mistyped.push(param),
            Some(Value::String(s)) if param.required && s.trim().is_empty() => {
                missing.push(param.name)
            }
            Some(_) => {}
        }
    }

    for key in map.keys() {
        if !params.iter().any(|p| p.name == key.as_str()) {
            tracing::debug!(field = %key, "ignoring undeclared argument");
        }
    }

    if missing.is_empty() && mistyped.is_empty() {
        return Ok(map.clone());
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required field(s): {}", missing.join(", ")));
    }
    if !mistyped.is_empty() {
        let detail: Vec<String> = mistyped
            .iter()
            .map(|p| format!("{} (expected {})", p.name, p.kind.json_type()))
            .collect();
        parts.push(format!("wrong type: {}", detail.join(", ")));
    }

    let fields = missing
        .iter()
        .copied()
        .chain(mistyped.iter().map(|p| p.name))
        .map(str::to_owned)
        .collect();

    Err(Error::InvalidArguments {
        fields,
        message: parts.join("; "),
    })
}

/// JSON Schema advertised to MCP clients.
pub fn input_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for param in params {
        let mut prop = json!({
            "type": param.kind.json_type(),
            "description": param.description,
        });
        if let Some(ref default) = param.default {
            prop["default"] = default.clone();
        }
        properties.insert(param.name.to_owned(), prop);
    }
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name)
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
