//! Scope values.
//!
//! The variable scope handed to executing code maps names to [`Value`]s: a
//! value is either plain JSON data or a callable. Callables exist so the
//! pipeline can place the escape function (and anything else the caller
//! wants invokable from templates) directly into scope; compiled output
//! directives call it by name.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ExecError;

/// A callable placed in scope, invokable from template expressions.
///
/// Receives evaluated argument values, returns a value or a runtime error.
pub type Callable = Rc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, ExecError>>;

/// A single scope entry: plain data or a callable.
#[derive(Clone)]
pub enum Value {
    /// JSON data (scalars, arrays, objects).
    Data(serde_json::Value),
    /// A callable; invoked via `$name(args)` in expressions.
    Callable(Callable),
}

impl Value {
    /// Returns the data value, or `None` for callables.
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(v) => Some(v),
            Value::Callable(_) => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Data(v) => write!(f, "Data({})", v),
            Value::Callable(_) => write!(f, "Callable(..)"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Data(v)
    }
}

/// The name → value mapping available to executing code.
pub type Scope = HashMap<String, Value>;

/// Builds a scope from plain JSON data entries.
pub fn scope_from_data<I, K>(entries: I) -> Scope
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), Value::Data(v)))
        .collect()
}

/// Serializes a scope for an error-event payload.
///
/// Callables carry no serializable state; they appear as a placeholder so
/// the payload still records which names were bound.
pub fn scope_to_json(scope: &Scope) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in scope {
        let json = match value {
            Value::Data(v) => v.clone(),
            Value::Callable(_) => serde_json::Value::String("<callable>".into()),
        };
        map.insert(name.clone(), json);
    }
    map
}

/// Truthiness of a data value, matching the semantics the directive
/// expressions were written against: `false`, `null`, `0`, `0.0`, `""`,
/// `"0"`, and empty arrays/objects are falsy; everything else is truthy.
pub fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().is_some_and(|f| f != 0.0)
            }
        }
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}

/// Formats a data value for output.
///
/// Strings print as-is, numbers and booleans via their display form, null
/// as the empty string, arrays and objects as JSON.
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => value.to_string(),
    }
}
