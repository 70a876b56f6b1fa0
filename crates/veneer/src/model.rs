//! Model/view layer.
//!
//! A [`Model`] is a typed view object: it names itself, derives its
//! template name, and produces the argument map its template renders with.
//! Arguments may nest — a model argument is rendered to a string before the
//! parent template runs, depth-first, and plain maps are walked
//! element-wise so models can hide anywhere in the structure.
//!
//! Two supporting pieces live here as well: [`DefaultProvider`], a
//! per-type default-value table models draw from at construction to fill
//! fields the caller left unset, and [`NamespaceRegistry`], which maps
//! namespace names to template locations and fails hard on lookup
//! mistakes — the deliberate opposite of the soft-fail rendering core.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::error::{Error, ModelError};
use crate::value::{Callable, Scope, Value};

/// A template argument supplied by a model.
#[derive(Clone)]
pub enum Argument {
    /// Plain data, passed into scope as-is.
    Value(serde_json::Value),
    /// A callable, invokable from the template.
    Callable(Callable),
    /// A nested map, walked element-wise during expansion.
    Map(ArgumentMap),
    /// A nested model, replaced by its rendered output during expansion.
    Model(Rc<dyn Model>),
}

impl std::fmt::Debug for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Value(v) => write!(f, "Value({})", v),
            Argument::Callable(_) => write!(f, "Callable(..)"),
            Argument::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Argument::Model(m) => write!(f, "Model({})", m.model_name()),
        }
    }
}

impl From<serde_json::Value> for Argument {
    fn from(v: serde_json::Value) -> Self {
        Argument::Value(v)
    }
}

/// Ordered name → argument map. Ordering keeps expansion and error output
/// deterministic.
pub type ArgumentMap = BTreeMap<String, Argument>;

/// A view model: a typed object that knows its template and arguments.
pub trait Model {
    /// The model's type name, camel-cased (`TodoList`).
    fn model_name(&self) -> &str;

    /// The template this model renders with. Defaults to the dash-cased
    /// model name (`TodoList` → `todo-list`).
    fn template_name(&self) -> String {
        dash_case(self.model_name())
    }

    /// The arguments handed to the template.
    fn arguments(&self) -> ArgumentMap;

    /// Fills unset fields from the provider's per-type defaults. Runs once
    /// at construction; models without optional fields need not override.
    fn apply_defaults(&mut self, _provider: &DefaultProvider) {}
}

/// Expands a model's argument map into a rendering scope.
///
/// Depth-first: nested models are rendered (via `render`) before the
/// parent sees them, so the parent template receives finished strings.
/// Plain maps are walked element-wise; values pass through. Callables are
/// only representable at the top level of the scope — one nested inside a
/// map has nowhere to live in the JSON structure and is a hard error.
pub fn expand_arguments(
    arguments: &ArgumentMap,
    render: &mut dyn FnMut(&dyn Model) -> Result<String, Error>,
) -> Result<Scope, Error> {
    let mut scope = Scope::new();
    for (name, argument) in arguments {
        let value = match argument {
            Argument::Value(v) => Value::Data(v.clone()),
            Argument::Callable(c) => Value::Callable(c.clone()),
            Argument::Map(map) => Value::Data(expand_nested(map, render)?),
            Argument::Model(model) => {
                Value::Data(serde_json::Value::String(render(model.as_ref())?))
            }
        };
        scope.insert(name.clone(), value);
    }
    Ok(scope)
}

fn expand_nested(
    map: &ArgumentMap,
    render: &mut dyn FnMut(&dyn Model) -> Result<String, Error>,
) -> Result<serde_json::Value, Error> {
    let mut out = serde_json::Map::new();
    for (name, argument) in map {
        let value = match argument {
            Argument::Value(v) => v.clone(),
            Argument::Map(inner) => expand_nested(inner, render)?,
            Argument::Model(model) => serde_json::Value::String(render(model.as_ref())?),
            Argument::Callable(_) => {
                return Err(Error::Serialization(format!(
                    "argument `{}`: callables cannot nest inside maps",
                    name
                )))
            }
        };
        out.insert(name.clone(), value);
    }
    Ok(serde_json::Value::Object(out))
}

/// Per-type default values, consulted by models at construction.
#[derive(Debug, Default, Clone)]
pub struct DefaultProvider {
    defaults: HashMap<String, serde_json::Value>,
}

impl DefaultProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the default value for `type_name`. Later registrations
    /// overwrite earlier ones.
    pub fn set(&mut self, type_name: impl Into<String>, value: serde_json::Value) {
        self.defaults.insert(type_name.into(), value);
    }

    /// Returns the raw default for `type_name`, if any.
    pub fn get(&self, type_name: &str) -> Option<&serde_json::Value> {
        self.defaults.get(type_name)
    }

    /// Fills `slot` from the default registered under `type_name`.
    ///
    /// Set slots are left alone; unset slots stay unset when no default is
    /// registered or the registered value does not deserialize to `T`.
    pub fn fill<T: DeserializeOwned>(&self, slot: &mut Option<T>, type_name: &str) {
        if slot.is_some() {
            return;
        }
        if let Some(value) = self.defaults.get(type_name) {
            if let Ok(typed) = serde_json::from_value(value.clone()) {
                *slot = Some(typed);
            }
        }
    }
}

/// Where a namespace's templates live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub template_root: PathBuf,
    pub extension: String,
}

/// Maps namespace names to template locations.
///
/// Registry mistakes are programming errors, so both duplicate
/// registration and unregistered lookup fail hard.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: HashMap<String, NamespaceConfig>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `namespace`. A second registration of the same name is a
    /// [`ModelError::NamespaceCollision`].
    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        template_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Result<(), ModelError> {
        let namespace = namespace.into();
        if self.namespaces.contains_key(&namespace) {
            return Err(ModelError::NamespaceCollision(namespace));
        }
        self.namespaces.insert(
            namespace,
            NamespaceConfig {
                template_root: template_root.into(),
                extension: extension.into(),
            },
        );
        Ok(())
    }

    /// Looks up `namespace`; unregistered names are a hard error.
    pub fn get(&self, namespace: &str) -> Result<&NamespaceConfig, ModelError> {
        self.namespaces
            .get(namespace)
            .ok_or_else(|| ModelError::UnregisteredNamespace(namespace.to_string()))
    }
}

/// Applies construction-time defaults to models.
///
/// Default injection happens exactly once, when the factory builds the
/// model, never during rendering.
#[derive(Debug, Default, Clone)]
pub struct ModelFactory {
    defaults: DefaultProvider,
}

impl ModelFactory {
    pub fn new(defaults: DefaultProvider) -> Self {
        Self { defaults }
    }

    /// Fills the model's unset fields from the default table and returns
    /// it ready for rendering.
    pub fn build<M: Model>(&self, mut model: M) -> Rc<M> {
        model.apply_defaults(&self.defaults);
        Rc::new(model)
    }
}

/// Dash-cases a camel-cased name: a dash is inserted between a lowercase
/// letter and the uppercase letter that follows it, then the whole string
/// is lowercased. `TodoList` → `todo-list`, `HTTPServer` → `httpserver`.
pub fn dash_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = c.is_lowercase();
        for lower in c.to_lowercase() {
            out.push(lower);
        }
    }
    out
}
