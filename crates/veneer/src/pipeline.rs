//! Pipeline facade.
//!
//! [`Pipeline`] wires the full decorator chain behind one configured entry
//! point. A render call flows outside-in:
//!
//! event details → file template → escape injection → capture →
//! compile → global arguments → error interception → interpreter
//!
//! so compilation happens against the final template text, globals are
//! merged before execution, and every execution failure is reported
//! through the dispatcher and suppressed. Only extension-callback and
//! model-setup failures reach the caller.

use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;
use veneer_dispatch::{Details, EventDispatcher, Listener};

use crate::compile::{DirectiveCompiler, ExtensionFn};
use crate::error::{Error, ModelError};
use crate::escape::default_escape_callable;
use crate::exec::{
    CompileExecutor, ErrorInterceptExecutor, Execute, GlobalArgumentsExecutor, Interpreter,
};
use crate::model::{
    expand_arguments, DefaultProvider, Model, ModelFactory, NamespaceConfig, NamespaceRegistry,
};
use crate::render::{
    CaptureRenderer, EscapeRenderer, EventDetailRenderer, FileTemplateRenderer, Render,
};
use crate::value::{scope_from_data, Callable, Scope};

/// Configures and builds a [`Pipeline`]. Every field is optional; unset
/// fields take the documented default.
pub struct PipelineBuilder {
    error_event: String,
    globals: Scope,
    escape_variable: String,
    escape: Option<Callable>,
    extension: Option<ExtensionFn>,
    templates_are_paths: bool,
    template_root: Option<PathBuf>,
    template_extension: Option<String>,
    dispatcher: Option<Rc<EventDispatcher>>,
    registry: NamespaceRegistry,
    defaults: DefaultProvider,
    error_listeners: Vec<Listener>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            error_event: "template_error".into(),
            globals: Scope::new(),
            escape_variable: "escape".into(),
            escape: None,
            extension: None,
            templates_are_paths: false,
            template_root: None,
            template_extension: None,
            dispatcher: None,
            registry: NamespaceRegistry::new(),
            defaults: DefaultProvider::new(),
            error_listeners: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event name rendering failures dispatch under. Default
    /// `"template_error"`.
    pub fn error_event(mut self, event: impl Into<String>) -> Self {
        self.error_event = event.into();
        self
    }

    /// Arguments available to every render; call-specific arguments win on
    /// collision.
    pub fn globals(mut self, globals: Scope) -> Self {
        self.globals = globals;
        self
    }

    /// Scope variable name escaped output calls. Default `"escape"`.
    pub fn escape_variable(mut self, name: impl Into<String>) -> Self {
        self.escape_variable = name.into();
        self
    }

    /// Replaces the default HTML escape callable entirely.
    pub fn escape(mut self, escape: Callable) -> Self {
        self.escape = Some(escape);
        self
    }

    /// Compiler-extension callback, applied to compiled program text.
    pub fn extension(mut self, extension: ExtensionFn) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Treat template strings handed to `render_str`/`render_scope` as
    /// file paths.
    pub fn templates_are_paths(mut self, yes: bool) -> Self {
        self.templates_are_paths = yes;
        self
    }

    /// Root directory for path-resolved templates.
    pub fn template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = Some(root.into());
        self
    }

    /// Extension (without the dot) appended to path-resolved template
    /// names.
    pub fn template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = Some(extension.into());
        self
    }

    /// Shares an existing dispatcher instead of creating a fresh one.
    pub fn dispatcher(mut self, dispatcher: Rc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Registers a template namespace for model rendering.
    pub fn namespace(
        mut self,
        name: impl Into<String>,
        template_root: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Result<Self, ModelError> {
        self.registry.register(name, template_root, extension)?;
        Ok(self)
    }

    /// Per-type default values injected into models at construction.
    pub fn defaults(mut self, defaults: DefaultProvider) -> Self {
        self.defaults = defaults;
        self
    }

    /// Registers a listener for the error event.
    pub fn on_error(mut self, listener: Listener) -> Self {
        self.error_listeners.push(listener);
        self
    }

    pub fn build(self) -> Pipeline {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Rc::new(EventDispatcher::new()));
        for listener in self.error_listeners {
            dispatcher.add_listener(&self.error_event, listener);
        }
        Pipeline {
            error_event: self.error_event,
            globals: self.globals,
            escape_variable: self.escape_variable,
            escape: self.escape.unwrap_or_else(default_escape_callable),
            extension: self.extension,
            templates_are_paths: self.templates_are_paths,
            template_root: self.template_root,
            template_extension: self.template_extension,
            dispatcher,
            registry: self.registry,
            defaults: self.defaults,
        }
    }
}

/// The configured rendering pipeline.
pub struct Pipeline {
    error_event: String,
    globals: Scope,
    escape_variable: String,
    escape: Callable,
    extension: Option<ExtensionFn>,
    templates_are_paths: bool,
    template_root: Option<PathBuf>,
    template_extension: Option<String>,
    dispatcher: Rc<EventDispatcher>,
    registry: NamespaceRegistry,
    defaults: DefaultProvider,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The dispatcher this pipeline reports through; add or remove
    /// listeners here.
    pub fn dispatcher(&self) -> &Rc<EventDispatcher> {
        &self.dispatcher
    }

    /// A factory applying this pipeline's defaults to new models.
    pub fn model_factory(&self) -> ModelFactory {
        ModelFactory::new(self.defaults.clone())
    }

    /// Renders a template string against serializable data.
    ///
    /// `data` must serialize to a JSON object; its entries become the call
    /// scope.
    pub fn render_str<T: Serialize>(&self, template: &str, data: &T) -> Result<String, Error> {
        let value = serde_json::to_value(data)?;
        let scope = match value {
            serde_json::Value::Object(map) => scope_from_data(map),
            other => {
                return Err(Error::Serialization(format!(
                    "template data must serialize to an object, got {}",
                    other
                )))
            }
        };
        self.render_scope(template, scope, false)
    }

    /// Renders a template string against an explicit scope.
    pub fn render_scope(
        &self,
        template: &str,
        scope: Scope,
        do_print: bool,
    ) -> Result<String, Error> {
        if self.templates_are_paths {
            return self.render_file(template, scope, do_print);
        }
        let renderer = self.string_renderer();
        Ok(renderer.render(template, scope, do_print)?)
    }

    /// Renders a template file, resolved against the configured root and
    /// extension. The file path rides along as an ambient event detail.
    pub fn render_file(
        &self,
        name: &str,
        scope: Scope,
        do_print: bool,
    ) -> Result<String, Error> {
        let mut file = FileTemplateRenderer::new(self.string_renderer());
        if let Some(root) = &self.template_root {
            file = file.with_root(root);
        }
        if let Some(ext) = &self.template_extension {
            file = file.with_extension(ext.clone());
        }
        let mut details = Details::new();
        details.insert(
            "template".into(),
            serde_json::Value::String(name.to_string()),
        );
        let renderer = EventDetailRenderer::new(
            Box::new(file),
            self.dispatcher.clone(),
            self.error_event.clone(),
            details,
        );
        Ok(renderer.render(name, scope, do_print)?)
    }

    /// Renders a model through its registered namespace.
    ///
    /// Nested models expand depth-first within the same namespace. The
    /// model's name rides along as the `modelClass` event detail. An
    /// unregistered namespace is a hard error.
    pub fn render_model(&self, namespace: &str, model: &dyn Model) -> Result<String, Error> {
        let config = self.registry.get(namespace)?.clone();
        self.render_model_in(&config, model)
    }

    fn render_model_in(
        &self,
        config: &NamespaceConfig,
        model: &dyn Model,
    ) -> Result<String, Error> {
        let scope = expand_arguments(&model.arguments(), &mut |nested| {
            self.render_model_in(config, nested)
        })?;

        let file = FileTemplateRenderer::new(self.string_renderer())
            .with_root(config.template_root.clone())
            .with_extension(config.extension.clone());
        let mut details = Details::new();
        details.insert(
            "modelClass".into(),
            serde_json::Value::String(model.model_name().to_string()),
        );
        let renderer = EventDetailRenderer::new(
            Box::new(file),
            self.dispatcher.clone(),
            self.error_event.clone(),
            details,
        );
        Ok(renderer.render(&model.template_name(), scope, false)?)
    }

    /// The escape-injecting capture stack over the executor chain.
    fn string_renderer(&self) -> Box<dyn Render> {
        let capture = CaptureRenderer::new(self.executor());
        Box::new(EscapeRenderer::new(
            Box::new(capture),
            self.escape_variable.clone(),
            self.escape.clone(),
        ))
    }

    /// Compile → globals → interception → interpreter.
    fn executor(&self) -> Box<dyn Execute> {
        let intercepted = ErrorInterceptExecutor::new(
            Box::new(Interpreter::new()),
            self.dispatcher.clone(),
            self.error_event.clone(),
        );
        let with_globals =
            GlobalArgumentsExecutor::new(Box::new(intercepted), self.globals.clone());
        let mut compiler =
            DirectiveCompiler::new().with_escape_variable(self.escape_variable.clone());
        if let Some(extension) = &self.extension {
            compiler = compiler.with_extension(extension.clone());
        }
        Box::new(CompileExecutor::new(Box::new(with_globals), compiler))
    }
}
