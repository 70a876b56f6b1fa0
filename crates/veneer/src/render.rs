//! Rendering decorators.
//!
//! [`Render`] is the outer pipeline seam: take a template, a scope, and a
//! print flag, return the rendered string. The base implementation is
//! [`CaptureRenderer`], which drives an executor chain into a string sink
//! and optionally prints the result. Around it stack decorators that each
//! adjust one aspect of a render call:
//!
//! - [`EscapeRenderer`] — places the escape callable in scope unless the
//!   caller already bound one,
//! - [`FileTemplateRenderer`] — treats the template argument as a file
//!   path and substitutes the file's contents,
//! - [`EventDetailRenderer`] — attaches ambient event details for the
//!   duration of the render, detaching on the way out even when the inner
//!   render fails.

use std::path::PathBuf;
use std::rc::Rc;

use veneer_dispatch::{Details, EventDispatcher};

use crate::error::ExecError;
use crate::exec::Execute;
use crate::value::{Scope, Value};

/// Renders a template against a scope, returning the produced output.
/// When `do_print` is set the output is also written to stdout.
pub trait Render {
    fn render(&self, template: &str, scope: Scope, do_print: bool) -> Result<String, ExecError>;
}

/// The base renderer: captures executor output into a string.
///
/// Sits at the bottom of the renderer stack and at the top of the executor
/// chain. Output produced before an executor failure is still returned by
/// an interception layer below; without one, the error propagates and the
/// partial output is dropped.
pub struct CaptureRenderer {
    executor: Box<dyn Execute>,
}

impl CaptureRenderer {
    pub fn new(executor: Box<dyn Execute>) -> Self {
        Self { executor }
    }
}

impl Render for CaptureRenderer {
    fn render(&self, template: &str, scope: Scope, do_print: bool) -> Result<String, ExecError> {
        let mut sink = String::new();
        self.executor.execute(template, scope, &mut sink)?;
        if do_print {
            print!("{}", sink);
        }
        Ok(sink)
    }
}

/// Renderer decorator that injects the escape callable into scope.
///
/// A binding the caller already placed under the variable name wins; the
/// decorator only fills the gap.
pub struct EscapeRenderer {
    inner: Box<dyn Render>,
    variable: String,
    escape: crate::value::Callable,
}

impl EscapeRenderer {
    pub fn new(
        inner: Box<dyn Render>,
        variable: impl Into<String>,
        escape: crate::value::Callable,
    ) -> Self {
        Self {
            inner,
            variable: variable.into(),
            escape,
        }
    }
}

impl Render for EscapeRenderer {
    fn render(&self, template: &str, scope: Scope, do_print: bool) -> Result<String, ExecError> {
        let mut scope = scope;
        scope
            .entry(self.variable.clone())
            .or_insert_with(|| Value::Callable(self.escape.clone()));
        self.inner.render(template, scope, do_print)
    }
}

/// Renderer decorator that resolves the template argument as a file path
/// and renders the file's contents.
///
/// An optional root directory and extension are applied around the given
/// name. A missing or unreadable file renders as the empty template; the
/// inner chain still runs, so globals-only templates behave consistently.
pub struct FileTemplateRenderer {
    inner: Box<dyn Render>,
    root: Option<PathBuf>,
    extension: Option<String>,
}

impl FileTemplateRenderer {
    pub fn new(inner: Box<dyn Render>) -> Self {
        Self {
            inner,
            root: None,
            extension: None,
        }
    }

    /// Resolves template names relative to `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Appends `extension` (without the dot) to template names.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    fn resolve(&self, template: &str) -> PathBuf {
        let mut name = template.to_string();
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        match &self.root {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl Render for FileTemplateRenderer {
    fn render(&self, template: &str, scope: Scope, do_print: bool) -> Result<String, ExecError> {
        let contents = std::fs::read_to_string(self.resolve(template)).unwrap_or_default();
        self.inner.render(&contents, scope, do_print)
    }
}

/// Detaches attached ambient details when dropped.
///
/// Returned by [`EventDetailRenderer`] internals and usable directly by
/// callers that attach details around their own work; the `Drop` impl
/// guarantees detachment on every exit path.
pub struct DetailGuard {
    dispatcher: Rc<EventDispatcher>,
    event: String,
    details: Details,
}

impl DetailGuard {
    /// Attaches `details` to `event` and returns the guard that will
    /// detach them.
    pub fn attach(dispatcher: Rc<EventDispatcher>, event: impl Into<String>, details: Details) -> Self {
        let event = event.into();
        dispatcher.attach_details(&event, details.clone());
        Self {
            dispatcher,
            event,
            details,
        }
    }
}

impl Drop for DetailGuard {
    fn drop(&mut self) {
        self.dispatcher.detach_details(&self.event, &self.details);
    }
}

/// Renderer decorator that attaches fixed ambient details for the span of
/// each render call.
///
/// Whatever the configured event dispatches while the inner render runs
/// carries these entries; they are detached when the call returns, on the
/// success and failure paths alike.
pub struct EventDetailRenderer {
    inner: Box<dyn Render>,
    dispatcher: Rc<EventDispatcher>,
    event: String,
    details: Details,
}

impl EventDetailRenderer {
    pub fn new(
        inner: Box<dyn Render>,
        dispatcher: Rc<EventDispatcher>,
        event: impl Into<String>,
        details: Details,
    ) -> Self {
        Self {
            inner,
            dispatcher,
            event: event.into(),
            details,
        }
    }
}

impl Render for EventDetailRenderer {
    fn render(&self, template: &str, scope: Scope, do_print: bool) -> Result<String, ExecError> {
        let _guard = DetailGuard::attach(
            self.dispatcher.clone(),
            self.event.clone(),
            self.details.clone(),
        );
        self.inner.render(template, scope, do_print)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::default_escape_callable;
    use crate::exec::Interpreter;
    use crate::value::scope_from_data;
    use serde_json::json;
    use std::io::Write;

    fn capture() -> Box<dyn Render> {
        Box::new(CaptureRenderer::new(Box::new(Interpreter::new())))
    }

    #[test]
    fn test_capture_returns_output() {
        let renderer = CaptureRenderer::new(Box::new(Interpreter::new()));
        let out = renderer
            .render(
                "Hello <% echo $name %>",
                scope_from_data([("name", json!("World"))]),
                false,
            )
            .unwrap();
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn test_capture_propagates_executor_errors() {
        let renderer = CaptureRenderer::new(Box::new(Interpreter::new()));
        let err = renderer
            .render("<% if( $x ): %>open", Scope::new(), false)
            .unwrap_err();
        assert!(matches!(err, ExecError::Parse(_)));
    }

    #[test]
    fn test_escape_renderer_injects_callable() {
        let renderer = EscapeRenderer::new(capture(), "escape", default_escape_callable());
        let out = renderer
            .render(
                "<% echo $escape( $v ) %>",
                scope_from_data([("v", json!("<b>"))]),
                false,
            )
            .unwrap();
        assert_eq!(out, "&lt;b&gt;");
    }

    #[test]
    fn test_caller_escape_binding_wins() {
        let renderer = EscapeRenderer::new(capture(), "escape", default_escape_callable());
        let mut scope = scope_from_data([("v", json!("<b>"))]);
        scope.insert(
            "escape".into(),
            Value::Callable(Rc::new(|args| Ok(args[0].clone()))),
        );
        let out = renderer
            .render("<% echo $escape( $v ) %>", scope, false)
            .unwrap();
        assert_eq!(out, "<b>");
    }

    #[test]
    fn test_file_template_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.tpl");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "Hi <% echo $name %>").unwrap();

        let renderer = FileTemplateRenderer::new(capture())
            .with_root(dir.path())
            .with_extension("tpl");
        let out = renderer
            .render("greeting", scope_from_data([("name", json!("Ada"))]), false)
            .unwrap();
        assert_eq!(out, "Hi Ada");
    }

    #[test]
    fn test_missing_file_renders_empty() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileTemplateRenderer::new(capture()).with_root(dir.path());
        let out = renderer.render("nope", Scope::new(), false).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_event_details_attached_during_render_only() {
        let dispatcher = Rc::new(EventDispatcher::new());
        let observed = Rc::new(std::cell::RefCell::new(Details::new()));

        struct Probe {
            dispatcher: Rc<EventDispatcher>,
            observed: Rc<std::cell::RefCell<Details>>,
        }
        impl Render for Probe {
            fn render(&self, _t: &str, _s: Scope, _p: bool) -> Result<String, ExecError> {
                *self.observed.borrow_mut() = self.dispatcher.ambient_details("template_error");
                Ok(String::new())
            }
        }

        let mut details = Details::new();
        details.insert("modelClass".into(), json!("todo-item"));
        let renderer = EventDetailRenderer::new(
            Box::new(Probe {
                dispatcher: dispatcher.clone(),
                observed: observed.clone(),
            }),
            dispatcher.clone(),
            "template_error",
            details,
        );

        renderer.render("", Scope::new(), false).unwrap();
        assert_eq!(observed.borrow()["modelClass"], json!("todo-item"));
        // Detached once the call returns.
        assert!(dispatcher.ambient_details("template_error").is_empty());
    }

    #[test]
    fn test_event_details_detached_on_failure() {
        let dispatcher = Rc::new(EventDispatcher::new());

        struct Failing;
        impl Render for Failing {
            fn render(&self, _t: &str, _s: Scope, _p: bool) -> Result<String, ExecError> {
                Err(ExecError::Type("boom".into()))
            }
        }

        let mut details = Details::new();
        details.insert("k".into(), json!("v"));
        let renderer = EventDetailRenderer::new(
            Box::new(Failing),
            dispatcher.clone(),
            "template_error",
            details,
        );

        assert!(renderer.render("", Scope::new(), false).is_err());
        assert!(dispatcher.ambient_details("template_error").is_empty());
    }
}
