//! Directive template compiler and rendering pipeline.
//!
//! `veneer` turns a directive-based template syntax — `@if`/`@foreach`
//! blocks, `{{ escaped }}` and `{!! raw !!}` output — into program text,
//! then interprets that text against a variable scope to produce a string.
//! Rendering is assembled from small decorators, each adjusting one aspect
//! of a call: error interception and reporting, global arguments, escape
//! injection, file-backed templates, ambient event details, and output
//! capture. [`Pipeline`] wires the whole chain behind one builder.
//!
//! ```rust
//! use serde_json::json;
//! use veneer::Pipeline;
//!
//! let pipeline = Pipeline::builder().build();
//! let out = pipeline
//!     .render_str("@if($ready){{ $msg }}@endif", &json!({
//!         "ready": true,
//!         "msg": "a < b",
//!     }))
//!     .unwrap();
//! assert_eq!(out, "a &lt; b");
//! ```
//!
//! Rendering soft-fails: an execution error is dispatched as an event and
//! the render returns whatever output was produced before the failure.
//! Setup mistakes — a failing compiler extension, an unregistered model
//! namespace — are hard errors.
//!
//! The model layer ([`Model`], [`NamespaceRegistry`]) puts typed view
//! objects in front of the pipeline: a model names its template, supplies
//! its arguments, and may nest other models, which render depth-first
//! before the parent template runs.

pub mod compile;
pub mod error;
pub mod escape;
pub mod exec;
pub mod expr;
pub mod model;
pub mod pipeline;
pub mod program;
pub mod render;
pub mod value;

pub use compile::{DirectiveCompiler, ExtensionFn};
pub use error::{Error, ExecError, ModelError};
pub use escape::{default_escape_callable, html_escape};
pub use exec::{
    CompileExecutor, ErrorInterceptExecutor, Execute, GlobalArgumentsExecutor, Interpreter,
};
pub use model::{
    dash_case, expand_arguments, Argument, ArgumentMap, DefaultProvider, Model, ModelFactory,
    NamespaceConfig, NamespaceRegistry,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use render::{
    CaptureRenderer, DetailGuard, EscapeRenderer, EventDetailRenderer, FileTemplateRenderer,
    Render,
};
pub use value::{scope_from_data, Callable, Scope, Value};
