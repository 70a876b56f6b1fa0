//! Code execution.
//!
//! [`Execute`] is the seam between the rendering layer and whatever runs
//! program text. The raw implementation is [`Interpreter`], a tree-walking
//! evaluator over the parsed program. Around it stack the executor
//! decorators, innermost first:
//!
//! - [`ErrorInterceptExecutor`] — converts any inner failure into one error
//!   event (`{arguments, code, error}`) and swallows it,
//! - [`GlobalArgumentsExecutor`] — merges configured globals under the
//!   call scope,
//! - [`CompileExecutor`] — compiles directive text to program text before
//!   delegating, which is what lets callers hand template text to an
//!   executor chain.
//!
//! The compile stage sits *outside* interception, so extension-callback
//! failures propagate to the caller while everything that happens during
//! execution is reported and suppressed.

use std::rc::Rc;

use veneer_dispatch::{Details, EventDispatcher};

use crate::compile::DirectiveCompiler;
use crate::error::ExecError;
use crate::expr::{apply_assign, eval, loose_eq, Expr};
use crate::program::{parse_program, Node};
use crate::value::{format_value, scope_to_json, truthy, Scope, Value};

/// Iteration cap for `while` and `for` loops. The source expressions have
/// no time limit of their own; past this many iterations the loop fails
/// with [`ExecError::IterationLimit`] and gets reported like any other
/// runtime failure.
pub const LOOP_ITERATION_LIMIT: usize = 1_000_000;

/// Executes program text against a scope, writing produced output to
/// `sink`. Output already written stays in the sink even when execution
/// fails partway.
pub trait Execute {
    fn execute(&self, code: &str, scope: Scope, sink: &mut String) -> Result<(), ExecError>;
}

/// Control-flow signal threaded through block execution.
enum Flow {
    Normal,
    Break,
}

/// The raw executor: parses program text and walks the tree.
#[derive(Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Execute for Interpreter {
    fn execute(&self, code: &str, scope: Scope, sink: &mut String) -> Result<(), ExecError> {
        let nodes = parse_program(code)?;
        let mut scope = scope;
        exec_nodes(&nodes, &mut scope, sink)?;
        Ok(())
    }
}

fn exec_nodes(nodes: &[Node], scope: &mut Scope, sink: &mut String) -> Result<Flow, ExecError> {
    for node in nodes {
        match node {
            Node::Literal(text) => sink.push_str(text),

            Node::Echo(expr) => {
                let value = eval(expr, scope)?;
                sink.push_str(&format_value(&value));
            }

            Node::If { arms, otherwise } => {
                let mut taken = false;
                for (cond, body) in arms {
                    if truthy(&eval(cond, scope)?) {
                        if let Flow::Break = exec_nodes(body, scope, sink)? {
                            return Ok(Flow::Break);
                        }
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    if let Some(body) = otherwise {
                        if let Flow::Break = exec_nodes(body, scope, sink)? {
                            return Ok(Flow::Break);
                        }
                    }
                }
            }

            Node::Foreach { header, body } => {
                let subject = eval(&header.subject, scope)?;
                let entries: Vec<(serde_json::Value, serde_json::Value)> = match subject {
                    serde_json::Value::Array(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (serde_json::Value::from(i), v))
                        .collect(),
                    serde_json::Value::Object(map) => map
                        .into_iter()
                        .map(|(k, v)| (serde_json::Value::String(k), v))
                        .collect(),
                    other => {
                        return Err(ExecError::Type(format!(
                            "foreach subject must be an array or map, got {}",
                            other
                        )))
                    }
                };
                for (key, item) in entries {
                    if let Some(key_var) = &header.key {
                        scope.insert(key_var.clone(), Value::Data(key));
                    }
                    scope.insert(header.item.clone(), Value::Data(item));
                    if let Flow::Break = exec_nodes(body, scope, sink)? {
                        break;
                    }
                }
            }

            Node::For { header, body } => {
                if let Some(init) = &header.init {
                    apply_assign(init, scope)?;
                }
                let mut iterations = 0usize;
                loop {
                    if let Some(cond) = &header.cond {
                        if !truthy(&eval(cond, scope)?) {
                            break;
                        }
                    }
                    iterations += 1;
                    if iterations > LOOP_ITERATION_LIMIT {
                        return Err(ExecError::IterationLimit {
                            limit: LOOP_ITERATION_LIMIT,
                        });
                    }
                    if let Flow::Break = exec_nodes(body, scope, sink)? {
                        break;
                    }
                    if let Some(step) = &header.step {
                        apply_assign(step, scope)?;
                    }
                }
            }

            Node::While { cond, body } => {
                let mut iterations = 0usize;
                while truthy(&eval(cond, scope)?) {
                    iterations += 1;
                    if iterations > LOOP_ITERATION_LIMIT {
                        return Err(ExecError::IterationLimit {
                            limit: LOOP_ITERATION_LIMIT,
                        });
                    }
                    if let Flow::Break = exec_nodes(body, scope, sink)? {
                        break;
                    }
                }
            }

            Node::Switch { subject, arms } => {
                let subject = eval(subject, scope)?;
                let matched = find_switch_arm(&subject, arms, scope)?;
                if let Some(start) = matched {
                    // Fall through subsequent arms until a break.
                    for (_, body) in &arms[start..] {
                        if let Flow::Break = exec_nodes(body, scope, sink)? {
                            break;
                        }
                    }
                }
            }

            Node::Break => return Ok(Flow::Break),
        }
    }
    Ok(Flow::Normal)
}

/// Finds the index of the first matching `case` arm, falling back to the
/// `default` arm when no test matches.
fn find_switch_arm(
    subject: &serde_json::Value,
    arms: &[(Option<Expr>, Vec<Node>)],
    scope: &Scope,
) -> Result<Option<usize>, ExecError> {
    for (index, (test, _)) in arms.iter().enumerate() {
        if let Some(test) = test {
            let candidate = eval(test, scope)?;
            if loose_eq(subject, &candidate) {
                return Ok(Some(index));
            }
        }
    }
    Ok(arms.iter().position(|(test, _)| test.is_none()))
}

/// Executor decorator that reports failures instead of raising them.
///
/// Any error from the inner executor becomes one dispatch under the
/// configured event name with payload `{arguments, code, error}` — merged
/// with whatever ambient details are attached at the point of failure —
/// after which the call returns success. Output captured before the
/// failure stays in the sink.
pub struct ErrorInterceptExecutor {
    inner: Box<dyn Execute>,
    dispatcher: Rc<EventDispatcher>,
    event: String,
}

impl ErrorInterceptExecutor {
    pub fn new(
        inner: Box<dyn Execute>,
        dispatcher: Rc<EventDispatcher>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            dispatcher,
            event: event.into(),
        }
    }
}

impl Execute for ErrorInterceptExecutor {
    fn execute(&self, code: &str, scope: Scope, sink: &mut String) -> Result<(), ExecError> {
        let arguments = scope_to_json(&scope);
        if let Err(error) = self.inner.execute(code, scope, sink) {
            let mut details = Details::new();
            details.insert(
                "arguments".into(),
                serde_json::Value::Object(arguments),
            );
            details.insert("code".into(), serde_json::Value::String(code.to_string()));
            details.insert(
                "error".into(),
                serde_json::Value::String(error.to_string()),
            );
            self.dispatcher.dispatch(&self.event, details);
        }
        Ok(())
    }
}

/// Executor decorator that merges a fixed global scope into every call.
/// Call-specific arguments win on key collision.
pub struct GlobalArgumentsExecutor {
    inner: Box<dyn Execute>,
    globals: Scope,
}

impl GlobalArgumentsExecutor {
    pub fn new(inner: Box<dyn Execute>, globals: Scope) -> Self {
        Self { inner, globals }
    }
}

impl Execute for GlobalArgumentsExecutor {
    fn execute(&self, code: &str, scope: Scope, sink: &mut String) -> Result<(), ExecError> {
        let mut merged = self.globals.clone();
        merged.extend(scope);
        self.inner.execute(code, merged, sink)
    }
}

/// Executor decorator that compiles directive text before delegating.
/// This is what turns "template text" into "program text" at the bottom
/// of the chain.
pub struct CompileExecutor {
    inner: Box<dyn Execute>,
    compiler: DirectiveCompiler,
}

impl CompileExecutor {
    pub fn new(inner: Box<dyn Execute>, compiler: DirectiveCompiler) -> Self {
        Self { inner, compiler }
    }
}

impl Execute for CompileExecutor {
    fn execute(&self, code: &str, scope: Scope, sink: &mut String) -> Result<(), ExecError> {
        let compiled = self.compiler.compile(code)?;
        self.inner.execute(&compiled, scope, sink)
    }
}
