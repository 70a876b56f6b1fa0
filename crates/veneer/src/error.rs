//! Error types for the rendering pipeline.
//!
//! [`ExecError`] covers everything that can go wrong while turning program
//! text into output: parsing the compiled program, evaluating expressions,
//! and the compile-time extension callback. Execution-side errors are
//! normally intercepted, reported through the event dispatcher, and
//! suppressed; only extension-callback failures reach the caller.
//!
//! [`ModelError`] covers model-layer setup mistakes (unregistered
//! namespaces and the like). These are hard, caller-visible failures —
//! deliberately the opposite policy from the soft-fail rendering core.

use thiserror::Error;

/// Error raised while executing compiled program text.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program text could not be parsed (unclosed block, stray close
    /// tag, malformed tag).
    #[error("program parse error: {0}")]
    Parse(String),

    /// An expression could not be parsed.
    #[error("expression parse error: {0}")]
    Expr(String),

    /// An expression evaluated to an unusable type for its position.
    #[error("type error: {0}")]
    Type(String),

    /// A call target was undefined or not a callable.
    #[error("`{0}` is not callable")]
    NotCallable(String),

    /// A `while`/`for` loop ran past the iteration cap.
    #[error("loop exceeded {limit} iterations")]
    IterationLimit { limit: usize },

    /// The compiler-extension callback failed. Not intercepted; propagates
    /// to the render caller.
    #[error("compiler extension failed: {0}")]
    Extension(String),
}

/// Error raised by the model layer at setup time.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A template namespace was used before being registered.
    #[error("namespace `{0}` is not registered")]
    UnregisteredNamespace(String),

    /// A namespace was registered twice.
    #[error("namespace `{0}` is already registered")]
    NamespaceCollision(String),
}

/// Umbrella error for pipeline entry points that can fail either way.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Caller data could not be serialized into a scope.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_error_display() {
        let err = ExecError::NotCallable("escape".into());
        assert_eq!(err.to_string(), "`escape` is not callable");

        let err = ExecError::IterationLimit { limit: 10 };
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::UnregisteredNamespace("admin".into());
        assert!(err.to_string().contains("admin"));
    }
}
