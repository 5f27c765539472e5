//! Error types for spark-view.
//!
//! Every failure is local to the subtree or check that produced it and is
//! returned synchronously. Nothing is retried or silently repaired.

use thiserror::Error;

/// Result type alias for rendering and binding operations.
pub type ViewResult<T> = Result<T, ViewError>;

/// Errors raised while rendering, attaching, or updating a view.
#[derive(Error, Debug)]
pub enum ViewError {
    /// A `<view is=...>` names something that is neither registered nor stubbed.
    #[error("no component registered or stubbed for view '{is}'")]
    UnknownView { is: String },

    /// Attach found markup that does not match the template's shape.
    #[error("attach mismatch: expected {expected}, found {found}")]
    StructuralMismatch { expected: String, found: String },

    /// A model path that cannot be written (e.g. indexing into a string).
    #[error("invalid model path '{path}'")]
    InvalidPath { path: String },

    /// Render configuration failed to deserialize.
    #[error("invalid render config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ViewError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Failures reported by the equivalence checker.
///
/// Each variant names the strategy that diverged so a failing assertion
/// points at the backend at fault.
#[derive(Error, Debug)]
pub enum EquivalenceError {
    /// A strategy failed to render at all.
    #[error("{strategy} rendering failed: {source}")]
    Render {
        strategy: &'static str,
        #[source]
        source: ViewError,
    },

    /// A strategy rendered, but its output differs from the expected markup.
    #[error("{strategy} rendering diverged\n  expected: {expected}\n    actual: {actual}")]
    Diverged {
        strategy: &'static str,
        expected: String,
        actual: String,
    },

    /// The attach strategy could not reconcile the template with the parsed markup.
    #[error("attach failed: {source}")]
    Attach {
        #[source]
        source: ViewError,
    },
}
