//! Error taxonomy for scene composition and rendering.
//!
//! Configuration problems surface immediately to the caller that composed the
//! scene; invariant breaks indicate a defect in composing code and are never
//! recovered. Capacity overflows are not errors: they degrade the result and
//! are reported through `tracing`.

use thiserror::Error;

pub type Result<T, E = ViewError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ViewError {
    /// A referenced shader/topology name is unknown, or an input does not
    /// match any recognized geometry shape.
    #[error("configuration: {0}")]
    Config(String),

    /// A programming error in composing code, such as a resource key held by
    /// two different resource types.
    #[error("invariant: {0}")]
    Invariant(String),

    /// GL object creation or shader build failure.
    #[error("gl: {0}")]
    Gl(String),
}

impl ViewError {
    pub fn config(msg: impl Into<String>) -> Self {
        ViewError::Config(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        ViewError::Invariant(msg.into())
    }

    pub fn gl(msg: impl Into<String>) -> Self {
        ViewError::Gl(msg.into())
    }
}
