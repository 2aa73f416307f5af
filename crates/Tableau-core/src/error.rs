//! # Errors
//!
//! A single error type for the whole crate. Variants follow the failure
//! taxonomy of the engine: programmer errors fail fast, the "scene not loaded"
//! precondition is recoverable, and unhandled render modes are fatal.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required value was empty, negative or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Strategy construction was attempted before the owning scene finished loading.
    #[error("scene is not loaded yet")]
    NotLoaded,

    /// A renderer was asked for an operation its shape has no concept of.
    #[error("`{operation}` is not supported for shape `{shape}`")]
    Unsupported {
        operation: &'static str,
        shape: &'static str,
    },

    /// A render mode value that the strategy selector cannot map to a technique.
    #[error("unhandled render mode bits {0:#06b}")]
    UnhandledRenderMode(u32),

    /// No renderer is registered for the shape (or any of its fallbacks).
    #[error("no shape renderer registered for `{0}`")]
    NoRenderer(&'static str),

    /// The owning scene was dropped while an actor or support still referenced it.
    #[error("owning scene is gone")]
    SceneGone,

    /// The graphics backend rejected a call.
    #[error("graphics backend error: {0}")]
    Graphics(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for errors that callers are expected to catch and retry later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotLoaded)
    }
}
