//! Error types for mesh operations.
//!
//! Operations return [`anyhow::Result`]; the carried error is a [`MeshError`] so that callers
//! can tell a recoverable enforcement failure from a defect.

use thiserror::Error;

/// Errors that can occur while building or mutating a mesh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The operation was called on a handle or mesh state it does not accept.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// An argument is outside of its domain.
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// The triangulation could not be enforced, retrying with a relaxed tolerance may help.
    #[error("Triangulation enforcement failed: {0}")]
    Enforcement(String),

    /// The mesh or the geometry context stack is in an unexpected state.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeshError {
    /// Only enforcement failures are worth a retry.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, MeshError::Enforcement(_))
    }
}

/// Classification helpers on [`anyhow::Error`].
pub trait MeshErrorExt {
    /// The [`MeshError`] carried by this error, if any.
    fn mesh_error(&self) -> Option<&MeshError>;

    /// Check if the carried [`MeshError`] is recoverable.
    fn is_recoverable(&self) -> bool {
        self.mesh_error().is_some_and(MeshError::is_recoverable)
    }
}

impl MeshErrorExt for anyhow::Error {
    fn mesh_error(&self) -> Option<&MeshError> {
        self.downcast_ref::<MeshError>()
    }
}

pub(crate) fn precondition(msg: impl Into<String>) -> anyhow::Error {
    MeshError::Precondition(msg.into()).into()
}

pub(crate) fn illegal_argument(msg: impl Into<String>) -> anyhow::Error {
    MeshError::IllegalArgument(msg.into()).into()
}

pub(crate) fn enforcement(msg: impl Into<String>) -> anyhow::Error {
    MeshError::Enforcement(msg.into()).into()
}

pub(crate) fn internal(msg: impl Into<String>) -> anyhow::Error {
    MeshError::Internal(msg.into()).into()
}
