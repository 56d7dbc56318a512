//! Error types for the AST crate

use thiserror::Error;

use crate::arena::ArenaId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A handle was dereferenced against an arena that did not issue it, or
    /// after the arena gave up ownership of its nodes.
    #[error("Dangling reference: handle {index} of arena {arena} does not resolve")]
    DanglingReference { arena: ArenaId, index: usize },

    #[error("Schema mismatch in {kind} document at field '{field}': {reason}")]
    SchemaMismatch {
        kind: String,
        field: String,
        reason: String,
    },

    #[error("Nesting deeper than {0} levels")]
    DepthLimitExceeded(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn mismatch(kind: &str, field: &str, reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            kind: kind.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
