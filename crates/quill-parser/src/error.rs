//! Errors raised while turning query text into AST nodes

use thiserror::Error;

use crate::grammar::Rule;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    /// The grammar recognised the input but no transform exists for it.
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Malformed parse tree: {kind} is missing or has an invalid {field}")]
    MalformedExternalTree { kind: String, field: String },

    #[error("Query nests deeper than {0} levels")]
    DepthLimitExceeded(usize),

    #[error(transparent)]
    Ast(#[from] quill_ast::Error),
}

impl Error {
    pub(crate) fn malformed(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Error::MalformedExternalTree {
            kind: kind.into(),
            field: field.into(),
        }
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Error::UnsupportedConstruct(what.into())
    }
}
