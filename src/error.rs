//! Error types for cassis operations.

use thiserror::Error;

/// Errors that can occur while parsing CSS or mutating the object model.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Token sequence does not match any production.
    #[error("syntax error: {message} [{line}:{column}]")]
    Syntax {
        message: String,
        line: u32,
        column: u32,
    },

    /// A structural mutation violates an ordering or type invariant.
    #[error("invalid modification: {0}")]
    InvalidModification(String),

    /// Mutation attempted on a readonly node.
    #[error("no modification allowed: {0}")]
    NoModificationAllowed(String),

    /// Unresolvable namespace prefix in a selector.
    #[error("undefined namespace prefix: {0}")]
    Namespace(String),

    /// Structurally invalid nesting, e.g. a margin rule outside `@page`.
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// Removal of an item that is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// Out-of-range indexed access.
    #[error("index out of range: {0}")]
    IndexSize(String),

    /// The declared or explicit encoding cannot decode the byte source.
    #[error("cannot decode as {encoding}: {message}")]
    UnicodeDecode { encoding: String, message: String },

    /// Transport-level failure from the fetcher collaborator.
    #[error("fetch error: {0}")]
    Fetch(String),
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>, line: u32, column: u32) -> Self {
        Error::Syntax {
            message: message.into(),
            line,
            column,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
