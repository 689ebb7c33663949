//! Error types for the SQL compiler and execution engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Syntax errors carry the byte offset of the offending token so the
    // caller can render a useful diagnostic against the original SQL text.
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    // Schema consistency errors
    #[error("Field already exists: {0}")]
    FieldAlreadyExists(String),

    #[error("Field not exists: {0}")]
    FieldNotExists(String),

    #[error("Primary field already exists: {0}")]
    PrimaryFieldAlreadyExists(String),

    #[error("Primary field not found in type: {0}")]
    PrimaryFieldNotFound(String),

    #[error("Type already exists: {0}")]
    TypeAlreadyExists(String),

    #[error("Type not exists: {0}")]
    TypeNotExists(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Index not exists: {0}")]
    IndexNotExists(String),

    // Illegal-state errors on the TypeDefinition lifecycle
    #[error("Type not published: {0}")]
    TypeNotPublished(String),

    #[error("Type already published: {0}")]
    TypePublished(String),

    // Type errors
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // Dispatch errors
    #[error("no executor found for statement class {statement}, result class {result}")]
    NoExecutor { statement: String, result: String },

    #[error("duplicate executor registered for statement class {statement}, result class {result}")]
    DuplicateExecutor { statement: String, result: String },

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl Error {
    /// Shorthand for a syntax error at the given source offset.
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            message: message.into(),
        }
    }
}
