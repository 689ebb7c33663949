//! A SQL compiler and execution engine for document search backends
//!
//! This crate compiles SQL SELECT statements into a typed, immutable AST,
//! validates them against a dynamically discovered schema (index, type, and
//! field definitions mirroring a document store), and executes them through
//! a registry of statement executors, exposing results through a
//! cursor-style result set.

pub mod backend;
pub mod error;
pub mod execution;
pub mod functions;
pub mod parsing;
pub mod types;

pub use backend::{MemoryBackend, SearchBackend, SearchRequest};
pub use error::{Error, Result};
pub use execution::{CacheSweeper, ExecuteEngine, ExecutionEnvironment, ResultSet, Rows};
pub use parsing::{CachingParser, Statement, parse_sql};
pub use types::{DataType, Document, Identifier, IndexDefinition, TypeDefinition, Value};
