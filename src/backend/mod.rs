//! The search backend interface
//!
//! The engine talks to its document store exclusively through this trait:
//! schema discovery (index and type definitions) and the query call that
//! executes a bound, resolved search request. The network transport and
//! wire protocol behind it are out of scope.

pub mod memory;

pub use memory::MemoryBackend;

use crate::error::Result;
use crate::execution::result::Rows;
use crate::parsing::ast::{Direction, Expression};
use crate::types::{Identifier, IndexDefinition, TypeDefinition, Value};
use std::sync::Arc;

/// A bound, resolved search request: the target type, an optional filter
/// with its bound argument values, a sort specification, and paging. Sort
/// and paging are only present when the executor can push them down.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub type_ident: Identifier,
    pub filter: Option<Expression>,
    pub params: Vec<Value>,
    pub sort: Vec<(Expression, Direction)>,
    pub from: usize,
    pub size: Option<usize>,
}

impl SearchRequest {
    /// A request that scans a whole type.
    pub fn scan(type_ident: Identifier) -> Self {
        SearchRequest {
            type_ident,
            filter: None,
            params: Vec::new(),
            sort: Vec::new(),
            from: 0,
            size: None,
        }
    }
}

/// The document store the engine compiles queries against.
pub trait SearchBackend: Send + Sync {
    fn index_exists(&self, index: &Identifier) -> Result<bool>;

    /// Creates an index. Fails with `IndexAlreadyExists` if taken.
    fn create_index(&self, definition: &IndexDefinition) -> Result<()>;

    /// Drops an index. Fails with `IndexNotExists` if missing.
    fn drop_index(&self, index: &Identifier) -> Result<()>;

    fn index_definition(&self, index: &Identifier) -> Result<IndexDefinition>;

    fn list_indices(&self) -> Result<Vec<IndexDefinition>>;

    fn type_exists(&self, index: &Identifier, type_ident: &Identifier) -> Result<bool>;

    /// Registers a published type definition under an index. Fails with
    /// `TypeAlreadyExists` if taken, `TypeNotPublished` if unpublished.
    fn create_type(&self, index: &Identifier, definition: &Arc<TypeDefinition>) -> Result<()>;

    /// Drops a type and its documents. Fails with `TypeNotExists` if
    /// missing.
    fn drop_type(&self, index: &Identifier, type_ident: &Identifier) -> Result<()>;

    fn type_definition(
        &self,
        index: &Identifier,
        type_ident: &Identifier,
    ) -> Result<Arc<TypeDefinition>>;

    fn list_type_definitions(&self, index: &Identifier) -> Result<Vec<Arc<TypeDefinition>>>;

    /// Executes a bound search request and returns a row cursor over the
    /// matching documents, in the type's field order.
    fn search(&self, index: &Identifier, request: &SearchRequest) -> Result<Rows>;
}
