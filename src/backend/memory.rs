//! In-memory search backend
//!
//! The reference `SearchBackend` implementation: indices, types, and
//! documents held in process memory, with filter, sort, and paging applied
//! through the shared expression evaluator. Integration tests and embedded
//! use run against it.

use super::{SearchBackend, SearchRequest};
use crate::error::{Error, Result};
use crate::execution::evaluator::{self, Environment};
use crate::execution::result::{ColumnMeta, ResultMetadata, Rows};
use crate::functions::FunctionContext;
use crate::parsing::ast::Direction;
use crate::types::{Document, Identifier, IndexDefinition, Row, TypeDefinition, Value};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct MemoryBackend {
    indices: RwLock<HashMap<Identifier, IndexEntry>>,
}

struct IndexEntry {
    definition: IndexDefinition,
    types: HashMap<Identifier, TypeEntry>,
}

struct TypeEntry {
    definition: Arc<TypeDefinition>,
    documents: Vec<Row>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document under the given index. The document's type must
    /// have been created on that index.
    pub fn insert_document(&self, index: &Identifier, document: Document) -> Result<()> {
        let mut indices = self.indices.write();
        let entry = indices
            .get_mut(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?;
        let type_ident = document.type_definition().identifier().clone();
        let type_entry = entry
            .types
            .get_mut(&type_ident)
            .ok_or_else(|| Error::TypeNotExists(type_ident.to_string()))?;
        type_entry.documents.push(document.into_values());
        Ok(())
    }
}

impl SearchBackend for MemoryBackend {
    fn index_exists(&self, index: &Identifier) -> Result<bool> {
        Ok(self.indices.read().contains_key(index))
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        let mut indices = self.indices.write();
        let ident = definition.identifier().clone();
        if indices.contains_key(&ident) {
            return Err(Error::IndexAlreadyExists(ident.to_string()));
        }
        tracing::debug!(index = %ident, "creating index");
        indices.insert(
            ident,
            IndexEntry {
                definition: definition.clone(),
                types: HashMap::new(),
            },
        );
        Ok(())
    }

    fn drop_index(&self, index: &Identifier) -> Result<()> {
        self.indices
            .write()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))
    }

    fn index_definition(&self, index: &Identifier) -> Result<IndexDefinition> {
        self.indices
            .read()
            .get(index)
            .map(|entry| entry.definition.clone())
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))
    }

    fn list_indices(&self) -> Result<Vec<IndexDefinition>> {
        Ok(self
            .indices
            .read()
            .values()
            .map(|entry| entry.definition.clone())
            .collect())
    }

    fn type_exists(&self, index: &Identifier, type_ident: &Identifier) -> Result<bool> {
        Ok(self
            .indices
            .read()
            .get(index)
            .is_some_and(|entry| entry.types.contains_key(type_ident)))
    }

    fn create_type(&self, index: &Identifier, definition: &Arc<TypeDefinition>) -> Result<()> {
        if !definition.is_published() {
            return Err(Error::TypeNotPublished(
                definition.identifier().to_string(),
            ));
        }
        let mut indices = self.indices.write();
        let entry = indices
            .get_mut(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?;
        let ident = definition.identifier().clone();
        if entry.types.contains_key(&ident) {
            return Err(Error::TypeAlreadyExists(ident.to_string()));
        }
        tracing::debug!(index = %index, type_ident = %ident, "creating type");
        entry.types.insert(
            ident,
            TypeEntry {
                definition: definition.clone(),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_type(&self, index: &Identifier, type_ident: &Identifier) -> Result<()> {
        let mut indices = self.indices.write();
        let entry = indices
            .get_mut(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?;
        entry
            .types
            .remove(type_ident)
            .map(|_| ())
            .ok_or_else(|| Error::TypeNotExists(type_ident.to_string()))
    }

    fn type_definition(
        &self,
        index: &Identifier,
        type_ident: &Identifier,
    ) -> Result<Arc<TypeDefinition>> {
        self.indices
            .read()
            .get(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?
            .types
            .get(type_ident)
            .map(|entry| entry.definition.clone())
            .ok_or_else(|| Error::TypeNotExists(type_ident.to_string()))
    }

    fn list_type_definitions(&self, index: &Identifier) -> Result<Vec<Arc<TypeDefinition>>> {
        Ok(self
            .indices
            .read()
            .get(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?
            .types
            .values()
            .map(|entry| entry.definition.clone())
            .collect())
    }

    fn search(&self, index: &Identifier, request: &SearchRequest) -> Result<Rows> {
        let indices = self.indices.read();
        let entry = indices
            .get(index)
            .ok_or_else(|| Error::IndexNotExists(index.to_string()))?;
        let type_entry = entry
            .types
            .get(&request.type_ident)
            .ok_or_else(|| Error::TypeNotExists(request.type_ident.to_string()))?;
        let schema = type_entry.definition.as_ref();

        let ctx = FunctionContext::default();
        let mut matched: Vec<Row> = Vec::new();
        for row in &type_entry.documents {
            let keep = match &request.filter {
                Some(filter) => {
                    let env = Environment::new(Some(row), Some(schema), &request.params, &ctx);
                    evaluator::is_truthy(&evaluator::evaluate(filter, &env)?)
                }
                None => true,
            };
            if keep {
                matched.push(row.clone());
            }
        }

        if !request.sort.is_empty() {
            matched = sort_rows(matched, request, schema, &ctx)?;
        }

        let from = request.from.min(matched.len());
        let until = match request.size {
            Some(size) => (from + size).min(matched.len()),
            None => matched.len(),
        };
        let matched = matched[from..until].to_vec();

        let columns = schema
            .fields()?
            .iter()
            .map(|field| {
                ColumnMeta::new(
                    field.identifier().clone(),
                    field.identifier().to_string(),
                    field.data_type(),
                )
            })
            .collect();
        Ok(Rows::new(ResultMetadata::new(columns), matched))
    }
}

/// Sorts rows by the request's sort keys, each key evaluated per row.
fn sort_rows(
    rows: Vec<Row>,
    request: &SearchRequest,
    schema: &TypeDefinition,
    ctx: &FunctionContext,
) -> Result<Vec<Row>> {
    let mut keyed: Vec<(Vec<Value>, Row)> = Vec::with_capacity(rows.len());
    for row in rows {
        let keys = request
            .sort
            .iter()
            .map(|(expr, _)| {
                let env = Environment::new(Some(&row), Some(schema), &request.params, ctx);
                evaluator::evaluate(expr, &env)
            })
            .collect::<Result<Vec<_>>>()?;
        keyed.push((keys, row));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for ((av, bv), (_, direction)) in a.iter().zip(b).zip(&request.sort) {
            let ordering = av.cmp(bv);
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}
