//! Schema model: index, type, and field definitions
//!
//! `TypeDefinition` has a two-phase lifecycle: fields are defined while the
//! type is building, then `publish()` freezes them into a read-only indexed
//! view. Field lookups are only legal after publish.

use super::data_type::DataType;
use super::identifier::Identifier;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// An index definition: name plus shard and replica counts.
///
/// Equality and hashing consider the identifier only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    identifier: Identifier,
    shards: u32,
    replicas: u32,
}

impl IndexDefinition {
    /// Creates an index definition. Shard count must be at least one.
    pub fn new(name: &str, shards: u32, replicas: u32) -> Result<Self> {
        if shards == 0 {
            return Err(Error::InvalidValue(format!(
                "index {} must have at least one shard",
                name
            )));
        }
        Ok(IndexDefinition {
            identifier: Identifier::new(name)?,
            shards,
            replicas,
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn shards(&self) -> u32 {
        self.shards
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }
}

impl PartialEq for IndexDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for IndexDefinition {}

impl std::hash::Hash for IndexDefinition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

/// A field of a type: identifier, data type, optional date format (required
/// iff the type is `Date`), stored flag, assigned index, and primary flag.
///
/// Fields carry no pointer back to their owning type; lookups always go
/// through the owning `TypeDefinition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    identifier: Identifier,
    data_type: DataType,
    date_format: Option<String>,
    stored: bool,
    index: usize,
    primary: bool,
}

impl FieldDefinition {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// The field's position in the owning type's field order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_primary_field(&self) -> bool {
        self.primary
    }
}

/// The frozen, indexed view of a published type.
struct Published {
    fields: Vec<Arc<FieldDefinition>>,
    by_name: HashMap<Identifier, usize>,
    primary: usize,
}

/// A document type: an ordered, unique-by-identifier collection of fields,
/// exactly one of which is primary.
pub struct TypeDefinition {
    identifier: Identifier,
    builder: Mutex<Vec<FieldDefinition>>,
    published: OnceLock<Published>,
}

impl TypeDefinition {
    pub fn new(name: &str) -> Result<Self> {
        Ok(TypeDefinition {
            identifier: Identifier::new(name)?,
            builder: Mutex::new(Vec::new()),
            published: OnceLock::new(),
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn is_published(&self) -> bool {
        self.published.get().is_some()
    }

    /// Defines a non-date field. Fields are assigned monotonically increasing
    /// indexes in definition order.
    pub fn define_field(&self, name: &str, data_type: DataType) -> Result<()> {
        self.define(name, data_type, None, false)
    }

    /// Defines a non-date field whose source value is stored by the backend.
    pub fn define_stored_field(&self, name: &str, data_type: DataType) -> Result<()> {
        self.define(name, data_type, None, true)
    }

    /// Defines a date field with its format pattern.
    pub fn define_date_field(&self, name: &str, format: &str) -> Result<()> {
        self.define(name, DataType::Date, Some(format.to_string()), false)
    }

    fn define(
        &self,
        name: &str,
        data_type: DataType,
        date_format: Option<String>,
        stored: bool,
    ) -> Result<()> {
        if data_type == DataType::Date && date_format.is_none() {
            return Err(Error::InvalidValue(format!(
                "date field {} requires a format pattern",
                name
            )));
        }
        let identifier = Identifier::new(name)?;
        let mut fields = self.builder.lock();
        if self.published.get().is_some() {
            return Err(Error::TypePublished(self.identifier.to_string()));
        }
        if fields.iter().any(|f| f.identifier == identifier) {
            return Err(Error::FieldAlreadyExists(identifier.to_string()));
        }
        let index = fields.len();
        fields.push(FieldDefinition {
            identifier,
            data_type,
            date_format,
            stored,
            index,
            primary: false,
        });
        Ok(())
    }

    /// Marks an already-defined field as the primary field. At most one field
    /// may be primary.
    pub fn as_primary_field(&self, name: &str) -> Result<()> {
        let identifier = Identifier::new(name)?;
        let mut fields = self.builder.lock();
        if self.published.get().is_some() {
            return Err(Error::TypePublished(self.identifier.to_string()));
        }
        if let Some(existing) = fields.iter().find(|f| f.primary) {
            return Err(Error::PrimaryFieldAlreadyExists(
                existing.identifier.to_string(),
            ));
        }
        let field = fields
            .iter_mut()
            .find(|f| f.identifier == identifier)
            .ok_or_else(|| Error::FieldNotExists(identifier.to_string()))?;
        field.primary = true;
        Ok(())
    }

    /// Freezes the field list. Idempotent and safe to race: concurrent
    /// publishers converge on one winner, the rest observe the published
    /// state and return without effect. Requires a primary field.
    pub fn publish(&self) -> Result<()> {
        if self.published.get().is_some() {
            return Ok(());
        }
        let fields = self.builder.lock();
        // Re-check under the lock: another publisher may have won the race.
        if self.published.get().is_some() {
            return Ok(());
        }
        let primary = fields
            .iter()
            .position(|f| f.primary)
            .ok_or_else(|| Error::PrimaryFieldNotFound(self.identifier.to_string()))?;
        let fields: Vec<Arc<FieldDefinition>> =
            fields.iter().cloned().map(Arc::new).collect();
        let by_name = fields
            .iter()
            .map(|f| (f.identifier.clone(), f.index))
            .collect();
        let _ = self.published.set(Published {
            fields,
            by_name,
            primary,
        });
        Ok(())
    }

    fn view(&self) -> Result<&Published> {
        self.published
            .get()
            .ok_or_else(|| Error::TypeNotPublished(self.identifier.to_string()))
    }

    /// All fields in index order. Fails before publish.
    pub fn fields(&self) -> Result<&[Arc<FieldDefinition>]> {
        Ok(&self.view()?.fields)
    }

    pub fn field_count(&self) -> Result<usize> {
        Ok(self.view()?.fields.len())
    }

    /// Looks up a field by identifier. Fails before publish.
    pub fn field(&self, name: &str) -> Result<Arc<FieldDefinition>> {
        let view = self.view()?;
        let identifier = Identifier::new(name)?;
        view.by_name
            .get(&identifier)
            .map(|&i| view.fields[i].clone())
            .ok_or_else(|| Error::FieldNotExists(identifier.to_string()))
    }

    /// Looks up a field by assigned index. Fails before publish.
    pub fn field_at(&self, index: usize) -> Result<Arc<FieldDefinition>> {
        let view = self.view()?;
        view.fields
            .get(index)
            .cloned()
            .ok_or_else(|| Error::FieldNotExists(format!("index {}", index)))
    }

    pub fn primary_field(&self) -> Result<Arc<FieldDefinition>> {
        let view = self.view()?;
        Ok(view.fields[view.primary].clone())
    }
}

impl std::fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("identifier", &self.identifier)
            .field("published", &self.is_published())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> TypeDefinition {
        let def = TypeDefinition::new("student").unwrap();
        def.define_field("id", DataType::Int).unwrap();
        def.define_field("name", DataType::Str).unwrap();
        def.define_date_field("birthday", "%Y-%m-%d").unwrap();
        def.as_primary_field("id").unwrap();
        def
    }

    #[test]
    fn index_definition_equality_by_identifier() {
        let a = IndexDefinition::new("school", 5, 1).unwrap();
        let b = IndexDefinition::new("school", 3, 0).unwrap();
        assert_eq!(a, b);
        assert!(IndexDefinition::new("school", 0, 1).is_err());
    }

    #[test]
    fn publish_freezes_fields_and_is_idempotent() {
        let def = student();
        assert!(!def.is_published());
        assert!(matches!(
            def.field("id"),
            Err(Error::TypeNotPublished(_))
        ));

        def.publish().unwrap();
        def.publish().unwrap();
        assert!(def.is_published());
        assert_eq!(def.field_count().unwrap(), 3);
        assert_eq!(def.field("id").unwrap().index(), 0);
        assert_eq!(def.field_at(2).unwrap().identifier().as_str(), "birthday");
        assert!(def.primary_field().unwrap().is_primary_field());

        // Further definition after publish is an illegal state.
        assert!(matches!(
            def.define_field("extra", DataType::Str),
            Err(Error::TypePublished(_))
        ));
    }

    #[test]
    fn exactly_one_primary_field() {
        let def = student();
        assert!(matches!(
            def.as_primary_field("name"),
            Err(Error::PrimaryFieldAlreadyExists(_))
        ));
        def.publish().unwrap();
        let primaries = def
            .fields()
            .unwrap()
            .iter()
            .filter(|f| f.is_primary_field())
            .count();
        assert_eq!(primaries, 1);
    }

    #[test]
    fn publish_without_primary_fails() {
        let def = TypeDefinition::new("note").unwrap();
        def.define_field("text", DataType::Str).unwrap();
        assert!(matches!(
            def.publish(),
            Err(Error::PrimaryFieldNotFound(_))
        ));
    }

    #[test]
    fn duplicate_field_and_missing_field_errors() {
        let def = TypeDefinition::new("t").unwrap();
        def.define_field("a", DataType::Long).unwrap();
        assert!(matches!(
            def.define_field("a", DataType::Str),
            Err(Error::FieldAlreadyExists(_))
        ));
        assert!(matches!(
            def.as_primary_field("missing"),
            Err(Error::FieldNotExists(_))
        ));
        // Date fields require a format.
        assert!(def.define_field("when", DataType::Date).is_err());
    }

    #[test]
    fn concurrent_publish_converges() {
        let def = Arc::new(student());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let def = def.clone();
                std::thread::spawn(move || def.publish())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(def.field_count().unwrap(), 3);
    }
}
