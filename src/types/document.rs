//! Documents: fixed-width rows bound to a published type

use super::schema::TypeDefinition;
use super::value::{Row, Value};
use crate::error::Result;
use std::sync::Arc;

/// A document bound to one published `TypeDefinition`. Its value array is
/// indexed by the type's field order and never resized; assignments coerce
/// the incoming value to the field's data type.
#[derive(Debug, Clone)]
pub struct Document {
    type_definition: Arc<TypeDefinition>,
    values: Row,
}

impl Document {
    /// Creates an all-NULL document for the given published type.
    pub fn new(type_definition: Arc<TypeDefinition>) -> Result<Self> {
        let width = type_definition.field_count()?;
        Ok(Document {
            type_definition,
            values: vec![Value::Null; width],
        })
    }

    pub fn type_definition(&self) -> &Arc<TypeDefinition> {
        &self.type_definition
    }

    /// Assigns a field by index, coercing the value to the field's type.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        let field = self.type_definition.field_at(index)?;
        self.values[index] = value.coerce_to(field.data_type(), field.date_format())?;
        Ok(())
    }

    /// Assigns a field by identifier.
    pub fn set_value_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.type_definition.field(name)?;
        let index = field.index();
        self.values[index] = value.coerce_to(field.data_type(), field.date_format())?;
        Ok(())
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.type_definition.field_at(index)?;
        Ok(&self.values[index])
    }

    pub fn value_by_name(&self, name: &str) -> Result<&Value> {
        let field = self.type_definition.field(name)?;
        Ok(&self.values[field.index()])
    }

    /// The document's values in field order.
    pub fn values(&self) -> &Row {
        &self.values
    }

    pub fn into_values(self) -> Row {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::data_type::DataType;

    fn student() -> Arc<TypeDefinition> {
        let def = TypeDefinition::new("student").unwrap();
        def.define_field("id", DataType::Int).unwrap();
        def.define_field("score", DataType::Double).unwrap();
        def.define_field("active", DataType::Bool).unwrap();
        def.define_date_field("enrolled", "%Y-%m-%d").unwrap();
        def.as_primary_field("id").unwrap();
        def.publish().unwrap();
        Arc::new(def)
    }

    #[test]
    fn coerces_values_on_assignment() {
        let mut doc = Document::new(student()).unwrap();
        doc.set_value(0, Value::Int(7)).unwrap();
        // Integer widens into a double field.
        doc.set_value_by_name("score", Value::Int(95)).unwrap();
        assert_eq!(doc.value_by_name("score").unwrap(), &Value::Double(95.0));
        // Booleans parse from strings.
        doc.set_value_by_name("active", Value::Str("true".into()))
            .unwrap();
        assert_eq!(doc.value(2).unwrap(), &Value::Bool(true));
        // Dates parse with the field's format.
        doc.set_value_by_name("enrolled", Value::Str("2024-09-01".into()))
            .unwrap();
        assert!(matches!(doc.value(3).unwrap(), Value::Date(_)));
    }

    #[test]
    fn rejects_mismatched_values() {
        let mut doc = Document::new(student()).unwrap();
        assert!(matches!(
            doc.set_value(0, Value::Str("seven".into())),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            doc.set_value_by_name("missing", Value::Int(1)),
            Err(Error::FieldNotExists(_))
        ));
        assert!(doc.set_value(9, Value::Int(1)).is_err());
    }

    #[test]
    fn width_is_fixed_by_the_type() {
        let doc = Document::new(student()).unwrap();
        assert_eq!(doc.values().len(), 4);
        assert!(doc.values().iter().all(Value::is_null));
    }
}
