//! Core type system: identifiers, data types, values, schema, documents

pub mod data_type;
pub mod document;
pub mod identifier;
pub mod schema;
pub mod value;

pub use data_type::DataType;
pub use document::Document;
pub use identifier::Identifier;
pub use schema::{FieldDefinition, IndexDefinition, TypeDefinition};
pub use value::{Row, Value};
