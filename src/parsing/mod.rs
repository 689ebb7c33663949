//! SQL parsing: lexer, grammar analyzer, AST, and the statement cache
//!
//! Parses raw SQL strings into a structured Abstract Syntax Tree. The AST
//! only ensures the syntax is well-formed; binding names and types against
//! the schema is the planner's job.

pub mod ast;
pub mod caching_parser;
pub mod lexer;
mod parser;

use crate::error::Result;

pub use ast::{Statement, StatementKind};
pub use caching_parser::CachingParser;
pub use lexer::{Keyword, Lexer, Token};
pub use parser::Parser;

/// Parses a SQL statement string into an AST.
pub fn parse_sql(sql: &str) -> Result<Statement> {
    Parser::parse(sql)
}
