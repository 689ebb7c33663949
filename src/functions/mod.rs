//! SQL function definitions and registry
//!
//! Functions are registered in a process-wide registry, looked up by name
//! case-insensitively. The registry is populated once at first use from an
//! explicit registration table and can be extended at runtime; this is how
//! new SQL functions are added without touching the grammar analyzer.

use crate::error::{Error, Result};
use crate::types::DataType;
use crate::types::Value;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

mod avg;
mod concat;
mod count;
mod max;
mod min;
mod now;
mod substring;
mod sum;

/// Metadata about a function's signature.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSignature {
    /// Function name (uppercase).
    pub name: &'static str,
    /// Minimum number of arguments.
    pub min_args: usize,
    /// Maximum number of arguments. None means variadic.
    pub max_args: Option<usize>,
    /// Whether this is an aggregate function.
    pub aggregate: bool,
}

impl FunctionSignature {
    /// Checks an argument count against the signature's bounds.
    pub fn check_arity(&self, argc: usize) -> Result<()> {
        if argc < self.min_args || self.max_args.is_some_and(|max| argc > max) {
            return Err(Error::InvalidValue(match self.max_args {
                Some(max) if max == self.min_args => format!(
                    "{} takes exactly {} argument(s), got {}",
                    self.name, self.min_args, argc
                ),
                Some(max) => format!(
                    "{} takes {} to {} arguments, got {}",
                    self.name, self.min_args, max, argc
                ),
                None => format!(
                    "{} takes at least {} argument(s), got {}",
                    self.name, self.min_args, argc
                ),
            }));
        }
        Ok(())
    }
}

/// Per-execution context passed to function evaluation. NOW() is evaluated
/// once per statement execution from this snapshot.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    now: NaiveDateTime,
}

impl FunctionContext {
    pub fn new(now: NaiveDateTime) -> Self {
        FunctionContext { now }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }
}

impl Default for FunctionContext {
    fn default() -> Self {
        FunctionContext {
            now: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Trait for SQL functions.
pub trait Function: Send + Sync {
    /// The function's signature.
    fn signature(&self) -> &FunctionSignature;

    /// Validates argument types and returns the result type.
    fn validate(&self, arg_types: &[DataType]) -> Result<DataType>;

    /// Evaluates the function for one row. For aggregates this is the
    /// row-level contribution; the cross-row folding lives in the
    /// execution-layer accumulators.
    fn evaluate(&self, args: &[Value], ctx: &FunctionContext) -> Result<Value>;
}

/// Registry of available SQL functions, keyed by uppercase name.
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        // Aggregate functions
        count::register(&mut registry);
        sum::register(&mut registry);
        avg::register(&mut registry);
        min::register(&mut registry);
        max::register(&mut registry);

        // Scalar functions
        concat::register(&mut registry);
        substring::register(&mut registry);
        now::register(&mut registry);

        registry
    }

    /// Registers a function under its signature name. Re-registering the
    /// same name replaces the previous entry.
    fn register(&mut self, function: Arc<dyn Function>) {
        let name = function.signature().name.to_string();
        self.functions.insert(name, function);
    }
}

// Global registry. Reads take the read lock and clone the Arc; extension
// registration takes the write lock.
static REGISTRY: LazyLock<RwLock<FunctionRegistry>> =
    LazyLock::new(|| RwLock::new(FunctionRegistry::new()));

/// Looks up a function by name, case-insensitively.
pub fn get_function(name: &str) -> Option<Arc<dyn Function>> {
    REGISTRY
        .read()
        .functions
        .get(&name.to_uppercase())
        .cloned()
}

/// The signature of a function, if registered.
pub fn signature(name: &str) -> Option<FunctionSignature> {
    get_function(name).map(|f| *f.signature())
}

/// Whether the named function is an aggregate.
pub fn is_aggregate(name: &str) -> bool {
    signature(name).is_some_and(|s| s.aggregate)
}

/// Validates function arguments and returns the result type.
pub fn validate_function(name: &str, arg_types: &[DataType]) -> Result<DataType> {
    match get_function(name) {
        Some(function) => function.validate(arg_types),
        None => Err(Error::ExecutionError(format!("Unknown function: {}", name))),
    }
}

/// Evaluates a function for one row.
pub fn evaluate_function(name: &str, args: &[Value], ctx: &FunctionContext) -> Result<Value> {
    match get_function(name) {
        Some(function) => {
            function.signature().check_arity(args.len())?;
            function.evaluate(args, ctx)
        }
        None => Err(Error::ExecutionError(format!("Unknown function: {}", name))),
    }
}

/// Registers an extension function process-wide.
pub fn register(function: Arc<dyn Function>) {
    tracing::debug!(name = function.signature().name, "registering SQL function");
    REGISTRY.write().register(function);
}
