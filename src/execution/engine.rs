//! Statement execution dispatch
//!
//! `ExecuteEngine` maps (statement kind, result type) pairs to registered
//! executor singletons. Lookup is by exact pair, not subtype-polymorphic; a
//! missing pair is an engine error and a duplicate registration is a fatal
//! configuration error at engine construction.

use super::environment::ExecutionEnvironment;
use super::executor::{SelectExecutor, StatementExecutor};
use super::result::Rows;
use crate::backend::SearchBackend;
use crate::error::{Error, Result};
use crate::parsing::ast::{Statement, StatementKind};
use crate::types::Value;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

struct Registration {
    executor: Arc<dyn StatementExecutor>,
    result_name: &'static str,
}

/// The typed dispatch table from (statement kind, result type) to executor.
pub struct ExecuteEngine {
    executors: HashMap<(StatementKind, TypeId), Registration>,
}

impl ExecuteEngine {
    /// An empty engine with no registered executors.
    pub fn new() -> Self {
        ExecuteEngine {
            executors: HashMap::new(),
        }
    }

    /// An engine with the built-in executors registered.
    pub fn with_default_executors() -> Result<Self> {
        let mut engine = Self::new();
        engine.register::<Rows>(StatementKind::Select, Arc::new(SelectExecutor::new()))?;
        Ok(engine)
    }

    /// Registers an executor for a (statement kind, result type) pair. A
    /// second registration for the same pair is a fatal configuration
    /// error: the process must not continue with an ambiguous registry.
    pub fn register<R: Any>(
        &mut self,
        kind: StatementKind,
        executor: Arc<dyn StatementExecutor>,
    ) -> Result<()> {
        let key = (kind, TypeId::of::<R>());
        if self.executors.contains_key(&key) {
            return Err(Error::DuplicateExecutor {
                statement: kind.to_string(),
                result: type_name::<R>().to_string(),
            });
        }
        self.executors.insert(
            key,
            Registration {
                executor,
                result_name: type_name::<R>(),
            },
        );
        Ok(())
    }

    /// Executes a statement through the executor registered for its kind
    /// and the requested result type.
    pub fn execute_statement<R: Any>(
        &self,
        backend: &Arc<dyn SearchBackend>,
        environment: &ExecutionEnvironment,
        statement: Arc<Statement>,
        arguments: &[Value],
    ) -> Result<R> {
        let kind = statement.kind();
        let registration = self
            .executors
            .get(&(kind, TypeId::of::<R>()))
            .ok_or_else(|| Error::NoExecutor {
                statement: kind.to_string(),
                result: type_name::<R>().to_string(),
            })?;
        tracing::debug!(statement = %kind, result = registration.result_name, "dispatching statement");
        let result = registration
            .executor
            .execute(backend, environment, statement, arguments)?;
        result.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
            Error::ExecutionError(format!(
                "executor for {} returned a value of the wrong result type",
                kind
            ))
        })
    }

    /// Sweeps the caches owned by registered executors.
    pub fn sweep_caches(&self) {
        for registration in self.executors.values() {
            registration.executor.sweep_caches();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn environment() -> (Arc<dyn SearchBackend>, ExecutionEnvironment) {
        let backend: Arc<dyn SearchBackend> = Arc::new(MemoryBackend::new());
        let index = crate::types::IndexDefinition::new("school", 1, 0).unwrap();
        backend.create_index(&index).unwrap();
        let environment =
            ExecutionEnvironment::new(backend.clone(), "school", Default::default()).unwrap();
        (backend, environment)
    }

    #[test]
    fn missing_executor_is_a_dispatch_error() {
        let engine = ExecuteEngine::new();
        let (backend, environment) = environment();
        let statement = Arc::new(crate::parsing::parse_sql("SELECT * FROM student").unwrap());
        let err = engine
            .execute_statement::<Rows>(&backend, &environment, statement, &[])
            .unwrap_err();
        let Error::NoExecutor { statement, result } = err else {
            panic!("expected NoExecutor, got {:?}", err);
        };
        assert_eq!(statement, "SelectStatement");
        assert!(result.contains("Rows"));
    }

    #[test]
    fn duplicate_registration_is_fatal() {
        let mut engine = ExecuteEngine::with_default_executors().unwrap();
        let err = engine
            .register::<Rows>(StatementKind::Select, Arc::new(SelectExecutor::new()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateExecutor { .. }));
    }

    #[test]
    fn dispatch_is_exact_on_result_type() {
        let engine = ExecuteEngine::with_default_executors().unwrap();
        let (backend, environment) = environment();
        let statement = Arc::new(crate::parsing::parse_sql("SELECT * FROM student").unwrap());
        // Registered for Rows, not for String.
        let err = engine
            .execute_statement::<String>(&backend, &environment, statement, &[])
            .unwrap_err();
        assert!(matches!(err, Error::NoExecutor { .. }));
    }
}
