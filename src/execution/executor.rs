//! Statement executors
//!
//! An executor binds a compiled statement against the schema and drives the
//! backend to produce a result. Executors are stateless singletons apart
//! from their plan cache; they never mutate the statement.

use super::aggregator::Aggregator;
use super::environment::ExecutionEnvironment;
use super::evaluator::{self, Environment};
use super::plan::PlanCache;
use super::result::Rows;
use crate::backend::SearchBackend;
use crate::error::{Error, Result};
use crate::functions::FunctionContext;
use crate::parsing::ast::{Direction, Statement};
use crate::types::{Row, Value};
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

/// The contract every registered executor fulfils: given a backend handle,
/// a compiled statement, the session environment, and bound argument
/// values, produce a result of the registered result type.
pub trait StatementExecutor: Send + Sync {
    fn execute(
        &self,
        backend: &Arc<dyn SearchBackend>,
        environment: &ExecutionEnvironment,
        statement: Arc<Statement>,
        arguments: &[Value],
    ) -> Result<Box<dyn Any>>;

    /// Reclaims executor-owned caches. Driven by the cache sweeper.
    fn sweep_caches(&self) {}
}

/// Executes SELECT statements into `Rows`.
pub struct SelectExecutor {
    plans: PlanCache,
}

impl SelectExecutor {
    pub fn new() -> Self {
        SelectExecutor {
            plans: PlanCache::new(),
        }
    }

    fn execute_select(
        &self,
        backend: &Arc<dyn SearchBackend>,
        environment: &ExecutionEnvironment,
        statement: Arc<Statement>,
        arguments: &[Value],
    ) -> Result<Rows> {
        let expected = statement.parameter_count();
        if arguments.len() != expected {
            return Err(Error::InvalidValue(format!(
                "statement takes {} argument(s), got {}",
                expected,
                arguments.len()
            )));
        }

        let Statement::Select(select) = statement.as_ref();
        let type_definition = environment.type_definition(&select.from().table.name)?;
        let plan = self.plans.get_or_plan(&statement, &type_definition)?;

        let request = plan.search_request(arguments.to_vec());
        let documents = backend.search(environment.index(), &request)?.into_rows();

        let ctx = FunctionContext::default();
        let schema = plan.type_definition().as_ref();

        let rows = if plan.is_aggregated() {
            let mut aggregator =
                Aggregator::new(plan.group_by().to_vec(), plan.aggregates().to_vec());
            for row in &documents {
                let env = Environment::new(Some(row), Some(schema), arguments, &ctx);
                aggregator.add(&env)?;
            }

            let mut output: Vec<(Vec<Value>, Row)> = Vec::new();
            for group in aggregator.finalize()? {
                let env = Environment::new(None, Some(schema), arguments, &ctx)
                    .with_overrides(group.overrides());

                if let Some(having) = plan.having()
                    && !evaluator::is_truthy(&evaluator::evaluate(having, &env)?)
                {
                    continue;
                }

                let row = plan
                    .select_items()
                    .iter()
                    .map(|(expr, _)| evaluator::evaluate(expr, &env))
                    .collect::<Result<Row>>()?;
                let sort_keys = plan
                    .order_by()
                    .iter()
                    .map(|(expr, _)| evaluator::evaluate(expr, &env))
                    .collect::<Result<Vec<_>>>()?;
                output.push((sort_keys, row));
            }

            if !plan.order_by().is_empty() {
                output.sort_by(|(a, _), (b, _)| {
                    for ((av, bv), (_, direction)) in a.iter().zip(b).zip(plan.order_by()) {
                        let ordering = match direction {
                            Direction::Asc => av.cmp(bv),
                            Direction::Desc => av.cmp(bv).reverse(),
                        };
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                    Ordering::Equal
                });
            }

            let mut rows: Vec<Row> = output.into_iter().map(|(_, row)| row).collect();
            // Ordering and paging were not pushed down for aggregated
            // queries; apply the offset and row count here.
            if let Some(limit) = plan.limit() {
                let from = (limit.offset.max(0) as usize).min(rows.len());
                let until = (from + limit.row_count.max(0) as usize).min(rows.len());
                rows = rows[from..until].to_vec();
            }
            rows
        } else {
            documents
                .iter()
                .map(|row| {
                    let env = Environment::new(Some(row), Some(schema), arguments, &ctx);
                    plan.select_items()
                        .iter()
                        .map(|(expr, _)| evaluator::evaluate(expr, &env))
                        .collect::<Result<Row>>()
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Rows::new(plan.metadata().clone(), rows))
    }
}

impl Default for SelectExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementExecutor for SelectExecutor {
    fn execute(
        &self,
        backend: &Arc<dyn SearchBackend>,
        environment: &ExecutionEnvironment,
        statement: Arc<Statement>,
        arguments: &[Value],
    ) -> Result<Box<dyn Any>> {
        let rows = self.execute_select(backend, environment, statement, arguments)?;
        Ok(Box::new(rows))
    }

    fn sweep_caches(&self) {
        self.plans.sweep();
    }
}
