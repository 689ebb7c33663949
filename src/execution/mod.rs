//! Execution: planning, dispatch, evaluation, and the session environment

pub mod aggregator;
pub mod engine;
pub mod environment;
pub mod evaluator;
pub mod executor;
pub mod plan;
pub mod result;
pub mod sweeper;

pub use engine::ExecuteEngine;
pub use environment::{
    DEFAULT_METADATA_CACHE_TTL_MS, ExecutionEnvironment, METADATA_CACHE_TTL_PROPERTY,
};
pub use executor::{SelectExecutor, StatementExecutor};
pub use plan::{ExecutionPlan, PlanCache, Planner};
pub use result::{ColumnMeta, ResultMetadata, ResultSet, Rows};
pub use sweeper::CacheSweeper;
