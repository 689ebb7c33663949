//! Query planning: binding statements against the schema
//!
//! The planner validates a parsed statement against a published type
//! definition — resolving every reference, enforcing the aggregation rules,
//! substituting select aliases in HAVING and ORDER BY — and produces an
//! `ExecutionPlan`: output column metadata, the aggregation specification,
//! and the pushdown shape of the backend search request. Plans are cached
//! per compiled statement.

use super::aggregator::AggregateCall;
use super::evaluator::resolve_field;
use super::result::{ColumnMeta, ResultMetadata};
use crate::backend::SearchRequest;
use crate::error::{Error, Result};
use crate::functions;
use crate::parsing::ast::{
    Direction, Expression, LimitClause, Statement, TypeContext,
};
use crate::types::{DataType, Identifier, TypeDefinition, Value};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default capacity for the plan cache.
const DEFAULT_CACHE_CAPACITY: usize = 500;

/// A bound, validated execution plan for a SELECT statement.
pub struct ExecutionPlan {
    statement: Arc<Statement>,
    type_definition: Arc<TypeDefinition>,
    /// Select items with `*` expanded and each paired with its label.
    select_items: Vec<(Expression, String)>,
    /// Whether the query aggregates (GROUP BY present, or any aggregate
    /// call, or a HAVING clause).
    aggregated: bool,
    aggregates: Vec<AggregateCall>,
    group_by: Vec<Expression>,
    /// HAVING condition with select aliases substituted.
    having: Option<Expression>,
    /// ORDER BY with select aliases substituted.
    order_by: Vec<(Expression, Direction)>,
    limit: Option<LimitClause>,
    metadata: ResultMetadata,
}

impl ExecutionPlan {
    pub fn statement(&self) -> &Arc<Statement> {
        &self.statement
    }

    pub fn type_definition(&self) -> &Arc<TypeDefinition> {
        &self.type_definition
    }

    pub fn select_items(&self) -> &[(Expression, String)] {
        &self.select_items
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn aggregates(&self) -> &[AggregateCall] {
        &self.aggregates
    }

    pub fn group_by(&self) -> &[Expression] {
        &self.group_by
    }

    pub fn having(&self) -> Option<&Expression> {
        self.having.as_ref()
    }

    pub fn order_by(&self) -> &[(Expression, Direction)] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<LimitClause> {
        self.limit
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    /// Builds the backend search request for this plan with the given bound
    /// arguments. Sort and paging are pushed down only when the query does
    /// not aggregate; aggregated queries order and page after grouping.
    pub fn search_request(&self, params: Vec<Value>) -> SearchRequest {
        let Statement::Select(select) = self.statement.as_ref();
        let mut request = SearchRequest::scan(self.type_definition.identifier().clone());
        request.filter = select
            .where_clause()
            .map(|where_clause| where_clause.condition.clone());
        request.params = params;
        if !self.aggregated {
            request.sort = self.order_by.clone();
            if let Some(limit) = self.limit {
                request.from = limit.offset.max(0) as usize;
                request.size = Some(limit.row_count.max(0) as usize);
            }
        }
        request
    }
}

/// Resolution context used while typing plan expressions. Parameter types
/// are unknown until execution, so they type as STRING.
struct PlanContext<'a> {
    schema: &'a TypeDefinition,
}

impl TypeContext for PlanContext<'_> {
    fn column_type(&self, _qualifier: Option<&str>, name: &str) -> Result<DataType> {
        let index = resolve_field(self.schema, name)?;
        Ok(self.schema.field_at(index)?.data_type())
    }

    fn parameter_type(&self, _index: usize) -> Result<DataType> {
        Ok(DataType::Str)
    }
}

pub struct Planner;

impl Planner {
    /// Plans a statement against a published type definition.
    pub fn plan(
        statement: Arc<Statement>,
        type_definition: Arc<TypeDefinition>,
    ) -> Result<ExecutionPlan> {
        let Statement::Select(select) = statement.as_ref();
        let schema = type_definition.as_ref();

        let table = &select.from().table;

        // Select aliases, for HAVING and ORDER BY references.
        let mut aliases: Vec<(String, Expression)> = Vec::new();
        for item in &select.select().items {
            if let Some(alias) = &item.alias {
                aliases.push((alias.clone(), item.expression.clone()));
            }
        }

        // Expand `*` into one item per field, in field order.
        let mut select_items: Vec<(Expression, String)> = Vec::new();
        for item in &select.select().items {
            if item.expression == Expression::All {
                for field in schema.fields()? {
                    let name = field.identifier().to_string();
                    select_items.push((Expression::Column(None, name.clone()), name));
                }
            } else {
                let label = item
                    .alias
                    .clone()
                    .unwrap_or_else(|| item.expression.to_string());
                select_items.push((item.expression.clone(), label));
            }
        }

        let group_by = select
            .group_by()
            .map(|clause| clause.expressions.clone())
            .unwrap_or_default();
        let having = select
            .having()
            .map(|clause| substitute_aliases(clause.condition.clone(), &aliases))
            .transpose()?;
        let order_by = select
            .order_by()
            .map(|clause| {
                clause
                    .items
                    .iter()
                    .map(|(expr, direction)| {
                        Ok((substitute_aliases(expr.clone(), &aliases)?, *direction))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        // Every reference must resolve against the schema, and qualifiers
        // must name the queried table or its alias.
        let mut bound: Vec<&Expression> = select_items.iter().map(|(expr, _)| expr).collect();
        if let Some(where_clause) = select.where_clause() {
            bound.push(&where_clause.condition);
        }
        bound.extend(group_by.iter());
        bound.extend(having.iter());
        bound.extend(order_by.iter().map(|(expr, _)| expr));
        for expr in &bound {
            resolve_references(expr, schema, table.name.as_str(), table.alias.as_deref())?;
        }

        // Aggregates may not appear in WHERE; the filter runs per document.
        if let Some(where_clause) = select.where_clause()
            && where_clause.condition.contains_aggregate()
        {
            return Err(Error::InvalidValue(
                "aggregate functions are not allowed in WHERE".into(),
            ));
        }

        // Collect the distinct aggregate calls across the output clauses.
        let mut aggregates: Vec<AggregateCall> = Vec::new();
        let mut collect = |expr: &Expression| {
            expr.walk(&mut |node| {
                if let Some(call) = AggregateCall::from_expression(node)
                    && !aggregates.iter().any(|a| a.expression == call.expression)
                {
                    aggregates.push(call);
                }
                true
            });
        };
        for (expr, _) in &select_items {
            collect(expr);
        }
        if let Some(having) = &having {
            collect(having);
        }
        for (expr, _) in &order_by {
            collect(expr);
        }

        let aggregated = !group_by.is_empty() || !aggregates.is_empty() || having.is_some();
        if aggregated {
            if having.is_some() && group_by.is_empty() && aggregates.is_empty() {
                return Err(Error::InvalidValue(
                    "HAVING requires GROUP BY or aggregate functions".into(),
                ));
            }
            for (expr, _) in &select_items {
                validate_over_groups(expr, &group_by)?;
            }
            if let Some(having) = &having {
                validate_over_groups(having, &group_by)?;
            }
            for (expr, _) in &order_by {
                validate_over_groups(expr, &group_by)?;
            }
        }

        // Output column metadata from the resolved expressions.
        let ctx = PlanContext { schema };
        let columns = select_items
            .iter()
            .map(|(expr, label)| {
                let data_type = item_type(expr, &ctx)?;
                Ok(ColumnMeta::new(
                    Identifier::new(label)?,
                    label.clone(),
                    data_type,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            statement = %statement,
            type_ident = %type_definition.identifier(),
            aggregated,
            "planned statement"
        );

        Ok(ExecutionPlan {
            select_items,
            aggregated,
            aggregates,
            group_by,
            having,
            order_by,
            limit: select.limit().copied(),
            metadata: ResultMetadata::new(columns),
            statement,
            type_definition,
        })
    }
}

/// Replaces unqualified references that name a select alias with the
/// aliased expression.
fn substitute_aliases(
    mut expr: Expression,
    aliases: &[(String, Expression)],
) -> Result<Expression> {
    expr.transform(&mut |node| {
        if let Expression::Column(None, name) = node
            && let Some((_, target)) = aliases.iter().find(|(alias, _)| alias.as_str() == name.as_str())
        {
            *node = target.clone();
        }
        Ok(())
    })?;
    Ok(expr)
}

/// Checks that every reference in the expression resolves against the
/// schema and that qualifiers name the queried table.
fn resolve_references(
    expr: &Expression,
    schema: &TypeDefinition,
    table: &str,
    alias: Option<&str>,
) -> Result<()> {
    let mut result = Ok(());
    expr.walk(&mut |node| {
        if let Expression::Column(qualifier, name) = node {
            if let Some(qualifier) = qualifier
                && !qualifier.eq_ignore_ascii_case(table)
                && !alias.is_some_and(|a| qualifier.eq_ignore_ascii_case(a))
            {
                result = Err(Error::FieldNotExists(format!("{}.{}", qualifier, name)));
                return false;
            }
            if let Err(err) = resolve_field(schema, name) {
                result = Err(err);
                return false;
            }
        }
        true
    });
    result
}

/// In an aggregated query, output expressions may only combine group-by
/// expressions, aggregate calls, literals, and parameters.
fn validate_over_groups(expr: &Expression, group_by: &[Expression]) -> Result<()> {
    if group_by.contains(expr) {
        return Ok(());
    }
    match expr {
        Expression::Literal(_) | Expression::Parameter(_) => Ok(()),
        Expression::Function(name, _) if functions::is_aggregate(name) => Ok(()),
        Expression::Function(_, args) => {
            args.iter().try_for_each(|arg| validate_over_groups(arg, group_by))
        }
        Expression::Operator(_) => expr
            .operands()
            .into_iter()
            .try_for_each(|operand| validate_over_groups(operand, group_by)),
        other => Err(Error::InvalidValue(format!(
            "expression {} must appear in the GROUP BY clause or be aggregated",
            other
        ))),
    }
}

/// The output type of a select item. NULL literals have no inherent type
/// and surface as STRING.
fn item_type(expr: &Expression, ctx: &PlanContext) -> Result<DataType> {
    match expr.result_type(ctx) {
        Err(Error::UnsupportedDataType(_)) => Ok(DataType::Str),
        other => other,
    }
}

/// Cache of execution plans, keyed by the identity of the compiled
/// statement and the resolved type definition. Entries are reclaimed by
/// `sweep()` once the client has dropped the compiled statement.
pub struct PlanCache {
    cache: Mutex<LruCache<(usize, usize), Arc<ExecutionPlan>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PlanCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached plan for the statement/type pair, planning and
    /// inserting on a miss. Racing inserts are last-write-wins.
    pub fn get_or_plan(
        &self,
        statement: &Arc<Statement>,
        type_definition: &Arc<TypeDefinition>,
    ) -> Result<Arc<ExecutionPlan>> {
        let key = (
            Arc::as_ptr(statement) as usize,
            Arc::as_ptr(type_definition) as *const () as usize,
        );
        if let Some(plan) = self.cache.lock().get(&key) {
            return Ok(plan.clone());
        }
        let plan = Arc::new(Planner::plan(statement.clone(), type_definition.clone())?);
        self.cache.lock().put(key, plan.clone());
        Ok(plan)
    }

    /// Drops plans whose compiled statement is no longer referenced outside
    /// the cache. The key stays valid while the entry lives because the
    /// plan itself keeps the statement alive.
    pub fn sweep(&self) {
        let mut cache = self.cache.lock();
        let dead: Vec<(usize, usize)> = cache
            .iter()
            .filter(|(_, plan)| Arc::strong_count(plan.statement()) == 1)
            .map(|(key, _)| *key)
            .collect();
        if !dead.is_empty() {
            tracing::debug!(count = dead.len(), "sweeping unreferenced plans");
        }
        for key in dead {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_sql;
    use crate::types::DataType;

    fn student() -> Arc<TypeDefinition> {
        let def = TypeDefinition::new("student").unwrap();
        def.define_field("id", DataType::Int).unwrap();
        def.define_field("name", DataType::Str).unwrap();
        def.define_field("class", DataType::Str).unwrap();
        def.define_field("score", DataType::Double).unwrap();
        def.as_primary_field("id").unwrap();
        def.publish().unwrap();
        Arc::new(def)
    }

    fn plan(sql: &str) -> Result<ExecutionPlan> {
        Planner::plan(Arc::new(parse_sql(sql)?), student())
    }

    #[test]
    fn expands_star_into_field_columns() {
        let plan = plan("SELECT * FROM student").unwrap();
        assert_eq!(plan.select_items().len(), 4);
        assert_eq!(plan.metadata().column_count(), 4);
        assert_eq!(plan.metadata().column(0).unwrap().label(), "id");
        assert_eq!(
            plan.metadata().column(3).unwrap().data_type(),
            DataType::Double
        );
        assert!(!plan.is_aggregated());
    }

    #[test]
    fn resolves_references_case_insensitively() {
        assert!(plan("SELECT ID, Name FROM student WHERE SCORE > 60").is_ok());
        assert!(matches!(
            plan("SELECT missing FROM student"),
            Err(Error::FieldNotExists(_))
        ));
        // Qualifiers must name the table or its alias.
        assert!(plan("SELECT student.id FROM student").is_ok());
        assert!(plan("SELECT s.id FROM student s").is_ok());
        assert!(matches!(
            plan("SELECT t.id FROM student s"),
            Err(Error::FieldNotExists(_))
        ));
    }

    #[test]
    fn types_computed_columns() {
        let plan = plan("SELECT score + 1, concat(name, '!') tag FROM student").unwrap();
        assert_eq!(
            plan.metadata().column(0).unwrap().data_type(),
            DataType::Double
        );
        assert_eq!(plan.metadata().column(1).unwrap().label(), "tag");
        assert_eq!(
            plan.metadata().column(1).unwrap().data_type(),
            DataType::Str
        );
    }

    #[test]
    fn aggregation_rules() {
        let plan =
            plan("SELECT class, max(score) max_score FROM student GROUP BY class").unwrap();
        assert!(plan.is_aggregated());
        assert_eq!(plan.aggregates().len(), 1);

        // Non-grouped column in an aggregated query is rejected.
        assert!(matches!(
            super::Planner::plan(
                Arc::new(parse_sql("SELECT name FROM student GROUP BY class").unwrap()),
                student()
            ),
            Err(Error::InvalidValue(_))
        ));

        // Aggregates in WHERE are rejected.
        assert!(matches!(
            super::Planner::plan(
                Arc::new(parse_sql("SELECT id FROM student WHERE max(score) > 1").unwrap()),
                student()
            ),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn having_resolves_select_aliases() {
        let plan = plan(
            "SELECT class, max(score) max_score FROM student \
             GROUP BY class HAVING max_score >= 95",
        )
        .unwrap();
        // The alias reference was substituted with the aggregate call.
        assert!(plan.having().unwrap().contains_aggregate());
    }

    #[test]
    fn pushdown_only_without_aggregation() {
        let plan = plan("SELECT id FROM student ORDER BY score DESC LIMIT 5").unwrap();
        let request = plan.search_request(Vec::new());
        assert_eq!(request.sort.len(), 1);
        assert_eq!(request.size, Some(5));

        let plan = plan_aggregated();
        let request = plan.search_request(Vec::new());
        assert!(request.sort.is_empty());
        assert_eq!(request.size, None);
    }

    fn plan_aggregated() -> ExecutionPlan {
        plan("SELECT class, count(*) FROM student GROUP BY class ORDER BY class LIMIT 3").unwrap()
    }

    #[test]
    fn plan_cache_is_keyed_by_statement_identity() {
        let cache = PlanCache::new();
        let statement = Arc::new(parse_sql("SELECT id FROM student").unwrap());
        let schema = student();
        let first = cache.get_or_plan(&statement, &schema).unwrap();
        let second = cache.get_or_plan(&statement, &schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // A structurally equal but distinct statement plans separately.
        let other = Arc::new(parse_sql("SELECT id FROM student").unwrap());
        let third = cache.get_or_plan(&other, &schema).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);

        // Sweeping reclaims entries once the statements are dropped.
        drop(statement);
        drop(other);
        drop(first);
        drop(second);
        drop(third);
        cache.sweep();
        assert!(cache.is_empty());
    }
}
