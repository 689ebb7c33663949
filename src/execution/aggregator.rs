//! Aggregation execution for GROUP BY queries
//!
//! Groups rows by key and folds aggregate function calls through per-group
//! accumulators. With no GROUP BY, a single global group is produced.

use super::evaluator::{self, Environment, compare};
use crate::error::{Error, Result};
use crate::parsing::ast::Expression;
use crate::types::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// One aggregate call extracted from the statement: the function name and
/// its argument expression (`None` for COUNT(*)).
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub expression: Expression,
    pub function: String,
    pub argument: Option<Expression>,
}

impl AggregateCall {
    /// Extracts the aggregate call from a Function expression, if it is one.
    pub fn from_expression(expr: &Expression) -> Option<Self> {
        let Expression::Function(name, args) = expr else {
            return None;
        };
        if !crate::functions::is_aggregate(name) {
            return None;
        }
        let argument = match args.first() {
            Some(Expression::All) | None => None,
            Some(arg) => Some(arg.clone()),
        };
        Some(AggregateCall {
            expression: expr.clone(),
            function: name.to_uppercase(),
            argument,
        })
    }
}

/// Groups rows by key expressions and accumulates aggregate values.
pub struct Aggregator {
    group_by: Vec<Expression>,
    aggregates: Vec<AggregateCall>,
    buckets: HashMap<Vec<Value>, Vec<Box<dyn Accumulator>>>,
}

impl Aggregator {
    pub fn new(group_by: Vec<Expression>, aggregates: Vec<AggregateCall>) -> Self {
        Aggregator {
            group_by,
            aggregates,
            buckets: HashMap::new(),
        }
    }

    /// Adds a row: evaluates the group key and feeds each accumulator.
    pub fn add(&mut self, env: &Environment) -> Result<()> {
        let key = self
            .group_by
            .iter()
            .map(|expr| evaluator::evaluate(expr, env))
            .collect::<Result<Vec<_>>>()?;

        let accumulators = match self.buckets.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let fresh = self
                    .aggregates
                    .iter()
                    .map(create_accumulator)
                    .collect::<Result<Vec<_>>>()?;
                entry.insert(fresh)
            }
        };

        for (call, accumulator) in self.aggregates.iter().zip(accumulators.iter_mut()) {
            let value = match &call.argument {
                Some(arg) => evaluator::evaluate(arg, env)?,
                // COUNT(*): every row counts.
                None => Value::Bool(true),
            };
            accumulator.add(value)?;
        }
        Ok(())
    }

    /// Finalizes into one group per key: the key values plus, per group, the
    /// value of every aggregate call. Groups are ordered by key for
    /// deterministic output; a statement-level ORDER BY reorders later.
    /// With no grouping and at least one aggregate, a single global group is
    /// emitted even for zero input rows.
    pub fn finalize(self) -> Result<Vec<Group>> {
        if self.buckets.is_empty() && self.group_by.is_empty() && !self.aggregates.is_empty() {
            let accumulators = self
                .aggregates
                .iter()
                .map(|call| create_accumulator(call))
                .collect::<Result<Vec<_>>>()?;
            return Ok(vec![Group::new(
                &self.aggregates,
                &self.group_by,
                Vec::new(),
                accumulators,
            )?]);
        }

        let mut groups: Vec<(Vec<Value>, Vec<Box<dyn Accumulator>>)> =
            self.buckets.into_iter().collect();
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));
        groups
            .into_iter()
            .map(|(key, accumulators)| {
                Group::new(&self.aggregates, &self.group_by, key, accumulators)
            })
            .collect()
    }
}

/// One output group: its key values and the finalized aggregate values,
/// exposed as an override map from expression to value for evaluating
/// select items, HAVING, and residual ORDER BY.
#[derive(Debug)]
pub struct Group {
    overrides: HashMap<Expression, Value>,
}

impl Group {
    fn new(
        aggregates: &[AggregateCall],
        group_by: &[Expression],
        key: Vec<Value>,
        accumulators: Vec<Box<dyn Accumulator>>,
    ) -> Result<Self> {
        let mut overrides = HashMap::new();
        for (expr, value) in group_by.iter().zip(key) {
            overrides.insert(expr.clone(), value);
        }
        for (call, accumulator) in aggregates.iter().zip(accumulators) {
            overrides.insert(call.expression.clone(), accumulator.finalize()?);
        }
        Ok(Group { overrides })
    }

    pub fn insert(&mut self, expr: Expression, value: Value) {
        self.overrides.insert(expr, value);
    }

    pub fn overrides(&self) -> &HashMap<Expression, Value> {
        &self.overrides
    }
}

/// Folds one aggregate over the rows of a group.
trait Accumulator: Send {
    fn add(&mut self, value: Value) -> Result<()>;
    fn finalize(self: Box<Self>) -> Result<Value>;
}

fn create_accumulator(call: &AggregateCall) -> Result<Box<dyn Accumulator>> {
    Ok(match call.function.as_str() {
        "COUNT" => Box::new(Count {
            count: 0,
            count_all: call.argument.is_none(),
        }),
        "SUM" => Box::new(Sum { sum: None }),
        "AVG" => Box::new(Avg { sum: 0.0, count: 0 }),
        "MIN" => Box::new(Extreme {
            best: None,
            keep: Ordering::Less,
        }),
        "MAX" => Box::new(Extreme {
            best: None,
            keep: Ordering::Greater,
        }),
        other => {
            return Err(Error::ExecutionError(format!(
                "no accumulator for aggregate function {}",
                other
            )));
        }
    })
}

struct Count {
    count: i64,
    count_all: bool,
}

impl Accumulator for Count {
    fn add(&mut self, value: Value) -> Result<()> {
        if self.count_all || !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(Value::Long(self.count))
    }
}

struct Sum {
    sum: Option<Value>,
}

impl Accumulator for Sum {
    fn add(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.sum = Some(match self.sum.take() {
            None => value,
            Some(sum) if sum.is_integer() && value.is_integer() => {
                Value::Long(sum.to_long()? + value.to_long()?)
            }
            Some(sum) => Value::Double(sum.to_double()? + value.to_double()?),
        });
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.sum.unwrap_or(Value::Null))
    }
}

struct Avg {
    sum: f64,
    count: i64,
}

impl Accumulator for Avg {
    fn add(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.sum += value.to_double()?;
        self.count += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        if self.count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Double(self.sum / self.count as f64))
    }
}

struct Extreme {
    best: Option<Value>,
    keep: Ordering,
}

impl Accumulator for Extreme {
    fn add(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.best = Some(match self.best.take() {
            None => value,
            Some(best) => {
                if compare(&value, &best)? == self.keep {
                    value
                } else {
                    best
                }
            }
        });
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.best.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionContext;
    use crate::parsing::Parser;

    fn call(sql: &str) -> AggregateCall {
        AggregateCall::from_expression(&Parser::parse_expr(sql).unwrap()).unwrap()
    }

    #[test]
    fn recognizes_aggregate_calls() {
        assert!(AggregateCall::from_expression(&Parser::parse_expr("count(*)").unwrap()).is_some());
        assert!(
            AggregateCall::from_expression(&Parser::parse_expr("concat('a')").unwrap()).is_none()
        );
        assert!(call("count(*)").argument.is_none());
        assert!(call("sum(score)").argument.is_some());
    }

    #[test]
    fn folds_aggregates_over_groups() {
        // Rows of (class, score) grouped by class.
        let group_by = vec![Parser::parse_expr("class").unwrap()];
        let aggregates = vec![call("count(*)"), call("sum(score)"), call("avg(score)")];
        let mut aggregator = Aggregator::new(group_by, aggregates);

        let schema = {
            let def = crate::types::TypeDefinition::new("exam").unwrap();
            def.define_field("class", crate::types::DataType::Str)
                .unwrap();
            def.define_field("score", crate::types::DataType::Int)
                .unwrap();
            def.as_primary_field("class").unwrap();
            def.publish().unwrap();
            def
        };
        let ctx = FunctionContext::default();
        let rows = vec![
            vec![Value::Str("a".into()), Value::Int(90)],
            vec![Value::Str("a".into()), Value::Int(80)],
            vec![Value::Str("b".into()), Value::Int(70)],
        ];
        for row in &rows {
            let env = Environment::new(Some(row), Some(&schema), &[], &ctx);
            aggregator.add(&env).unwrap();
        }

        let groups = aggregator.finalize().unwrap();
        assert_eq!(groups.len(), 2);
        let count = Parser::parse_expr("count(*)").unwrap();
        let sum = Parser::parse_expr("sum(score)").unwrap();
        assert_eq!(groups[0].overrides()[&count], Value::Long(2));
        assert_eq!(groups[0].overrides()[&sum], Value::Long(170));
        assert_eq!(groups[1].overrides()[&count], Value::Long(1));
    }

    #[test]
    fn global_aggregation_emits_one_group_even_for_no_rows() {
        let aggregator = Aggregator::new(Vec::new(), vec![call("count(*)"), call("max(score)")]);
        let groups = aggregator.finalize().unwrap();
        assert_eq!(groups.len(), 1);
        let count = Parser::parse_expr("count(*)").unwrap();
        let max = Parser::parse_expr("max(score)").unwrap();
        assert_eq!(groups[0].overrides()[&count], Value::Long(0));
        assert_eq!(groups[0].overrides()[&max], Value::Null);
    }

    #[test]
    fn min_and_max_track_extremes() {
        let mut aggregator = Aggregator::new(Vec::new(), vec![call("min(score)"), call("max(score)")]);
        let schema = {
            let def = crate::types::TypeDefinition::new("t").unwrap();
            def.define_field("score", crate::types::DataType::Int).unwrap();
            def.as_primary_field("score").unwrap();
            def.publish().unwrap();
            def
        };
        let ctx = FunctionContext::default();
        for score in [55, 99, 72] {
            let row = vec![Value::Int(score)];
            let env = Environment::new(Some(&row), Some(&schema), &[], &ctx);
            aggregator.add(&env).unwrap();
        }
        let groups = aggregator.finalize().unwrap();
        let min = Parser::parse_expr("min(score)").unwrap();
        let max = Parser::parse_expr("max(score)").unwrap();
        assert_eq!(groups[0].overrides()[&min], Value::Int(55));
        assert_eq!(groups[0].overrides()[&max], Value::Int(99));
    }
}
