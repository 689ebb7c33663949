//! Expression evaluation over rows
//!
//! Evaluates bound expressions against a row of field values, with SQL NULL
//! semantics: comparisons and arithmetic over NULL yield NULL, and three
//! valued logic applies to AND/OR/NOT.

use crate::error::{Error, Result};
use crate::functions::{self, FunctionContext};
use crate::parsing::ast::{Expression, Literal, Operator};
use crate::types::schema::TypeDefinition;
use crate::types::{Row, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Everything an expression may need to resolve during evaluation.
pub struct Environment<'a> {
    /// The current row, in the schema's field order.
    pub row: Option<&'a Row>,
    /// The type whose fields column references resolve against.
    pub schema: Option<&'a TypeDefinition>,
    /// Bound argument values for `?` placeholders.
    pub params: &'a [Value],
    /// Precomputed values for whole subexpressions. Consulted before any
    /// other resolution; this is how aggregate results and group keys are
    /// injected when evaluating HAVING and residual ORDER BY.
    pub overrides: Option<&'a HashMap<Expression, Value>>,
    pub ctx: &'a FunctionContext,
}

impl<'a> Environment<'a> {
    pub fn new(
        row: Option<&'a Row>,
        schema: Option<&'a TypeDefinition>,
        params: &'a [Value],
        ctx: &'a FunctionContext,
    ) -> Self {
        Environment {
            row,
            schema,
            params,
            overrides: None,
            ctx,
        }
    }

    pub fn with_overrides(mut self, overrides: &'a HashMap<Expression, Value>) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Resolves a field index by reference name, case-insensitively.
pub fn resolve_field(schema: &TypeDefinition, name: &str) -> Result<usize> {
    let fields = schema.fields()?;
    fields
        .iter()
        .position(|f| f.identifier().as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::FieldNotExists(name.to_string()))
}

/// Whether a filter result lets a row through: only a true boolean does.
pub fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

/// Evaluates an expression in the given environment.
pub fn evaluate(expr: &Expression, env: &Environment) -> Result<Value> {
    if let Some(overrides) = env.overrides
        && let Some(value) = overrides.get(expr)
    {
        return Ok(value.clone());
    }

    match expr {
        Expression::All => Err(Error::ExecutionError("* cannot be evaluated".into())),

        Expression::Column(_, name) => {
            let schema = env
                .schema
                .ok_or_else(|| Error::ExecutionError("no schema to resolve columns".into()))?;
            let row = env
                .row
                .ok_or_else(|| Error::ExecutionError("no row to resolve columns".into()))?;
            let index = resolve_field(schema, name)?;
            Ok(row[index].clone())
        }

        Expression::Literal(literal) => Ok(match literal {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Integer(v) => Value::Int(*v),
            Literal::Long(v) => Value::Long(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::String(s) => Value::Str(s.clone()),
        }),

        Expression::Parameter(index) => env.params.get(*index).cloned().ok_or_else(|| {
            Error::InvalidValue(format!("no value bound for parameter {}", index))
        }),

        Expression::Function(name, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, env))
                .collect::<Result<Vec<_>>>()?;
            functions::evaluate_function(name, &args, env.ctx)
        }

        Expression::Operator(op) => evaluate_operator(op, env),
    }
}

fn evaluate_operator(op: &Operator, env: &Environment) -> Result<Value> {
    use Operator::*;
    match op {
        And(lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            match (bool_or_null(&lhs)?, bool_or_null(&rhs)?) {
                (Some(false), _) | (_, Some(false)) => Ok(Value::Bool(false)),
                (Some(true), Some(true)) => Ok(Value::Bool(true)),
                _ => Ok(Value::Null),
            }
        }
        Or(lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            match (bool_or_null(&lhs)?, bool_or_null(&rhs)?) {
                (Some(true), _) | (_, Some(true)) => Ok(Value::Bool(true)),
                (Some(false), Some(false)) => Ok(Value::Bool(false)),
                _ => Ok(Value::Null),
            }
        }
        Not(inner) => match bool_or_null(&evaluate(inner, env)?)? {
            Some(b) => Ok(Value::Bool(!b)),
            None => Ok(Value::Null),
        },

        Equal(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o == Ordering::Equal),
        NotEqual(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o != Ordering::Equal),
        GreaterThan(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o == Ordering::Greater),
        GreaterThanOrEqual(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o != Ordering::Less),
        LessThan(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o == Ordering::Less),
        LessThanOrEqual(lhs, rhs) => compare_bool(env, lhs, rhs, |o| o != Ordering::Greater),

        Add(lhs, rhs) => arithmetic(env, lhs, rhs, i64::checked_add, |a, b| a + b, "+"),
        Subtract(lhs, rhs) => arithmetic(env, lhs, rhs, i64::checked_sub, |a, b| a - b, "-"),
        Multiply(lhs, rhs) => arithmetic(env, lhs, rhs, i64::checked_mul, |a, b| a * b, "*"),
        Divide(lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            if lhs.is_integer() && rhs.is_integer() {
                let divisor = rhs.to_long()?;
                if divisor == 0 {
                    return Err(Error::ExecutionError("division by zero".into()));
                }
                return Ok(Value::Long(lhs.to_long()? / divisor));
            }
            let divisor = rhs.to_double()?;
            if divisor == 0.0 {
                return Err(Error::ExecutionError("division by zero".into()));
            }
            Ok(Value::Double(lhs.to_double()? / divisor))
        }
        Identity(inner) => {
            let value = evaluate(inner, env)?;
            if !value.is_null() && !value.is_numeric() {
                return Err(Error::TypeMismatch {
                    expected: "numeric".into(),
                    found: format!("{:?}", value),
                });
            }
            Ok(value)
        }
        Negate(inner) => match evaluate(inner, env)? {
            Value::Null => Ok(Value::Null),
            Value::Int(v) => Ok(Value::Int(-v)),
            Value::Long(v) => Ok(Value::Long(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Double(v) => Ok(Value::Double(-v)),
            other => Err(Error::TypeMismatch {
                expected: "numeric".into(),
                found: format!("{:?}", other),
            }),
        },

        Like(lhs, rhs) => {
            let value = evaluate(lhs, env)?;
            let pattern = evaluate(rhs, env)?;
            if value.is_null() || pattern.is_null() {
                return Ok(Value::Null);
            }
            match (&value, &pattern) {
                (Value::Str(value), Value::Str(pattern)) => {
                    Ok(Value::Bool(like_match(value, pattern)))
                }
                _ => Err(Error::TypeMismatch {
                    expected: "STRING".into(),
                    found: format!("{:?} LIKE {:?}", value, pattern),
                }),
            }
        }

        Is { expr, negated } => {
            let is_null = evaluate(expr, env)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }

        Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = evaluate(expr, env)?;
            let low = evaluate(low, env)?;
            let high = evaluate(high, env)?;
            if value.is_null() || low.is_null() || high.is_null() {
                return Ok(Value::Null);
            }
            let within = compare(&value, &low)? != Ordering::Less
                && compare(&value, &high)? != Ordering::Greater;
            Ok(Value::Bool(within != *negated))
        }

        InList {
            expr,
            list,
            negated,
        } => {
            let value = evaluate(expr, env)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let item = evaluate(item, env)?;
                if item.is_null() {
                    saw_null = true;
                    continue;
                }
                if compare(&value, &item)? == Ordering::Equal {
                    return Ok(Value::Bool(!negated));
                }
            }
            if saw_null {
                return Ok(Value::Null);
            }
            Ok(Value::Bool(*negated))
        }
    }
}

fn bool_or_null(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(Error::TypeMismatch {
            expected: "BOOLEAN".into(),
            found: format!("{:?}", other),
        }),
    }
}

/// Compares two non-null values of comparable kinds.
pub fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    let comparable = match (lhs, rhs) {
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (Value::Str(_), Value::Str(_)) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::Date(_), Value::Date(_)) => true,
        _ => false,
    };
    if !comparable {
        return Err(Error::TypeMismatch {
            expected: format!("{:?}", lhs),
            found: format!("{:?}", rhs),
        });
    }
    Ok(lhs.cmp(rhs))
}

fn compare_bool(
    env: &Environment,
    lhs: &Expression,
    rhs: &Expression,
    test: impl Fn(Ordering) -> bool,
) -> Result<Value> {
    let lhs = evaluate(lhs, env)?;
    let rhs = evaluate(rhs, env)?;
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(test(compare(&lhs, &rhs)?)))
}

fn arithmetic(
    env: &Environment,
    lhs: &Expression,
    rhs: &Expression,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
    symbol: &str,
) -> Result<Value> {
    let lhs = evaluate(lhs, env)?;
    let rhs = evaluate(rhs, env)?;
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if lhs.is_integer() && rhs.is_integer() {
        return int_op(lhs.to_long()?, rhs.to_long()?)
            .map(Value::Long)
            .ok_or_else(|| {
                Error::ExecutionError(format!("integer overflow in {} {} {}", lhs, symbol, rhs))
            });
    }
    Ok(Value::Double(float_op(lhs.to_double()?, rhs.to_double()?)))
}

/// SQL LIKE matching: `%` matches any run of characters, `_` exactly one.
fn like_match(value: &str, pattern: &str) -> bool {
    fn matches(value: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some((&'%', rest)) => {
                (0..=value.len()).any(|skip| matches(&value[skip..], rest))
            }
            Some((&'_', rest)) => value
                .split_first()
                .is_some_and(|(_, value)| matches(value, rest)),
            Some((c, rest)) => value
                .split_first()
                .is_some_and(|(v, value)| v == c && matches(value, rest)),
        }
    }
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&value, &pattern)
}
