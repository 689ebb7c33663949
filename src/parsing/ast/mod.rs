//! Abstract Syntax Tree for SQL statements
//!
//! The statement is the root of the tree. Built from raw SQL by the grammar
//! analyzer, validated and bound against the schema by the planner.
//! Statements and their clauses are immutable once constructed; derived
//! values such as the parameter count are computed eagerly at construction.

pub mod expressions;

pub use expressions::{Expression, Literal, Operator, TypeContext};

use crate::parsing::lexer::Keyword;
use std::fmt;

/// The kinds of clause a statement can carry, in canonical statement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
}

impl ClauseKind {
    /// The fixed list of leading keywords that identifies this clause in the
    /// token stream, also used for its canonical rendering.
    pub fn prefix_keywords(&self) -> &'static [Keyword] {
        match self {
            ClauseKind::Select => &[Keyword::Select],
            ClauseKind::From => &[Keyword::From],
            ClauseKind::Where => &[Keyword::Where],
            ClauseKind::GroupBy => &[Keyword::Group, Keyword::By],
            ClauseKind::Having => &[Keyword::Having],
            ClauseKind::OrderBy => &[Keyword::Order, Keyword::By],
            ClauseKind::Limit => &[Keyword::Limit],
        }
    }

    /// All clause kinds in the canonical order the analyzer tries them.
    pub fn all() -> &'static [ClauseKind] {
        &[
            ClauseKind::Select,
            ClauseKind::From,
            ClauseKind::Where,
            ClauseKind::GroupBy,
            ClauseKind::Having,
            ClauseKind::OrderBy,
            ClauseKind::Limit,
        ]
    }
}

// Renders the prefix keyword list, e.g. "GROUP BY".
impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, keyword) in self.prefix_keywords().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", keyword)?;
        }
        Ok(())
    }
}

/// One item of a SELECT clause: an expression with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectItem {
    pub expression: Expression,
    pub alias: Option<String>,
}

/// SELECT: the projected expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectClause {
    pub items: Vec<SelectItem>,
}

/// A single table declare: name plus optional alias. This engine supports
/// exactly one table per statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableDeclare {
    pub name: String,
    pub alias: Option<String>,
}

/// FROM: the queried table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FromClause {
    pub table: TableDeclare,
}

/// WHERE: the row filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereClause {
    pub condition: Expression,
}

/// GROUP BY: the grouping expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupByClause {
    pub expressions: Vec<Expression>,
}

/// HAVING: the group filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HavingClause {
    pub condition: Expression,
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY: sort expressions with directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByClause {
    pub items: Vec<(Expression, Direction)>,
}

/// LIMIT: row offset and count. `LIMIT n` is offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitClause {
    pub offset: i32,
    pub row_count: i32,
}

/// A parsed clause, produced by one clause analyzer and consumed by the
/// statement adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    Select(SelectClause),
    From(FromClause),
    Where(WhereClause),
    GroupBy(GroupByClause),
    Having(HavingClause),
    OrderBy(OrderByClause),
    Limit(LimitClause),
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        match self {
            Clause::Select(_) => ClauseKind::Select,
            Clause::From(_) => ClauseKind::From,
            Clause::Where(_) => ClauseKind::Where,
            Clause::GroupBy(_) => ClauseKind::GroupBy,
            Clause::Having(_) => ClauseKind::Having,
            Clause::OrderBy(_) => ClauseKind::OrderBy,
            Clause::Limit(_) => ClauseKind::Limit,
        }
    }
}

/// The kinds of statement the engine can execute. Used as half of the
/// executor dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Select => write!(f, "SelectStatement"),
        }
    }
}

/// A SQL statement. One concrete kind today; the enum keeps the dispatch
/// surface closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    Select(SelectStatement),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Select(_) => StatementKind::Select,
        }
    }

    /// The number of argument placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        match self {
            Statement::Select(select) => select.parameter_count(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => write!(f, "{}", select),
        }
    }
}

/// A SELECT statement: mandatory SELECT and FROM clauses plus the optional
/// tail clauses, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectStatement {
    select: SelectClause,
    from: FromClause,
    where_clause: Option<WhereClause>,
    group_by: Option<GroupByClause>,
    having: Option<HavingClause>,
    order_by: Option<OrderByClause>,
    limit: Option<LimitClause>,
    parameter_count: usize,
}

impl SelectStatement {
    pub fn new(
        select: SelectClause,
        from: FromClause,
        where_clause: Option<WhereClause>,
        group_by: Option<GroupByClause>,
        having: Option<HavingClause>,
        order_by: Option<OrderByClause>,
        limit: Option<LimitClause>,
    ) -> Self {
        let mut statement = SelectStatement {
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            parameter_count: 0,
        };
        let parameter_count = statement
            .expressions()
            .iter()
            .map(|expr| count_parameters(expr))
            .sum();
        statement.parameter_count = parameter_count;
        statement
    }

    pub fn select(&self) -> &SelectClause {
        &self.select
    }

    pub fn from(&self) -> &FromClause {
        &self.from
    }

    pub fn where_clause(&self) -> Option<&WhereClause> {
        self.where_clause.as_ref()
    }

    pub fn group_by(&self) -> Option<&GroupByClause> {
        self.group_by.as_ref()
    }

    pub fn having(&self) -> Option<&HavingClause> {
        self.having.as_ref()
    }

    pub fn order_by(&self) -> Option<&OrderByClause> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<&LimitClause> {
        self.limit.as_ref()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// All top-level expressions across the statement's clauses, in clause
    /// order.
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut expressions: Vec<&Expression> =
            self.select.items.iter().map(|item| &item.expression).collect();
        if let Some(where_clause) = &self.where_clause {
            expressions.push(&where_clause.condition);
        }
        if let Some(group_by) = &self.group_by {
            expressions.extend(group_by.expressions.iter());
        }
        if let Some(having) = &self.having {
            expressions.push(&having.condition);
        }
        if let Some(order_by) = &self.order_by {
            expressions.extend(order_by.items.iter().map(|(expr, _)| expr));
        }
        expressions
    }
}

fn count_parameters(expr: &Expression) -> usize {
    let mut count = 0;
    expr.walk(&mut |expr| {
        if matches!(expr, Expression::Parameter(_)) {
            count += 1;
        }
        true
    });
    count
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", ClauseKind::Select)?;
        for (i, item) in self.select.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item.expression)?;
            if let Some(alias) = &item.alias {
                write!(f, " AS ")?;
                expressions::format_ident(f, alias)?;
            }
        }
        write!(f, " {} ", ClauseKind::From)?;
        expressions::format_ident(f, &self.from.table.name)?;
        if let Some(alias) = &self.from.table.alias {
            write!(f, " AS ")?;
            expressions::format_ident(f, alias)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " {} {}", ClauseKind::Where, where_clause.condition)?;
        }
        if let Some(group_by) = &self.group_by {
            write!(f, " {} ", ClauseKind::GroupBy)?;
            for (i, expr) in group_by.expressions.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", expr)?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " {} {}", ClauseKind::Having, having.condition)?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " {} ", ClauseKind::OrderBy)?;
            for (i, (expr, direction)) in order_by.items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", expr)?;
                if *direction == Direction::Desc {
                    write!(f, " DESC")?;
                }
            }
        }
        if let Some(limit) = &self.limit {
            write!(f, " {} ", ClauseKind::Limit)?;
            if limit.offset != 0 {
                write!(f, "{}, ", limit.offset)?;
            }
            write!(f, "{}", limit.row_count)?;
        }
        Ok(())
    }
}
