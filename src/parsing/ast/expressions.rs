//! SQL expressions and operators

use crate::error::{Error, Result};
use crate::functions;
use crate::types::DataType;
use std::fmt;
use std::hash::{Hash, Hasher};

/// SQL expressions, e.g. `score + 7 > threshold`. Can be nested.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Expression {
    /// All columns, i.e. *.
    All,
    /// A column reference, optionally qualified with a table name.
    Column(Option<String>, String),
    /// A literal constant.
    Literal(Literal),
    /// An argument placeholder (? in SQL), with its position (0-indexed).
    Parameter(usize),
    /// An operator applied to sub-expressions.
    Operator(Operator),
    /// A function call, resolved against the function registry.
    Function(String, Vec<Expression>),
}

/// Expression literal values. The parser emits `Integer` for integral
/// literals that fit 32 bits and `Long` for wider ones.
#[derive(Clone, Debug)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
}

/// Expression operators. Each child expression is boxed since the structure
/// is recursive.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    And(Box<Expression>, Box<Expression>), // a AND b
    Or(Box<Expression>, Box<Expression>),  // a OR b
    Not(Box<Expression>),                  // NOT a

    Equal(Box<Expression>, Box<Expression>), // a = b
    NotEqual(Box<Expression>, Box<Expression>), // a != b
    GreaterThan(Box<Expression>, Box<Expression>), // a > b
    GreaterThanOrEqual(Box<Expression>, Box<Expression>), // a >= b
    LessThan(Box<Expression>, Box<Expression>), // a < b
    LessThanOrEqual(Box<Expression>, Box<Expression>), // a <= b

    Add(Box<Expression>, Box<Expression>),      // a + b
    Subtract(Box<Expression>, Box<Expression>), // a - b
    Multiply(Box<Expression>, Box<Expression>), // a * b
    Divide(Box<Expression>, Box<Expression>),   // a / b
    Identity(Box<Expression>),                  // +a
    Negate(Box<Expression>),                    // -a

    Like(Box<Expression>, Box<Expression>), // a LIKE b

    /// a IS NULL, or a IS NOT NULL when negated.
    Is { expr: Box<Expression>, negated: bool },
    /// a [NOT] BETWEEN low AND high.
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    /// a [NOT] IN (b, c, d).
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
}

/// Literal equality is by value, with floats compared by bit pattern so
/// literals can live in hash maps. SQL NULL semantics apply at evaluation,
/// not here.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Integer(l), Self::Integer(r)) => l == r,
            (Self::Long(l), Self::Long(r)) => l == r,
            (Self::Double(l), Self::Double(r)) => l.to_bits() == r.to_bits(),
            (Self::String(l), Self::String(r)) => l == r,
            (_, _) => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(v) => v.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Long(v) => v.hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::String(v) => v.hash(state),
        }
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Expression::Literal(literal)
    }
}

impl From<Operator> for Expression {
    fn from(operator: Operator) -> Self {
        Expression::Operator(operator)
    }
}

/// Resolves the types of column references and argument placeholders, whose
/// types are only known from the bound schema and values.
pub trait TypeContext {
    fn column_type(&self, qualifier: Option<&str>, name: &str) -> Result<DataType>;
    fn parameter_type(&self, index: usize) -> Result<DataType>;
}

impl Operator {
    /// The operator's direct child expressions, in source order.
    pub fn operands(&self) -> Vec<&Expression> {
        use Operator::*;
        match self {
            Add(lhs, rhs)
            | And(lhs, rhs)
            | Divide(lhs, rhs)
            | Equal(lhs, rhs)
            | GreaterThan(lhs, rhs)
            | GreaterThanOrEqual(lhs, rhs)
            | LessThan(lhs, rhs)
            | LessThanOrEqual(lhs, rhs)
            | Like(lhs, rhs)
            | Multiply(lhs, rhs)
            | NotEqual(lhs, rhs)
            | Or(lhs, rhs)
            | Subtract(lhs, rhs) => vec![lhs, rhs],

            Identity(expr) | Negate(expr) | Not(expr) => vec![expr],

            Is { expr, .. } => vec![expr],

            Between {
                expr, low, high, ..
            } => vec![expr, low, high],

            InList { expr, list, .. } => {
                let mut operands = vec![expr.as_ref()];
                operands.extend(list.iter());
                operands
            }
        }
    }
}

impl Expression {
    /// The expression's direct operand expressions.
    pub fn operands(&self) -> Vec<&Expression> {
        match self {
            Self::Operator(op) => op.operands(),
            Self::Function(_, args) => args.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The expression and all its transitive operands, depth-first.
    pub fn flatten(&self) -> Vec<&Expression> {
        let mut out = vec![self];
        for operand in self.operands() {
            out.extend(operand.flatten());
        }
        out
    }

    /// Walks the expression tree depth-first, calling a closure for every
    /// node. Halts and returns false if the closure returns false.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression) -> bool) -> bool {
        if !visitor(self) {
            return false;
        }
        self.operands().iter().all(|expr| expr.walk(visitor))
    }

    /// Transforms the expression tree depth-first, applying a closure to
    /// every node and replacing the node with the returned value.
    pub fn transform(
        &mut self,
        transformer: &mut impl FnMut(&mut Expression) -> Result<()>,
    ) -> Result<()> {
        use Operator::*;
        match self {
            Self::Operator(op) => match op {
                Add(lhs, rhs)
                | And(lhs, rhs)
                | Divide(lhs, rhs)
                | Equal(lhs, rhs)
                | GreaterThan(lhs, rhs)
                | GreaterThanOrEqual(lhs, rhs)
                | LessThan(lhs, rhs)
                | LessThanOrEqual(lhs, rhs)
                | Like(lhs, rhs)
                | Multiply(lhs, rhs)
                | NotEqual(lhs, rhs)
                | Or(lhs, rhs)
                | Subtract(lhs, rhs) => {
                    lhs.transform(transformer)?;
                    rhs.transform(transformer)?;
                }
                Identity(expr) | Negate(expr) | Not(expr) | Is { expr, .. } => {
                    expr.transform(transformer)?;
                }
                Between {
                    expr, low, high, ..
                } => {
                    expr.transform(transformer)?;
                    low.transform(transformer)?;
                    high.transform(transformer)?;
                }
                InList { expr, list, .. } => {
                    expr.transform(transformer)?;
                    for item in list {
                        item.transform(transformer)?;
                    }
                }
            },
            Self::Function(_, args) => {
                for arg in args {
                    arg.transform(transformer)?;
                }
            }
            _ => {}
        }
        transformer(self)
    }

    /// Whether any node in this tree is an aggregate function call.
    pub fn contains_aggregate(&self) -> bool {
        !self.walk(&mut |expr| match expr {
            Self::Function(name, _) => !functions::is_aggregate(name),
            _ => true,
        })
    }

    /// The expression's result data type. Column and parameter types come
    /// from the resolution context; function types from the registry.
    pub fn result_type(&self, ctx: &dyn TypeContext) -> Result<DataType> {
        use Operator::*;
        match self {
            Self::All => Err(Error::UnsupportedDataType("*".into())),
            Self::Column(qualifier, name) => ctx.column_type(qualifier.as_deref(), name),
            Self::Parameter(index) => ctx.parameter_type(*index),
            Self::Literal(literal) => match literal {
                Literal::Null => Err(Error::UnsupportedDataType("null".into())),
                Literal::Boolean(_) => Ok(DataType::Bool),
                Literal::Integer(_) => Ok(DataType::Int),
                Literal::Long(_) => Ok(DataType::Long),
                Literal::Double(_) => Ok(DataType::Double),
                Literal::String(_) => Ok(DataType::Str),
            },
            Self::Function(name, args) => {
                let arg_types = args
                    .iter()
                    .map(|arg| match arg {
                        // COUNT(*) carries no scalar operand type.
                        Self::All => Ok(DataType::Str),
                        other => other.result_type(ctx),
                    })
                    .collect::<Result<Vec<_>>>()?;
                functions::validate_function(name, &arg_types)
            }
            Self::Operator(op) => match op {
                And(..) | Or(..) | Not(_) | Equal(..) | NotEqual(..) | GreaterThan(..)
                | GreaterThanOrEqual(..) | LessThan(..) | LessThanOrEqual(..) | Like(..)
                | Is { .. } | Between { .. } | InList { .. } => Ok(DataType::Bool),
                Add(lhs, rhs) | Subtract(lhs, rhs) | Multiply(lhs, rhs) | Divide(lhs, rhs) => {
                    let lhs = lhs.result_type(ctx)?;
                    let rhs = rhs.result_type(ctx)?;
                    promote_numeric(lhs, rhs)
                }
                Identity(expr) | Negate(expr) => expr.result_type(ctx),
            },
        }
    }

    /// Rendering precedence: operators take their parse precedence, atoms
    /// bind tightest.
    fn precedence(&self) -> u8 {
        use Operator::*;
        match self {
            Self::Operator(op) => match op {
                Or(..) => 1,
                And(..) => 2,
                Not(_) => 3,
                Equal(..) | NotEqual(..) | Like(..) | Is { .. } | Between { .. }
                | InList { .. } => 4,
                GreaterThan(..) | GreaterThanOrEqual(..) | LessThan(..)
                | LessThanOrEqual(..) => 5,
                Add(..) | Subtract(..) => 6,
                Multiply(..) | Divide(..) => 7,
                Identity(_) | Negate(_) => 10,
            },
            _ => u8::MAX,
        }
    }
}

fn promote_numeric(lhs: DataType, rhs: DataType) -> Result<DataType> {
    if !lhs.is_numeric() || !rhs.is_numeric() {
        return Err(Error::TypeMismatch {
            expected: "numeric".into(),
            found: if lhs.is_numeric() { rhs } else { lhs }.to_string(),
        });
    }
    Ok(match (lhs, rhs) {
        (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
        (DataType::Float, _) | (_, DataType::Float) => DataType::Double,
        (DataType::Long, _) | (_, DataType::Long) => DataType::Long,
        _ => DataType::Int,
    })
}

/// Renders an identifier, back-tick quoting it when it would otherwise lex
/// as a keyword or fail to lex as a bare identifier.
pub(crate) fn format_ident(f: &mut fmt::Formatter<'_>, ident: &str) -> fmt::Result {
    let bare = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
        && ident
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        && crate::parsing::lexer::Keyword::from_ident(ident).is_none();
    if bare {
        write!(f, "{}", ident)
    } else {
        write!(f, "`{}`", ident)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}", v),
            // Keep the decimal point so the literal reparses as a double.
            Literal::Double(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Literal::Double(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl Expression {
    /// Renders an operand, parenthesizing it when its precedence requires.
    fn fmt_operand(
        f: &mut fmt::Formatter<'_>,
        operand: &Expression,
        min_precedence: u8,
    ) -> fmt::Result {
        if operand.precedence() < min_precedence {
            write!(f, "({})", operand)
        } else {
            write!(f, "{}", operand)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        match self {
            Self::All => write!(f, "*"),
            Self::Column(qualifier, name) => {
                if let Some(qualifier) = qualifier {
                    format_ident(f, qualifier)?;
                    write!(f, ".")?;
                }
                format_ident(f, name)
            }
            Self::Literal(literal) => write!(f, "{}", literal),
            Self::Parameter(_) => write!(f, "?"),
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Self::Operator(op) => {
                let precedence = self.precedence();
                let mut infix = |f: &mut fmt::Formatter<'_>,
                                 lhs: &Expression,
                                 symbol: &str,
                                 rhs: &Expression| {
                    Self::fmt_operand(f, lhs, precedence)?;
                    write!(f, " {} ", symbol)?;
                    Self::fmt_operand(f, rhs, precedence + 1)
                };
                match op {
                    And(lhs, rhs) => infix(f, lhs, "AND", rhs),
                    Or(lhs, rhs) => infix(f, lhs, "OR", rhs),
                    Equal(lhs, rhs) => infix(f, lhs, "=", rhs),
                    NotEqual(lhs, rhs) => infix(f, lhs, "!=", rhs),
                    GreaterThan(lhs, rhs) => infix(f, lhs, ">", rhs),
                    GreaterThanOrEqual(lhs, rhs) => infix(f, lhs, ">=", rhs),
                    LessThan(lhs, rhs) => infix(f, lhs, "<", rhs),
                    LessThanOrEqual(lhs, rhs) => infix(f, lhs, "<=", rhs),
                    Add(lhs, rhs) => infix(f, lhs, "+", rhs),
                    Subtract(lhs, rhs) => infix(f, lhs, "-", rhs),
                    Multiply(lhs, rhs) => infix(f, lhs, "*", rhs),
                    Divide(lhs, rhs) => infix(f, lhs, "/", rhs),
                    Like(lhs, rhs) => infix(f, lhs, "LIKE", rhs),
                    Not(expr) => {
                        write!(f, "NOT ")?;
                        Self::fmt_operand(f, expr, precedence)
                    }
                    Identity(expr) => {
                        write!(f, "+")?;
                        Self::fmt_operand(f, expr, precedence)
                    }
                    Negate(expr) => {
                        write!(f, "-")?;
                        Self::fmt_operand(f, expr, precedence)
                    }
                    Is { expr, negated } => {
                        Self::fmt_operand(f, expr, precedence)?;
                        write!(f, " IS {}NULL", if *negated { "NOT " } else { "" })
                    }
                    Between {
                        expr,
                        low,
                        high,
                        negated,
                    } => {
                        Self::fmt_operand(f, expr, precedence)?;
                        write!(f, " {}BETWEEN ", if *negated { "NOT " } else { "" })?;
                        Self::fmt_operand(f, low, precedence + 1)?;
                        write!(f, " AND ")?;
                        Self::fmt_operand(f, high, precedence + 1)
                    }
                    InList {
                        expr,
                        list,
                        negated,
                    } => {
                        Self::fmt_operand(f, expr, precedence)?;
                        write!(f, " {}IN (", if *negated { "NOT " } else { "" })?;
                        for (i, item) in list.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", item)?;
                        }
                        write!(f, ")")
                    }
                }
            }
        }
    }
}
