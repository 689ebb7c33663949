//! The SQL grammar analyzer
//!
//! Takes tokens from the lexer and parses them into the AST. Statements are
//! recognized clause by clause: each clause analyzer is keyed by its fixed
//! leading keyword list, the analyzers are tried in canonical order until no
//! clause matches, and a statement adapter selected by the first clause
//! assembles the collected clauses — rejecting duplicates and missing
//! mandatory clauses.
//!
//! The parser only ensures the syntax is well-formed; whether a referenced
//! table or field exists is the planner's job.

use std::iter::Peekable;
use std::ops::Add;

use super::ast::{
    self, Clause, ClauseKind, Direction, Expression, FromClause, GroupByClause, HavingClause,
    Literal, Operator, OrderByClause, SelectClause, SelectItem, Statement, TableDeclare,
    WhereClause,
};
use super::lexer::{Keyword, Lexer, Token};
use crate::error::{Error, Result};
use crate::functions;

pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    /// Offset just past the end of input, for end-of-input errors.
    end_offset: usize,
    /// Counter for argument placeholders (?).
    param_count: usize,
}

impl Parser<'_> {
    /// Parses the input string into a statement AST. The entire string must
    /// be parsed as a single statement, ending with an optional semicolon.
    pub fn parse(statement: &str) -> Result<Statement> {
        let mut parser = Parser::new(statement);
        let clauses = parser.parse_clauses()?;
        parser.skip(Token::Semicolon);
        if let Some((offset, token)) = parser.lexer.next().transpose()? {
            return Err(Error::syntax(offset, format!("unexpected token {}", token)));
        }
        parser.assemble(clauses)
    }

    /// Parses the input string as a single expression. Only used in tests.
    #[cfg(test)]
    pub fn parse_expr(expr: &str) -> Result<Expression> {
        let mut parser = Parser::new(expr);
        let expression = parser.parse_expression()?;
        if let Some((offset, token)) = parser.lexer.next().transpose()? {
            return Err(Error::syntax(offset, format!("unexpected token {}", token)));
        }
        Ok(expression)
    }

    fn new(input: &str) -> Parser<'_> {
        let lexer = Lexer::new(input);
        let end_offset = lexer.end_offset();
        Parser {
            lexer: lexer.peekable(),
            end_offset,
            param_count: 0,
        }
    }

    /// Fetches the next token, or errors if none is found.
    fn next(&mut self) -> Result<(usize, Token)> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| Error::syntax(self.end_offset, "unexpected end of input"))
    }

    /// Peeks the next token, transposing the lexer's error for convenience.
    fn peek(&mut self) -> Result<Option<&Token>> {
        match self.lexer.peek() {
            Some(Ok((_, token))) => Ok(Some(token)),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(None),
        }
    }

    /// The source offset of the next token, or end of input.
    fn peek_offset(&mut self) -> usize {
        match self.lexer.peek() {
            Some(Ok((offset, _))) => *offset,
            _ => self.end_offset,
        }
    }

    /// Returns the next token if it satisfies the predicate.
    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        let matched = matches!(self.peek(), Ok(Some(token)) if predicate(token));
        if !matched {
            return None;
        }
        self.next().ok().map(|(_, token)| token)
    }

    /// Passes the next token through the closure, consuming it if the
    /// closure returns Some. Returns the result of the closure.
    fn next_if_map<T>(&mut self, f: impl Fn(&Token) -> Option<T>) -> Option<T> {
        let value = match self.peek() {
            Ok(Some(token)) => f(token)?,
            _ => return None,
        };
        let _ = self.next();
        Some(value)
    }

    /// Consumes the next token if it is the given token, returning true.
    fn next_is(&mut self, token: Token) -> bool {
        self.next_if(|t| t == &token).is_some()
    }

    /// Consumes the next token if it's the expected token, or errors.
    fn expect(&mut self, expect: Token) -> Result<()> {
        let offset = self.peek_offset();
        let (_, token) = self.next().map_err(|_| {
            Error::syntax(offset, format!("expected token {}, found end of input", expect))
        })?;
        if token != expect {
            return Err(Error::syntax(
                offset,
                format!("expected token {}, found {}", expect, token),
            ));
        }
        Ok(())
    }

    /// Consumes the next token if it is the given token. Equivalent to
    /// next_is(), but expresses intent better.
    fn skip(&mut self, token: Token) {
        self.next_is(token);
    }

    /// Returns the next identifier (bare or back-tick quoted), or errors.
    fn next_ident(&mut self) -> Result<String> {
        let offset = self.peek_offset();
        match self.next()? {
            (_, Token::Ident(ident)) | (_, Token::QuotedIdent(ident)) => Ok(ident),
            (_, token) => Err(Error::syntax(
                offset,
                format!("expected identifier, got {}", token),
            )),
        }
    }

    /// Consumes an identifier alias if present: AS name, or a bare name.
    fn next_alias(&mut self) -> Result<Option<String>> {
        if self.next_is(Keyword::As.into()) {
            return Ok(Some(self.next_ident()?));
        }
        Ok(self.next_if_map(|token| match token {
            Token::Ident(ident) | Token::QuotedIdent(ident) => Some(ident.clone()),
            _ => None,
        }))
    }

    /// Collects clauses by asking each clause analyzer, in canonical order,
    /// whether its leading keywords match at the current position.
    fn parse_clauses(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        'collect: loop {
            for kind in ClauseKind::all() {
                if self.match_clause_prefix(*kind)? {
                    clauses.push(self.parse_clause(*kind)?);
                    continue 'collect;
                }
            }
            return Ok(clauses);
        }
    }

    /// Consumes the clause's leading keyword list if its first keyword is
    /// next. The remaining prefix keywords are then mandatory.
    fn match_clause_prefix(&mut self, kind: ClauseKind) -> Result<bool> {
        let prefix = kind.prefix_keywords();
        if !self.next_is(prefix[0].into()) {
            return Ok(false);
        }
        for keyword in &prefix[1..] {
            self.expect((*keyword).into())?;
        }
        Ok(true)
    }

    /// Parses one clause. The leading keywords have already been consumed.
    fn parse_clause(&mut self, kind: ClauseKind) -> Result<Clause> {
        Ok(match kind {
            ClauseKind::Select => Clause::Select(self.parse_select_clause()?),
            ClauseKind::From => Clause::From(self.parse_from_clause()?),
            ClauseKind::Where => Clause::Where(WhereClause {
                condition: self.parse_expression()?,
            }),
            ClauseKind::GroupBy => Clause::GroupBy(self.parse_group_by_clause()?),
            ClauseKind::Having => Clause::Having(HavingClause {
                condition: self.parse_expression()?,
            }),
            ClauseKind::OrderBy => Clause::OrderBy(self.parse_order_by_clause()?),
            ClauseKind::Limit => Clause::Limit(self.parse_limit_clause()?),
        })
    }

    fn parse_select_clause(&mut self) -> Result<SelectClause> {
        // DISTINCT and TOP are recognized but rejected, leaving room for
        // future support without a grammar rewrite.
        let offset = self.peek_offset();
        if self.next_is(Keyword::Distinct.into()) {
            return Err(Error::syntax(offset, "DISTINCT is not supported"));
        }
        if self.next_is(Keyword::Top.into()) {
            return Err(Error::syntax(offset, "TOP is not supported"));
        }
        let mut items = Vec::new();
        loop {
            let offset = self.peek_offset();
            let expression = self.parse_expression()?;
            let alias = self.next_alias()?;
            if expression == Expression::All && alias.is_some() {
                return Err(Error::syntax(offset, "can't alias *"));
            }
            items.push(SelectItem { expression, alias });
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(SelectClause { items })
    }

    fn parse_from_clause(&mut self) -> Result<FromClause> {
        let name = self.next_ident()?;
        if self.next_is(Token::Period) {
            return Err(Error::syntax(
                self.peek_offset(),
                "compound table names are not supported",
            ));
        }
        let alias = self.next_alias()?;
        if self.next_is(Token::Comma) {
            return Err(Error::syntax(
                self.peek_offset(),
                "only support a single table declare",
            ));
        }
        Ok(FromClause {
            table: TableDeclare { name, alias },
        })
    }

    fn parse_group_by_clause(&mut self) -> Result<GroupByClause> {
        let mut expressions = Vec::new();
        loop {
            expressions.push(self.parse_expression()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(GroupByClause { expressions })
    }

    fn parse_order_by_clause(&mut self) -> Result<OrderByClause> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = self
                .next_if_map(|token| match token {
                    Token::Keyword(Keyword::Asc) => Some(Direction::Asc),
                    Token::Keyword(Keyword::Desc) => Some(Direction::Desc),
                    _ => None,
                })
                .unwrap_or_default();
            items.push((expression, direction));
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(OrderByClause { items })
    }

    fn parse_limit_clause(&mut self) -> Result<ast::LimitClause> {
        let first = self.parse_limit_value()?;
        if self.next_is(Token::Comma) {
            let row_count = self.parse_limit_value()?;
            return Ok(ast::LimitClause {
                offset: first,
                row_count,
            });
        }
        Ok(ast::LimitClause {
            offset: 0,
            row_count: first,
        })
    }

    /// LIMIT operands must be integral literals within 32-bit range.
    fn parse_limit_value(&mut self) -> Result<i32> {
        let offset = self.peek_offset();
        match self.next()? {
            (_, Token::Number(n)) if !n.contains('.') => n.parse::<i32>().map_err(|_| {
                Error::syntax(offset, format!("LIMIT value {} out of integer range", n))
            }),
            (_, token) => Err(Error::syntax(
                offset,
                format!("expected integer LIMIT value, got {}", token),
            )),
        }
    }

    /// The statement adapter: selected by the first clause, assembles the
    /// clause list into a concrete statement.
    fn assemble(&self, clauses: Vec<Clause>) -> Result<Statement> {
        match clauses.first() {
            Some(Clause::Select(_)) => self.assemble_select(clauses),
            Some(clause) => Err(Error::syntax(
                0,
                format!("statement cannot begin with a {} clause", clause.kind()),
            )),
            None => Err(Error::syntax(0, "empty statement")),
        }
    }

    fn assemble_select(&self, clauses: Vec<Clause>) -> Result<Statement> {
        let mut select = None;
        let mut from = None;
        let mut where_clause = None;
        let mut group_by = None;
        let mut having = None;
        let mut order_by = None;
        let mut limit = None;

        for clause in clauses {
            let kind = clause.kind();
            let conflict = match clause {
                Clause::Select(c) => select.replace(c).is_some(),
                Clause::From(c) => from.replace(c).is_some(),
                Clause::Where(c) => where_clause.replace(c).is_some(),
                Clause::GroupBy(c) => group_by.replace(c).is_some(),
                Clause::Having(c) => having.replace(c).is_some(),
                Clause::OrderBy(c) => order_by.replace(c).is_some(),
                Clause::Limit(c) => limit.replace(c).is_some(),
            };
            if conflict {
                return Err(Error::syntax(
                    self.end_offset,
                    format!("Conflict {} clause in statement", kind),
                ));
            }
        }

        let select = select.ok_or_else(|| {
            Error::syntax(self.end_offset, "missing SELECT clause in statement")
        })?;
        let from = from.ok_or_else(|| {
            Error::syntax(self.end_offset, "missing FROM clause in statement")
        })?;

        Ok(Statement::Select(ast::SelectStatement::new(
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
        )))
    }

    /// Parses an expression using precedence climbing: parse the left-hand
    /// side (including prefix operators), then greedily consume infix and
    /// postfix operators whose precedence is at or above the current
    /// minimum, recursing for right-hand sides at the next precedence.
    /// See <https://en.wikipedia.org/wiki/Operator-precedence_parser#Precedence_climbing_method>.
    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_expression_at(0)
    }

    fn parse_expression_at(&mut self, min_precedence: Precedence) -> Result<Expression> {
        let mut lhs = if let Some(prefix) = self.parse_prefix_operator_at(min_precedence) {
            let next_precedence = prefix.precedence() + prefix.associativity();
            let rhs = self.parse_expression_at(next_precedence)?;
            prefix.into_expression(rhs)
        } else {
            self.parse_expression_atom()?
        };

        loop {
            // Multi-token operators at comparison precedence: IS [NOT] NULL,
            // [NOT] BETWEEN, [NOT] IN, and NOT LIKE.
            if COMPARE_PRECEDENCE >= min_precedence {
                if self.next_is(Keyword::Is.into()) {
                    let negated = self.next_is(Keyword::Not.into());
                    self.expect(Keyword::Null.into())?;
                    lhs = Operator::Is {
                        expr: Box::new(lhs),
                        negated,
                    }
                    .into();
                    continue;
                }
                if self.next_is(Keyword::Between.into()) {
                    lhs = self.parse_between(lhs, false)?;
                    continue;
                }
                if self.next_is(Keyword::In.into()) {
                    lhs = self.parse_in(lhs, false)?;
                    continue;
                }
                if matches!(self.peek()?, Some(Token::Keyword(Keyword::Not))) {
                    let offset = self.peek_offset();
                    self.next()?;
                    lhs = match self.next()? {
                        (_, Token::Keyword(Keyword::Between)) => self.parse_between(lhs, true)?,
                        (_, Token::Keyword(Keyword::In)) => self.parse_in(lhs, true)?,
                        (_, Token::Keyword(Keyword::Like)) => {
                            let rhs = self.parse_expression_at(COMPARE_PRECEDENCE + 1)?;
                            Operator::Not(Box::new(
                                Operator::Like(Box::new(lhs), Box::new(rhs)).into(),
                            ))
                            .into()
                        }
                        (_, token) => {
                            return Err(Error::syntax(
                                offset,
                                format!("expected BETWEEN, IN or LIKE after NOT, got {}", token),
                            ));
                        }
                    };
                    continue;
                }
            }

            match self.parse_infix_operator_at(min_precedence) {
                Some(infix) => {
                    let next_precedence = infix.precedence() + infix.associativity();
                    let rhs = self.parse_expression_at(next_precedence)?;
                    lhs = infix.into_expression(lhs, rhs);
                }
                None => return Ok(lhs),
            }
        }
    }

    /// Parses `low AND high` after a BETWEEN. The bounds parse above AND's
    /// precedence so the separator AND is left for us to consume.
    fn parse_between(&mut self, expr: Expression, negated: bool) -> Result<Expression> {
        let low = self.parse_expression_at(COMPARE_PRECEDENCE + 1)?;
        self.expect(Keyword::And.into())?;
        let high = self.parse_expression_at(COMPARE_PRECEDENCE + 1)?;
        Ok(Operator::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        }
        .into())
    }

    /// Parses `(a, b, c)` after an IN.
    fn parse_in(&mut self, expr: Expression, negated: bool) -> Result<Expression> {
        self.expect(Token::OpenParen)?;
        let mut list = Vec::new();
        loop {
            list.push(self.parse_expression()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        self.expect(Token::CloseParen)?;
        Ok(Operator::InList {
            expr: Box::new(expr),
            list,
            negated,
        }
        .into())
    }

    /// Parses an expression atom: a literal, a placeholder, a column
    /// reference, a function call, or a parenthesized expression.
    fn parse_expression_atom(&mut self) -> Result<Expression> {
        let offset = self.peek_offset();
        Ok(match self.next()? {
            (_, Token::Asterisk) => Expression::All,

            (_, Token::Number(n)) => parse_number_literal(offset, &n)?.into(),
            (_, Token::Str(s)) => Literal::String(s).into(),
            (_, Token::Keyword(Keyword::True)) => Literal::Boolean(true).into(),
            (_, Token::Keyword(Keyword::False)) => Literal::Boolean(false).into(),
            (_, Token::Keyword(Keyword::Null)) => Literal::Null.into(),

            // Argument placeholder, allocating the next parameter index.
            (_, Token::Question) => {
                let index = self.param_count;
                self.param_count += 1;
                Expression::Parameter(index)
            }

            // Function call: an identifier immediately followed by `(`.
            (_, Token::Ident(name)) if self.next_is(Token::OpenParen) => {
                let mut args = Vec::new();
                while !self.next_is(Token::CloseParen) {
                    if !args.is_empty() {
                        self.expect(Token::Comma)?;
                    }
                    args.push(self.parse_expression()?);
                }
                self.resolve_function_call(offset, name, args)?
            }

            // Column reference, qualified as table.column or unqualified.
            (_, Token::Ident(table) | Token::QuotedIdent(table))
                if self.next_is(Token::Period) =>
            {
                Expression::Column(Some(table), self.next_ident()?)
            }
            (_, Token::Ident(column) | Token::QuotedIdent(column)) => {
                Expression::Column(None, column)
            }

            (_, Token::OpenParen) => {
                let expr = self.parse_expression()?;
                self.expect(Token::CloseParen)?;
                expr
            }

            (_, token) => {
                return Err(Error::syntax(
                    offset,
                    format!("expected expression atom, found {}", token),
                ));
            }
        })
    }

    /// Resolves a function call against the registry: the name must be
    /// known (case-insensitively), the arity must match, and aggregates
    /// must not contain other aggregates in their operand trees.
    fn resolve_function_call(
        &self,
        offset: usize,
        name: String,
        args: Vec<Expression>,
    ) -> Result<Expression> {
        let signature = functions::signature(&name)
            .ok_or_else(|| Error::syntax(offset, format!("unknown function {}", name)))?;
        signature.check_arity(args.len()).map_err(|err| match err {
            Error::InvalidValue(message) => Error::syntax(offset, message),
            other => other,
        })?;
        if signature.aggregate && args.iter().any(Expression::contains_aggregate) {
            return Err(Error::syntax(
                offset,
                format!("aggregate function {} cannot contain another aggregate", name),
            ));
        }
        Ok(Expression::Function(name, args))
    }

    /// Parses a prefix operator, if there is one and its precedence is at
    /// least min_precedence.
    fn parse_prefix_operator_at(&mut self, min_precedence: Precedence) -> Option<PrefixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Keyword(Keyword::Not) => PrefixOperator::Not,
                Token::Minus => PrefixOperator::Minus,
                Token::Plus => PrefixOperator::Plus,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }

    /// Parses an infix operator, if there is one and its precedence is at
    /// least min_precedence.
    fn parse_infix_operator_at(&mut self, min_precedence: Precedence) -> Option<InfixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Keyword(Keyword::And) => InfixOperator::And,
                Token::Keyword(Keyword::Or) => InfixOperator::Or,
                Token::Keyword(Keyword::Like) => InfixOperator::Like,
                Token::Equal => InfixOperator::Equal,
                Token::NotEqual | Token::LessOrGreaterThan => InfixOperator::NotEqual,
                Token::GreaterThan => InfixOperator::GreaterThan,
                Token::GreaterThanOrEqual => InfixOperator::GreaterThanOrEqual,
                Token::LessThan => InfixOperator::LessThan,
                Token::LessThanOrEqual => InfixOperator::LessThanOrEqual,
                Token::Plus => InfixOperator::Add,
                Token::Minus => InfixOperator::Subtract,
                Token::Asterisk => InfixOperator::Multiply,
                Token::Slash => InfixOperator::Divide,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }
}

/// Parses a numeric literal token. Integral literals that fit 32 bits lex as
/// INTEGER constants, wider ones are promoted to LONG; decimals are DOUBLE.
fn parse_number_literal(offset: usize, text: &str) -> Result<Literal> {
    if text.contains('.') {
        return text
            .parse::<f64>()
            .map(Literal::Double)
            .map_err(|e| Error::syntax(offset, format!("invalid number {}: {}", text, e)));
    }
    if let Ok(value) = text.parse::<i32>() {
        return Ok(Literal::Integer(value));
    }
    text.parse::<i64>()
        .map(Literal::Long)
        .map_err(|e| Error::syntax(offset, format!("invalid number {}: {}", text, e)))
}

/// Operator precedence:
///
/// * 1: OR
/// * 2: AND
/// * 3: NOT
/// * 4: =, !=, LIKE, IS, BETWEEN, IN
/// * 5: <, <=, >, >=
/// * 6: +, -
/// * 7: *, /
/// * 10: +, - (prefix)
type Precedence = u8;

const COMPARE_PRECEDENCE: Precedence = 4;

/// Operator associativity. Left-associative operators get a +1 to their
/// precedence so they bind tighter to their left operand.
enum Associativity {
    Left,
}

impl Add<Associativity> for Precedence {
    type Output = Self;

    fn add(self, rhs: Associativity) -> Self {
        self + match rhs {
            Associativity::Left => 1,
        }
    }
}

/// Prefix operators.
enum PrefixOperator {
    Minus, // -a
    Not,   // NOT a
    Plus,  // +a
}

impl PrefixOperator {
    fn precedence(&self) -> Precedence {
        match self {
            Self::Not => 3,
            Self::Minus | Self::Plus => 10,
        }
    }

    // Prefix operators are right-associative by definition, so the next
    // precedence is their own.
    fn associativity(&self) -> Precedence {
        0
    }

    fn into_expression(self, rhs: Expression) -> Expression {
        let rhs = Box::new(rhs);
        match self {
            Self::Plus => Operator::Identity(rhs).into(),
            Self::Minus => Operator::Negate(rhs).into(),
            Self::Not => Operator::Not(rhs).into(),
        }
    }
}

/// Infix operators.
enum InfixOperator {
    Add,                // a + b
    And,                // a AND b
    Divide,             // a / b
    Equal,              // a = b
    GreaterThan,        // a > b
    GreaterThanOrEqual, // a >= b
    LessThan,           // a < b
    LessThanOrEqual,    // a <= b
    Like,               // a LIKE b
    Multiply,           // a * b
    NotEqual,           // a != b
    Or,                 // a OR b
    Subtract,           // a - b
}

impl InfixOperator {
    fn precedence(&self) -> Precedence {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal | Self::NotEqual | Self::Like => COMPARE_PRECEDENCE,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 5,
            Self::Add | Self::Subtract => 6,
            Self::Multiply | Self::Divide => 7,
        }
    }

    fn associativity(&self) -> Associativity {
        Associativity::Left
    }

    fn into_expression(self, lhs: Expression, rhs: Expression) -> Expression {
        let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
        match self {
            Self::Add => Operator::Add(lhs, rhs).into(),
            Self::And => Operator::And(lhs, rhs).into(),
            Self::Divide => Operator::Divide(lhs, rhs).into(),
            Self::Equal => Operator::Equal(lhs, rhs).into(),
            Self::GreaterThan => Operator::GreaterThan(lhs, rhs).into(),
            Self::GreaterThanOrEqual => Operator::GreaterThanOrEqual(lhs, rhs).into(),
            Self::LessThan => Operator::LessThan(lhs, rhs).into(),
            Self::LessThanOrEqual => Operator::LessThanOrEqual(lhs, rhs).into(),
            Self::Like => Operator::Like(lhs, rhs).into(),
            Self::Multiply => Operator::Multiply(lhs, rhs).into(),
            Self::NotEqual => Operator::NotEqual(lhs, rhs).into(),
            Self::Or => Operator::Or(lhs, rhs).into(),
            Self::Subtract => Operator::Subtract(lhs, rhs).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_select(sql: &str) -> ast::SelectStatement {
        match Parser::parse(sql).unwrap() {
            Statement::Select(select) => select,
        }
    }

    #[test]
    fn parses_minimal_select() {
        let select = parse_select("SELECT * FROM student");
        assert_eq!(select.select().items.len(), 1);
        assert_eq!(select.select().items[0].expression, Expression::All);
        assert_eq!(select.from().table.name, "student");
        assert!(select.where_clause().is_none());
        assert!(select.limit().is_none());
    }

    #[test]
    fn parses_in_list_boundary_case() {
        let select = parse_select("SELECT * FROM STUDENT WHERE ID IN ('10010','10011','10012')");
        let where_clause = select.where_clause().unwrap();
        let Expression::Operator(Operator::InList { list, negated, .. }) = &where_clause.condition
        else {
            panic!("expected IN expression, got {:?}", where_clause.condition);
        };
        assert!(!negated);
        assert_eq!(list.len(), 3);
        assert_eq!(where_clause.condition.operands().len(), 4);
    }

    #[test]
    fn parses_full_clause_tail() {
        let select = parse_select(
            "SELECT id, count(id), max(score) max_score FROM student \
             GROUP BY class HAVING max_score >= 95 ORDER BY max_score DESC LIMIT 0, 10",
        );
        assert!(select.where_clause().is_none());
        assert!(select.group_by().is_some());
        assert!(select.having().is_some());
        assert!(select.order_by().is_some());
        assert_eq!(
            select.limit(),
            Some(&ast::LimitClause {
                offset: 0,
                row_count: 10
            })
        );
        assert_eq!(select.parameter_count(), 0);
        assert_eq!(
            select.select().items[2].alias.as_deref(),
            Some("max_score")
        );
        assert_eq!(
            select.order_by().unwrap().items[0].1,
            Direction::Desc
        );
    }

    #[test]
    fn allocates_parameter_indexes() {
        let select = parse_select("SELECT stuno, stuname FROM student WHERE stuno = ?");
        assert_eq!(select.parameter_count(), 1);
        let Expression::Operator(Operator::Equal(_, rhs)) =
            &select.where_clause().unwrap().condition
        else {
            panic!("expected equality");
        };
        assert_eq!(**rhs, Expression::Parameter(0));
    }

    #[test]
    fn rejects_distinct_and_top() {
        assert!(matches!(
            Parser::parse("SELECT DISTINCT * FROM student"),
            Err(Error::Syntax { .. })
        ));
        assert!(matches!(
            Parser::parse("SELECT TOP 5 * FROM student"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn rejects_multiple_tables() {
        let err = Parser::parse("SELECT * FROM a, b").unwrap_err();
        let Error::Syntax { message, .. } = err else {
            panic!("expected syntax error");
        };
        assert!(message.contains("single table declare"), "{}", message);
    }

    #[test]
    fn rejects_duplicate_clauses() {
        let err = Parser::parse("SELECT * FROM a WHERE x = 1 WHERE y = 2").unwrap_err();
        let Error::Syntax { message, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!(message, "Conflict WHERE clause in statement");
    }

    #[test]
    fn rejects_missing_mandatory_clauses() {
        assert!(Parser::parse("SELECT 1").is_err());
        assert!(Parser::parse("WHERE x = 1").is_err());
        assert!(Parser::parse("").is_err());
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(Parser::parse("SELECT * FROM a extra junk ;").is_err());
    }

    #[test]
    fn respects_operator_precedence() {
        let expr = Parser::parse_expr("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Operator::Add(
                Box::new(Literal::Integer(1).into()),
                Box::new(
                    Operator::Multiply(
                        Box::new(Literal::Integer(2).into()),
                        Box::new(Literal::Integer(3).into()),
                    )
                    .into()
                ),
            )
            .into()
        );

        let expr = Parser::parse_expr("a = 1 OR b = 2 AND c = 3").unwrap();
        let Expression::Operator(Operator::Or(_, rhs)) = expr else {
            panic!("expected OR at the root");
        };
        assert!(matches!(*rhs, Expression::Operator(Operator::And(..))));
    }

    #[test]
    fn parses_between_in_like_and_is_null() {
        assert!(matches!(
            Parser::parse_expr("score BETWEEN 60 AND 90").unwrap(),
            Expression::Operator(Operator::Between { negated: false, .. })
        ));
        assert!(matches!(
            Parser::parse_expr("score NOT BETWEEN 60 AND 90").unwrap(),
            Expression::Operator(Operator::Between { negated: true, .. })
        ));
        assert!(matches!(
            Parser::parse_expr("id NOT IN (1, 2)").unwrap(),
            Expression::Operator(Operator::InList { negated: true, .. })
        ));
        assert!(matches!(
            Parser::parse_expr("name LIKE 'A%'").unwrap(),
            Expression::Operator(Operator::Like(..))
        ));
        assert!(matches!(
            Parser::parse_expr("name IS NOT NULL").unwrap(),
            Expression::Operator(Operator::Is { negated: true, .. })
        ));
    }

    #[test]
    fn types_numeric_literals_by_width() {
        assert_eq!(
            Parser::parse_expr("5").unwrap(),
            Literal::Integer(5).into()
        );
        assert_eq!(
            Parser::parse_expr("9999999999").unwrap(),
            Literal::Long(9_999_999_999).into()
        );
        assert_eq!(
            Parser::parse_expr("3.5").unwrap(),
            Literal::Double(3.5).into()
        );
    }

    #[test]
    fn function_calls_resolve_against_the_registry() {
        assert!(matches!(
            Parser::parse_expr("count(*)").unwrap(),
            Expression::Function(name, args) if name == "count" && args == vec![Expression::All]
        ));

        // Unknown functions and bad arity are parse-time errors.
        assert!(Parser::parse_expr("frobnicate(1)").is_err());
        assert!(Parser::parse_expr("count(a, b)").is_err());
    }

    #[test]
    fn aggregates_do_not_nest() {
        let err = Parser::parse_expr("sum(avg(score))").unwrap_err();
        let Error::Syntax { message, .. } = err else {
            panic!("expected syntax error");
        };
        assert!(message.contains("cannot contain another aggregate"), "{}", message);

        // A scalar function over an aggregate is fine.
        assert!(Parser::parse_expr("concat(max(name), '!')").is_ok());
    }

    #[test]
    fn quoted_identifiers_parse_as_references() {
        let expr = Parser::parse_expr("`select`").unwrap();
        assert_eq!(expr, Expression::Column(None, "select".into()));

        let expr = Parser::parse_expr("t.`from`").unwrap();
        assert_eq!(
            expr,
            Expression::Column(Some("t".into()), "from".into())
        );
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        let err = Parser::parse("SELECT * FROM student WHERE name = 'abc").unwrap_err();
        assert!(matches!(err, Error::Syntax { offset: 35, .. }));
    }
}
