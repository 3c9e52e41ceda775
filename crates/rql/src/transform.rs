//! Resolve the surface AST into the core AST
//!
//! This pass:
//! - Checks operator names against the closed set
//! - Enforces per-operator arity and argument kinds
//! - Percent-decodes tokens and coerces literals
//! - Rewrites shorthand `field=op=value` into operator nodes
//!
//! Every failure is a `ParseError` pointing at the offending node.

use crate::ast::core::Node;
use crate::ast::surface::{Expr as SurfaceExpr, Span, Token};
use crate::ast::{Direction, Literal, Operator};
use crate::literal::{Converter, DecodeError, coerce, decode};
use crate::parse::ParseError;

/// Resolve a surface expression parsed from `query`
pub fn resolve(expr: SurfaceExpr, query: &str) -> Result<Node> {
    Resolver { query }.query(expr)
}

/// Where a token appears; decides how `+` decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Function-call argument: `+` stays literal
    Argument,
    /// Shorthand value: `+` is a space
    Shorthand,
}

struct Resolver<'q> {
    query: &'q str,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Resolver<'_> {
    fn error(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::at(self.query, span, message)
    }

    /// A node that stands on its own: operator call, comparison or segment list
    fn query(&self, expr: SurfaceExpr) -> Result<Node> {
        match expr {
            SurfaceExpr::Call { name, args, span } => self.call(name, args, span),
            SurfaceExpr::Compare {
                field,
                op,
                value,
                span,
            } => self.shorthand(field, op, *value, span),
            SurfaceExpr::And(segments, _) => self.segments(Operator::And, segments),
            SurfaceExpr::Or(segments, _) => self.segments(Operator::Or, segments),
            SurfaceExpr::Token(token) => Err(self.error(
                token.span,
                format!("expected a query expression, found value '{}'", token.text),
            )),
            SurfaceExpr::List(_, span) => {
                Err(self.error(span, "expected a query expression, found a list"))
            }
        }
    }

    fn segments(&self, op: Operator, segments: Vec<SurfaceExpr>) -> Result<Node> {
        let args = segments
            .into_iter()
            .map(|segment| self.query(segment))
            .collect::<Result<Vec<_>>>()?;
        Ok(Node::op(op, args))
    }

    fn shorthand(
        &self,
        field: Token,
        op: Option<Token>,
        value: SurfaceExpr,
        span: Span,
    ) -> Result<Node> {
        let op = match op {
            None => Operator::Eq,
            Some(token) => match Operator::from_name(&token.text) {
                Some(op) if op.is_comparison() => op,
                Some(op) => {
                    return Err(self.error(
                        token.span,
                        format!("'{}' cannot be used as a shorthand comparison", op.name()),
                    ));
                }
                None => {
                    return Err(self.error(
                        token.span,
                        format!("unknown operator '{}'", token.text),
                    ));
                }
            },
        };
        let field = self.field(&field)?;
        let value = self.comparison_value(op, value, Position::Shorthand, span)?;
        Ok(Node::op(op, vec![field, value]))
    }

    fn call(&self, name: String, args: Vec<SurfaceExpr>, span: Span) -> Result<Node> {
        let Some(op) = Operator::from_name(&name) else {
            return Err(self.error(span, format!("unknown operator '{name}'")));
        };
        let arity = op.arity();
        if !arity.accepts(args.len()) {
            return Err(self.error(
                span,
                format!(
                    "operator '{}' expects {}, got {}",
                    op.name(),
                    arity.describe(),
                    args.len()
                ),
            ));
        }

        let args = match op {
            Operator::And | Operator::Or | Operator::Not => args
                .into_iter()
                .map(|arg| self.query(arg))
                .collect::<Result<Vec<_>>>()?,
            _ if op.is_comparison() => {
                let mut args = args.into_iter();
                let (Some(field), Some(value)) = (args.next(), args.next()) else {
                    let message = format!("'{}' needs a field and a value", op.name());
                    return Err(self.error(span, message));
                };
                let field = self.field_arg(op, field)?;
                let value = self.comparison_value(op, value, Position::Argument, span)?;
                vec![field, value]
            }
            Operator::Sort => args
                .into_iter()
                .map(|arg| self.sort_key(arg))
                .collect::<Result<Vec<_>>>()?,
            Operator::Select
            | Operator::Values
            | Operator::Sum
            | Operator::Mean
            | Operator::Max
            | Operator::Min => args
                .into_iter()
                .map(|arg| self.field_arg(op, arg))
                .collect::<Result<Vec<_>>>()?,
            Operator::Limit => args
                .into_iter()
                .map(|arg| self.limit_arg(arg))
                .collect::<Result<Vec<_>>>()?,
            Operator::Aggregate => args
                .into_iter()
                .map(|arg| self.aggregate_arg(arg))
                .collect::<Result<Vec<_>>>()?,
            // distinct, count: arity already guarantees no arguments
            _ => Vec::new(),
        };
        Ok(Node::op(op, args))
    }

    // ============ Argument kinds ============

    fn field_arg(&self, op: Operator, arg: SurfaceExpr) -> Result<Node> {
        match arg {
            SurfaceExpr::Token(token) => self.field(&token),
            other => Err(self.error(
                other.span(),
                format!("'{}' expects a field name here", op.name()),
            )),
        }
    }

    fn field(&self, token: &Token) -> Result<Node> {
        let path = decode(&token.text, false)
            .map_err(|e| self.error(token.span.clone(), format!("malformed field name: {e}")))?;
        if path.is_empty() {
            return Err(self.error(token.span.clone(), "empty field name"));
        }
        Ok(Node::FieldRef(path))
    }

    fn comparison_value(
        &self,
        op: Operator,
        value: SurfaceExpr,
        position: Position,
        span: Span,
    ) -> Result<Node> {
        match value {
            SurfaceExpr::Token(token) => {
                let literal = self.literal(&token, position)?;
                if op == Operator::In {
                    Ok(Node::Array(vec![literal]))
                } else {
                    Ok(Node::Literal(literal))
                }
            }
            SurfaceExpr::List(items, list_span) => match op {
                Operator::In | Operator::Contains | Operator::Excludes => {
                    let values = items
                        .iter()
                        .map(|token| self.literal(token, position))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Node::Array(values))
                }
                _ => Err(self.error(
                    list_span,
                    format!("'{}' compares against a single value, not a list", op.name()),
                )),
            },
            other => Err(self.error(
                if other.span().is_empty() { span } else { other.span() },
                format!("'{}' expects a value, found a nested query", op.name()),
            )),
        }
    }

    fn literal(&self, token: &Token, position: Position) -> Result<Literal> {
        let plus_as_space = position == Position::Shorthand;
        let decode_error =
            |e: DecodeError| self.error(token.span.clone(), format!("malformed value: {e}"));

        match Converter::split(&token.text) {
            Some((converter, rest)) => {
                let text = decode(rest, plus_as_space).map_err(decode_error)?;
                converter
                    .convert(&text)
                    .map_err(|e| self.error(token.span.clone(), e.to_string()))
            }
            None => Ok(coerce(&decode(&token.text, plus_as_space).map_err(decode_error)?)),
        }
    }

    fn sort_key(&self, arg: SurfaceExpr) -> Result<Node> {
        let SurfaceExpr::Token(token) = arg else {
            return Err(self.error(arg.span(), "'sort' expects +field or -field"));
        };
        let (direction, raw) = match token.text.strip_prefix('-') {
            Some(rest) => (Direction::Descending, rest),
            None => (
                Direction::Ascending,
                token.text.strip_prefix('+').unwrap_or(&token.text),
            ),
        };
        let field = decode(raw, false)
            .map_err(|e| self.error(token.span.clone(), format!("malformed field name: {e}")))?;
        if field.is_empty() {
            return Err(self.error(token.span.clone(), "sort key without a field name"));
        }
        Ok(Node::SortKey { field, direction })
    }

    fn limit_arg(&self, arg: SurfaceExpr) -> Result<Node> {
        let SurfaceExpr::Token(token) = arg else {
            return Err(self.error(arg.span(), "'limit' expects integer arguments"));
        };
        match self.literal(&token, Position::Argument)? {
            Literal::Integer(n) if n >= 0 => Ok(Node::Literal(Literal::Integer(n))),
            other => Err(self.error(
                token.span,
                format!("'limit' expects a non-negative integer, got {}", other.kind()),
            )),
        }
    }

    fn aggregate_arg(&self, arg: SurfaceExpr) -> Result<Node> {
        match arg {
            SurfaceExpr::Token(token) => self.field(&token),
            SurfaceExpr::Call { name, args, span } => {
                match Operator::from_name(&name) {
                    Some(op) if op.is_aggregate_fn() => self.call(name, args, span),
                    _ => Err(self.error(
                        span,
                        format!("'aggregate' accepts fields and sum/mean/max/min/count, not '{name}'"),
                    )),
                }
            }
            other => Err(self.error(
                other.span(),
                "'aggregate' accepts fields and sum/mean/max/min/count",
            )),
        }
    }
}
