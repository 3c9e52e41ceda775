//! Grammar for RQL query strings
//!
//! Produces surface::Expr which is then resolved to core::Node. Accepts both
//! the function-call form `and(eq(a,1),lt(b,2))` and the query-string
//! shorthand `a=1&b=lt=2`.

use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, separated, terminated};
use winnow::error::{ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stream};
use winnow::token::{one_of, take_while};

use crate::ast::surface::{Expr, Span, Token};

type Input<'a> = LocatingSlice<&'a str>;
type PResult<T> = winnow::ModalResult<T>;

/// Default bound on parenthesis nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// The full query that failed
    pub query: String,
    /// Byte offset of the offending text
    pub offset: usize,
    /// The offending substring (for grammar errors, the unparsed remainder)
    pub fragment: String,
}

impl ParseError {
    /// Error pointing at a span of the query
    pub(crate) fn at(query: &str, span: Span, message: impl Into<String>) -> Self {
        let offset = span.start.min(query.len());
        ParseError {
            message: message.into(),
            query: query.to_string(),
            offset,
            fragment: query.get(span).unwrap_or_default().to_string(),
        }
    }

    /// Error pointing at everything from `offset` to the end of the query
    pub(crate) fn remainder(query: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::at(query, offset..query.len(), message)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.fragment.is_empty() {
            write!(f, "{} (offset {}, end of input)", self.message, self.offset)
        } else {
            write!(
                f,
                "{} (offset {}, near '{}')",
                self.message, self.offset, self.fragment
            )
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum parenthesis nesting accepted before descent
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Parse an RQL query string into its surface form
#[cfg(test)]
pub fn parse(query: &str) -> Result<Expr, ParseError> {
    parse_with(query, &ParseOptions::default())
}

pub fn parse_with(query: &str, options: &ParseOptions) -> Result<Expr, ParseError> {
    if query.trim().is_empty() {
        return Err(ParseError::remainder(query, 0, "empty query"));
    }
    check_depth(query, options.max_depth)?;

    let mut stream = LocatingSlice::new(query);
    match delimited(ws, or_expr, ws).parse_next(&mut stream) {
        Ok(parsed) => {
            if stream.eof_offset() == 0 {
                Ok(parsed)
            } else {
                let offset = query.len() - stream.eof_offset();
                Err(ParseError::remainder(query, offset, "unexpected input"))
            }
        }
        Err(e) => {
            let offset = query.len() - stream.eof_offset();
            let message = match e {
                ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx.to_string(),
                ErrMode::Incomplete(_) => String::new(),
            };
            let message = if message.trim().is_empty() {
                "malformed query".to_string()
            } else {
                message.replace('\n', "; ")
            };
            Err(ParseError::remainder(query, offset, message))
        }
    }
}

/// Reject nesting deeper than `max_depth` before any recursive descent
fn check_depth(query: &str, max_depth: usize) -> Result<(), ParseError> {
    let mut depth = 0usize;
    for (offset, c) in query.char_indices() {
        match c {
            '(' => {
                depth += 1;
                if depth > max_depth {
                    return Err(ParseError::remainder(
                        query,
                        offset,
                        format!("nesting deeper than {max_depth} levels"),
                    ));
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// ============ Boolean segments (handles precedence) ============

fn or_expr(input: &mut Input<'_>) -> PResult<Expr> {
    let (segments, span): (Vec<Expr>, Span) = separated(1.., and_expr, (ws, '|', ws))
        .with_span()
        .parse_next(input)?;
    Ok(join(segments, span, Expr::Or))
}

fn and_expr(input: &mut Input<'_>) -> PResult<Expr> {
    let (segments, span): (Vec<Expr>, Span) = separated(1.., term, (ws, '&', ws))
        .with_span()
        .parse_next(input)?;
    Ok(join(segments, span, Expr::And))
}

/// A single segment is not wrapped
fn join(mut segments: Vec<Expr>, span: Span, wrap: fn(Vec<Expr>, Span) -> Expr) -> Expr {
    if segments.len() == 1 {
        segments.remove(0)
    } else {
        wrap(segments, span)
    }
}

fn term(input: &mut Input<'_>) -> PResult<Expr> {
    alt((group, call, comparison)).parse_next(input)
}

fn group(input: &mut Input<'_>) -> PResult<Expr> {
    delimited(
        ('(', ws),
        or_expr,
        (
            ws,
            cut_err(')').context(StrContext::Expected(StrContextValue::CharLiteral(')'))),
        ),
    )
    .parse_next(input)
}

// ============ Function-call form ============

fn call(input: &mut Input<'_>) -> PResult<Expr> {
    (
        terminated(ident, '('),
        cut_err(terminated(
            delimited(ws, separated(0.., arg, (ws, ',', ws)), ws),
            ')'.context(StrContext::Expected(StrContextValue::CharLiteral(')'))),
        )),
    )
        .with_span()
        .map(|((name, args), span)| Expr::Call { name, args, span })
        .parse_next(input)
}

fn arg(input: &mut Input<'_>) -> PResult<Expr> {
    alt((call, comparison, group, list, token.map(Expr::Token))).parse_next(input)
}

fn list(input: &mut Input<'_>) -> PResult<Expr> {
    delimited(
        ('(', ws),
        separated(0.., token, (ws, ',', ws)),
        (ws, ')'),
    )
    .with_span()
    .map(|(items, span)| Expr::List(items, span))
    .parse_next(input)
}

// ============ Shorthand comparisons ============

/// `field=value`, `field=op=value`, `field=op=(v1,v2)`
fn comparison(input: &mut Input<'_>) -> PResult<Expr> {
    (
        token,
        preceded((ws, '=', ws), opt(terminated(token, (ws, '=', ws)))),
        value,
    )
        .with_span()
        .map(|((field, op, value), span)| Expr::Compare {
            field,
            op,
            value: Box::new(value),
            span,
        })
        .parse_next(input)
}

fn value(input: &mut Input<'_>) -> PResult<Expr> {
    alt((
        list,
        opt(token).with_span().map(|(token, span)| {
            Expr::Token(token.unwrap_or(Token {
                text: String::new(),
                span,
            }))
        }),
    ))
    .parse_next(input)
}

// ============ Tokens ============

fn token(input: &mut Input<'_>) -> PResult<Token> {
    take_while(1.., is_token_char)
        .with_span()
        .map(|(text, span): (&str, Span)| Token {
            text: text.to_string(),
            span,
        })
        .parse_next(input)
}

fn is_token_char(c: char) -> bool {
    !matches!(c, '&' | '|' | '=' | '(' | ')' | ',') && !c.is_whitespace()
}

fn ident(input: &mut Input<'_>) -> PResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

fn ws(input: &mut Input<'_>) -> PResult<()> {
    multispace0.void().parse_next(input)
}

// ============ Sanity Tests ============
// Resolution and end-to-end behavior are covered in transform.rs and tests/

#[cfg(test)]
mod tests {
    use super::*;

    fn token_text(expr: &Expr) -> &str {
        match expr {
            Expr::Token(token) => &token.text,
            other => panic!("Expected token, got {other:?}"),
        }
    }

    #[test]
    fn parse_call() {
        let Expr::Call { name, args, span } = parse("eq(foo,bar)").unwrap() else {
            panic!("Expected call");
        };
        assert_eq!(name, "eq");
        assert_eq!(span, 0..11);
        assert_eq!(args.len(), 2);
        assert_eq!(token_text(&args[0]), "foo");
        assert_eq!(token_text(&args[1]), "bar");
    }

    #[test]
    fn parse_nested_calls() {
        let Expr::Call { args, .. } = parse("and(eq(a,1),or(gt(b,2),lt(b,0)))").unwrap() else {
            panic!("Expected call");
        };
        assert!(matches!(&args[1], Expr::Call { name, args, .. } if name == "or" && args.len() == 2));
    }

    #[test]
    fn parse_empty_args() {
        assert!(matches!(
            parse("count()").unwrap(),
            Expr::Call { ref args, .. } if args.is_empty()
        ));
    }

    #[test]
    fn parse_shorthand() {
        let Expr::Compare { field, op, value, .. } = parse("score=gt=10").unwrap() else {
            panic!("Expected comparison");
        };
        assert_eq!(field.text, "score");
        assert_eq!(op.unwrap().text, "gt");
        assert_eq!(token_text(&value), "10");

        let Expr::Compare { op, .. } = parse("foo=bar").unwrap() else {
            panic!("Expected comparison");
        };
        assert!(op.is_none());
    }

    #[test]
    fn parse_shorthand_list_and_empty_value() {
        let Expr::Compare { value, .. } = parse("tag=in=(a,b)").unwrap() else {
            panic!("Expected comparison");
        };
        assert!(matches!(*value, Expr::List(ref items, _) if items.len() == 2));

        let Expr::Compare { value, .. } = parse("name=").unwrap() else {
            panic!("Expected comparison");
        };
        assert_eq!(token_text(&value), "");
    }

    #[test]
    fn parse_segments() {
        assert!(matches!(parse("a=1&b=2").unwrap(), Expr::And(ref s, _) if s.len() == 2));
        assert!(matches!(parse("a=1|b=2|c=3").unwrap(), Expr::Or(ref s, _) if s.len() == 3));
        // '&' binds tighter than '|'
        let Expr::Or(segments, _) = parse("a=1&b=2|c=3").unwrap() else {
            panic!("Expected or");
        };
        assert!(matches!(segments[0], Expr::And(_, _)));
        // single segment is not wrapped
        assert!(matches!(parse("a=1").unwrap(), Expr::Compare { .. }));
    }

    #[test]
    fn parse_groups() {
        let Expr::And(segments, _) = parse("(a=1|b=2)&c=3").unwrap() else {
            panic!("Expected and");
        };
        assert!(matches!(segments[0], Expr::Or(_, _)));
    }

    #[test]
    fn parse_lists_in_arguments() {
        let Expr::Call { args, .. } = parse("in(tag,(a,b,c))").unwrap() else {
            panic!("Expected call");
        };
        assert!(matches!(&args[1], Expr::List(items, _) if items.len() == 3));

        let Expr::Call { args, .. } = parse("in(tag,())").unwrap() else {
            panic!("Expected call");
        };
        assert!(matches!(&args[1], Expr::List(items, _) if items.is_empty()));
    }

    #[test]
    fn parse_whitespace_around_delimiters() {
        assert!(parse(" eq( a , 1 ) ").is_ok());
        assert!(parse("a = 1 & b = 2").is_ok());
    }

    #[test]
    fn spans_point_into_query() {
        let Expr::And(segments, _) = parse("a=1&sort(-b)").unwrap() else {
            panic!("Expected and");
        };
        assert_eq!(segments[1].span(), 4..12);
    }

    #[test]
    fn unbalanced_parens() {
        let err = parse("eq(a,b").unwrap_err();
        assert_eq!(err.offset, 6);
        assert!(err.fragment.is_empty());

        let err = parse("eq(a,b))").unwrap_err();
        assert_eq!(err.fragment, ")");

        let err = parse("(a=1|b=2").unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn malformed_inputs() {
        for query in ["", "   ", "foo", "a=1&", "&a=1", "eq(a,)", "eq(a b)", "=1"] {
            assert!(parse(query).is_err(), "{query:?} should not parse");
        }
    }

    #[test]
    fn trailing_input_reports_remainder() {
        let err = parse("a=1&b=2 junk").unwrap_err();
        assert_eq!(err.fragment, "junk");
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn depth_is_bounded() {
        let deep = format!("{}eq(a,1){}", "not(".repeat(80), ")".repeat(80));
        let err = parse(&deep).unwrap_err();
        assert!(err.message.contains("nesting"));
        // the 65th '(' belongs to the 65th "not("
        assert_eq!(err.offset, 4 * 64 + 3);

        let options = ParseOptions { max_depth: 100 };
        assert!(parse_with(&deep, &options).is_ok());
    }
}
