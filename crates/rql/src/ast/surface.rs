//! Surface AST - what the grammar produces
//!
//! Mirrors the source syntax closely: tokens are kept raw (still
//! percent-encoded), shorthand comparisons keep their own shape, and every
//! node remembers the byte span it was parsed from so resolution errors can
//! point back into the query.

use std::ops::Range;

pub type Span = Range<usize>;

/// A raw, undecoded token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare token: `foo`, `+price`, `2009-10`, `string:12`
    Token(Token),

    /// Parenthesized token list: `(a,b,c)`
    List(Vec<Token>, Span),

    /// Function-call form: `name(args...)`
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },

    /// Shorthand comparison: `field=value` or `field=op=value`
    Compare {
        field: Token,
        op: Option<Token>,
        value: Box<Expr>,
        span: Span,
    },

    /// `&`-joined segments
    And(Vec<Expr>, Span),

    /// `|`-joined segments
    Or(Vec<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Token(token) => token.span.clone(),
            Expr::List(_, span)
            | Expr::Call { span, .. }
            | Expr::Compare { span, .. }
            | Expr::And(_, span)
            | Expr::Or(_, span) => span.clone(),
        }
    }
}
