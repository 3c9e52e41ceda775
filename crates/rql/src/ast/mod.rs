//! AST types for RQL
//!
//! Split into:
//! - `surface`: What the grammar produces (raw tokens, spans, shorthand forms)
//! - `core`: What the translator consumes (typed literals, checked arity)

pub mod core;
pub mod surface;

use chrono::NaiveDateTime;

// Shared types used by both surface and core ASTs

/// A typed value coerced from a query token
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    DateTime(NaiveDateTime),
    String(String),
}

impl Literal {
    /// Name of the literal kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Boolean(_) => "boolean",
            Literal::Null => "null",
            Literal::DateTime(_) => "date",
            Literal::String(_) => "string",
        }
    }
}

/// The closed set of RQL operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Boolean
    And,
    Or,
    Not,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
    Excludes,

    // Directives
    Sort,
    Select,
    Values,
    Limit,
    Distinct,
    Aggregate,

    // Aggregate functions
    Sum,
    Mean,
    Max,
    Min,
    Count,
}

/// Allowed argument count for an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
        }
    }

    pub fn describe(self) -> String {
        match self {
            Arity::Exactly(0) => "no arguments".to_string(),
            Arity::Exactly(1) => "exactly 1 argument".to_string(),
            Arity::Exactly(k) => format!("exactly {k} arguments"),
            Arity::AtLeast(1) => "at least 1 argument".to_string(),
            Arity::AtLeast(k) => format!("at least {k} arguments"),
            Arity::Between(lo, hi) => format!("between {lo} and {hi} arguments"),
        }
    }
}

impl Operator {
    pub const ALL: [Operator; 23] = [
        Operator::And,
        Operator::Or,
        Operator::Not,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::Contains,
        Operator::Excludes,
        Operator::Sort,
        Operator::Select,
        Operator::Values,
        Operator::Limit,
        Operator::Distinct,
        Operator::Aggregate,
        Operator::Sum,
        Operator::Mean,
        Operator::Max,
        Operator::Min,
        Operator::Count,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::In => "in",
            Operator::Contains => "contains",
            Operator::Excludes => "excludes",
            Operator::Sort => "sort",
            Operator::Select => "select",
            Operator::Values => "values",
            Operator::Limit => "limit",
            Operator::Distinct => "distinct",
            Operator::Aggregate => "aggregate",
            Operator::Sum => "sum",
            Operator::Mean => "mean",
            Operator::Max => "max",
            Operator::Min => "min",
            Operator::Count => "count",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Operator::And | Operator::Or => Arity::AtLeast(1),
            Operator::Not => Arity::Exactly(1),
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge
            | Operator::In
            | Operator::Contains
            | Operator::Excludes => Arity::Exactly(2),
            Operator::Sort | Operator::Select | Operator::Values | Operator::Aggregate => {
                Arity::AtLeast(1)
            }
            Operator::Limit => Arity::Between(1, 2),
            Operator::Distinct | Operator::Count => Arity::Exactly(0),
            Operator::Sum | Operator::Mean | Operator::Max | Operator::Min => Arity::Exactly(1),
        }
    }

    /// `and`, `or`, `not`
    pub fn is_boolean(self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not)
    }

    /// Operators whose first argument is a field reference
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::In
                | Operator::Contains
                | Operator::Excludes
        )
    }

    /// Operators that shape the result rather than filter it
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            Operator::Sort
                | Operator::Select
                | Operator::Values
                | Operator::Limit
                | Operator::Distinct
                | Operator::Aggregate
        )
    }

    pub fn is_aggregate_fn(self) -> bool {
        matches!(
            self,
            Operator::Sum | Operator::Mean | Operator::Max | Operator::Min | Operator::Count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}
