//! Canonical RQL rendering for the core AST
//!
//! `Display` emits function-call form only. Parsing the output yields an
//! equal tree: tokens are percent-encoded, and strings that would coerce to
//! another type carry a `string:` prefix.

use std::fmt::{self, Display};

use crate::ast::core::Node;
use crate::ast::{Direction, Literal, Operator};
use crate::literal::{coerce, encode};

/// Six fractional digits keep microsecond precision
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

// ============ Display (single-line) ============

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{n}"),
            // Debug keeps a decimal point or exponent, so it never reads back as an integer
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Null => write!(f, "null"),
            Literal::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Literal::String(s) => {
                if needs_string_prefix(s) {
                    write!(f, "string:{}", encode(s))
                } else {
                    write!(f, "{}", encode(s))
                }
            }
        }
    }
}

fn needs_string_prefix(s: &str) -> bool {
    s.is_empty() || !matches!(coerce(s), Literal::String(_))
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "+"),
            Direction::Descending => write!(f, "-"),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Operator { op, args } => {
                write!(f, "{op}(")?;
                write_separated(f, args)?;
                write!(f, ")")
            }
            Node::Literal(lit) => write!(f, "{lit}"),
            Node::Array(items) => {
                write!(f, "(")?;
                write_separated(f, items)?;
                write!(f, ")")
            }
            Node::FieldRef(path) => write!(f, "{}", encode(path)),
            Node::SortKey { field, direction } => write!(f, "{direction}{}", encode(field)),
        }
    }
}

fn write_separated<T: Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn literals() {
        assert_eq!(Literal::Integer(-3).to_string(), "-3");
        assert_eq!(Literal::Float(2.0).to_string(), "2.0");
        assert_eq!(Literal::Float(1e20).to_string(), "1e20");
        assert_eq!(Literal::Boolean(true).to_string(), "true");
        assert_eq!(Literal::Null.to_string(), "null");
        let dt = NaiveDate::from_ymd_opt(2009, 10, 12)
            .unwrap()
            .and_hms_micro_opt(12, 15, 23, 123450)
            .unwrap();
        assert_eq!(Literal::DateTime(dt).to_string(), "2009-10-12T12:15:23.123450Z");
    }

    #[test]
    fn strings_are_encoded_and_prefixed() {
        assert_eq!(Literal::String("foo".into()).to_string(), "foo");
        assert_eq!(Literal::String("a b,c".into()).to_string(), "a%20b%2Cc");
        assert_eq!(Literal::String("12".into()).to_string(), "string:12");
        assert_eq!(Literal::String("true".into()).to_string(), "string:true");
        assert_eq!(Literal::String("2009-10".into()).to_string(), "string:2009-10");
        assert_eq!(Literal::String(String::new()).to_string(), "string:");
        assert_eq!(Literal::String("date:x".into()).to_string(), "date%3Ax");
    }

    #[test]
    fn nodes() {
        let node = Node::op(
            Operator::And,
            vec![
                Node::op(
                    Operator::In,
                    vec![
                        Node::field("user.name"),
                        Node::Array(vec![Literal::String("a".into()), Literal::Integer(1)]),
                    ],
                ),
                Node::op(
                    Operator::Sort,
                    vec![
                        Node::sort_key("a", Direction::Ascending),
                        Node::sort_key("b", Direction::Descending),
                    ],
                ),
                Node::op(Operator::Distinct, vec![]),
            ],
        );
        assert_eq!(node.to_string(), "and(in(user.name,(a,1)),sort(+a,-b),distinct())");
    }
}
