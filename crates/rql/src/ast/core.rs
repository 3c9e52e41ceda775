//! Core AST - what the translator consumes
//!
//! Produced by resolving the surface AST: operator names are checked against
//! the closed set, arity and argument kinds are validated, tokens are decoded
//! and coerced. Nodes are never mutated after construction.

use super::{Direction, Literal, Operator};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Operator application: `eq(price,10)`, `and(...)`, `sort(-a)`
    Operator { op: Operator, args: Vec<Node> },

    /// Literal value
    Literal(Literal),

    /// Literal list: the second argument of `in`, `contains`, `excludes`
    Array(Vec<Literal>),

    /// Document field path, dotted segments allowed: `user.name`
    FieldRef(String),

    /// Sort directive entry: `+a`, `-b`
    SortKey { field: String, direction: Direction },
}

impl Node {
    pub fn op(op: Operator, args: Vec<Node>) -> Self {
        Node::Operator { op, args }
    }

    pub fn field(path: impl Into<String>) -> Self {
        Node::FieldRef(path.into())
    }

    pub fn lit(literal: Literal) -> Self {
        Node::Literal(literal)
    }

    pub fn sort_key(field: impl Into<String>, direction: Direction) -> Self {
        Node::SortKey {
            field: field.into(),
            direction,
        }
    }

    /// Comparison helper: `op(field, value)`
    pub fn compare(op: Operator, field: impl Into<String>, value: Literal) -> Self {
        Node::op(op, vec![Node::field(field), Node::lit(value)])
    }

    /// The operator at this node, if it is an operator node
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Node::Operator { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Sort spec of a `sort(...)` node, in directive order
    pub fn sort_spec(&self) -> Option<Vec<(&str, Direction)>> {
        match self {
            Node::Operator {
                op: Operator::Sort,
                args,
            } => args
                .iter()
                .map(|arg| match arg {
                    Node::SortKey { field, direction } => Some((field.as_str(), *direction)),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}
