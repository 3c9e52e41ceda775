//! Canonicalize equivalent ASTs
//!
//! Collapses `and`/`or` nodes with a single child into that child, bottom-up.
//! Builds a new tree; the input is consumed, never mutated in place.

use crate::ast::Operator;
use crate::ast::core::Node;

pub fn normalize(node: Node) -> Node {
    match node {
        Node::Operator { op, args } => {
            let mut args: Vec<Node> = args.into_iter().map(normalize).collect();
            if matches!(op, Operator::And | Operator::Or) && args.len() == 1 {
                args.remove(0)
            } else {
                Node::Operator { op, args }
            }
        }
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;

    fn eq(field: &str, n: i64) -> Node {
        Node::compare(Operator::Eq, field, Literal::Integer(n))
    }

    #[test]
    fn collapses_single_child() {
        let node = Node::op(Operator::And, vec![eq("a", 1)]);
        assert_eq!(normalize(node), eq("a", 1));
    }

    #[test]
    fn collapses_nested_chains() {
        let node = Node::op(
            Operator::Or,
            vec![Node::op(Operator::And, vec![Node::op(Operator::Or, vec![eq("a", 1)])])],
        );
        assert_eq!(normalize(node), eq("a", 1));
    }

    #[test]
    fn keeps_multi_child_and_not() {
        let node = Node::op(
            Operator::And,
            vec![
                Node::op(Operator::Not, vec![Node::op(Operator::Or, vec![eq("a", 1)])]),
                eq("b", 2),
            ],
        );
        let expected = Node::op(
            Operator::And,
            vec![Node::op(Operator::Not, vec![eq("a", 1)]), eq("b", 2)],
        );
        assert_eq!(normalize(node), expected);
    }

    #[test]
    fn idempotent() {
        let node = Node::op(
            Operator::And,
            vec![Node::op(Operator::Or, vec![eq("a", 1)]), eq("b", 2)],
        );
        let once = normalize(node);
        assert_eq!(normalize(once.clone()), once);
    }
}
