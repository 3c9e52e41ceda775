//! Translation of the core AST into a document-store query
//!
//! The top-level node (or each child of a top-level `and`) is either a
//! directive, a bare aggregate function, or a predicate. Predicates are
//! collected into the filter; directives populate the query's result
//! options. Directives nested inside predicates are rejected.

use serde_json::{Number, Value, json};
use thiserror::Error;

use crate::ast::core::Node;
use crate::ast::{Direction, Literal, Operator};
use crate::document::{Accumulator, Aggregation, Document, DocumentQuery, Projection, key_name};

/// Seam for alternative query targets
pub trait Translate {
    type Output;

    fn translate(&self, node: &Node) -> std::result::Result<Self::Output, TranslationError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("unsupported operator '{operator}': {reason}")]
    UnsupportedOperator { operator: String, reason: String },

    #[error("unsupported field '{field}': {reason}")]
    UnsupportedField { field: String, reason: String },

    #[error("'{operator}' requires at least one argument")]
    EmptyArguments { operator: String },

    #[error("'{operator}' given more than once")]
    DuplicateDirective { operator: String },

    #[error("malformed '{operator}' node: {reason}")]
    MalformedNode { operator: String, reason: String },
}

impl TranslationError {
    /// The operator or field the error is about
    pub fn subject(&self) -> &str {
        match self {
            TranslationError::UnsupportedOperator { operator, .. }
            | TranslationError::EmptyArguments { operator }
            | TranslationError::DuplicateDirective { operator }
            | TranslationError::MalformedNode { operator, .. } => operator,
            TranslationError::UnsupportedField { field, .. } => field,
        }
    }

    fn malformed(op: Operator, reason: impl Into<String>) -> Self {
        TranslationError::MalformedNode {
            operator: op.name().to_string(),
            reason: reason.into(),
        }
    }

    fn duplicate(op: Operator) -> Self {
        TranslationError::DuplicateDirective {
            operator: op.name().to_string(),
        }
    }
}

type Result<T> = std::result::Result<T, TranslationError>;

/// Translator targeting MongoDB-style filter documents
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStore;

impl Translate for DocumentStore {
    type Output = DocumentQuery;

    fn translate(&self, node: &Node) -> Result<DocumentQuery> {
        log::trace!("translating {node}");

        let top_level: Vec<&Node> = match node {
            Node::Operator {
                op: Operator::And,
                args,
            } => {
                if args.is_empty() {
                    return Err(TranslationError::EmptyArguments {
                        operator: Operator::And.name().to_string(),
                    });
                }
                args.iter().collect()
            }
            Node::Operator { .. } => vec![node],
            other => {
                return Err(TranslationError::MalformedNode {
                    operator: "query".to_string(),
                    reason: format!("expected an operator at the root, found {}", kind(other)),
                });
            }
        };

        let mut builder = Builder::default();
        for child in top_level {
            builder.top_level(child)?;
        }
        Ok(builder.finish())
    }
}

#[derive(Default)]
struct Builder {
    query: DocumentQuery,
    predicates: Vec<Document>,
    /// Set once `aggregate(...)` was seen; bare aggregate functions may not follow
    explicit_aggregate: bool,
}

impl Builder {
    fn top_level(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Operator { op, args } if op.is_directive() => self.directive(*op, args),
            Node::Operator { op, .. } if op.is_aggregate_fn() => {
                if self.explicit_aggregate {
                    return Err(TranslationError::duplicate(*op));
                }
                if self.query.projection.is_some() {
                    return Err(not_with_projection(*op));
                }
                let aggregation = self.query.aggregation.get_or_insert_with(Aggregation::default);
                add_accumulator(aggregation, *op, node)
            }
            _ => {
                self.predicates.push(predicate(node)?);
                Ok(())
            }
        }
    }

    fn directive(&mut self, op: Operator, args: &[Node]) -> Result<()> {
        let query = &mut self.query;
        match op {
            Operator::Sort => {
                if !query.sort.is_empty() {
                    return Err(TranslationError::duplicate(op));
                }
                if args.is_empty() {
                    return Err(empty(op));
                }
                for arg in args {
                    let Node::SortKey { field, direction } = arg else {
                        return Err(TranslationError::malformed(
                            op,
                            format!("expected a sort key, found {}", kind(arg)),
                        ));
                    };
                    let field = field_path(field)?;
                    let order = match direction {
                        Direction::Ascending => 1,
                        Direction::Descending => -1,
                    };
                    if query.sort.insert(field.clone(), order).is_some() {
                        return Err(TranslationError::UnsupportedField {
                            field,
                            reason: "sorted more than once".to_string(),
                        });
                    }
                }
            }
            Operator::Select | Operator::Values => {
                if query.projection.is_some() {
                    return Err(TranslationError::duplicate(op));
                }
                if query.aggregation.is_some() {
                    return Err(not_with_projection(op));
                }
                if args.is_empty() {
                    return Err(empty(op));
                }
                let fields = args
                    .iter()
                    .map(|arg| field_arg(op, arg))
                    .collect::<Result<Vec<_>>>()?;
                query.projection = Some(Projection {
                    fields,
                    values_only: op == Operator::Values,
                });
            }
            Operator::Limit => {
                if query.limit.is_some() {
                    return Err(TranslationError::duplicate(op));
                }
                match args {
                    [count] => query.limit = Some(count_arg(op, count)?),
                    [count, start] => {
                        query.limit = Some(count_arg(op, count)?);
                        query.skip = Some(count_arg(op, start)?);
                    }
                    [] => return Err(empty(op)),
                    _ => {
                        return Err(TranslationError::malformed(
                            op,
                            format!("expected 1 or 2 arguments, got {}", args.len()),
                        ));
                    }
                }
            }
            Operator::Distinct => {
                if query.distinct {
                    return Err(TranslationError::duplicate(op));
                }
                if !args.is_empty() {
                    return Err(TranslationError::malformed(op, "takes no arguments"));
                }
                query.distinct = true;
            }
            Operator::Aggregate => {
                if query.aggregation.is_some() {
                    return Err(TranslationError::duplicate(op));
                }
                if query.projection.is_some() {
                    return Err(not_with_projection(op));
                }
                if args.is_empty() {
                    return Err(empty(op));
                }
                let mut aggregation = Aggregation::default();
                for arg in args {
                    match arg {
                        Node::FieldRef(path) => {
                            let field = field_path(path)?;
                            let key = key_name(&field);
                            if let Some(other) =
                                aggregation.group_by.iter().find(|other| key_name(other) == key)
                            {
                                return Err(TranslationError::UnsupportedField {
                                    reason: format!("group key '{key}' collides with '{other}'"),
                                    field,
                                });
                            }
                            aggregation.group_by.push(field);
                        }
                        Node::Operator { op: inner, .. } if inner.is_aggregate_fn() => {
                            add_accumulator(&mut aggregation, *inner, arg)?;
                        }
                        other => {
                            return Err(TranslationError::malformed(
                                op,
                                format!(
                                    "expected a field or aggregate function, found {}",
                                    kind(other)
                                ),
                            ));
                        }
                    }
                }
                query.aggregation = Some(aggregation);
                self.explicit_aggregate = true;
            }
            _ => unreachable!("{op:?} is not a directive"),
        }
        Ok(())
    }

    fn finish(mut self) -> DocumentQuery {
        self.query.filter = match self.predicates.len() {
            0 => Document::new(),
            1 => self.predicates.remove(0),
            _ => {
                let children = self.predicates.into_iter().map(Value::Object).collect();
                single("$and", Value::Array(children))
            }
        };
        log::trace!("translated filter: {}", Value::Object(self.query.filter.clone()));
        self.query
    }
}

fn predicate(node: &Node) -> Result<Document> {
    let Node::Operator { op, args } = node else {
        return Err(TranslationError::MalformedNode {
            operator: "filter".to_string(),
            reason: format!("expected a predicate, found {}", kind(node)),
        });
    };
    let op = *op;

    match op {
        Operator::And | Operator::Or => {
            if args.is_empty() {
                return Err(empty(op));
            }
            let children = args
                .iter()
                .map(|arg| predicate(arg).map(Value::Object))
                .collect::<Result<Vec<_>>>()?;
            let key = if op == Operator::And { "$and" } else { "$or" };
            Ok(single(key, Value::Array(children)))
        }
        Operator::Not => match args.as_slice() {
            [child] => {
                let child = Value::Object(predicate(child)?);
                Ok(single("$nor", Value::Array(vec![child])))
            }
            [] => Err(empty(op)),
            _ => Err(TranslationError::malformed(
                op,
                format!("expected 1 argument, got {}", args.len()),
            )),
        },
        _ if op.is_comparison() => comparison(op, args),
        _ if op.is_directive() => Err(TranslationError::UnsupportedOperator {
            operator: op.name().to_string(),
            reason: "directives are only allowed at the top level of a query".to_string(),
        }),
        _ => Err(TranslationError::UnsupportedOperator {
            operator: op.name().to_string(),
            reason: "aggregate functions are only allowed at the top level or inside aggregate()"
                .to_string(),
        }),
    }
}

fn comparison(op: Operator, args: &[Node]) -> Result<Document> {
    let [field, value] = args else {
        return Err(TranslationError::malformed(
            op,
            format!("expected a field and a value, got {} arguments", args.len()),
        ));
    };
    let field = field_arg(op, field)?;

    let condition = match (op, value) {
        (Operator::Eq, Node::Literal(lit)) => literal(op, lit)?,
        (Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge, Node::Literal(lit)) => {
            let key = match op {
                Operator::Ne => "$ne",
                Operator::Lt => "$lt",
                Operator::Le => "$lte",
                Operator::Gt => "$gt",
                _ => "$gte",
            };
            Value::Object(single(key, literal(op, lit)?))
        }
        (Operator::In | Operator::Contains | Operator::Excludes, value) => {
            let values = match value {
                Node::Array(items) => items
                    .iter()
                    .map(|lit| literal(op, lit))
                    .collect::<Result<Vec<_>>>()?,
                Node::Literal(lit) => vec![literal(op, lit)?],
                other => {
                    return Err(TranslationError::malformed(
                        op,
                        format!("expected a value or list, found {}", kind(other)),
                    ));
                }
            };
            let key = match op {
                Operator::In => "$in",
                Operator::Contains => "$all",
                _ => "$nin",
            };
            Value::Object(single(key, Value::Array(values)))
        }
        (_, other) => {
            return Err(TranslationError::malformed(
                op,
                format!("expected a single value, found {}", kind(other)),
            ));
        }
    };

    Ok(single(&field, condition))
}

fn field_arg(op: Operator, node: &Node) -> Result<String> {
    match node {
        Node::FieldRef(path) => field_path(path),
        other => Err(TranslationError::malformed(
            op,
            format!("expected a field, found {}", kind(other)),
        )),
    }
}

/// Validate a dotted field path for use as a document key
fn field_path(path: &str) -> Result<String> {
    let reject = |reason: &str| {
        Err(TranslationError::UnsupportedField {
            field: path.to_string(),
            reason: reason.to_string(),
        })
    };
    if path.is_empty() {
        return reject("empty field path");
    }
    if path.contains('\0') {
        return reject("contains a NUL character");
    }
    for segment in path.split('.') {
        if segment.is_empty() {
            return reject("empty path segment");
        }
        if segment.starts_with('$') {
            return reject("path segments may not start with '$'");
        }
    }
    Ok(path.to_string())
}

fn literal(op: Operator, lit: &Literal) -> Result<Value> {
    Ok(match lit {
        Literal::Integer(n) => json!(n),
        Literal::Float(x) => Number::from_f64(*x).map(Value::Number).ok_or_else(|| {
            TranslationError::malformed(op, format!("{x} is not a finite number"))
        })?,
        Literal::Boolean(b) => json!(b),
        Literal::Null => Value::Null,
        Literal::String(s) => json!(s),
        Literal::DateTime(dt) => {
            json!({ "$date": dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string() })
        }
    })
}

fn count_arg(op: Operator, node: &Node) -> Result<u64> {
    match node {
        Node::Literal(Literal::Integer(n)) => u64::try_from(*n)
            .map_err(|_| TranslationError::malformed(op, format!("{n} is negative"))),
        other => Err(TranslationError::malformed(
            op,
            format!("expected a non-negative integer, found {}", kind(other)),
        )),
    }
}

fn accumulator(node: &Node) -> Result<(String, Accumulator)> {
    let Node::Operator { op, args } = node else {
        return Err(TranslationError::MalformedNode {
            operator: "aggregate".to_string(),
            reason: format!("expected an aggregate function, found {}", kind(node)),
        });
    };
    let accumulator = match (op, args.as_slice()) {
        (Operator::Count, []) => Accumulator::Count,
        (Operator::Count, _) => return Err(TranslationError::malformed(*op, "takes no arguments")),
        (_, [field]) => {
            let field = field_arg(*op, field)?;
            match op {
                Operator::Sum => Accumulator::Sum(field),
                Operator::Mean => Accumulator::Mean(field),
                Operator::Max => Accumulator::Max(field),
                _ => Accumulator::Min(field),
            }
        }
        (_, []) => return Err(empty(*op)),
        _ => {
            return Err(TranslationError::malformed(
                *op,
                format!("expected 1 argument, got {}", args.len()),
            ));
        }
    };
    Ok((accumulator.output_name(), accumulator))
}

/// Insert an accumulator, rejecting output names already taken.
///
/// Repeating the same function is a duplicate directive. Distinct fields that
/// flatten to the same output name (`a.b` and `a_b`) are rejected by field.
fn add_accumulator(aggregation: &mut Aggregation, op: Operator, node: &Node) -> Result<()> {
    let (name, accumulator) = accumulator(node)?;
    if let Some(existing) = aggregation.accumulators.get(&name) {
        if *existing == accumulator {
            return Err(TranslationError::duplicate(op));
        }
        return Err(TranslationError::UnsupportedField {
            field: accumulator.field().unwrap_or_default().to_string(),
            reason: format!(
                "output name '{name}' collides with '{}'",
                existing.field().unwrap_or_default()
            ),
        });
    }
    aggregation.accumulators.insert(name, accumulator);
    Ok(())
}

/// Grouped output no longer carries the source fields a projection names
fn not_with_projection(op: Operator) -> TranslationError {
    TranslationError::UnsupportedOperator {
        operator: op.name().to_string(),
        reason: "projection cannot be combined with aggregation".to_string(),
    }
}

fn empty(op: Operator) -> TranslationError {
    TranslationError::EmptyArguments {
        operator: op.name().to_string(),
    }
}

fn single(key: &str, value: Value) -> Document {
    let mut doc = Document::new();
    doc.insert(key.to_string(), value);
    doc
}

fn kind(node: &Node) -> String {
    match node {
        Node::Operator { op, .. } => format!("operator '{}'", op.name()),
        Node::Literal(lit) => format!("{} literal", lit.kind()),
        Node::Array(_) => "list".to_string(),
        Node::FieldRef(path) => format!("field '{path}'"),
        Node::SortKey { .. } => "sort key".to_string(),
    }
}
