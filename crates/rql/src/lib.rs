//! RQL - Resource Query Language
//!
//! Parses RQL query strings into a typed AST and translates them into
//! MongoDB-style document-store queries.
//!
//! ## Quick Start
//!
//! ```
//! use rql::to_document_query;
//!
//! let query = to_document_query("price=lt=10&tags=contains=sale&sort(-price)&limit(20)").unwrap();
//! assert_eq!(
//!     serde_json::Value::Object(query.filter),
//!     serde_json::json!({ "$and": [
//!         { "price": { "$lt": 10 } },
//!         { "tags": { "$all": ["sale"] } },
//!     ] })
//! );
//! assert_eq!(query.limit, Some(20));
//! ```
//!
//! ## Cached Usage
//!
//! Services that see the same query strings repeatedly share one engine:
//!
//! ```
//! use rql::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::new(EngineConfig::default());
//! let first = engine.parse("or(eq(a,1),eq(b,2))").unwrap();
//! let second = engine.parse("or(eq(a,1),eq(b,2))").unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &second));
//! ```
//!
//! ## Syntax
//!
//! - `op(arg, ...)` → operator call: `and(eq(a,1),lt(b,2))`
//! - `field=value` → `eq(field,value)`
//! - `field=op=value` → `op(field,value)`; `field=in=(a,b)` for lists
//! - `a&b`, `a|b`, `(a|b)&c` → `and`/`or` with grouping
//! - `string:12`, `number:1`, `date:2009` → explicit literal types

mod ast;
mod datetime;
mod document;
mod engine;
mod literal;
mod normalize;
mod parse;
mod pretty;
mod transform;
mod translate;

use thiserror::Error;

// ============ Primary Public API ============

pub use ast::core::Node;
pub use ast::{Direction, Literal, Operator};
pub use document::{Accumulator, Aggregation, Document, DocumentQuery, Projection};
pub use engine::{EngineConfig, QueryEngine};
pub use normalize::normalize;
pub use parse::{DEFAULT_MAX_DEPTH, ParseError, ParseOptions};
pub use translate::{DocumentStore, Translate, TranslationError};

/// Parse a query string into the core AST
pub fn parse(query: &str) -> Result<Node, ParseError> {
    parse_with(query, &ParseOptions::default())
}

pub fn parse_with(query: &str, options: &ParseOptions) -> Result<Node, ParseError> {
    let surface = parse::parse_with(query, options)?;
    transform::resolve(surface, query)
}

/// Translate a core AST into a document-store query
pub fn translate(node: &Node) -> Result<DocumentQuery, TranslationError> {
    DocumentStore.translate(node)
}

/// Parse, normalize and translate in one step.
/// An empty query matches everything.
pub fn to_document_query(query: &str) -> Result<DocumentQuery, RqlError> {
    if query.trim().is_empty() {
        return Ok(DocumentQuery::default());
    }
    let node = normalize(parse(query)?);
    Ok(translate(&node)?)
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum RqlError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Translation error: {0}")]
    Translate(#[from] TranslationError),
}

// ============ Literals ============

pub use datetime::{DateParseError, ISO_FORMAT, PartialFormat, parse_partial_datetime};
pub use literal::{ConversionError, Converter, DecodeError, coerce, decode, encode};

/// Lower-level building blocks: the surface grammar and its resolution pass
pub mod advanced {
    pub use crate::ast::surface::{Expr, Span, Token};
    pub use crate::ast::{Arity, core};

    /// Parse into the surface form without resolving operators or literals
    pub fn parse_surface(
        query: &str,
        options: &crate::ParseOptions,
    ) -> Result<Expr, crate::ParseError> {
        crate::parse::parse_with(query, options)
    }

    /// Resolve a surface expression parsed from `query` into the core AST
    pub fn resolve(expr: Expr, query: &str) -> Result<crate::Node, crate::ParseError> {
        crate::transform::resolve(expr, query)
    }
}
