//! RQL CLI
//!
//! Translates RQL query strings into document-store queries and prints them as JSON.

use std::io::BufRead;

use anyhow::Context;
use clap::{ArgAction, Parser};
use rql::{EngineConfig, QueryEngine};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "rql")]
#[command(about = "Translate RQL queries into document-store queries")]
#[command(after_help = "\
EXAMPLES:
    # Filter document
    rql 'price=lt=10&tags=contains=sale'

    # Aggregation pipeline
    rql --pipeline 'year=2009&aggregate(dept,sum(pay))&sort(-sum_pay)'

    # Canonical function-call form of a query
    rql --ast 'a=1|b=in=(x,y)'

    # One query per line on stdin
    cat queries.txt | rql --pretty
")]
struct Args {
    /// Queries to translate; read one per line from stdin when omitted
    queries: Vec<String>,

    /// Maximum parenthesis nesting
    #[arg(long, default_value_t = rql::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the parsed tree as canonical RQL instead of translating it
    #[arg(long, conflicts_with = "pipeline")]
    ast: bool,

    /// Print an aggregation pipeline instead of the query document
    #[arg(long)]
    pipeline: bool,

    /// Collapse single-child and/or nodes before translating
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    normalize: bool,
}

fn render(engine: &QueryEngine, args: &Args, query: &str) -> anyhow::Result<String> {
    if args.ast {
        let node = engine.parse(query)?;
        return Ok(node.to_string());
    }

    let translated = engine.translate(query)?;
    let value = if args.pipeline {
        Value::Array(translated.pipeline())
    } else {
        serde_json::to_value(&translated)?
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(json)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let engine = QueryEngine::new(EngineConfig {
        max_depth: args.max_depth,
        normalize: args.normalize,
        ..Default::default()
    });

    let queries = if args.queries.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read queries from stdin")?
    } else {
        args.queries.clone()
    };
    log::debug!("translating {} queries", queries.len());

    for query in &queries {
        let output = render(&engine, &args, query).with_context(|| format!("query {query:?}"))?;
        println!("{output}");
    }

    log::debug!("{} distinct queries cached", engine.cache_len());
    Ok(())
}
