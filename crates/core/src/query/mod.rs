//! Product query language.
//!
//! A small SQL dialect, `SELECT [TOP n] * FROM c [WHERE ...]`, matching what
//! the hosted model is prompted to generate for natural-language searches.
//! Every query is parsed and checked against the product schema before it is
//! run; nothing generated is executed verbatim.

mod filter;
mod lexer;
mod parser;
pub mod translate;

pub use filter::{CmpOp, FieldPath, Filter, Operand, StringFunc};
pub use translate::{ChatQueryTranslator, QueryTranslator};

use crate::error::CatalogError;
use crate::types::{PartitionKey, KNOWN_FIELDS, NESTED_FIELDS};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Bound `@name` parameters, keyed without the `@`
pub type QueryParams = HashMap<String, Value>;

/// A validated query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `TOP n` row bound, if given
    pub top: Option<usize>,
    pub filter: Option<Filter>,
}

impl Query {
    /// Effective row bound given the caller's limit.
    pub fn limit(&self, requested: usize) -> usize {
        self.top.map_or(requested, |top| top.min(requested))
    }
}

/// Fields a query is allowed to reference
#[derive(Debug, Clone)]
pub struct QuerySchema {
    fields: BTreeSet<String>,
    nested: BTreeSet<String>,
}

impl QuerySchema {
    pub fn new<I, S>(fields: I, nested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            nested: nested.into_iter().map(Into::into).collect(),
        }
    }

    /// The advisory product schema plus the configured partition field.
    pub fn products(partition_key: &PartitionKey) -> Self {
        let mut schema = Self::new(KNOWN_FIELDS.iter().copied(), NESTED_FIELDS.iter().copied());
        schema.fields.insert(partition_key.field().to_string());
        schema
    }

    fn check(&self, path: &FieldPath) -> Result<(), CatalogError> {
        let root = path.root();
        if !self.fields.contains(root) {
            return Err(CatalogError::Query(format!(
                "unknown field '{}'; queries may only reference product schema fields",
                root
            )));
        }
        if path.0.len() > 1 && !self.nested.contains(root) {
            return Err(CatalogError::Query(format!(
                "field '{}' has no nested attributes",
                root
            )));
        }
        Ok(())
    }
}

/// Parse and validate a query statement.
pub fn parse_query(
    text: &str,
    schema: &QuerySchema,
    params: &QueryParams,
) -> Result<Query, CatalogError> {
    let statement = strip_decorations(text);
    if statement.is_empty() {
        return Err(CatalogError::Query("empty query".to_string()));
    }
    parser::Parser::new(statement, schema, params)?.parse_statement()
}

/// Drop markdown code fences and trailing semicolons around a statement.
fn strip_decorations(text: &str) -> &str {
    let mut statement = text.trim();
    if let Some(rest) = statement.strip_prefix("```") {
        let body = match rest.split_once('\n') {
            Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
            _ => rest,
        };
        let body = body.trim();
        statement = body.strip_suffix("```").unwrap_or(body).trim();
    }
    statement.trim_end_matches(';').trim_end()
}
