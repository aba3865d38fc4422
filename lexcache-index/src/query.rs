//! Query construction and evaluation.
//!
//! Queries are plain values; each index implementation only has to answer
//! the three primitive lookups in [`TermSource`], and boolean composition is
//! evaluated here once for all of them.

use std::collections::BTreeSet;
use std::ops::{Bound, RangeBounds};

use regex::Regex;

use crate::error::{IndexError, IndexResult};
use crate::traits::DocId;

/// A query against a document index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Documents indexed with exactly this term in `field`.
    Term { field: String, term: String },
    /// Documents whose numeric `field` lies within the bounds.
    Range {
        field: String,
        lower: Bound<i64>,
        upper: Bound<i64>,
    },
    /// Documents with a term in `field` matching a `*`/`?` pattern.
    Wildcard { field: String, pattern: String },
    /// Documents matching every sub-query. An empty list matches nothing.
    And(Vec<Query>),
    /// Documents matching at least one sub-query.
    Or(Vec<Query>),
}

impl Query {
    pub fn term(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            term: term.into(),
        }
    }

    /// OR of exact terms on one field.
    pub fn any_term<I, S>(field: &str, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Or(terms.into_iter().map(|t| Self::term(field, t)).collect())
    }

    pub fn range(field: impl Into<String>, lower: Bound<i64>, upper: Bound<i64>) -> Self {
        Self::Range {
            field: field.into(),
            lower,
            upper,
        }
    }

    /// `field < value`
    pub fn less_than(field: impl Into<String>, value: i64) -> Self {
        Self::range(field, Bound::Unbounded, Bound::Excluded(value))
    }

    /// `field >= value`
    pub fn at_least(field: impl Into<String>, value: i64) -> Self {
        Self::range(field, Bound::Included(value), Bound::Unbounded)
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Wildcard {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn and(queries: impl IntoIterator<Item = Query>) -> Self {
        Self::And(queries.into_iter().collect())
    }

    pub fn or(queries: impl IntoIterator<Item = Query>) -> Self {
        Self::Or(queries.into_iter().collect())
    }
}

/// Compiled `*`/`?` pattern.
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    regex: Regex,
}

impl WildcardMatcher {
    pub fn compile(pattern: &str) -> IndexResult<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?s)^");
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        source.push('$');
        let regex = Regex::new(&source).map_err(|e| IndexError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, term: &str) -> bool {
        self.regex.is_match(term)
    }

    /// Literal prefix before the first wildcard, usable to narrow a scan.
    pub fn literal_prefix(pattern: &str) -> &str {
        let end = pattern.find(['*', '?']).unwrap_or(pattern.len());
        &pattern[..end]
    }
}

/// Primitive lookups an index must provide.
pub(crate) trait TermSource {
    fn term_docs(&self, field: &str, term: &str) -> IndexResult<BTreeSet<DocId>>;

    fn range_docs(
        &self,
        field: &str,
        lower: Bound<i64>,
        upper: Bound<i64>,
    ) -> IndexResult<BTreeSet<DocId>>;

    fn wildcard_docs(
        &self,
        field: &str,
        pattern: &str,
        matcher: &WildcardMatcher,
    ) -> IndexResult<BTreeSet<DocId>>;
}

pub(crate) fn evaluate(query: &Query, source: &dyn TermSource) -> IndexResult<BTreeSet<DocId>> {
    match query {
        Query::Term { field, term } => source.term_docs(field, term),
        Query::Range {
            field,
            lower,
            upper,
        } => source.range_docs(field, *lower, *upper),
        Query::Wildcard { field, pattern } => {
            let matcher = WildcardMatcher::compile(pattern)?;
            source.wildcard_docs(field, pattern, &matcher)
        }
        Query::And(queries) => {
            let mut queries = queries.iter();
            let Some(first) = queries.next() else {
                return Ok(BTreeSet::new());
            };
            let mut result = evaluate(first, source)?;
            for query in queries {
                if result.is_empty() {
                    break;
                }
                let docs = evaluate(query, source)?;
                result.retain(|id| docs.contains(id));
            }
            Ok(result)
        }
        Query::Or(queries) => {
            let mut result = BTreeSet::new();
            for query in queries {
                result.extend(evaluate(query, source)?);
            }
            Ok(result)
        }
    }
}

pub(crate) fn in_range(value: i64, lower: Bound<i64>, upper: Bound<i64>) -> bool {
    (lower, upper).contains(&value)
}
