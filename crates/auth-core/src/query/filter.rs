//! Filters and finder queries
//!
//! `Eq` and `In` follow document-database semantics: when the stored field is
//! an array, the condition matches if any element matches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Filter over stored documents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Case-insensitive substring search over the collection's text index
    Text(String),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn text(needle: impl Into<String>) -> Self {
        Self::Text(needle.into())
    }

    /// Conjunction, flattening nested `And`s and dropping `All`
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), f) => {
                a.push(f);
                Self::And(a)
            }
            (f, Self::And(mut b)) => {
                b.insert(0, f);
                Self::And(b)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Disjunction
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Self::Or(mut a), f) => {
                a.push(f);
                Self::Or(a)
            }
            (a, b) => Self::Or(vec![a, b]),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl From<i32> for SortOrder {
    /// `1` ascending, negative descending
    fn from(value: i32) -> Self {
        if value < 0 {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// Finder parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Result cache TTL in seconds; `Some(0)` bypasses any cache
    pub cache_ttl: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Add an extra condition
    pub fn and(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(filter);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<SortOrder>) -> Self {
        self.sort.push((field.into(), order.into()));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl = Some(seconds);
        self
    }

    /// Never serve this query from a cache
    pub fn no_cache(self) -> Self {
        self.cache_ttl(0)
    }

    pub fn bypasses_cache(&self) -> bool {
        self.cache_ttl == Some(0)
    }
}
