//! Query model - the document store's filter and finder parameters

mod filter;

pub use filter::{Filter, Query, SortOrder};
