//! Reference resolution - the single choke point between stored reference
//! strings and live identity objects

mod resolver;

pub use resolver::{
    finder_forms, resolve, resolve_identity, Identity, IdentityLookup, Reference, ResolvePolicy,
};
