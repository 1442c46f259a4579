//! Field catalog and lexical scope tracking.
//!
//! A `Schema` describes the fields of a named source dataset; a `Scope`
//! tracks the names visible at a given pipeline position, including
//! aliases introduced by `stats`, `eval`, and `rename`. The analyzer
//! resolves scope-first and falls back to the schema.

mod schema;
mod scope;

pub use schema::{Field, Schema};
pub use scope::{Scope, Symbol};

pub(crate) type Map<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
