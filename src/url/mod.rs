//! URL resolution and comparison
//!
//! Implements the resolution algebra that turns a raw candidate URL plus a
//! base into the resolved/rebased/redirected interpretations stored on a
//! [`Link`](crate::link::Link), along with origin comparison and the keyword
//! glob matcher used by exclusion filtering.

mod compare;
mod matcher;
mod resolve;

pub use compare::{same_origin, same_page};
pub use matcher::matches_keyword;
pub use resolve::{redirect, relation, resolve, strip_hash};
