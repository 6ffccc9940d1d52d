//! Path matching and route registration.
//!
//! [`PathTrie`] maps a path to a registered pattern and captures its parameters.
//! [`RouteGroup`] puts a prefix, group middleware and per-method handler chains on top.

mod group;
mod trie;

pub(crate) use group::Resolution;
pub use group::{MethodKey, RouteGroup};
pub use trie::{PathTrie, TrieNode};
