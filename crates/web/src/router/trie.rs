//! Segment-based prefix tree used by every route group.
//!
//! Patterns are split on `/`. Each segment is one of:
//! - a literal, matched exactly
//! - `:name`, capturing one non-empty segment under `name`
//! - `*`, capturing the remaining segments (at least one) under `*`
//!
//! A node holds any number of literal children and at most one wildcard child
//! (`:name` or `*`). Lookups prefer the literal child and fall back to the wildcard
//! child when the literal branch dead-ends, so `/user/new` beats `/user/:id` while
//! `/user/7` still reaches the capture.
//!
//! Trailing slashes are trimmed from patterns and paths alike: `/a/` and `/a` are the
//! same route. The root is `/`.

use crate::error::RegisterError;
use crate::request::PathParams;

pub(crate) const CATCH_ALL: &str = "*";

#[derive(Debug, Default)]
pub struct TrieNode {
    segment: String,
    route_name: String,
    statics: Vec<TrieNode>,
    wildcard: Option<Box<TrieNode>>,
    is_end: bool,
}

impl TrieNode {
    fn new(segment: &str) -> Self {
        Self { segment: segment.to_owned(), ..Self::default() }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The full pattern registered at this node, e.g. `/user/:id`; empty for inner nodes.
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    pub fn is_end(&self) -> bool {
        self.is_end
    }

    fn static_child(&self, segment: &str) -> Option<&TrieNode> {
        self.statics.iter().find(|child| child.segment == segment)
    }

    fn find<'n>(&'n self, segments: &[&str], params: &mut PathParams) -> Option<&'n TrieNode> {
        let Some((head, rest)) = segments.split_first() else {
            return self.is_end.then_some(self);
        };

        if let Some(child) = self.static_child(head) {
            if let Some(found) = child.find(rest, params) {
                return Some(found);
            }
        }

        let wildcard = self.wildcard.as_deref()?;
        if wildcard.segment == CATCH_ALL {
            if !wildcard.is_end {
                return None;
            }
            params.push(CATCH_ALL, segments.join("/"));
            return Some(wildcard);
        }

        if head.is_empty() {
            return None;
        }

        let mark = params.len();
        params.push(&wildcard.segment[1..], *head);
        let found = wildcard.find(rest, params);
        if found.is_none() {
            params.truncate(mark);
        }
        found
    }
}

#[derive(Debug, Default)]
pub struct PathTrie {
    root: TrieNode,
}

impl PathTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pattern` under `name`.
    ///
    /// Fails when the same pattern is registered twice, when two different wildcards
    /// meet at the same level, or when the pattern is malformed.
    pub fn insert(&mut self, pattern: &str, name: impl Into<String>) -> Result<(), RegisterError> {
        let segments = parse_pattern(pattern)?;

        let mut node = &mut self.root;
        for segment in segments {
            node = if is_wildcard(segment) {
                if let Some(existing) = node.wildcard.as_deref() {
                    if existing.segment != segment {
                        return Err(RegisterError::WildcardConflict {
                            pattern: pattern.to_owned(),
                            existing: existing.segment.clone(),
                        });
                    }
                }
                node.wildcard.get_or_insert_with(|| Box::new(TrieNode::new(segment))).as_mut()
            } else {
                let index = match node.statics.iter().position(|child| child.segment == segment) {
                    Some(index) => index,
                    None => {
                        node.statics.push(TrieNode::new(segment));
                        node.statics.len() - 1
                    }
                };
                &mut node.statics[index]
            };
        }

        if node.is_end {
            return Err(RegisterError::DuplicateRoute { pattern: pattern.to_owned() });
        }
        node.is_end = true;
        node.route_name = name.into();
        Ok(())
    }

    /// Returns the terminal node matching `path`, or `None`.
    ///
    /// Inner nodes that were never registered as complete routes do not match.
    pub fn get(&self, path: &str) -> Option<&TrieNode> {
        let mut params = PathParams::empty();
        self.lookup(path, &mut params)
    }

    /// Like [`PathTrie::get`], also collecting captured segments into `params`.
    ///
    /// `params` is left as it was when nothing matches.
    pub fn lookup(&self, path: &str, params: &mut PathParams) -> Option<&TrieNode> {
        let path = normalize(path);
        let segments = split(path).collect::<Vec<_>>();
        let mark = params.len();
        let found = self.root.find(&segments, params);
        if found.is_none() {
            params.truncate(mark);
        }
        found
    }

    /// Walks `pattern` literally (wildcards compared as written), returning the node
    /// whether or not it terminates a route.
    pub fn node(&self, pattern: &str) -> Option<&TrieNode> {
        split(normalize(pattern)).try_fold(&self.root, |node, segment| {
            if is_wildcard(segment) {
                node.wildcard.as_deref().filter(|wildcard| wildcard.segment == segment)
            } else {
                node.static_child(segment)
            }
        })
    }
}

fn is_wildcard(segment: &str) -> bool {
    segment.starts_with(':') || segment == CATCH_ALL
}

/// Trims a trailing `/` (except for the root itself).
pub(crate) fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/').filter({
        let root = path.is_empty();
        move |_| !root
    })
}

fn parse_pattern(pattern: &str) -> Result<Vec<&str>, RegisterError> {
    if !pattern.starts_with('/') {
        return Err(RegisterError::invalid_pattern(pattern, "must start with '/'"));
    }

    let segments = split(normalize(pattern)).collect::<Vec<_>>();
    let mut captures: Vec<&str> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(RegisterError::invalid_pattern(pattern, "empty segment"));
        }
        if *segment == CATCH_ALL && index + 1 != segments.len() {
            return Err(RegisterError::CatchAllNotLast { pattern: pattern.to_owned() });
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(RegisterError::invalid_pattern(pattern, "empty parameter name"));
            }
            if captures.contains(&name) {
                return Err(RegisterError::invalid_pattern(pattern, format!("duplicate parameter '{name}'")));
            }
            captures.push(name);
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(patterns: &[&str]) -> PathTrie {
        let mut trie = PathTrie::new();
        for pattern in patterns {
            trie.insert(pattern, *pattern).unwrap();
        }
        trie
    }

    fn params_of(trie: &PathTrie, path: &str) -> Option<(String, Vec<(String, String)>)> {
        let mut params = PathParams::empty();
        let node = trie.lookup(path, &mut params)?;
        let pairs = params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        Some((node.route_name().to_owned(), pairs))
    }

    #[test]
    fn static_routes_match_exactly() {
        let trie = trie(&["/", "/user/list", "/user/list/active"]);

        for pattern in ["/", "/user/list", "/user/list/active"] {
            let node = trie.get(pattern).unwrap();
            assert!(node.is_end());
            assert_eq!(node.route_name(), pattern);
        }
        assert!(trie.get("/user/lists").is_none());
        assert!(trie.get("/user/list/active/x").is_none());
    }

    #[test]
    fn unregistered_prefix_is_not_a_match() {
        let trie = trie(&["/user/list/active"]);

        assert!(trie.get("/user").is_none());
        assert!(trie.get("/user/list").is_none());

        let inner = trie.node("/user/list").unwrap();
        assert!(!inner.is_end());
        assert_eq!(inner.route_name(), "");
    }

    #[test]
    fn param_captures_segment() {
        let trie = trie(&["/user/:id", "/user/:id/posts/:post"]);

        let (route, params) = params_of(&trie, "/user/42").unwrap();
        assert_eq!(route, "/user/:id");
        assert_eq!(params, vec![("id".to_owned(), "42".to_owned())]);

        let (route, params) = params_of(&trie, "/user/42/posts/7").unwrap();
        assert_eq!(route, "/user/:id/posts/:post");
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], ("post".to_owned(), "7".to_owned()));
    }

    #[test]
    fn empty_segment_does_not_match_param() {
        let trie = trie(&["/user/:id", "/user/:id/edit"]);

        assert!(trie.get("/user/").is_none());
        assert!(trie.get("/user").is_none());
        assert!(trie.get("/user//edit").is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let trie = trie(&["/a/", "/b"]);

        assert_eq!(trie.get("/a").unwrap().route_name(), "/a/");
        assert_eq!(trie.get("/a/").unwrap().route_name(), "/a/");
        assert_eq!(trie.get("/b/").unwrap().route_name(), "/b");
        assert!(trie.get("").is_none());
    }

    #[test]
    fn root_matches_only_when_registered() {
        assert!(trie(&["/a"]).get("/").is_none());
        assert!(trie(&["/"]).get("").is_some());
    }

    #[test]
    fn static_beats_param_and_backtracks() {
        let trie = trie(&["/user/new", "/user/:id", "/user/new/draft/edit", "/user/:id/draft"]);

        assert_eq!(params_of(&trie, "/user/new").unwrap().0, "/user/new");
        assert_eq!(params_of(&trie, "/user/7").unwrap().0, "/user/:id");

        // the literal branch dead-ends at `draft`, the capture branch terminates there
        let (route, params) = params_of(&trie, "/user/new/draft").unwrap();
        assert_eq!(route, "/user/:id/draft");
        assert_eq!(params, vec![("id".to_owned(), "new".to_owned())]);
    }

    #[test]
    fn catch_all_takes_remainder() {
        let trie = trie(&["/static/*", "/static/favicon.ico"]);

        let (route, params) = params_of(&trie, "/static/css/site.css").unwrap();
        assert_eq!(route, "/static/*");
        assert_eq!(params, vec![("*".to_owned(), "css/site.css".to_owned())]);

        assert_eq!(params_of(&trie, "/static/favicon.ico").unwrap().0, "/static/favicon.ico");
        assert!(trie.get("/static").is_none());
    }

    #[test]
    fn failed_lookup_leaves_params_untouched() {
        let trie = trie(&["/user/:id/edit"]);
        let mut params = PathParams::empty();

        assert!(trie.lookup("/user/9/view", &mut params).is_none());
        assert!(params.is_empty());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut trie = trie(&["/user/:id"]);

        assert_eq!(
            trie.insert("/user/:id/", "again"),
            Err(RegisterError::DuplicateRoute { pattern: "/user/:id/".into() })
        );
        assert_eq!(trie.get("/user/1").unwrap().route_name(), "/user/:id");
    }

    #[test]
    fn conflicting_wildcards_fail() {
        let mut trie = trie(&["/user/:id"]);

        assert_eq!(
            trie.insert("/user/:name", "/user/:name"),
            Err(RegisterError::WildcardConflict { pattern: "/user/:name".into(), existing: ":id".into() })
        );
        assert!(matches!(trie.insert("/user/*", "/user/*"), Err(RegisterError::WildcardConflict { .. })));
    }

    #[test]
    fn malformed_patterns_fail() {
        let mut trie = PathTrie::new();

        assert!(matches!(trie.insert("user", "user"), Err(RegisterError::InvalidPattern { .. })));
        assert!(matches!(trie.insert("/a//b", "/a//b"), Err(RegisterError::InvalidPattern { .. })));
        assert!(matches!(trie.insert("/a/:", "/a/:"), Err(RegisterError::InvalidPattern { .. })));
        assert!(matches!(trie.insert("/a/:x/b/:x", "/a/:x/b/:x"), Err(RegisterError::InvalidPattern { .. })));
        assert!(matches!(trie.insert("/a/*/b", "/a/*/b"), Err(RegisterError::CatchAllNotLast { .. })));
    }
}
