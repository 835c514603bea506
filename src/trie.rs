//! Pattern-indexed store mapping dotted topic trees to queue names.
//!
//! A topic key is a non-empty string split on `.` into tokens. `*` matches
//! exactly one token; `#` matches zero or more tokens. Both wildcards are
//! only recognized when they appear as whole tokens in a binding key — a
//! literal token containing `*` or `#` as a substring is matched literally.

use indexmap::IndexMap;
use std::collections::BTreeSet;

const SINGLE_WILDCARD: &str = "*";
const MULTI_WILDCARD: &str = "#";

#[derive(Debug, Default)]
struct Node {
    children: IndexMap<String, Node>,
    patterns: BTreeSet<String>,
}

impl Node {
    fn get_or_create_child(&mut self, token: &str) -> &mut Node {
        self.children.entry(token.to_string()).or_default()
    }

    /// Depth-first collection of every pattern matching the remaining
    /// tokens, rooted at this node. See module docs for wildcard rules.
    fn collect_matches(&self, tokens: &[String], out: &mut BTreeSet<String>) {
        if tokens.is_empty() {
            out.extend(self.patterns.iter().cloned());
            // A `#` child matches zero trailing tokens too, so its own
            // patterns are reachable here even though nothing more remains
            // to descend on.
            if let Some(child) = self.children.get(MULTI_WILDCARD) {
                out.extend(child.patterns.iter().cloned());
            }
            return;
        }

        let head = &tokens[0];
        let tail = &tokens[1..];

        if let Some(child) = self.children.get(head.as_str()) {
            child.collect_matches(tail, out);
        }

        if let Some(child) = self.children.get(SINGLE_WILDCARD) {
            child.collect_matches(tail, out);
        }

        if let Some(child) = self.children.get(MULTI_WILDCARD) {
            // `#` may swallow any number of the remaining tokens, including
            // all of them or none. Try every suffix of `tokens` itself (not
            // just `tail`) so the zero-tokens-consumed case — where `#`
            // steps aside and `head` is matched by whatever comes after it
            // in the `#` child's own subtree — is tried too.
            for i in 0..=tokens.len() {
                child.collect_matches(&tokens[i..], out);
            }
        }
    }
}

/// A rooted trie of dotted topic trees, storing queue names as patterns at
/// terminal nodes. `add`/`remove` treat the pattern set at a node as a set:
/// duplicates are silently ignored, and removing an absent pattern is a
/// no-op.
#[derive(Debug, Default)]
pub struct TopicTrie {
    root: Node,
}

fn split(topic_tree: &str) -> Vec<String> {
    topic_tree.split('.').map(str::to_string).collect()
}

impl TopicTrie {
    pub fn new() -> TopicTrie {
        TopicTrie::default()
    }

    /// Adds `pattern` at the terminal node reached by descending
    /// `topic_tree`, creating intermediate nodes as needed.
    pub fn add(&mut self, topic_tree: &str, pattern: impl Into<String>) {
        let mut node = &mut self.root;
        for token in split(topic_tree) {
            node = node.get_or_create_child(&token);
        }
        node.patterns.insert(pattern.into());
    }

    /// Removes `pattern` from the terminal node reached by descending
    /// `topic_tree`, if present. Descending through a path that doesn't
    /// exist creates it as a side effect (matching the known quirk of the
    /// reference implementation) but leaves the pattern set unaffected
    /// since nothing was ever stored there.
    pub fn remove(&mut self, topic_tree: &str, pattern: &str) {
        let mut node = &mut self.root;
        for token in split(topic_tree) {
            node = node.get_or_create_child(&token);
        }
        node.patterns.remove(pattern);
    }

    /// Splits `topic_key` on `.` and returns the deduplicated set of every
    /// pattern whose bound topic tree matches it.
    pub fn matches(&self, topic_key: &str) -> BTreeSet<String> {
        let tokens = split(topic_key);
        let mut out = BTreeSet::new();
        self.root.collect_matches(&tokens, &mut out);
        out
    }
}
