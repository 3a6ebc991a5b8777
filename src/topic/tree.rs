//! Wildcard-aware subscription trie.
//!
//! Grounded loosely on hebo's `dispatcher::trie::SubTrie` naming (a "Sub"
//! data structure holding per-filter registrations), but that module is a
//! flat `HashMap` with a linear `is_match` scan, not a trie — this one
//! actually walks levels, matching spec section 4.1's `O(L * k)` bound.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

const SINGLE_WILDCARD: &str = "+";
const MULTI_WILDCARD: &str = "#";

#[derive(Debug)]
struct Node<T> {
    children: HashMap<String, Node<T>>,
    dataset: HashSet<T>,
}

impl<T: Eq + Hash> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            dataset: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash> Node<T> {
    fn is_empty(&self) -> bool {
        self.dataset.is_empty() && self.children.is_empty()
    }
}

/// A trie keyed by topic level, storing an arbitrary payload `T` per
/// registered filter (client ids for the subscription index, `()` for the
/// retained-topic index).
#[derive(Debug)]
pub struct TopicTree<T> {
    root: Node<T>,
}

impl<T: Eq + Hash> Default for TopicTree<T> {
    fn default() -> Self {
        Self {
            root: Node::default(),
        }
    }
}

impl<T: Clone + Eq + Hash> TopicTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `filter`. `+` and `#` are stored as literal
    /// level tokens, same as any other level.
    pub fn add(&mut self, filter: &str, value: T) {
        let mut node = &mut self.root;
        for level in filter.split('/') {
            node = node.children.entry(level.to_string()).or_default();
        }
        node.dataset.insert(value);
    }

    /// Remove `value` from `filter`'s dataset, pruning now-empty nodes back
    /// up the chain.
    pub fn remove(&mut self, filter: &str, value: &T) {
        Self::remove_at(&mut self.root, &Self::levels(filter), 0, value);
    }

    fn levels(filter: &str) -> Vec<&str> {
        filter.split('/').collect()
    }

    fn remove_at(node: &mut Node<T>, levels: &[&str], i: usize, value: &T) -> bool {
        if i == levels.len() {
            node.dataset.remove(value);
            return node.is_empty();
        }
        let level = levels[i];
        let prune_child = if let Some(child) = node.children.get_mut(level) {
            Self::remove_at(child, levels, i + 1, value)
        } else {
            false
        };
        if prune_child {
            node.children.remove(level);
        }
        node.is_empty()
    }

    /// Remove every registration of `value` regardless of filter. Used when
    /// a client disconnects and all its subscriptions must go at once.
    pub fn remove_value(&mut self, value: &T) {
        Self::remove_value_at(&mut self.root, value);
    }

    fn remove_value_at(node: &mut Node<T>, value: &T) {
        node.dataset.remove(value);
        node.children.retain(|_, child| {
            Self::remove_value_at(child, value);
            !child.is_empty()
        });
    }

    /// Walk a concrete topic, collecting values registered under the
    /// literal level, `+`, or `#` at each step. `#` short-circuits: every
    /// value anywhere below that node is yielded without descending further
    /// per-level.
    #[must_use]
    pub fn match_concrete(&self, topic: &str) -> HashSet<T> {
        let levels: Vec<&str> = topic.split('/').collect();
        let mut out = HashSet::new();
        Self::collect_concrete(&self.root, &levels, 0, &mut out);
        out
    }

    fn collect_concrete(node: &Node<T>, levels: &[&str], i: usize, out: &mut HashSet<T>) {
        if let Some(hash_node) = node.children.get(MULTI_WILDCARD) {
            out.extend(hash_node.dataset.iter().cloned());
        }

        if i == levels.len() {
            out.extend(node.dataset.iter().cloned());
            return;
        }

        let level = levels[i];
        if let Some(child) = node.children.get(level) {
            Self::collect_concrete(child, levels, i + 1, out);
        }
        if level != SINGLE_WILDCARD {
            if let Some(child) = node.children.get(SINGLE_WILDCARD) {
                Self::collect_concrete(child, levels, i + 1, out);
            }
        }
    }

    /// Reverse direction: given a subscription filter, yield the concrete
    /// topic strings registered in this tree (nodes with a non-empty
    /// dataset) that the filter would match. Used by the retained store to
    /// answer a wildcard SUBSCRIBE; the stored payload `T` plays no role
    /// here, only which paths are populated.
    #[must_use]
    pub fn match_filter(&self, filter: &str) -> HashSet<String> {
        let levels: Vec<&str> = filter.split('/').collect();
        let mut out = HashSet::new();
        let mut path: Vec<String> = Vec::new();
        Self::collect_filter(&self.root, &levels, 0, &mut path, &mut out);
        out
    }

    fn collect_filter(
        node: &Node<T>,
        levels: &[&str],
        i: usize,
        path: &mut Vec<String>,
        out: &mut HashSet<String>,
    ) {
        if i == levels.len() {
            if !node.dataset.is_empty() {
                out.insert(path.join("/"));
            }
            return;
        }

        let level = levels[i];
        if level == MULTI_WILDCARD {
            Self::collect_all(node, path, out);
            return;
        }
        if level == SINGLE_WILDCARD {
            for (key, child) in &node.children {
                path.push(key.clone());
                Self::collect_filter(child, levels, i + 1, path, out);
                path.pop();
            }
            return;
        }
        if let Some(child) = node.children.get(level) {
            path.push(level.to_string());
            Self::collect_filter(child, levels, i + 1, path, out);
            path.pop();
        }
    }

    fn collect_all(node: &Node<T>, path: &mut Vec<String>, out: &mut HashSet<String>) {
        if !node.dataset.is_empty() {
            out.insert(path.join("/"));
        }
        for (key, child) in &node.children {
            path.push(key.clone());
            Self::collect_all(child, path, out);
            path.pop();
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_single_and_multi_level_wildcards() {
        let mut tree: TopicTree<&str> = TopicTree::new();
        tree.add("a/+/c", "sub1");
        tree.add("a/b/#", "sub2");

        let matches = tree.match_concrete("a/b/c");
        assert_eq!(matches.len(), 2);
        assert!(matches.contains("sub1"));
        assert!(matches.contains("sub2"));

        assert!(tree.match_concrete("a/x/y/b").is_empty());
    }

    #[test]
    fn filter_a_plus_b_hash_matches_per_spec_example() {
        let mut tree: TopicTree<&str> = TopicTree::new();
        tree.add("a/+/b/#", "sub");

        assert!(tree.match_concrete("a/x/b").contains("sub"));
        assert!(tree.match_concrete("a/x/b/c").contains("sub"));
        assert!(tree.match_concrete("a/x/b/c/d").contains("sub"));
        assert!(!tree.match_concrete("a/x/y/b").contains("sub"));
    }

    #[test]
    fn remove_prunes_empty_chains() {
        let mut tree: TopicTree<&str> = TopicTree::new();
        tree.add("a/b/c", "sub");
        tree.remove("a/b/c", &"sub");
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_value_strips_every_registration() {
        let mut tree: TopicTree<&str> = TopicTree::new();
        tree.add("a/b", "sub");
        tree.add("x/y", "sub");
        tree.remove_value(&"sub");
        assert!(tree.is_empty());
    }

    #[test]
    fn match_filter_reverses_direction_for_retained_lookup() {
        let mut tree: TopicTree<()> = TopicTree::new();
        tree.add("r/1", ());
        tree.add("r/2", ());
        tree.add("s/1", ());

        let matches = tree.match_filter("r/+");
        assert_eq!(matches.len(), 2);
        assert!(matches.contains("r/1"));
        assert!(matches.contains("r/2"));
    }
}
