// --- File: src/core/trie.rs
use crate::core::error::EngineError;
use crate::core::strategy::merge_top_k;
use crate::core::types::{Aggregation, CacheCeiling, EntryId, NodeId, Ranked, Symbol, WeightEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ROOT: NodeId = 0;

#[derive(Clone, Serialize, Deserialize)]
pub struct TrieNode<S: Symbol> {
    children: HashMap<S, NodeId>,
    terminal: Option<EntryId>,
    /// Best completions beneath this node, best first. Only maintained when
    /// the trie was built with a cache ceiling.
    best: Vec<Ranked>,
    subtree_weight: f64,
    subtree_completions: usize,
}

impl<S: Symbol> TrieNode<S> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            terminal: None,
            best: Vec::new(),
            subtree_weight: 0.0,
            subtree_completions: 0,
        }
    }

    pub fn best(&self) -> &[Ranked] {
        &self.best
    }
}

/// A weighted prefix tree stored as a flat arena of nodes.
///
/// Every distinct inserted sequence owns exactly one `WeightEntry`, referenced
/// by the node where the sequence ends. When a cache ceiling is configured,
/// each node also carries its top-K completions, refreshed bottom-up along the
/// insertion path.
#[derive(Clone, Serialize, Deserialize)]
pub struct Trie<S: Symbol> {
    nodes: Vec<TrieNode<S>>,
    entries: Vec<WeightEntry<S>>,
    aggregation: Aggregation,
    cache: Option<CacheCeiling>,
}

impl<S: Symbol> Trie<S> {
    pub fn new(aggregation: Aggregation, cache: Option<CacheCeiling>) -> Self {
        Self { nodes: vec![TrieNode::new()], entries: Vec::new(), aggregation, cache }
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Number of distinct sequences stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &TrieNode<S> {
        &self.nodes[id]
    }

    pub fn entry(&self, id: EntryId) -> &WeightEntry<S> {
        &self.entries[id]
    }

    pub fn entries(&self) -> &[WeightEntry<S>] {
        &self.entries
    }

    /// Inserts one occurrence of `sequence`.
    /// O(k) structural work where k is the sequence length, plus cache
    /// refresh along the path when caching is enabled.
    pub fn insert(&mut self, sequence: &[S], weight: f64) -> Result<EntryId, EngineError> {
        if sequence.is_empty() {
            return Err(EngineError::InvalidEntry("sequence is empty"));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(EngineError::InvalidEntry("weight must be finite and positive"));
        }
        // The root total bounds every entry and subtree total beneath it.
        if !(self.nodes[ROOT].subtree_weight + weight).is_finite() {
            return Err(EngineError::InvalidEntry("accumulated weight would overflow"));
        }

        let mut node_idx = ROOT;
        let mut path = Vec::with_capacity(sequence.len() + 1);
        path.push(ROOT);
        for symbol in sequence {
            let next_idx = if let Some(&id) = self.nodes[node_idx].children.get(symbol) {
                id
            } else {
                let new_node_id = self.nodes.len();
                self.nodes.push(TrieNode::new());
                self.nodes[node_idx].children.insert(symbol.clone(), new_node_id);
                new_node_id
            };
            node_idx = next_idx;
            path.push(node_idx);
        }

        let (entry_id, is_new) = match self.nodes[node_idx].terminal {
            Some(id) => {
                self.entries[id].record(weight);
                (id, false)
            }
            None => {
                let id = self.entries.len();
                self.entries.push(WeightEntry::new(sequence.to_vec(), weight));
                self.nodes[node_idx].terminal = Some(id);
                (id, true)
            }
        };

        for &idx in &path {
            let node = &mut self.nodes[idx];
            node.subtree_weight += weight;
            if is_new {
                node.subtree_completions += 1;
            }
        }

        if let Some(ceiling) = self.cache {
            self.propagate(&path, ceiling);
        }
        Ok(entry_id)
    }

    /// Refreshes the cached top-K lists from the terminal node up to the root.
    /// A node whose cache comes out unchanged leaves every ancestor unchanged
    /// too, so the walk stops there.
    fn propagate(&mut self, path: &[NodeId], ceiling: CacheCeiling) {
        let mut refreshed_levels = 0;
        for &idx in path.iter().rev() {
            let best = self.recompute_best(idx, ceiling);
            if best == self.nodes[idx].best {
                break;
            }
            self.nodes[idx].best = best;
            refreshed_levels += 1;
        }
        log::debug!("cache refreshed on {} of {} path nodes", refreshed_levels, path.len());
    }

    /// The cache a node should hold given its own entry and its children's
    /// current caches.
    pub fn recompute_best(&self, idx: NodeId, ceiling: CacheCeiling) -> Vec<Ranked> {
        let node = &self.nodes[idx];
        let own = node.terminal.map(|id| Ranked {
            entry: id,
            score: self.aggregation.score(&self.entries[id]),
        });
        let child_lists: Vec<&[Ranked]> = node
            .children
            .values()
            .map(|&child_idx| self.nodes[child_idx].best.as_slice())
            .collect();
        merge_top_k(own, &child_lists, &self.entries, ceiling.capacity())
    }

    /// Walks `prefix` from the root. `None` means no inserted sequence starts
    /// with it.
    pub fn lookup_node(&self, prefix: &[S]) -> Option<NodeId> {
        let mut node_idx = ROOT;
        for symbol in prefix {
            node_idx = *self.nodes[node_idx].children.get(symbol)?;
        }
        Some(node_idx)
    }

    pub fn find_entry(&self, sequence: &[S]) -> Option<&WeightEntry<S>> {
        let node_idx = self.lookup_node(sequence)?;
        self.nodes[node_idx].terminal.map(|id| &self.entries[id])
    }

    /// Aggregate weight of everything beneath `node`.
    pub fn subtree_weight(&self, node: NodeId) -> f64 {
        let node = &self.nodes[node];
        self.aggregation.subtree_weight(node.subtree_weight, node.subtree_completions)
    }

    /// Every entry stored at or beneath `node`, in no particular order.
    pub fn terminal_entries(&self, node: NodeId) -> Vec<EntryId> {
        let mut found = Vec::with_capacity(self.nodes[node].subtree_completions);
        let mut stack = vec![node];
        while let Some(idx) = stack.pop() {
            let current = &self.nodes[idx];
            if let Some(id) = current.terminal {
                found.push(id);
            }
            stack.extend(current.children.values().copied());
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn insert_creates_one_node_per_new_prefix() {
        let mut trie = Trie::new(Aggregation::Sum, None);
        trie.insert(&chars("cat"), 1.0).unwrap();
        assert_eq!(trie.node_count(), 4);
        trie.insert(&chars("car"), 1.0).unwrap();
        assert_eq!(trie.node_count(), 5);
        trie.insert(&chars("ca"), 1.0).unwrap();
        assert_eq!(trie.node_count(), 5);
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn reinsertion_accumulates_into_one_entry() {
        let mut trie = Trie::new(Aggregation::Average, None);
        let first = trie.insert(&chars("cat"), 2.0).unwrap();
        let second = trie.insert(&chars("cat"), 5.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(trie.len(), 1);

        let entry = trie.find_entry(&chars("cat")).unwrap();
        assert_eq!(entry.occurrences, 2);
        assert_eq!(entry.total_weight, 7.0);
        assert_eq!(Aggregation::Sum.score(entry), 7.0);
        assert_eq!(Aggregation::Average.score(entry), 3.5);
    }

    #[test]
    fn rejects_invalid_entries_without_touching_the_tree() {
        let mut trie: Trie<char> = Trie::new(Aggregation::Sum, Some(CacheCeiling::Bounded(3)));
        assert!(matches!(trie.insert(&[], 1.0), Err(EngineError::InvalidEntry(_))));
        assert!(matches!(trie.insert(&chars("a"), 0.0), Err(EngineError::InvalidEntry(_))));
        assert!(matches!(trie.insert(&chars("a"), -2.0), Err(EngineError::InvalidEntry(_))));
        assert!(matches!(trie.insert(&chars("a"), f64::NAN), Err(EngineError::InvalidEntry(_))));
        assert!(matches!(
            trie.insert(&chars("a"), f64::INFINITY),
            Err(EngineError::InvalidEntry(_))
        ));
        assert_eq!(trie.node_count(), 1);
        assert!(trie.is_empty());
    }

    #[test]
    fn rejects_weights_whose_total_would_overflow() {
        let mut trie = Trie::new(Aggregation::Sum, Some(CacheCeiling::Bounded(2)));
        trie.insert(&chars("big"), f64::MAX).unwrap();
        assert!(matches!(trie.insert(&chars("big"), f64::MAX), Err(EngineError::InvalidEntry(_))));
        assert!(matches!(trie.insert(&chars("bag"), f64::MAX), Err(EngineError::InvalidEntry(_))));

        let entry = trie.find_entry(&chars("big")).unwrap();
        assert_eq!((entry.occurrences, entry.total_weight), (1, f64::MAX));
        assert_eq!(trie.len(), 1);
        assert!(trie.lookup_node(&chars("ba")).is_none());
        assert!(trie.subtree_weight(0).is_finite());
    }

    #[test]
    fn lookup_distinguishes_missing_prefixes() {
        let mut trie = Trie::new(Aggregation::Sum, None);
        trie.insert(&chars("door"), 1.0).unwrap();
        assert_eq!(trie.lookup_node(&[]), Some(0));
        assert!(trie.lookup_node(&chars("doo")).is_some());
        assert!(trie.lookup_node(&chars("dor")).is_none());
        assert!(trie.lookup_node(&chars("doors")).is_none());
        assert!(trie.find_entry(&chars("doo")).is_none());
    }

    #[test]
    fn subtree_weights_follow_aggregation() {
        let mut sum = Trie::new(Aggregation::Sum, None);
        let mut avg = Trie::new(Aggregation::Average, None);
        for trie in [&mut sum, &mut avg] {
            trie.insert(&chars("cat"), 2.0).unwrap();
            trie.insert(&chars("cat"), 2.0).unwrap();
            trie.insert(&chars("care"), 3.0).unwrap();
        }
        assert_eq!(sum.subtree_weight(0), 7.0);
        assert_eq!(avg.subtree_weight(0), 3.5);

        let car = avg.lookup_node(&chars("car")).unwrap();
        assert_eq!(avg.subtree_weight(car), 3.0);
    }

    #[test]
    fn caches_are_only_kept_when_configured() {
        let mut plain = Trie::new(Aggregation::Sum, None);
        plain.insert(&chars("ab"), 1.0).unwrap();
        assert!(plain.node(0).best().is_empty());

        let mut cached = Trie::new(Aggregation::Sum, Some(CacheCeiling::Bounded(2)));
        cached.insert(&chars("ab"), 1.0).unwrap();
        cached.insert(&chars("ac"), 3.0).unwrap();
        cached.insert(&chars("ad"), 2.0).unwrap();
        let root: Vec<f64> = cached.node(0).best().iter().map(|r| r.score).collect();
        assert_eq!(root, vec![3.0, 2.0]);
    }

    #[test]
    fn every_cache_matches_a_fresh_recompute() {
        let ceiling = CacheCeiling::Bounded(2);
        let mut trie = Trie::new(Aggregation::Average, Some(ceiling));
        let words = [("tea", 4.0), ("ten", 1.0), ("tea", 1.0), ("to", 2.0), ("tend", 9.0), ("ten", 8.0)];
        for (word, weight) in words {
            trie.insert(&chars(word), weight).unwrap();
            for idx in 0..trie.node_count() {
                assert_eq!(trie.node(idx).best(), trie.recompute_best(idx, ceiling).as_slice());
            }
        }
    }

    #[test]
    fn terminal_entries_cover_the_subtree() {
        let mut trie = Trie::new(Aggregation::Sum, None);
        for word in ["an", "and", "ant", "b"] {
            trie.insert(&chars(word), 1.0).unwrap();
        }
        let an = trie.lookup_node(&chars("an")).unwrap();
        let mut found: Vec<String> = trie
            .terminal_entries(an)
            .into_iter()
            .map(|id| trie.entry(id).sequence.iter().collect())
            .collect();
        found.sort();
        assert_eq!(found, vec!["an", "and", "ant"]);
    }
}
