// src/core/strategy.rs
use crate::core::error::EngineError;
use crate::core::trie::Trie;
use crate::core::types::{CacheCeiling, NodeId, Ranked, Symbol, WeightEntry};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// How a query turns a prefix node into ranked completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStrategy {
    /// Scan the whole subtree on every query.
    Simple,
    /// Read the per-node top-K cache maintained on insert.
    Complex(CacheCeiling),
}

impl QueryStrategy {
    /// The cache the trie has to maintain for this strategy, if any.
    pub fn cache_ceiling(&self) -> Option<CacheCeiling> {
        match self {
            QueryStrategy::Simple => None,
            QueryStrategy::Complex(ceiling) => Some(*ceiling),
        }
    }

    /// Up to `limit` best completions at or beneath `node`.
    pub fn query<S: Symbol>(
        &self,
        trie: &Trie<S>,
        node: NodeId,
        limit: usize,
    ) -> Result<Vec<Ranked>, EngineError> {
        if limit == 0 {
            return Err(EngineError::InvalidLimit(limit));
        }
        match self {
            QueryStrategy::Simple => Ok(scan_subtree(trie, node, Some(limit))),
            QueryStrategy::Complex(ceiling) if ceiling.covers(limit) => {
                Ok(trie.node(node).best().iter().take(limit).copied().collect())
            }
            QueryStrategy::Complex(ceiling) => {
                log::debug!(
                    "limit {} exceeds cache ceiling {}, scanning subtree",
                    limit,
                    ceiling.capacity()
                );
                Ok(scan_subtree(trie, node, Some(limit)))
            }
        }
    }

    /// Every completion at or beneath `node`, best first.
    pub fn query_all<S: Symbol>(&self, trie: &Trie<S>, node: NodeId) -> Vec<Ranked> {
        match self {
            QueryStrategy::Complex(CacheCeiling::Unbounded) => trie.node(node).best().to_vec(),
            _ => scan_subtree(trie, node, None),
        }
    }
}

/// Orders completions best first: higher score wins, equal scores fall back
/// to the lexicographic order of the sequences.
pub fn rank_order<S: Ord>(a: &Ranked, b: &Ranked, entries: &[WeightEntry<S>]) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| entries[a.entry].sequence.cmp(&entries[b.entry].sequence))
}

/// Full traversal of the subtree under `node`, scoring every stored entry
/// with the trie's aggregation. O(n log n) in the subtree size.
pub fn scan_subtree<S: Symbol>(trie: &Trie<S>, node: NodeId, limit: Option<usize>) -> Vec<Ranked> {
    let aggregation = trie.aggregation();
    let mut ranked: Vec<Ranked> = trie
        .terminal_entries(node)
        .into_iter()
        .map(|id| Ranked { entry: id, score: aggregation.score(trie.entry(id)) })
        .collect();
    ranked.sort_by(|a, b| rank_order(a, b, trie.entries()));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

/// Head of one sorted input list during a k-way merge.
struct Head<'a, S> {
    ranked: Ranked,
    sequence: &'a [S],
    list: usize,
    pos: usize,
}

impl<S: Ord> Ord for Head<'_, S> {
    // Max-heap order: the best completion compares greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        self.ranked
            .score
            .total_cmp(&other.ranked.score)
            .then_with(|| other.sequence.cmp(self.sequence))
    }
}

impl<S: Ord> PartialOrd for Head<'_, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: Ord> PartialEq for Head<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<S: Ord> Eq for Head<'_, S> {}

/// Merges a node's own completion with its children's cached lists into the
/// node's new top-`capacity` list.
///
/// Every input list must already be sorted by [`rank_order`]. Subtrees are
/// disjoint, so no entry appears in more than one input.
/// O(capacity * log(lists)) after O(lists) heap setup.
pub fn merge_top_k<S: Ord>(
    own: Option<Ranked>,
    children: &[&[Ranked]],
    entries: &[WeightEntry<S>],
    capacity: usize,
) -> Vec<Ranked> {
    let own_list: Vec<Ranked> = own.into_iter().collect();
    let lists: Vec<&[Ranked]> = std::iter::once(own_list.as_slice())
        .chain(children.iter().copied())
        .collect();

    let mut heap: BinaryHeap<Head<'_, S>> = (0..lists.len())
        .filter_map(|list| head_at(&lists, entries, list, 0))
        .collect();
    let mut merged = Vec::new();
    while merged.len() < capacity {
        let Some(best) = heap.pop() else { break };
        merged.push(best.ranked);
        if let Some(next) = head_at(&lists, entries, best.list, best.pos + 1) {
            heap.push(next);
        }
    }
    merged
}

fn head_at<'a, S>(
    lists: &[&[Ranked]],
    entries: &'a [WeightEntry<S>],
    list: usize,
    pos: usize,
) -> Option<Head<'a, S>> {
    lists[list].get(pos).map(|&ranked| Head {
        ranked,
        sequence: entries[ranked.entry].sequence.as_slice(),
        list,
        pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Aggregation;

    fn entry(word: &str, total: f64) -> WeightEntry<char> {
        WeightEntry { sequence: word.chars().collect(), occurrences: 1, total_weight: total }
    }

    fn ranked(entries: &[WeightEntry<char>], ids: &[usize]) -> Vec<Ranked> {
        ids.iter().map(|&id| Ranked { entry: id, score: entries[id].total_weight }).collect()
    }

    fn words(entries: &[WeightEntry<char>], list: &[Ranked]) -> Vec<String> {
        list.iter().map(|r| entries[r.entry].sequence.iter().collect()).collect()
    }

    #[test]
    fn merge_interleaves_sorted_children() {
        let entries = vec![
            entry("ab", 9.0),
            entry("ac", 4.0),
            entry("ba", 7.0),
            entry("bb", 1.0),
            entry("a", 5.0),
        ];
        let left = ranked(&entries, &[0, 1]);
        let right = ranked(&entries, &[2, 3]);
        let own = Some(Ranked { entry: 4, score: 5.0 });

        let merged = merge_top_k(own, &[left.as_slice(), right.as_slice()], &entries, usize::MAX);
        assert_eq!(words(&entries, &merged), vec!["ab", "ba", "a", "ac", "bb"]);

        let capped = merge_top_k(own, &[left.as_slice(), right.as_slice()], &entries, 2);
        assert_eq!(words(&entries, &capped), vec!["ab", "ba"]);
    }

    #[test]
    fn merge_breaks_ties_lexicographically() {
        let entries = vec![entry("cart", 5.0), entry("car", 5.0), entry("cat", 5.0)];
        let child = ranked(&entries, &[2]);
        let deeper = ranked(&entries, &[0]);
        let own = Some(Ranked { entry: 1, score: 5.0 });

        let merged = merge_top_k(own, &[child.as_slice(), deeper.as_slice()], &entries, 3);
        assert_eq!(words(&entries, &merged), vec!["car", "cart", "cat"]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let entries: Vec<WeightEntry<char>> = Vec::new();
        assert!(merge_top_k(None, &[], &entries, 4).is_empty());
        let empty: &[Ranked] = &[];
        assert!(merge_top_k(None, &[empty, empty], &entries, 4).is_empty());
    }

    #[test]
    fn merge_agrees_with_subtree_scan_at_every_node() {
        let ceiling = CacheCeiling::Bounded(3);
        let mut trie = Trie::new(Aggregation::Sum, Some(ceiling));
        for (word, weight) in [("pear", 2.0), ("peach", 6.0), ("pea", 3.0), ("plum", 6.0), ("pe", 1.0), ("p", 4.0)] {
            trie.insert(&word.chars().collect::<Vec<_>>(), weight).unwrap();
        }
        for idx in 0..trie.node_count() {
            assert_eq!(trie.recompute_best(idx, ceiling), scan_subtree(&trie, idx, Some(3)));
        }
    }

    #[test]
    fn strategies_reject_zero_limit() {
        let trie: Trie<char> = Trie::new(Aggregation::Sum, Some(CacheCeiling::Unbounded));
        for strategy in [QueryStrategy::Simple, QueryStrategy::Complex(CacheCeiling::Unbounded)] {
            assert_eq!(strategy.query(&trie, 0, 0), Err(EngineError::InvalidLimit(0)));
        }
    }

    #[test]
    fn complex_falls_back_to_scan_above_ceiling() {
        let ceiling = CacheCeiling::Bounded(1);
        let mut trie = Trie::new(Aggregation::Sum, Some(ceiling));
        for (word, weight) in [("x", 1.0), ("xy", 2.0), ("xz", 3.0)] {
            trie.insert(&word.chars().collect::<Vec<_>>(), weight).unwrap();
        }
        let complex = QueryStrategy::Complex(ceiling).query(&trie, 0, 3).unwrap();
        let simple = QueryStrategy::Simple.query(&trie, 0, 3).unwrap();
        assert_eq!(complex.len(), 3);
        assert_eq!(complex, simple);
    }
}
