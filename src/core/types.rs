// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Index of a node inside the trie's arena. The root is always `0`.
pub type NodeId = usize;

/// Index of a weight entry inside the trie's entry store.
pub type EntryId = usize;

/// One unit of a completable sequence: a letter, a word, a melodic interval.
///
/// Ordering is what breaks ties between equally scored completions, so it has
/// to be total and stable across runs.
pub trait Symbol: Clone + Eq + Hash + Ord + Debug {}

impl<T: Clone + Eq + Hash + Ord + Debug> Symbol for T {}

/// Accumulated weight of one distinct inserted sequence.
/// This is the "value" stored at a terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry<S> {
    pub sequence: Vec<S>,
    /// How many times this exact sequence has been inserted.
    pub occurrences: u64,
    /// Sum of every weight it was inserted with.
    pub total_weight: f64,
}

impl<S> WeightEntry<S> {
    pub fn new(sequence: Vec<S>, weight: f64) -> Self {
        Self { sequence, occurrences: 1, total_weight: weight }
    }

    pub fn record(&mut self, weight: f64) {
        self.occurrences += 1;
        self.total_weight += weight;
    }
}

/// How accumulated weight turns into a ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    #[serde(alias = "avg")]
    Average,
}

impl Aggregation {
    /// Score of a single completion, always derived from the current totals.
    pub fn score<S>(&self, entry: &WeightEntry<S>) -> f64 {
        match self {
            Aggregation::Sum => entry.total_weight,
            Aggregation::Average => entry.total_weight / entry.occurrences as f64,
        }
    }

    /// Aggregate weight of a whole subtree holding `completions` distinct
    /// sequences whose total weights add up to `total_weight`.
    pub fn subtree_weight(&self, total_weight: f64, completions: usize) -> f64 {
        match self {
            Aggregation::Sum => total_weight,
            Aggregation::Average if completions == 0 => 0.0,
            Aggregation::Average => total_weight / completions as f64,
        }
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Aggregation::Sum),
            "average" | "avg" => Ok(Aggregation::Average),
            other => Err(format!("unknown aggregation '{other}', expected sum or average")),
        }
    }
}

/// Upper bound on how many completions each node keeps in its top-K cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheCeiling {
    Bounded(usize),
    Unbounded,
}

impl CacheCeiling {
    pub fn from_option(ceiling: Option<usize>) -> Self {
        ceiling.map_or(CacheCeiling::Unbounded, CacheCeiling::Bounded)
    }

    /// Number of entries a cache may hold.
    pub fn capacity(&self) -> usize {
        match self {
            CacheCeiling::Bounded(k) => *k,
            CacheCeiling::Unbounded => usize::MAX,
        }
    }

    /// The numeric bound, `None` when unbounded.
    pub fn bound(&self) -> Option<usize> {
        match self {
            CacheCeiling::Bounded(k) => Some(*k),
            CacheCeiling::Unbounded => None,
        }
    }

    /// Whether a query for `limit` results can be answered from the cache alone.
    pub fn covers(&self, limit: usize) -> bool {
        limit <= self.capacity()
    }
}

impl std::str::FromStr for CacheCeiling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unbounded" => Ok(CacheCeiling::Unbounded),
            other => other
                .parse()
                .map(CacheCeiling::Bounded)
                .map_err(|_| format!("invalid cache ceiling '{other}', expected a number or unbounded")),
        }
    }
}

/// A completion as the query strategies see it: an entry and its score at the
/// moment it was ranked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ranked {
    pub entry: EntryId,
    pub score: f64,
}

/// A completion handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion<S> {
    pub sequence: Vec<S>,
    pub score: f64,
}

/// One `(sequence, weight)` pair produced by an ingestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<S> {
    pub sequence: Vec<S>,
    pub weight: f64,
}
