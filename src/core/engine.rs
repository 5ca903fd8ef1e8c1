use crate::core::error::EngineError;
use crate::core::strategy::QueryStrategy;
use crate::core::trie::Trie;
use crate::core::types::{Aggregation, CacheCeiling, Completion, Ranked, Record, Symbol, WeightEntry};
use serde::{Deserialize, Deserializer, Serialize};

/// Which query strategy an engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Simple,
    #[default]
    Complex,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(StrategyKind::Simple),
            "complex" => Ok(StrategyKind::Complex),
            other => Err(format!("unknown strategy '{other}', expected simple or complex")),
        }
    }
}

/// Cache size used when a configuration does not name one.
pub const DEFAULT_CACHE_CEILING: usize = 20;

/// Construction parameters, fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Largest number of completions each node caches under the complex
    /// strategy; `None` caches every completion. Ignored by the simple
    /// strategy. In TOML this is a number or `"unbounded"`.
    #[serde(default = "default_cache_ceiling", deserialize_with = "deserialize_ceiling")]
    pub cache_ceiling: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregation: Aggregation::default(),
            strategy: StrategyKind::default(),
            cache_ceiling: default_cache_ceiling(),
        }
    }
}

fn default_cache_ceiling() -> Option<usize> {
    Some(DEFAULT_CACHE_CEILING)
}

fn deserialize_ceiling<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ceiling {
        Size(usize),
        Word(String),
    }

    match Ceiling::deserialize(deserializer)? {
        Ceiling::Size(k) => Ok(Some(k)),
        Ceiling::Word(word) => word
            .parse::<CacheCeiling>()
            .map(|ceiling| ceiling.bound())
            .map_err(serde::de::Error::custom),
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.strategy == StrategyKind::Complex && self.cache_ceiling == Some(0) {
            return Err(EngineError::InvalidCacheCeiling);
        }
        Ok(())
    }

    /// Drops the ceiling when the simple strategy would ignore it.
    fn normalized(self) -> Self {
        match self.strategy {
            StrategyKind::Simple => Self { cache_ceiling: None, ..self },
            StrategyKind::Complex => self,
        }
    }
}

/// What to do with a record the engine rejects during a batch insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    Skip,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Weighted prefix autocompletion over sequences of `S`.
///
/// Built once from a batch of inserts, then queried. Mutation takes `&mut self`
/// and queries take `&self`, so the borrow rules already keep readers away
/// from a half-propagated cache.
#[derive(Clone, Serialize, Deserialize)]
pub struct AutocompleteEngine<S: Symbol> {
    trie: Trie<S>,
    strategy: QueryStrategy,
}

impl<S: Symbol> AutocompleteEngine<S> {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let strategy = match config.strategy {
            StrategyKind::Simple => QueryStrategy::Simple,
            StrategyKind::Complex => QueryStrategy::Complex(CacheCeiling::from_option(config.cache_ceiling)),
        };
        Ok(Self {
            trie: Trie::new(config.aggregation, strategy.cache_ceiling()),
            strategy,
        })
    }

    pub fn aggregation(&self) -> Aggregation {
        self.trie.aggregation()
    }

    pub fn strategy(&self) -> QueryStrategy {
        self.strategy
    }

    /// The parameters this engine was built with. A simple engine reports no
    /// cache ceiling.
    pub fn config(&self) -> EngineConfig {
        let (strategy, cache_ceiling) = match self.strategy {
            QueryStrategy::Simple => (StrategyKind::Simple, None),
            QueryStrategy::Complex(ceiling) => (StrategyKind::Complex, ceiling.bound()),
        };
        EngineConfig { aggregation: self.aggregation(), strategy, cache_ceiling }
    }

    /// Whether building from `config` would give an engine that ranks and
    /// caches exactly like this one.
    pub fn is_built_with(&self, config: &EngineConfig) -> bool {
        self.config() == config.normalized()
    }

    /// Number of distinct sequences indexed.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn insert(&mut self, sequence: &[S], weight: f64) -> Result<(), EngineError> {
        self.trie.insert(sequence, weight).map(|_| ())
    }

    /// Inserts every record. Under `BatchPolicy::Abort` the first rejected
    /// record stops the batch; records before it stay inserted.
    pub fn insert_batch<I>(&mut self, records: I, policy: BatchPolicy) -> Result<BatchReport, EngineError>
    where
        I: IntoIterator<Item = Record<S>>,
    {
        let mut report = BatchReport::default();
        for record in records {
            match self.trie.insert(&record.sequence, record.weight) {
                Ok(_) => report.inserted += 1,
                Err(e) if policy == BatchPolicy::Skip => {
                    log::warn!("skipping {:?}: {}", record.sequence, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        log::info!(
            "indexed {} records ({} distinct, {} skipped)",
            report.inserted,
            self.len(),
            report.skipped
        );
        Ok(report)
    }

    /// Up to `limit` completions of `prefix`, best first. An unknown prefix
    /// yields no completions rather than an error.
    pub fn autocomplete(&self, prefix: &[S], limit: usize) -> Result<Vec<Completion<S>>, EngineError> {
        if limit == 0 {
            return Err(EngineError::InvalidLimit(limit));
        }
        let Some(node) = self.trie.lookup_node(prefix) else {
            return Ok(Vec::new());
        };
        let ranked = self.strategy.query(&self.trie, node, limit)?;
        Ok(self.materialize(ranked))
    }

    /// Every completion of `prefix`, best first.
    pub fn autocomplete_all(&self, prefix: &[S]) -> Vec<Completion<S>> {
        match self.trie.lookup_node(prefix) {
            Some(node) => self.materialize(self.strategy.query_all(&self.trie, node)),
            None => Vec::new(),
        }
    }

    /// Aggregate weight of every completion under `prefix`.
    pub fn prefix_weight(&self, prefix: &[S]) -> Option<f64> {
        self.trie.lookup_node(prefix).map(|node| self.trie.subtree_weight(node))
    }

    /// Accumulated accounting of exactly `sequence`, if it was ever inserted.
    pub fn entry(&self, sequence: &[S]) -> Option<&WeightEntry<S>> {
        self.trie.find_entry(sequence)
    }

    fn materialize(&self, ranked: Vec<Ranked>) -> Vec<Completion<S>> {
        ranked
            .into_iter()
            .map(|r| Completion {
                sequence: self.trie.entry(r.entry).sequence.clone(),
                score: r.score,
            })
            .collect()
    }
}
