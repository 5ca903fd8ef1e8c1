// src/lib.rs

pub mod config;
pub mod core;
pub mod ingest;
pub mod persistence;
pub use crate::core::engine::{AutocompleteEngine, BatchPolicy, BatchReport, EngineConfig, StrategyKind};
pub use crate::core::error::EngineError;
pub use crate::core::types::{Aggregation, Completion, Record, WeightEntry};
