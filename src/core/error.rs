// src/core/error.rs

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid entry: {0}")]
    InvalidEntry(&'static str),
    #[error("invalid limit: {0}, expected a positive number of completions")]
    InvalidLimit(usize),
    #[error("cache ceiling must be at least 1")]
    InvalidCacheCeiling,
}
