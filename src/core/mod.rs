pub mod engine;
pub mod error;
pub mod strategy;
pub mod tokenizer;
pub mod trie;
pub mod types;
