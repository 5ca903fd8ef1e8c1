// src/core/tokenizer.rs
use crate::core::types::Symbol;

/// Converts raw input into symbols for the engine and renders stored
/// sequences back into display form.
pub trait Tokenizer {
    type Symbol: Symbol;

    fn tokenize(&self, raw: &str) -> Vec<Self::Symbol>;

    fn render(&self, sequence: &[Self::Symbol]) -> String;
}

/// Completes text one character at a time. Only lowercase letters, digits and
/// spaces are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct LetterTokenizer;

impl Tokenizer for LetterTokenizer {
    type Symbol = char;

    fn tokenize(&self, raw: &str) -> Vec<char> {
        raw.chars()
            .flat_map(char::to_lowercase)
            .filter(|c| c.is_alphanumeric() || *c == ' ')
            .collect()
    }

    fn render(&self, sequence: &[char]) -> String {
        sequence.iter().collect()
    }
}

/// Completes text one word at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceTokenizer;

impl Tokenizer for SentenceTokenizer {
    type Symbol = String;

    fn tokenize(&self, raw: &str) -> Vec<String> {
        raw.split_whitespace()
            .map(|word| {
                word.chars()
                    .flat_map(char::to_lowercase)
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty())
            .collect()
    }

    fn render(&self, sequence: &[String]) -> String {
        sequence.join(" ")
    }
}

/// Completes melodies by their pitch intervals, so a tune matches regardless
/// of the key it starts in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MelodyTokenizer;

impl MelodyTokenizer {
    /// Semitone steps between consecutive pitches.
    pub fn intervals(pitches: &[i32]) -> Vec<i32> {
        pitches.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

impl Tokenizer for MelodyTokenizer {
    type Symbol = i32;

    /// Accepts intervals separated by whitespace or commas, e.g. `"12, -5"`.
    /// Anything that is not an integer is ignored.
    fn tokenize(&self, raw: &str) -> Vec<i32> {
        raw.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .filter_map(|token| token.trim_start_matches('+').parse().ok())
            .collect()
    }

    fn render(&self, sequence: &[i32]) -> String {
        sequence
            .iter()
            .map(|step| format!("{step:+}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
