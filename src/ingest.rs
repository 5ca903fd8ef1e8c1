// File: src/ingest.rs
use crate::core::tokenizer::{MelodyTokenizer, Tokenizer};
use crate::core::types::Record;
use std::io::{BufRead, Read};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Validation { line: u64, reason: String },
}

/// One record per line of plain text, each with weight 1.
/// Lines with nothing left after tokenizing are skipped.
pub fn read_lines<R, T>(reader: R, tokenizer: &T) -> Result<Vec<Record<T::Symbol>>, IngestError>
where
    R: BufRead,
    T: Tokenizer,
{
    let mut records = Vec::new();
    for line in reader.lines() {
        let sequence = tokenizer.tokenize(&line?);
        if !sequence.is_empty() {
            records.push(Record { sequence, weight: 1.0 });
        }
    }
    log::info!("read {} lines of text", records.len());
    Ok(records)
}

/// Rows of `text,weight`.
pub fn read_weighted_csv<R, T>(reader: R, tokenizer: &T) -> Result<Vec<Record<T::Symbol>>, IngestError>
where
    R: Read,
    T: Tokenizer,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let (Some(text), Some(weight)) = (row.get(0), row.get(1)) else {
            return Err(IngestError::Validation {
                line,
                reason: "expected two columns: text,weight".to_string(),
            });
        };
        let weight: f64 = weight.trim().parse().map_err(|_| IngestError::Validation {
            line,
            reason: format!("weight '{weight}' is not a number"),
        })?;

        let sequence = tokenizer.tokenize(text);
        if sequence.is_empty() {
            log::warn!("line {}: no symbols in '{}', skipping", line, text);
            continue;
        }
        records.push(Record { sequence, weight });
    }
    log::info!("read {} weighted rows", records.len());
    Ok(records)
}

/// A named tune. Notes are `(pitch, duration)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    pub name: String,
    pub notes: Vec<(i32, u32)>,
}

impl Melody {
    pub fn intervals(&self) -> Vec<i32> {
        let pitches: Vec<i32> = self.notes.iter().map(|&(pitch, _)| pitch).collect();
        MelodyTokenizer::intervals(&pitches)
    }
}

/// Rows of `name,pitch,duration,pitch,duration,...`. Pairs with a blank pitch
/// or duration are dropped.
pub fn read_melodies<R: Read>(reader: R) -> Result<Vec<Melody>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut melodies = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let Some(name) = row.get(0) else { continue };

        let fields: Vec<&str> = row.iter().skip(1).map(str::trim).collect();
        let mut notes = Vec::with_capacity(fields.len() / 2);
        for pair in fields.chunks(2) {
            let [pitch, duration] = pair else { break };
            if pitch.is_empty() || duration.is_empty() {
                continue;
            }
            let parsed: Option<(i32, u32)> = pitch.parse().ok().zip(duration.parse().ok());
            let Some(note) = parsed else {
                return Err(IngestError::Validation {
                    line,
                    reason: format!("bad note '{pitch},{duration}' in '{name}'"),
                });
            };
            notes.push(note);
        }
        melodies.push(Melody { name: name.to_string(), notes });
    }
    log::info!("read {} melodies", melodies.len());
    Ok(melodies)
}

/// Interval records for the engine, one per melody with at least two notes.
pub fn melody_records(melodies: &[Melody]) -> Vec<Record<i32>> {
    melodies
        .iter()
        .filter_map(|melody| {
            let sequence = melody.intervals();
            if sequence.is_empty() {
                log::warn!("melody '{}' has fewer than two notes, skipping", melody.name);
                return None;
            }
            Some(Record { sequence, weight: 1.0 })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::{LetterTokenizer, SentenceTokenizer};

    #[test]
    fn text_lines_become_unit_weight_records() {
        let text = "An\n\n!!\nand\nMany things\n";
        let records = read_lines(text.as_bytes(), &LetterTokenizer).unwrap();
        let lines: Vec<String> = records.iter().map(|r| r.sequence.iter().collect()).collect();
        assert_eq!(lines, vec!["an", "and", "many things"]);
        assert!(records.iter().all(|r| r.weight == 1.0));
    }

    #[test]
    fn weighted_csv_keeps_weights() {
        let csv = "the animal,100\nThe Animal!,50\n???,3\nhow to cook,7.5\n";
        let records = read_weighted_csv(csv.as_bytes(), &SentenceTokenizer).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sequence, vec!["the", "animal"]);
        assert_eq!(records[1].sequence, records[0].sequence);
        assert_eq!(records[2].weight, 7.5);
    }

    #[test]
    fn weighted_csv_rejects_bad_weights() {
        let err = read_weighted_csv("fine,1\nbroken,heavy\n".as_bytes(), &SentenceTokenizer).unwrap_err();
        assert!(matches!(err, IngestError::Validation { line: 2, .. }), "{err}");

        let err = read_weighted_csv("lonely\n".as_bytes(), &SentenceTokenizer).unwrap_err();
        assert!(matches!(err, IngestError::Validation { line: 1, .. }), "{err}");
    }

    #[test]
    fn melodies_parse_into_intervals() {
        let csv = "Rising,60,1,62,1,67,2\nSingle,60,4\nGappy,60,1,,,72,1\n";
        let melodies = read_melodies(csv.as_bytes()).unwrap();
        assert_eq!(melodies.len(), 3);
        assert_eq!(melodies[0].intervals(), vec![2, 5]);
        assert_eq!(melodies[2].notes, vec![(60, 1), (72, 1)]);

        let records = melody_records(&melodies);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sequence, vec![12]);
    }

    #[test]
    fn melodies_reject_garbage_notes() {
        let err = read_melodies("Bad,sixty,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Validation { .. }));
    }
}
