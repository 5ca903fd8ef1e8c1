// File: src/persistence.rs
use crate::core::engine::AutocompleteEngine;
use crate::core::types::Symbol;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Writes the whole engine, caches included, so a reload skips re-ingestion.
/// The file is replaced atomically.
pub fn save_to_disk<S>(engine: &AutocompleteEngine<S>, path: &Path) -> Result<(), PersistError>
where
    S: Symbol + Serialize,
{
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    let mut writer = BufWriter::new(&temp_file);
    bincode::serialize_into(&mut writer, engine)?;
    writer.flush()?;
    drop(writer);

    temp_file.persist(path).map_err(|e| e.error)?;
    log::info!("saved snapshot of {} sequences to {}", engine.len(), path.display());
    Ok(())
}

pub fn load_from_disk<S>(path: &Path) -> Result<AutocompleteEngine<S>, PersistError>
where
    S: Symbol + DeserializeOwned,
{
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let engine: AutocompleteEngine<S> = bincode::deserialize_from(reader)?;
    log::info!("loaded snapshot of {} sequences from {}", engine.len(), path.display());
    Ok(engine)
}
