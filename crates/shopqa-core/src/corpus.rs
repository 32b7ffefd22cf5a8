//! Corpus loading and document-list persistence.
//!
//! The corpus is a JSON array of product records (or JSON Lines when the file
//! ends in `.jsonl`). The document list is the corpus snapshot taken at build
//! time; its order is the index position order.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Document;

/// Read the source corpus. A missing file is [`Error::CorpusNotFound`].
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    load_corpus_with_fingerprint(path).map(|(documents, _)| documents)
}

/// Read the source corpus once and return its records together with the
/// BLAKE3 digest of exactly the bytes that were parsed.
pub fn load_corpus_with_fingerprint(path: &Path) -> Result<(Vec<Document>, String)> {
    if !path.exists() {
        return Err(Error::CorpusNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    let fingerprint = blake3::hash(&bytes).to_hex().to_string();
    let content = String::from_utf8(bytes)
        .map_err(|e| Error::InvalidCorpus(format!("{}: {}", path.display(), e)))?;
    let records = if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        parse_json_lines(&content, path)?
    } else {
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) => items,
            Ok(_) => return Err(Error::InvalidCorpus(format!("{}: expected a JSON array of records", path.display()))),
            Err(e) => return Err(Error::InvalidCorpus(format!("{}: {}", path.display(), e))),
        }
    };
    let documents = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| into_document(i, record, path))
        .collect::<Result<Vec<_>>>()?;
    info!(count = documents.len(), path = %path.display(), "loaded corpus");
    Ok((documents, fingerprint))
}

fn parse_json_lines(content: &str, path: &Path) -> Result<Vec<Value>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::InvalidCorpus(format!("{}:{}: {}", path.display(), n + 1, e)))
        })
        .collect()
}

fn into_document(position: usize, record: Value, path: &Path) -> Result<Document> {
    if !record.is_object() {
        return Err(Error::InvalidCorpus(format!("{}: record {} is not an object", path.display(), position)));
    }
    serde_json::from_value(record)
        .map_err(|e| Error::InvalidCorpus(format!("{}: record {}: {}", path.display(), position, e)))
}

/// Persist the document list atomically (temp file in the same directory, then rename).
pub fn save_documents(path: &Path, documents: &[Document]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, documents)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!(count = documents.len(), path = %path.display(), "saved document list");
    Ok(())
}

/// Delete the persisted document list; absent is fine.
pub fn remove_documents(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Read the persisted document list; `Ok(None)` when it has not been written yet.
pub fn try_load_documents(path: &Path) -> Result<Option<Vec<Document>>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let documents = serde_json::from_str(&content)
        .map_err(|e| Error::Storage(format!("document list {} is corrupt: {}", path.display(), e)))?;
    Ok(Some(documents))
}

pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    try_load_documents(path)?.ok_or_else(|| Error::IndexNotFound(path.to_path_buf()))
}

/// BLAKE3 hex digest of the corpus bytes, used for the opt-in staleness check.
pub fn corpus_fingerprint(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::CorpusNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// BLAKE3 hex digest of a document list's canonical JSON encoding. Recorded
/// with the index so a document list from another build is detected on load.
pub fn documents_fingerprint(documents: &[Document]) -> Result<String> {
    let bytes = serde_json::to_vec(documents)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
