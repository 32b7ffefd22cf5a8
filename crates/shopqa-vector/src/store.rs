//! Durable storage for [`FlatIndex`] backed by LanceDB.
//!
//! An index artifact is a directory holding a `vectors` table
//! (`position`, `vector`) and a `meta` key/value table. Saves are written to a
//! sibling staging directory and renamed into place, so the configured path
//! either holds a complete artifact or nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, UInt64Array};
use arrow_schema::{DataType, Field};
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::{debug, info};

use shopqa_core::{Error, Result};

use crate::flat::FlatIndex;
use crate::schema::{build_vectors_schema, META_TABLE, VECTORS_TABLE};
use crate::table::{has_table, open_db, read_meta, write_meta};

pub const FORMAT_VERSION: &str = "1";
pub const KEY_DIM: &str = "dim";
pub const KEY_COUNT: &str = "count";
pub const KEY_FORMAT: &str = "format_version";

const WRITE_BATCH_ROWS: usize = 1000;

/// A loaded index together with the metadata recorded at save time.
#[derive(Debug, Clone)]
pub struct StoredIndex {
    pub index: FlatIndex,
    pub meta: BTreeMap<String, String>,
}

/// True when something exists at `path`. Whether it is a usable index is only
/// known after [`try_load`].
pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub async fn save(index: &FlatIndex, path: &Path) -> Result<()> {
    save_with_meta(index, path, &BTreeMap::new()).await
}

/// Persist `index`, replacing any artifact at `path`. `extra` entries are
/// stored next to the reserved `dim`/`count`/`format_version` keys.
pub async fn save_with_meta(index: &FlatIndex, path: &Path, extra: &BTreeMap<String, String>) -> Result<()> {
    let staging = staging_dir(path)?;
    if staging.exists() { std::fs::remove_dir_all(&staging)?; }
    std::fs::create_dir_all(&staging)?;

    if let Err(e) = write_artifact(index, &staging, extra).await {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }
    if path.exists() { std::fs::remove_dir_all(path)?; }
    std::fs::rename(&staging, path)?;
    info!(path = %path.display(), vectors = index.len(), dim = index.dim(), "saved index");
    Ok(())
}

async fn write_artifact(index: &FlatIndex, dir: &Path, extra: &BTreeMap<String, String>) -> Result<()> {
    let conn = open_db(&dir.to_string_lossy()).await?;
    if !index.is_empty() {
        let dim = index.dim();
        let list_len = i32::try_from(dim).map_err(|_| Error::Storage(format!("dimension {dim} too large")))?;
        let schema = build_vectors_schema(list_len);
        let item = Arc::new(Field::new("item", DataType::Float32, true));
        let mut batches = Vec::new();
        for (chunk_no, rows) in index.as_slice().chunks(dim * WRITE_BATCH_ROWS).enumerate() {
            let first = chunk_no * WRITE_BATCH_ROWS;
            let positions: Vec<u64> = (first..first + rows.len() / dim).map(|p| p as u64).collect();
            let vectors = FixedSizeListArray::try_new(item.clone(), list_len, Arc::new(Float32Array::from(rows.to_vec())), None)
                .map_err(Error::storage)?;
            let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(UInt64Array::from(positions)), Arc::new(vectors)])
                .map_err(Error::storage)?;
            batches.push(batch);
        }
        debug!(batches = batches.len(), "writing vector batches");
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), schema));
        conn.create_table(VECTORS_TABLE, reader).execute().await.map_err(Error::storage)?;
    }

    let mut meta = extra.clone();
    meta.insert(KEY_DIM.to_string(), index.dim().to_string());
    meta.insert(KEY_COUNT.to_string(), index.len().to_string());
    meta.insert(KEY_FORMAT.to_string(), FORMAT_VERSION.to_string());
    write_meta(&conn, META_TABLE, &meta).await
}

/// Load the index at `path`; a missing artifact is [`Error::IndexNotFound`].
pub async fn load(path: &Path) -> Result<FlatIndex> {
    try_load(path)
        .await?
        .map(|stored| stored.index)
        .ok_or_else(|| Error::IndexNotFound(path.to_path_buf()))
}

/// Load the index and its metadata. `Ok(None)` means nothing is stored at
/// `path`; an unreadable or inconsistent artifact is an error.
pub async fn try_load(path: &Path) -> Result<Option<StoredIndex>> {
    if !path.exists() { return Ok(None); }
    if !path.is_dir() {
        return Err(Error::Storage(format!("{} is not an index directory", path.display())));
    }
    let conn = open_db(&path.to_string_lossy()).await?;
    let meta = read_meta(&conn, META_TABLE)
        .await?
        .ok_or_else(|| Error::Storage(format!("{} has no {} table", path.display(), META_TABLE)))?;
    let dim = meta_usize(&meta, KEY_DIM)?;
    let count = meta_usize(&meta, KEY_COUNT)?;
    let total = count
        .checked_mul(dim)
        .ok_or_else(|| Error::Storage(format!("index meta count {count} x dim {dim} overflows")))?;
    if count == 0 {
        debug!(path = %path.display(), "loaded empty index");
        return Ok(Some(StoredIndex { index: FlatIndex::empty(), meta }));
    }
    if dim == 0 {
        return Err(Error::Storage(format!("index meta records {count} vectors of dimension 0")));
    }
    // meta values are untrusted; fail instead of aborting on a huge allocation
    let mut data: Vec<f32> = Vec::new();
    data.try_reserve_exact(total)
        .map_err(|e| Error::Storage(format!("index of {count} x {dim} floats cannot be allocated: {e}")))?;
    data.resize(total, 0.0);
    if !has_table(&conn, VECTORS_TABLE).await? {
        return Err(Error::Storage(format!("{} has no {} table", path.display(), VECTORS_TABLE)));
    }

    let table = conn.open_table(VECTORS_TABLE).execute().await.map_err(Error::storage)?;
    let mut stream = table.query().limit(count).execute().await.map_err(Error::storage)?;
    let mut seen = vec![false; count];
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(Error::storage)? {
        let positions = batch.column_by_name("position").and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| Error::Storage("vectors.position column missing".into()))?;
        let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| Error::Storage("vectors.vector column missing".into()))?;
        if vectors.value_length() as usize != dim {
            return Err(Error::DimensionMismatch { expected: dim, got: vectors.value_length() as usize });
        }
        for i in 0..batch.num_rows() {
            let pos = positions.value(i) as usize;
            if pos >= count || seen[pos] || vectors.is_null(i) {
                return Err(Error::Storage(format!("corrupt index: bad or duplicate row at position {pos}")));
            }
            let row = vectors.value(i);
            let values = row
                .as_primitive_opt::<Float32Type>()
                .ok_or_else(|| Error::Storage(format!("vector at position {pos} is {}, not Float32", row.data_type())))?
                .values();
            data[pos * dim..(pos + 1) * dim].copy_from_slice(values);
            seen[pos] = true;
        }
    }
    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(Error::Storage(format!("corrupt index: position {missing} of {count} missing")));
    }
    let index = FlatIndex::from_parts(dim, data)?;
    info!(path = %path.display(), vectors = index.len(), dim, "loaded index");
    Ok(Some(StoredIndex { index, meta }))
}

fn meta_usize(meta: &BTreeMap<String, String>, key: &str) -> Result<usize> {
    meta.get(key)
        .ok_or_else(|| Error::Storage(format!("index meta is missing '{key}'")))?
        .parse()
        .map_err(|e| Error::Storage(format!("index meta '{key}': {e}")))
}

fn staging_dir(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("index path {} has no file name", path.display())))?;
    let mut staged = name.to_os_string();
    staged.push(".staging");
    Ok(path.with_file_name(staged))
}
