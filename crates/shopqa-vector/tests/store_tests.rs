use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Float64Array, RecordBatch, RecordBatchIterator, UInt64Array};
use arrow_schema::{DataType, Field, Schema};

use shopqa_core::Error;
use shopqa_vector::schema::{META_TABLE, VECTORS_TABLE};
use shopqa_vector::table::{open_db, write_meta};
use shopqa_vector::{store, FlatIndex};

fn sample(n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|i| (0..dim).map(|j| ((i * 31 + j * 7) % 17) as f32 / 17.0 - 0.5).collect())
        .collect()
}

#[tokio::test]
async fn save_then_load_preserves_vectors_and_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("products.index");
    let vectors = sample(25, 8);
    let index = FlatIndex::build(&vectors)?;

    store::save(&index, &path).await?;
    assert!(store::exists(&path));

    let loaded = store::load(&path).await?;
    assert_eq!(loaded.len(), 25);
    assert_eq!(loaded.dim(), 8);
    for (pos, v) in vectors.iter().enumerate() {
        let row = loaded.vector(pos).unwrap();
        assert!(row.iter().zip(v).all(|(a, b)| (a - b).abs() < 1e-6), "row {pos} differs");
    }
    let q = &vectors[11];
    assert_eq!(loaded.search(q, 3)?, index.search(q, 3)?);
    Ok(())
}

#[tokio::test]
async fn large_index_spans_several_write_batches() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("big.index");
    let index = FlatIndex::build(&sample(2500, 4))?;
    store::save(&index, &path).await?;
    let loaded = store::load(&path).await?;
    assert_eq!(loaded, index);
    Ok(())
}

#[tokio::test]
async fn missing_artifact_is_reported() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("absent.index");
    assert!(!store::exists(&path));
    assert!(store::try_load(&path).await?.is_none());
    assert!(matches!(store::load(&path).await, Err(Error::IndexNotFound(p)) if p == path));
    Ok(())
}

#[tokio::test]
async fn empty_index_round_trips() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("empty.index");
    store::save(&FlatIndex::empty(), &path).await?;
    let stored = store::try_load(&path).await?.unwrap();
    assert!(stored.index.is_empty());
    assert_eq!(stored.meta.get(store::KEY_COUNT).map(String::as_str), Some("0"));
    Ok(())
}

#[tokio::test]
async fn extra_meta_is_kept_next_to_reserved_keys() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("meta.index");
    let mut extra = BTreeMap::new();
    extra.insert("model_id".to_string(), "hashing:xxh64:d4".to_string());
    extra.insert("count".to_string(), "999".to_string());
    store::save_with_meta(&FlatIndex::build(&sample(3, 4))?, &path, &extra).await?;

    let stored = store::try_load(&path).await?.unwrap();
    assert_eq!(stored.meta["model_id"], "hashing:xxh64:d4");
    assert_eq!(stored.meta[store::KEY_COUNT], "3");
    assert_eq!(stored.meta[store::KEY_DIM], "4");
    assert_eq!(stored.meta[store::KEY_FORMAT], store::FORMAT_VERSION);
    Ok(())
}

#[tokio::test]
async fn saving_again_replaces_previous_artifact() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("products.index");
    store::save(&FlatIndex::build(&sample(10, 6))?, &path).await?;
    let replacement = FlatIndex::build(&sample(4, 3))?;
    store::save(&replacement, &path).await?;

    let loaded = store::load(&path).await?;
    assert_eq!(loaded, replacement);
    assert!(!tmp.path().join("products.index.staging").exists());
    Ok(())
}

#[tokio::test]
async fn directory_without_meta_is_a_storage_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("junk.index");
    std::fs::create_dir_all(&path)?;
    assert!(matches!(store::try_load(&path).await, Err(Error::Storage(_))));

    let file = tmp.path().join("file.index");
    std::fs::write(&file, b"not an index")?;
    assert!(matches!(store::load(&file).await, Err(Error::Storage(_))));
    Ok(())
}

async fn write_raw_meta(dir: &Path, dim: &str, count: &str) -> anyhow::Result<lancedb::Connection> {
    std::fs::create_dir_all(dir)?;
    let conn = open_db(&dir.to_string_lossy()).await?;
    let mut meta = BTreeMap::new();
    meta.insert(store::KEY_DIM.to_string(), dim.to_string());
    meta.insert(store::KEY_COUNT.to_string(), count.to_string());
    meta.insert(store::KEY_FORMAT.to_string(), store::FORMAT_VERSION.to_string());
    write_meta(&conn, META_TABLE, &meta).await?;
    Ok(conn)
}

#[tokio::test]
async fn implausible_meta_sizes_are_storage_errors() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;

    let overflow = tmp.path().join("overflow.index");
    write_raw_meta(&overflow, &usize::MAX.to_string(), "2").await?;
    assert!(matches!(store::try_load(&overflow).await, Err(Error::Storage(_))));

    let huge = tmp.path().join("huge.index");
    write_raw_meta(&huge, &(1usize << 22).to_string(), &(1usize << 40).to_string()).await?;
    assert!(matches!(store::try_load(&huge).await, Err(Error::Storage(_))));

    let zero_dim = tmp.path().join("zero.index");
    write_raw_meta(&zero_dim, "0", "5").await?;
    assert!(matches!(store::try_load(&zero_dim).await, Err(Error::Storage(_))));
    Ok(())
}

#[tokio::test]
async fn non_float32_vectors_are_storage_errors() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("f64.index");
    let conn = write_raw_meta(&path, "2", "1").await?;

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("position", DataType::UInt64, false),
        Field::new("vector", DataType::FixedSizeList(item.clone(), 2), false),
    ]));
    let vectors = FixedSizeListArray::try_new(item, 2, Arc::new(Float64Array::from(vec![0.5, 1.5])), None)?;
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(UInt64Array::from(vec![0u64])), Arc::new(vectors)])?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    conn.create_table(VECTORS_TABLE, reader).execute().await?;

    assert!(matches!(store::load(&path).await, Err(Error::Storage(_))));
    Ok(())
}
