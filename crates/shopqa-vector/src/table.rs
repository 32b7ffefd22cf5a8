//! LanceDB connection and key/value metadata helpers.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use shopqa_core::{Error, Result};

use crate::schema::build_meta_schema;

/// Upper bound on rows scanned from a meta table.
const META_SCAN_LIMIT: usize = 1024;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::storage)
}

pub async fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::storage)?;
    Ok(names.iter().any(|n| n == name))
}

/// Create a key/value table holding `entries`, all stamped with the current time.
pub async fn write_meta(conn: &Connection, table: &str, entries: &BTreeMap<String, String>) -> Result<()> {
    let now = Utc::now().timestamp_millis();
    let keys: Vec<String> = entries.keys().cloned().collect();
    let values: Vec<String> = entries.values().cloned().collect();
    let stamps = vec![now; keys.len()];
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(keys)),
            Arc::new(StringArray::from(values)),
            Arc::new(TimestampMillisecondArray::from(stamps)),
        ],
    )
    .map_err(Error::storage)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    conn.create_table(table, reader).execute().await.map_err(Error::storage)?;
    Ok(())
}

/// Read every key/value pair; `Ok(None)` when the table does not exist.
pub async fn read_meta(conn: &Connection, table: &str) -> Result<Option<BTreeMap<String, String>>> {
    if !has_table(conn, table).await? { return Ok(None); }
    let t = conn.open_table(table).execute().await.map_err(Error::storage)?;
    let mut stream = t.query().limit(META_SCAN_LIMIT).execute().await.map_err(Error::storage)?;
    let mut out = BTreeMap::new();
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(Error::storage)? {
        let keys = batch.column_by_name("key").and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Storage(format!("{table}.key column missing")))?;
        let values = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Storage(format!("{table}.value column missing")))?;
        for i in 0..batch.num_rows() {
            out.insert(keys.value(i).to_string(), values.value(i).to_string());
        }
    }
    Ok(Some(out))
}
