use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{IngestError, Result};
use crate::models::{BatchStatus, FileOutcome, FileStatus, IngestionBatch};

pub fn create_batch(conn: &Connection, batch: &IngestionBatch) -> Result<()> {
    let files = serde_json::to_string(&batch.files)?;
    conn.execute(
        "INSERT INTO batches (batch_id, user, files, record_count, status, message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            batch.batch_id,
            batch.user,
            files,
            batch.record_count as i64,
            batch.status.as_str(),
            batch.message,
        ],
    )?;
    Ok(())
}

pub fn record_file_outcomes(conn: &mut Connection, batch_id: &str, outcomes: &[FileOutcome]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO batch_files (batch_id, filename, checksum, status, record_count, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for o in outcomes {
            stmt.execute(params![
                batch_id,
                o.filename,
                o.checksum,
                o.status.as_str(),
                o.record_count as i64,
                o.detail,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Move a running batch to its final status. A batch leaves `running` once.
pub fn finish_batch(
    conn: &Connection,
    batch_id: &str,
    status: BatchStatus,
    record_count: usize,
    message: &str,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE batches SET status = ?1, record_count = ?2, message = ?3, finished_at = datetime('now')
         WHERE batch_id = ?4 AND status = 'running'",
        params![status.as_str(), record_count as i64, message, batch_id],
    )?;
    if updated == 0 {
        let exists = get_batch(conn, batch_id)?.is_some();
        if !exists {
            return Err(IngestError::UnknownBatch(batch_id.to_string()));
        }
        return Err(IngestError::Other(format!("Batch {batch_id} is already finished")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const BATCH_COLUMNS: &str = "batch_id, files, user, status, record_count, message, created_at";

fn batch_from_row(row: &Row) -> rusqlite::Result<IngestionBatch> {
    let files: String = row.get(1)?;
    let status: String = row.get(3)?;
    let count: i64 = row.get(4)?;
    Ok(IngestionBatch {
        batch_id: row.get(0)?,
        files: serde_json::from_str(&files).unwrap_or_default(),
        user: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        status: status.parse().unwrap_or(BatchStatus::Failed),
        record_count: count.max(0) as usize,
        message: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Most recent batches first.
pub fn list_batches(conn: &Connection, limit: usize) -> Result<Vec<IngestionBatch>> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches ORDER BY id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([limit as i64], batch_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn get_batch(conn: &Connection, batch_id: &str) -> Result<Option<IngestionBatch>> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1");
    Ok(conn.query_row(&sql, [batch_id], batch_from_row).optional()?)
}

pub fn file_outcomes(conn: &Connection, batch_id: &str) -> Result<Vec<FileOutcome>> {
    let mut stmt = conn.prepare(
        "SELECT filename, checksum, status, record_count, detail FROM batch_files
         WHERE batch_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([batch_id], |row| {
        let status: String = row.get(2)?;
        let count: i64 = row.get(3)?;
        Ok(FileOutcome {
            filename: row.get(0)?,
            checksum: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            status: status.parse().unwrap_or(FileStatus::Unreadable),
            record_count: count.max(0) as usize,
            detail: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// The batch that already loaded a file with this content, if any.
pub fn find_loaded_checksum(conn: &Connection, checksum: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT f.batch_id FROM batch_files f
             JOIN batches b ON b.batch_id = f.batch_id
             WHERE f.checksum = ?1 AND f.status = 'loaded' AND b.status = 'completed'
             ORDER BY f.id DESC LIMIT 1",
            [checksum],
            |row| row.get(0),
        )
        .optional()?)
}

// ---------------------------------------------------------------------------
// Purge
// ---------------------------------------------------------------------------

/// Delete a batch with its file outcomes and transactions. Returns the
/// number of transactions removed.
pub fn purge_batch(conn: &mut Connection, batch_id: &str) -> Result<usize> {
    if get_batch(conn, batch_id)?.is_none() {
        return Err(IngestError::UnknownBatch(batch_id.to_string()));
    }
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM transactions WHERE batch_id = ?1", [batch_id])?;
    tx.execute("DELETE FROM batch_files WHERE batch_id = ?1", [batch_id])?;
    tx.execute("DELETE FROM batches WHERE batch_id = ?1", [batch_id])?;
    tx.commit()?;
    tracing::info!(batch = %batch_id, removed, "purged batch");
    Ok(removed)
}

/// Delete every batch and transaction. Returns the number of transactions
/// removed.
pub fn purge_all(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM batch_files", [])?;
    tx.execute("DELETE FROM batches", [])?;
    tx.commit()?;
    tracing::warn!(removed, "purged all batches");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_transaction, test_db};
    use crate::db::Store;

    fn outcome(name: &str, checksum: &str, status: FileStatus, count: usize) -> FileOutcome {
        FileOutcome {
            filename: name.to_string(),
            checksum: checksum.to_string(),
            status,
            record_count: count,
            detail: String::new(),
        }
    }

    #[test]
    fn test_create_and_get_batch() {
        let (_dir, conn) = test_db();
        let batch = IngestionBatch::start("b1", "ana", vec!["a.xlsx".into(), "b.xlsx".into()]);
        create_batch(&conn, &batch).unwrap();

        let got = get_batch(&conn, "b1").unwrap().unwrap();
        assert_eq!(got.files, vec!["a.xlsx", "b.xlsx"]);
        assert_eq!(got.user, "ana");
        assert_eq!(got.status, BatchStatus::Running);
        assert!(got.created_at.is_some());
        assert!(get_batch(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_finish_batch_once() {
        let (_dir, conn) = test_db();
        create_batch(&conn, &IngestionBatch::start("b1", "ana", vec![])).unwrap();
        finish_batch(&conn, "b1", BatchStatus::Completed, 7, "Procesados 7 registros de 1 archivos").unwrap();

        let got = get_batch(&conn, "b1").unwrap().unwrap();
        assert_eq!(got.status, BatchStatus::Completed);
        assert_eq!(got.record_count, 7);
        assert_eq!(got.message.as_deref(), Some("Procesados 7 registros de 1 archivos"));

        assert!(finish_batch(&conn, "b1", BatchStatus::Failed, 0, "again").is_err());
        assert!(matches!(
            finish_batch(&conn, "ghost", BatchStatus::Failed, 0, "x"),
            Err(IngestError::UnknownBatch(_))
        ));
    }

    #[test]
    fn test_list_batches_newest_first() {
        let (_dir, conn) = test_db();
        for id in ["b1", "b2", "b3"] {
            create_batch(&conn, &IngestionBatch::start(id, "ana", vec![])).unwrap();
        }
        let ids: Vec<String> = list_batches(&conn, 2).unwrap().into_iter().map(|b| b.batch_id).collect();
        assert_eq!(ids, vec!["b3", "b2"]);
    }

    #[test]
    fn test_file_outcomes_and_checksum_lookup() {
        let (_dir, mut conn) = test_db();
        create_batch(&conn, &IngestionBatch::start("b1", "ana", vec![])).unwrap();
        record_file_outcomes(
            &mut conn,
            "b1",
            &[outcome("a.xlsx", "aaa", FileStatus::Loaded, 3), outcome("b.xlsx", "bbb", FileStatus::Empty, 0)],
        )
        .unwrap();

        let got = file_outcomes(&conn, "b1").unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].status, FileStatus::Loaded);
        assert_eq!(got[1].filename, "b.xlsx");

        // Only completed batches count as having loaded a file.
        assert_eq!(find_loaded_checksum(&conn, "aaa").unwrap(), None);
        finish_batch(&conn, "b1", BatchStatus::Completed, 3, "ok").unwrap();
        assert_eq!(find_loaded_checksum(&conn, "aaa").unwrap().as_deref(), Some("b1"));
        assert_eq!(find_loaded_checksum(&conn, "bbb").unwrap(), None);
    }

    #[test]
    fn test_purge_batch() {
        let (_dir, mut conn) = test_db();
        conn.create_batch(&IngestionBatch::start("b1", "ana", vec![])).unwrap();
        conn.create_batch(&IngestionBatch::start("b2", "ana", vec![])).unwrap();
        conn.insert_transactions(&[
            sample_transaction("b1", "1", "15/01/2024", "1", "0"),
            sample_transaction("b1", "1", "16/01/2024", "1", "0"),
            sample_transaction("b2", "2", "16/01/2024", "1", "0"),
        ])
        .unwrap();
        record_file_outcomes(&mut conn, "b1", &[outcome("a.xlsx", "aaa", FileStatus::Loaded, 2)]).unwrap();

        assert_eq!(purge_batch(&mut conn, "b1").unwrap(), 2);
        assert!(get_batch(&conn, "b1").unwrap().is_none());
        assert!(file_outcomes(&conn, "b1").unwrap().is_empty());
        assert!(matches!(purge_batch(&mut conn, "b1"), Err(IngestError::UnknownBatch(_))));

        assert_eq!(purge_all(&mut conn).unwrap(), 1);
        assert!(list_batches(&conn, 10).unwrap().is_empty());
    }
}
