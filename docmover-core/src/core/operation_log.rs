//! Durable operation log and purge strategy for the workspace.

use crate::{Operation, Result};
use rusqlite::{Connection, Transaction};
use serde::Serialize;

/// Controls which old operations are removed from the log.
pub enum PurgeStrategy {
    /// Retain only the most recent `keep_last` operations.
    LocalOnly { keep_last: usize },
    /// Never remove anything.
    KeepAll,
}

/// Lightweight row returned by [`OperationLog::list`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub timestamp: i64,
    pub operation_type: String,
}

/// Records store mutations to the `operations` table and purges stale entries.
pub struct OperationLog {
    strategy: PurgeStrategy,
}

impl OperationLog {
    /// Creates a new `OperationLog` with the given purge strategy.
    pub fn new(strategy: PurgeStrategy) -> Self {
        Self { strategy }
    }

    /// Serialises `op` and appends it to the `operations` table within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocMoverError::Database`] if the INSERT fails, or
    /// [`crate::DocMoverError::Json`] if `op` cannot be serialised.
    pub fn log(&self, tx: &Transaction, op: &Operation) -> Result<()> {
        let op_json = serde_json::to_string(op)?;

        tx.execute(
            "INSERT INTO operations (operation_id, timestamp, store_id, operation_type, operation_data)
             VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![
                op.operation_id(),
                op.timestamp(),
                op.store_id(),
                op.type_name(),
                op_json,
            ],
        )?;

        Ok(())
    }

    /// Deletes old operations from the log according to the purge strategy.
    ///
    /// Call this after every [`log`](Self::log) call to keep the table bounded in size.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocMoverError::Database`] if the DELETE fails.
    pub fn purge_if_needed(&self, tx: &Transaction) -> Result<()> {
        if let PurgeStrategy::LocalOnly { keep_last } = self.strategy {
            tx.execute(
                "DELETE FROM operations WHERE id NOT IN (
                    SELECT id FROM operations ORDER BY id DESC LIMIT ?
                )",
                [keep_last as i64],
            )?;
        }
        Ok(())
    }

    /// Returns logged operations oldest first, optionally filtered by type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocMoverError::Database`] if the query fails.
    pub fn list(conn: &Connection, operation_type: Option<&str>) -> Result<Vec<OperationSummary>> {
        let mut stmt = conn.prepare(
            "SELECT operation_id, timestamp, operation_type FROM operations
             WHERE ?1 IS NULL OR operation_type = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([operation_type], |row| {
                Ok(OperationSummary {
                    operation_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    operation_type: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Storage;
    use tempfile::NamedTempFile;

    fn write_op(i: i64) -> Operation {
        Operation::WriteOrderMap {
            operation_id: format!("op-{}", i),
            timestamp: 1000 + i,
            store_id: "store-1".to_string(),
            container_id: "box".to_string(),
            entry_count: i as usize,
        }
    }

    #[test]
    fn test_log_and_purge() {
        let temp = NamedTempFile::new().unwrap();
        let mut storage = Storage::create(temp.path()).unwrap();
        let log = OperationLog::new(PurgeStrategy::LocalOnly { keep_last: 5 });

        let tx = storage.connection_mut().transaction().unwrap();
        for i in 0..10 {
            log.log(&tx, &write_op(i)).unwrap();
        }
        log.purge_if_needed(&tx).unwrap();
        tx.commit().unwrap();

        let ops = OperationLog::list(storage.connection(), None).unwrap();
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0].operation_id, "op-5");
    }

    #[test]
    fn test_list_filters_by_type() {
        let temp = NamedTempFile::new().unwrap();
        let mut storage = Storage::create(temp.path()).unwrap();
        let log = OperationLog::new(PurgeStrategy::KeepAll);

        let tx = storage.connection_mut().transaction().unwrap();
        log.log(&tx, &write_op(1)).unwrap();
        log.log(
            &tx,
            &Operation::RewriteBlock {
                operation_id: "op-r".to_string(),
                timestamp: 1,
                store_id: "store-1".to_string(),
                block_id: "b".to_string(),
                target_doc_id: "d".to_string(),
            },
        )
        .unwrap();
        tx.commit().unwrap();

        let rewrites = OperationLog::list(storage.connection(), Some("RewriteBlock")).unwrap();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].operation_id, "op-r");
    }
}
