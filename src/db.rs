use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

/// One persisted resume point. `percentage` is display text fixed at save time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    pub collection_id: String,
    pub sub_collection_id: String,
    pub row_id: String,
    pub percentage: String,
    pub timestamp: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                position INTEGER NOT NULL,
                collection_id TEXT NOT NULL,
                sub_collection_id TEXT NOT NULL,
                row_id TEXT NOT NULL,
                percentage TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (collection_id, sub_collection_id)
            );
            CREATE INDEX IF NOT EXISTS idx_bookmarks_position ON bookmarks(position ASC);
            "#,
        )?;
        Ok(())
    }

    /// Records in stored order, most recent first.
    pub fn load_bookmarks(&self) -> Result<Vec<BookmarkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection_id, sub_collection_id, row_id, percentage, created_at FROM bookmarks ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BookmarkRecord {
                collection_id: row.get(0)?,
                sub_collection_id: row.get(1)?,
                row_id: row.get(2)?,
                percentage: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Replaces the whole list in one transaction so the stored order always
    /// matches the in-memory order.
    pub fn replace_bookmarks(&self, records: &[BookmarkRecord]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to begin bookmark transaction")?;
        tx.execute("DELETE FROM bookmarks", [])?;
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO bookmarks (position, collection_id, sub_collection_id, row_id, percentage, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (position, record) in records.iter().enumerate() {
                insert.execute(params![
                    position as i64,
                    record.collection_id,
                    record.sub_collection_id,
                    record.row_id,
                    record.percentage,
                    record.timestamp,
                ])?;
            }
        }
        tx.commit().context("failed to commit bookmarks")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(collection: &str, sub: &str, row: &str) -> BookmarkRecord {
        BookmarkRecord {
            collection_id: collection.to_string(),
            sub_collection_id: sub.to_string(),
            row_id: row.to_string(),
            percentage: "10.00".to_string(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn replace_then_load_preserves_order() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");
        let records = vec![
            record("si5", "Weather", "004"),
            record("ha2", "Food", "011"),
            record("si5", "Family", "001"),
        ];
        db.replace_bookmarks(&records).expect("replace");

        let loaded = db.load_bookmarks().expect("load");
        assert_eq!(loaded, records);
    }

    #[test]
    fn replace_drops_records_missing_from_new_list() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("migrate");
        db.replace_bookmarks(&[record("si5", "Weather", "004"), record("ha2", "Food", "011")])
            .expect("first replace");
        db.replace_bookmarks(&[record("ha2", "Food", "012")])
            .expect("second replace");

        let loaded = db.load_bookmarks().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].row_id, "012");
    }

    #[test]
    fn migrate_is_idempotent() {
        let db = Database::open_in_memory().expect("open db");
        db.migrate().expect("first migrate");
        db.migrate().expect("second migrate");
        assert!(db.load_bookmarks().expect("load").is_empty());
    }
}
