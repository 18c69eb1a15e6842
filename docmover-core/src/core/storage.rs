use crate::Result;
use rusqlite::Connection;
use std::path::Path;

/// Tables a database must carry to be opened as a workspace.
const REQUIRED_TABLES: [&str; 6] = [
    "containers",
    "blocks",
    "refs",
    "order_maps",
    "operations",
    "workspace_meta",
];

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Validate database structure
        let placeholders = vec!["?"; REQUIRED_TABLES.len()].join(", ");
        let table_count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type='table' AND name IN ({placeholders})"
            ),
            rusqlite::params_from_iter(REQUIRED_TABLES),
            |row| row.get(0),
        )?;

        if table_count != REQUIRED_TABLES.len() as i64 {
            return Err(crate::DocMoverError::InvalidWorkspace(
                "Not a valid DocMover database".to_string(),
            ));
        }

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn table_names(storage: &Storage) -> Vec<String> {
        storage
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_create_storage() {
        let temp = NamedTempFile::new().unwrap();
        let storage = Storage::create(temp.path()).unwrap();

        let tables = table_names(&storage);
        for required in REQUIRED_TABLES {
            assert!(tables.contains(&required.to_string()), "missing {required}");
        }
    }

    #[test]
    fn test_open_existing_storage() {
        let temp = NamedTempFile::new().unwrap();
        Storage::create(temp.path()).unwrap();

        let storage = Storage::open(temp.path()).unwrap();
        assert!(table_names(&storage).contains(&"order_maps".to_string()));
    }

    #[test]
    fn test_open_invalid_database() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "not a database").unwrap();

        let result = Storage::open(temp.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_open_ignores_unrelated_tables() {
        let temp = NamedTempFile::new().unwrap();
        Storage::create(temp.path()).unwrap();
        {
            let conn = Connection::open(temp.path()).unwrap();
            conn.execute("CREATE TABLE extra (id TEXT)", []).unwrap();
        }

        assert!(Storage::open(temp.path()).is_ok());
    }

    #[test]
    fn test_open_database_missing_tables() {
        let temp = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(temp.path()).unwrap();
            conn.execute("CREATE TABLE blocks (id TEXT PRIMARY KEY)", []).unwrap();
        }

        let err = Storage::open(temp.path()).err().unwrap();
        assert!(matches!(err, crate::DocMoverError::InvalidWorkspace(_)));
    }
}
