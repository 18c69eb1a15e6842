//! SQLite-backed document store implementing every collaborator interface.

use crate::{
    encode_path, parse_path, reference_markup, BlockRewrite, DocCreate, DocKind, DocMoverError,
    Document, GraphQuery, Mover, Operation, OperationLog, OperationSummary, OrderMap, OrderStore,
    PurgeStrategy, ReferenceEdge, Result, Storage,
};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Column list shared by every block query; see [`map_block_row`].
const BLOCK_COLUMNS: &str =
    "id, container_id, parent_id, root_id, kind, title, content, path, hpath";

/// A top-level collection of documents (a notebook).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// An open DocMover workspace backed by a SQLite database.
///
/// All mutating methods take `&mut self` and run inside one SQLite
/// transaction, so a single `Workspace` is a single writer. Hosts that share
/// one across threads wrap it in a `Mutex`, which serialises every order-map
/// read-modify-write.
pub struct Workspace {
    storage: Storage,
    operation_log: OperationLog,
    store_id: String,
}

impl Workspace {
    /// Creates a new workspace database at `path` and initialises the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DocMoverError::Database`] for any SQLite failure.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = Storage::create(&path)?;
        let store_id = Uuid::new_v4().to_string();
        storage.connection().execute(
            "INSERT INTO workspace_meta (key, value) VALUES ('store_id', ?)",
            [&store_id],
        )?;
        log::info!("created workspace {} at {}", store_id, path.as_ref().display());

        Ok(Self {
            storage,
            operation_log: OperationLog::new(PurgeStrategy::LocalOnly { keep_last: 1000 }),
            store_id,
        })
    }

    /// Opens an existing workspace database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocMoverError::InvalidWorkspace`] if the file lacks the
    /// workspace tables, or [`DocMoverError::Database`] for any SQLite failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = Storage::open(&path)?;
        let store_id = storage
            .connection()
            .query_row(
                "SELECT value FROM workspace_meta WHERE key = 'store_id'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| DocMoverError::InvalidWorkspace("missing store_id".to_string()))?;

        Ok(Self {
            storage,
            operation_log: OperationLog::new(PurgeStrategy::LocalOnly { keep_last: 1000 }),
            store_id,
        })
    }

    /// Returns the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    /// Stable identifier of this workspace, stamped on every logged operation.
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Creates a new, empty container and returns its ID.
    pub fn create_container(&mut self, name: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.connection().execute(
            "INSERT INTO containers (id, name, created_at) VALUES (?, ?, ?)",
            rusqlite::params![id, name, chrono::Utc::now().timestamp()],
        )?;
        Ok(id)
    }

    pub fn list_containers(&self) -> Result<Vec<Container>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, name FROM containers ORDER BY created_at, rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Container {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Creates a document directly under the container root.
    pub fn create_top_level_document(&mut self, container_id: &str, title: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert_document(container_id, None, &id, title)?;
        Ok(id)
    }

    /// Creates a document as the child of `parent_id`, in the parent's container.
    pub fn create_child_document(&mut self, parent_id: &str, title: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.create_document_with_id(parent_id, &id, title)?;
        Ok(id)
    }

    /// Like [`create_child_document`](Self::create_child_document) with a caller-chosen ID.
    pub fn create_document_with_id(&mut self, parent_id: &str, id: &str, title: &str) -> Result<()> {
        let parent = self.resolve_document(parent_id)?;
        if !parent.is_document() {
            return Err(DocMoverError::InvalidMove(format!(
                "Block {parent_id} is not a document"
            )));
        }
        self.insert_document(&parent.container_id, Some(&parent), id, title)
    }

    /// Appends a paragraph block to the document `doc_id` and returns its ID.
    pub fn add_paragraph(&mut self, doc_id: &str, text: &str) -> Result<String> {
        let doc = self.resolve_document(doc_id)?;
        if !doc.is_document() {
            return Err(DocMoverError::InvalidMove(format!(
                "Block {doc_id} is not a document"
            )));
        }
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        self.connection().execute(
            "INSERT INTO blocks (id, container_id, parent_id, root_id, kind, title, content, path, hpath, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, '', ?, ?, ?, ?, ?)",
            rusqlite::params![
                id,
                doc.container_id,
                doc.id,
                doc.id,
                DocKind::OtherBlock.code(),
                text,
                encode_path(&doc.path),
                doc.hpath,
                now,
                now,
            ],
        )?;
        Ok(id)
    }

    /// Records a reference from `source_block_id` to `target_id` without
    /// touching the source block's content.
    pub fn add_reference(&mut self, source_block_id: &str, target_id: &str) -> Result<()> {
        let source = self.resolve_document(source_block_id)?;
        let target = self.resolve_document(target_id)?;
        self.connection().execute(
            "INSERT INTO refs (block_id, root_id, def_block_id, def_block_root_id) VALUES (?, ?, ?, ?)",
            rusqlite::params![source.id, source.root_id, target.id, target.root_id],
        )?;
        Ok(())
    }

    /// Direct child documents of `parent_id`, ordered by their persisted rank.
    ///
    /// Documents without a rank come first, in creation order.
    pub fn sorted_children(&self, parent_id: &str) -> Result<Vec<Document>> {
        let parent = self.resolve_document(parent_id)?;
        let order = self.read_order_map(&parent.container_id)?;
        let mut children = self.direct_children(&parent.container_id, parent_id)?;
        children.sort_by_key(|d| order.rank(&d.id));
        Ok(children)
    }

    /// Top-level documents of a container, ordered by their persisted rank.
    pub fn top_level_documents(&self, container_id: &str) -> Result<Vec<Document>> {
        let order = self.read_order_map(container_id)?;
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks
             WHERE container_id = ?1 AND kind = 'd' AND parent_id IS NULL
             ORDER BY seq"
        ))?;
        let mut docs = stmt
            .query_map([container_id], map_block_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        docs.sort_by_key(|d| order.rank(&d.id));
        Ok(docs)
    }

    /// Returns logged operations oldest first, optionally filtered by type name.
    pub fn list_operations(&self, operation_type: Option<&str>) -> Result<Vec<OperationSummary>> {
        OperationLog::list(self.connection(), operation_type)
    }

    fn ensure_container(&self, container_id: &str) -> Result<()> {
        let exists: bool = self.connection().query_row(
            "SELECT COUNT(*) FROM containers WHERE id = ?",
            [container_id],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(DocMoverError::ContainerNotFound(container_id.to_string()))
        }
    }

    fn insert_document(
        &mut self,
        container_id: &str,
        parent: Option<&Document>,
        id: &str,
        title: &str,
    ) -> Result<()> {
        self.ensure_container(container_id)?;

        let (path, hpath) = match parent {
            Some(p) => {
                let mut path = p.path.clone();
                path.push(id.to_string());
                (path, format!("{}/{}", p.hpath, title))
            }
            None => (vec![id.to_string()], format!("/{title}")),
        };
        let parent_id = parent.map(|p| p.id.clone());
        let now = chrono::Utc::now().timestamp();

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO blocks (id, container_id, parent_id, root_id, kind, title, content, path, hpath, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, '', ?, ?, ?, ?)",
            rusqlite::params![
                id,
                container_id,
                parent_id,
                id,
                DocKind::Document.code(),
                title,
                encode_path(&path),
                hpath,
                now,
                now,
            ],
        )?;

        let op = Operation::CreateDocument {
            operation_id: Uuid::new_v4().to_string(),
            timestamp: now,
            store_id: self.store_id.clone(),
            document_id: id.to_string(),
            container_id: container_id.to_string(),
            parent_id,
            hpath,
        };
        self.operation_log.log(&tx, &op)?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        Ok(())
    }

    fn query_blocks(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Document>> {
        let mut stmt = self.connection().prepare(sql)?;
        let rows = stmt
            .query_map(params, map_block_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_edges(&self, column: &str, value: &str) -> Result<Vec<ReferenceEdge>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT block_id, root_id, def_block_id, def_block_root_id
             FROM refs WHERE {column} = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([value], |row| {
                Ok(ReferenceEdge {
                    source_block_id: row.get(0)?,
                    source_root_id: row.get(1)?,
                    target_id: row.get(2)?,
                    target_root_id: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl GraphQuery for Workspace {
    fn resolve_document(&self, id: &str) -> Result<Document> {
        load_block(self.connection(), id)?.ok_or_else(|| DocMoverError::DocumentNotFound(id.to_string()))
    }

    fn find_documents(&self, ids: &[String]) -> Result<Vec<Document>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = load_block(self.connection(), id)? {
                found.push(doc);
            }
        }
        Ok(found)
    }

    fn direct_children(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>> {
        // The LIKE pair narrows the scan; segment comparison decides.
        let segment = format!("%/{}/%", escape_like(root_id));
        let deeper = format!("{segment}/%");
        let docs = self.query_blocks(
            &format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks
                 WHERE kind = 'd' AND container_id = ?1
                 AND path LIKE ?2 ESCAPE '\\'
                 AND path NOT LIKE ?3 ESCAPE '\\'
                 ORDER BY seq"
            ),
            rusqlite::params![container_id, segment, deeper],
        )?;
        let children: Vec<Document> = docs
            .into_iter()
            .filter(|d| d.is_direct_child_of(root_id))
            .collect();
        log::debug!("{} direct children under {}", children.len(), root_id);
        Ok(children)
    }

    fn descendants(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>> {
        let segment = format!("%/{}/%", escape_like(root_id));
        let docs = self.query_blocks(
            &format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks
                 WHERE kind = 'd' AND container_id = ?1
                 AND path LIKE ?2 ESCAPE '\\'
                 ORDER BY seq"
            ),
            rusqlite::params![container_id, segment],
        )?;
        Ok(docs.into_iter().filter(|d| d.is_descendant_of(root_id)).collect())
    }

    fn reference_edges(&self, root_id: &str) -> Result<Vec<ReferenceEdge>> {
        self.query_edges("root_id", root_id)
    }

    fn reference_edges_from_blocks(&self, block_ids: &[String]) -> Result<Vec<ReferenceEdge>> {
        let mut edges = Vec::new();
        for block_id in block_ids {
            edges.extend(self.query_edges("block_id", block_id)?);
        }
        Ok(edges)
    }
}

impl OrderStore for Workspace {
    fn read_order_map(&self, container_id: &str) -> Result<OrderMap> {
        self.ensure_container(container_id)?;
        let raw: Option<String> = self
            .connection()
            .query_row(
                "SELECT order_json FROM order_maps WHERE container_id = ?",
                [container_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(OrderMap::new()),
        }
    }

    fn write_order_map(&mut self, container_id: &str, map: &OrderMap) -> Result<()> {
        self.ensure_container(container_id)?;
        let json = serde_json::to_string(map)?;
        let now = chrono::Utc::now().timestamp();

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO order_maps (container_id, order_json) VALUES (?1, ?2)
             ON CONFLICT(container_id) DO UPDATE SET order_json = excluded.order_json",
            rusqlite::params![container_id, json],
        )?;
        let op = Operation::WriteOrderMap {
            operation_id: Uuid::new_v4().to_string(),
            timestamp: now,
            store_id: self.store_id.clone(),
            container_id: container_id.to_string(),
            entry_count: map.len(),
        };
        self.operation_log.log(&tx, &op)?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }
}

impl Mover for Workspace {
    /// Moves each document with its whole subtree.
    ///
    /// Paths, hierarchical paths and container IDs of every block in the
    /// subtree are rewritten. Documents already under `new_parent` are left
    /// alone. The transaction is rolled back if any ID is unknown, is not a
    /// document, or is an ancestor of `new_parent`.
    fn move_documents(&mut self, ids: &[String], new_parent: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.storage.connection_mut().transaction()?;

        let parent = load_block(&tx, new_parent)?
            .ok_or_else(|| DocMoverError::DocumentNotFound(new_parent.to_string()))?;
        if !parent.is_document() {
            return Err(DocMoverError::InvalidMove(format!(
                "Block {new_parent} is not a document"
            )));
        }

        let mut moved = 0usize;
        for id in ids {
            let doc = load_block(&tx, id)?
                .ok_or_else(|| DocMoverError::DocumentNotFound(id.clone()))?;
            if !doc.is_document() {
                return Err(DocMoverError::InvalidMove(format!("Block {id} is not a document")));
            }
            if parent.path_contains(id) {
                return Err(DocMoverError::InvalidMove(format!(
                    "Moving {id} under {new_parent} would create a cycle"
                )));
            }
            if doc.parent_id.as_deref() == Some(new_parent) {
                continue;
            }

            let old_path = encode_path(&doc.path);
            let mut new_path_segments = parent.path.clone();
            new_path_segments.push(doc.id.clone());
            let new_path = encode_path(&new_path_segments);
            let new_hpath = format!("{}/{}", parent.hpath, doc.title);

            tx.execute(
                "UPDATE blocks SET parent_id = ?1, modified_at = ?2 WHERE id = ?3",
                rusqlite::params![new_parent, now, id],
            )?;
            // Subtree: every block whose path is the old path or lies below it.
            tx.execute(
                "UPDATE blocks SET
                    path = ?1 || substr(path, length(?2) + 1),
                    hpath = ?3 || substr(hpath, length(?4) + 1),
                    container_id = ?5
                 WHERE path = ?2 OR substr(path, 1, length(?2) + 1) = ?2 || '/'",
                rusqlite::params![new_path, old_path, new_hpath, doc.hpath, parent.container_id],
            )?;

            let op = Operation::MoveDocument {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: now,
                store_id: self.store_id.clone(),
                document_id: id.clone(),
                old_parent_id: doc.parent_id.clone(),
                new_parent_id: new_parent.to_string(),
            };
            self.operation_log.log(&tx, &op)?;
            moved += 1;
        }

        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        log::info!("moved {moved} documents under {new_parent}");
        Ok(())
    }
}

impl DocCreate for Workspace {
    fn create_document(
        &mut self,
        container_id: &str,
        parent_id: Option<&str>,
        hpath: &str,
    ) -> Result<String> {
        let (parent_hpath, title) = hpath
            .rsplit_once('/')
            .ok_or_else(|| DocMoverError::InvalidPath(hpath.to_string()))?;
        if title.is_empty() {
            return Err(DocMoverError::InvalidPath(hpath.to_string()));
        }

        let parent = if let Some(parent_id) = parent_id {
            let parent = self.resolve_document(parent_id)?;
            if !parent.is_document()
                || parent.container_id != container_id
                || parent.hpath != parent_hpath
            {
                return Err(DocMoverError::InvalidPath(format!(
                    "{hpath} is not below document {parent_id}"
                )));
            }
            Some(parent)
        } else if parent_hpath.is_empty() {
            None
        } else {
            let found = self
                .query_blocks(
                    &format!(
                        "SELECT {BLOCK_COLUMNS} FROM blocks
                         WHERE container_id = ?1 AND kind = 'd' AND hpath = ?2
                         ORDER BY seq LIMIT 1"
                    ),
                    rusqlite::params![container_id, parent_hpath],
                )?
                .into_iter()
                .next();
            match found {
                Some(doc) => Some(doc),
                None => {
                    self.ensure_container(container_id)?;
                    return Err(DocMoverError::InvalidPath(parent_hpath.to_string()));
                }
            }
        };

        let id = Uuid::new_v4().to_string();
        self.insert_document(container_id, parent.as_ref(), &id, title)?;
        Ok(id)
    }
}

impl BlockRewrite for Workspace {
    fn rewrite_block_as_reference(
        &mut self,
        block_id: &str,
        target_doc_id: &str,
        display_text: &str,
    ) -> Result<()> {
        let block = self.resolve_document(block_id)?;
        let target = self.resolve_document(target_doc_id)?;
        let now = chrono::Utc::now().timestamp();

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "UPDATE blocks SET content = ?1, modified_at = ?2 WHERE id = ?3",
            rusqlite::params![reference_markup(&target.id, display_text), now, block.id],
        )?;
        tx.execute("DELETE FROM refs WHERE block_id = ?", [&block.id])?;
        tx.execute(
            "INSERT INTO refs (block_id, root_id, def_block_id, def_block_root_id) VALUES (?, ?, ?, ?)",
            rusqlite::params![block.id, block.root_id, target.id, target.root_id],
        )?;
        let op = Operation::RewriteBlock {
            operation_id: Uuid::new_v4().to_string(),
            timestamp: now,
            store_id: self.store_id.clone(),
            block_id: block.id.clone(),
            target_doc_id: target.id.clone(),
        };
        self.operation_log.log(&tx, &op)?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }
}

/// Loads one block by ID; works on a plain connection or inside a transaction.
fn load_block(conn: &Connection, id: &str) -> Result<Option<Document>> {
    let doc = conn
        .query_row(
            &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?"),
            [id],
            map_block_row,
        )
        .optional()?;
    Ok(doc)
}

/// Row-mapping closure for `rusqlite::Row` → [`Document`], matching [`BLOCK_COLUMNS`].
fn map_block_row(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        container_id: row.get(1)?,
        parent_id: row.get(2)?,
        root_id: row.get(3)?,
        kind: DocKind::from_code(&row.get::<_, String>(4)?),
        title: row.get(5)?,
        content: row.get(6)?,
        path: parse_path(&row.get::<_, String>(7)?),
        hpath: row.get(8)?,
    })
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
