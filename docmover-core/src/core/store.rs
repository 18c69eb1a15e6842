//! Collaborator interfaces the reorganizer and promoter are written against.
//!
//! [`Workspace`](super::workspace::Workspace) implements all of them over
//! SQLite; tests wrap it to inject failures. Every call is blocking and the
//! core never issues two at once.

use crate::{Document, OrderMap, ReferenceEdge, Result};

/// Read-only queries over the block and reference tables.
pub trait GraphQuery {
    /// Resolves a block by ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocMoverError::DocumentNotFound`] when `id` is absent.
    fn resolve_document(&self, id: &str) -> Result<Document>;

    /// Resolves every ID that exists, in request order. Unknown IDs are skipped.
    fn find_documents(&self, ids: &[String]) -> Result<Vec<Document>>;

    /// Documents exactly one level below `root_id`, in store iteration order.
    fn direct_children(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>>;

    /// Every document below `root_id` at any depth, in store iteration order.
    fn descendants(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>>;

    /// Reference edges whose source lives in the document `root_id`, in
    /// discovery order.
    fn reference_edges(&self, root_id: &str) -> Result<Vec<ReferenceEdge>>;

    /// Reference edges whose source is one of `block_ids`, in discovery order.
    fn reference_edges_from_blocks(&self, block_ids: &[String]) -> Result<Vec<ReferenceEdge>>;
}

/// Whole-map access to a container's persisted sibling order.
pub trait OrderStore {
    /// Reads the map; a container that never had one yields an empty map.
    fn read_order_map(&self, container_id: &str) -> Result<OrderMap>;

    /// Replaces the stored map in one write.
    fn write_order_map(&mut self, container_id: &str, map: &OrderMap) -> Result<()>;
}

/// Relocation of documents under a new parent.
pub trait Mover {
    /// Moves every ID in `ids` to become a direct child of `new_parent`.
    /// Either all of them move or none do.
    fn move_documents(&mut self, ids: &[String], new_parent: &str) -> Result<()>;
}

/// Creation of empty documents addressed by hierarchical path.
pub trait DocCreate {
    /// Creates an empty document at `hpath` (e.g. `/Parent/Title`) inside
    /// `container_id` and returns its ID.
    ///
    /// With `parent_id` the document is created under exactly that parent,
    /// whose hierarchical path must be everything before the last `/` of
    /// `hpath`. Without it the parent is looked up by that path, which is
    /// ambiguous when sibling titles repeat.
    fn create_document(
        &mut self,
        container_id: &str,
        parent_id: Option<&str>,
        hpath: &str,
    ) -> Result<String>;
}

/// Rewriting of content blocks into reference links.
pub trait BlockRewrite {
    fn rewrite_block_as_reference(
        &mut self,
        block_id: &str,
        target_doc_id: &str,
        display_text: &str,
    ) -> Result<()>;
}

/// Best-effort refresh hint for whatever is displaying the tree.
pub trait TreeObserver {
    fn tree_changed(&self, root_id: &str);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TreeObserver for NoopObserver {
    fn tree_changed(&self, _root_id: &str) {}
}

/// Everything the reorganizer needs from a store.
pub trait ReorganizeStore: GraphQuery + OrderStore + Mover {}

impl<T: GraphQuery + OrderStore + Mover> ReorganizeStore for T {}

/// Everything the promoter needs from a store.
pub trait PromoteStore: ReorganizeStore + DocCreate + BlockRewrite {}

impl<T: ReorganizeStore + DocCreate + BlockRewrite> PromoteStore for T {}
