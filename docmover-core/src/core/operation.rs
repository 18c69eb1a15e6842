//! Operation types recorded for every store mutation.

use serde::{Deserialize, Serialize};

/// A single store mutation recorded in the workspace operation log.
///
/// Every variant carries a stable `operation_id`, a wall-clock `timestamp`,
/// and the `store_id` of the workspace that performed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// A new empty document was inserted into a container.
    CreateDocument {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        /// Workspace that performed this operation.
        store_id: String,
        /// ID assigned to the new document.
        document_id: String,
        /// Container the document was created in.
        container_id: String,
        /// Parent document, or `None` for a top-level document.
        parent_id: Option<String>,
        /// Hierarchical path the document was created at.
        hpath: String,
    },
    /// A document (with its subtree) was relocated under a new parent.
    MoveDocument {
        operation_id: String,
        timestamp: i64,
        store_id: String,
        /// ID of the document that was moved.
        document_id: String,
        /// Parent before the move, `None` if it was top level.
        old_parent_id: Option<String>,
        /// Parent after the move.
        new_parent_id: String,
    },
    /// A content block was replaced by a reference link.
    RewriteBlock {
        operation_id: String,
        timestamp: i64,
        store_id: String,
        /// The rewritten block.
        block_id: String,
        /// The document it now references.
        target_doc_id: String,
    },
    /// A container's order map was replaced.
    WriteOrderMap {
        operation_id: String,
        timestamp: i64,
        store_id: String,
        container_id: String,
        /// Number of ranked entries in the written map.
        entry_count: usize,
    },
}

impl Operation {
    /// Returns the stable identifier for this operation.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        match self {
            Self::CreateDocument { operation_id, .. }
            | Self::MoveDocument { operation_id, .. }
            | Self::RewriteBlock { operation_id, .. }
            | Self::WriteOrderMap { operation_id, .. } => operation_id,
        }
    }

    /// Returns the wall-clock Unix timestamp (seconds) when this operation was created.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::CreateDocument { timestamp, .. }
            | Self::MoveDocument { timestamp, .. }
            | Self::RewriteBlock { timestamp, .. }
            | Self::WriteOrderMap { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the identifier of the workspace that performed this operation.
    #[must_use]
    pub fn store_id(&self) -> &str {
        match self {
            Self::CreateDocument { store_id, .. }
            | Self::MoveDocument { store_id, .. }
            | Self::RewriteBlock { store_id, .. }
            | Self::WriteOrderMap { store_id, .. } => store_id,
        }
    }

    /// Variant name as stored in the `operation_type` column.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateDocument { .. } => "CreateDocument",
            Self::MoveDocument { .. } => "MoveDocument",
            Self::RewriteBlock { .. } => "RewriteBlock",
            Self::WriteOrderMap { .. } => "WriteOrderMap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serialization() {
        let op = Operation::MoveDocument {
            operation_id: "op-123".to_string(),
            timestamp: 1234567890,
            store_id: "store-1".to_string(),
            document_id: "doc-1".to_string(),
            old_parent_id: None,
            new_parent_id: "root".to_string(),
        };

        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains(r#""type":"MoveDocument""#));
        let deserialized: Operation = serde_json::from_str(&json).unwrap();

        assert_eq!(op.operation_id(), deserialized.operation_id());
        assert_eq!(deserialized.type_name(), "MoveDocument");
        assert_eq!(deserialized.store_id(), "store-1");
    }
}
