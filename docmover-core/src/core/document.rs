//! Documents, blocks and reference edges as seen by the reorganizer.

use serde::{Deserialize, Serialize};

/// Separator used when a structured ID path is flattened for storage.
pub const PATH_SEPARATOR: char = '/';

/// Whether a block is a standalone document or content inside one.
///
/// Stored as the single-letter codes the block table uses (`"d"` for
/// documents, `"p"` for everything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocKind {
    Document,
    OtherBlock,
}

impl DocKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Document => "d",
            Self::OtherBlock => "p",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Self {
        if code == "d" {
            Self::Document
        } else {
            Self::OtherBlock
        }
    }
}

/// A block in the store. Only `kind == Document` participates in
/// relocation and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub container_id: String,
    /// Parent document, `None` for top-level documents of a container.
    pub parent_id: Option<String>,
    /// The document this block belongs to; equals `id` for documents.
    pub root_id: String,
    pub kind: DocKind,
    pub title: String,
    pub content: String,
    /// Ancestor document IDs from the container root down to the owning
    /// document, inclusive.
    pub path: Vec<String>,
    /// Human-readable path built from titles, e.g. `/Projects/Intro`.
    pub hpath: String,
}

impl Document {
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.kind == DocKind::Document
    }

    /// Segment-wise containment: true when `id` is one of the path entries.
    ///
    /// IDs are compared as whole segments, so `ab` never matches a path
    /// that only contains `xaby`.
    #[must_use]
    pub fn path_contains(&self, id: &str) -> bool {
        self.path.iter().any(|segment| segment == id)
    }

    /// True when `id` appears in the path strictly above this document.
    #[must_use]
    pub fn is_descendant_of(&self, id: &str) -> bool {
        match self.path.split_last() {
            Some((_, ancestors)) => ancestors.iter().any(|segment| segment == id),
            None => false,
        }
    }

    /// True when this is a document sitting exactly one level below `root_id`.
    #[must_use]
    pub fn is_direct_child_of(&self, root_id: &str) -> bool {
        self.is_document()
            && self.path.len() >= 2
            && self.path[self.path.len() - 2] == root_id
    }

    /// The flattened path of this document's parent (empty for top level).
    #[must_use]
    pub fn parent_path_key(&self) -> String {
        match self.path.split_last() {
            Some((_, ancestors)) => encode_path(ancestors),
            None => String::new(),
        }
    }
}

/// A resolved reference from content of one document to a block of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEdge {
    /// The block holding the reference markup.
    pub source_block_id: String,
    /// The document that block belongs to.
    pub source_root_id: String,
    /// The referenced block.
    pub target_id: String,
    /// The document the referenced block belongs to.
    pub target_root_id: String,
}

impl ReferenceEdge {
    /// True when the edge points at a whole document rather than a block inside one.
    #[must_use]
    pub fn targets_document(&self) -> bool {
        self.target_id == self.target_root_id
    }
}

/// Flattens an ID path into its stored `/a/b/c` form.
#[must_use]
pub fn encode_path(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push(PATH_SEPARATOR);
        out.push_str(segment);
    }
    out
}

/// Parses a stored `/a/b/c` path back into its segments.
#[must_use]
pub fn parse_path(raw: &str) -> Vec<String> {
    raw.split(PATH_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
