//! In-memory outline trees handed to the promoter.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One node of an outline.
///
/// Inside a `List`, a nested `List` item belongs to the nearest preceding
/// `Paragraph` item, mirroring a list item that holds a paragraph followed
/// by its sub-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutlineNode {
    /// A text leaf backed by a block in the store.
    #[serde(rename_all = "camelCase")]
    Paragraph {
        id: String,
        text: String,
        /// Document the paragraph already links to, if any.
        #[serde(default)]
        existing_ref: Option<String>,
    },
    /// An ordered list of items sharing the same parent context.
    List { items: Vec<OutlineNode> },
    /// A generic container; every paragraph inside is promoted flat.
    Block { children: Vec<OutlineNode> },
}

impl OutlineNode {
    /// Convenience constructor for a paragraph without a reference.
    #[must_use]
    pub fn paragraph(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Paragraph {
            id: id.into(),
            text: text.into(),
            existing_ref: None,
        }
    }

    /// Convenience constructor for a paragraph that already links to `target`.
    #[must_use]
    pub fn reference(id: impl Into<String>, text: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Paragraph {
            id: id.into(),
            text: text.into(),
            existing_ref: Some(target.into()),
        }
    }

    #[must_use]
    pub fn list(items: Vec<OutlineNode>) -> Self {
        Self::List { items }
    }

    /// Number of paragraphs anywhere in this subtree.
    #[must_use]
    pub fn paragraph_count(&self) -> usize {
        match self {
            Self::Paragraph { .. } => 1,
            Self::List { items } => items.iter().map(Self::paragraph_count).sum(),
            Self::Block { children } => children.iter().map(Self::paragraph_count).sum(),
        }
    }

    /// Paragraphs of this subtree in depth-first pre-order.
    pub fn paragraphs(&self) -> Vec<&OutlineNode> {
        let mut out = Vec::new();
        self.collect_paragraphs(&mut out);
        out
    }

    fn collect_paragraphs<'a>(&'a self, out: &mut Vec<&'a OutlineNode>) {
        match self {
            Self::Paragraph { .. } => out.push(self),
            Self::List { items } => items.iter().for_each(|n| n.collect_paragraphs(out)),
            Self::Block { children } => children.iter().for_each(|n| n.collect_paragraphs(out)),
        }
    }
}

/// Reads a JSON array of outline nodes from `path`.
///
/// # Errors
///
/// Returns [`crate::DocMoverError::Io`] if the file cannot be read, or
/// [`crate::DocMoverError::Json`] if it is not a valid outline.
pub fn read_outline_file(path: &Path) -> Result<Vec<OutlineNode>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Reference-link markup written into a promoted paragraph.
#[must_use]
pub fn reference_markup(target_doc_id: &str, display_text: &str) -> String {
    format!(
        r#"<span data-type="block-ref" data-id="{}" data-subtype="d">{}</span>"#,
        escape_html(target_doc_id),
        escape_html(display_text)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_count_walks_all_variants() {
        let outline = OutlineNode::Block {
            children: vec![
                OutlineNode::paragraph("p1", "One"),
                OutlineNode::list(vec![
                    OutlineNode::paragraph("p2", "Two"),
                    OutlineNode::list(vec![OutlineNode::reference("p3", "Three", "d3")]),
                ]),
            ],
        };
        assert_eq!(outline.paragraph_count(), 3);
        assert_eq!(OutlineNode::list(vec![]).paragraph_count(), 0);
    }

    #[test]
    fn test_paragraphs_in_pre_order() {
        let outline = OutlineNode::list(vec![
            OutlineNode::paragraph("a", "A"),
            OutlineNode::list(vec![OutlineNode::paragraph("b", "B")]),
            OutlineNode::paragraph("c", "C"),
        ]);
        let ids: Vec<&str> = outline
            .paragraphs()
            .into_iter()
            .filter_map(|n| match n {
                OutlineNode::Paragraph { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reference_markup_escapes_text() {
        let md = reference_markup("doc-1", "a <b> & \"c\"");
        assert_eq!(
            md,
            r#"<span data-type="block-ref" data-id="doc-1" data-subtype="d">a &lt;b&gt; &amp; &quot;c&quot;</span>"#
        );
    }

    #[test]
    fn test_outline_deserializes_from_json() {
        let json = r#"{"type":"list","items":[
            {"type":"paragraph","id":"p1","text":"Intro"},
            {"type":"paragraph","id":"p2","text":"Setup","existingRef":"X"}
        ]}"#;
        let node: OutlineNode = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            OutlineNode::list(vec![
                OutlineNode::paragraph("p1", "Intro"),
                OutlineNode::reference("p2", "Setup", "X"),
            ])
        );
    }

    #[test]
    fn test_read_outline_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"[{"type":"list","items":[{"type":"paragraph","id":"p1","text":"Intro"}]}]"#,
        )
        .unwrap();

        let nodes = read_outline_file(temp.path()).unwrap();
        assert_eq!(nodes, vec![OutlineNode::list(vec![OutlineNode::paragraph("p1", "Intro")])]);
    }

    #[test]
    fn test_read_outline_file_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_outline_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, crate::DocMoverError::Io(_)));
        assert!(err.is_store_unavailable());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{").unwrap();
        let err = read_outline_file(&bad).unwrap_err();
        assert!(matches!(err, crate::DocMoverError::Json(_)));
    }
}
