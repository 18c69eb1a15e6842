//! Promotion of outline paragraphs into child documents.
//!
//! Each paragraph without a link becomes a new document named after its
//! text, and the paragraph is rewritten into a reference to it. Paragraphs
//! that already link somewhere are reused as-is, so running a promotion
//! twice over the same (rewritten) outline creates nothing new.

use crate::{
    AffectedOrder, DocMoverError, Document, NoopObserver, OutlineNode, PromoteStore, Reorganizer,
    Result, TreeObserver,
};
use serde::Serialize;

/// Where a promoted node lands: the parent document, its container and its
/// hierarchical path. Passed by value down the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentContext {
    pub doc_id: String,
    pub container_id: String,
    pub hpath: String,
}

impl From<&Document> for ParentContext {
    fn from(doc: &Document) -> Self {
        Self {
            doc_id: doc.id.clone(),
            container_id: doc.container_id.clone(),
            hpath: doc.hpath.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDocument {
    pub id: String,
    pub parent_id: String,
    pub title: String,
}

/// A paragraph that could not be promoted. The walk carried on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteFailure {
    pub block_id: String,
    pub text: String,
    pub reason: String,
}

/// Accumulated result of a promotion walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteReport {
    /// New documents in traversal order.
    pub created: Vec<CreatedDocument>,
    /// Paragraphs that already linked to a document.
    pub reused: usize,
    /// Paragraphs with empty text.
    pub skipped: usize,
    pub failures: Vec<PromoteFailure>,
    /// Documents placed at the tail of their sibling group afterwards.
    pub sorted: usize,
}

impl PromoteReport {
    /// True when the outline held no paragraph that produced any effect.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.reused == 0 && self.failures.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_noop() {
            return "No paragraphs to promote".to_string();
        }
        let mut text = format!(
            "Created {} documents, reused {}",
            self.created.len(),
            self.reused
        );
        if self.skipped > 0 {
            text.push_str(&format!(", skipped {}", self.skipped));
        }
        if !self.failures.is_empty() {
            text.push_str(&format!(", {} failed", self.failures.len()));
        }
        text
    }

    /// Created document IDs grouped by parent, groups in first-seen order.
    fn created_by_parent(&self) -> Vec<(String, Vec<String>)> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for doc in &self.created {
            match groups.iter_mut().find(|(parent, _)| *parent == doc.parent_id) {
                Some((_, ids)) => ids.push(doc.id.clone()),
                None => groups.push((doc.parent_id.clone(), vec![doc.id.clone()])),
            }
        }
        groups
    }
}

/// Walks outlines and turns their paragraphs into documents.
pub struct OutlinePromoter<'a, S: PromoteStore> {
    store: &'a mut S,
    observer: &'a dyn TreeObserver,
}

impl<'a, S: PromoteStore> OutlinePromoter<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            observer: &NoopObserver,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn TreeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Promotes a whole outline under `root_id` and then ranks the new
    /// documents after the existing children of every parent that received
    /// some, the root first.
    ///
    /// An outline without any paragraph returns an empty report without
    /// touching the store. Per-paragraph failures are collected in the
    /// report; only a missing root or a failed re-rank is an error.
    pub fn promote_outline(&mut self, root_id: &str, nodes: &[OutlineNode]) -> Result<PromoteReport> {
        let root = self.store.resolve_document(root_id)?;
        if !root.is_document() {
            return Err(DocMoverError::DocumentNotFound(format!(
                "{root_id} is not a document"
            )));
        }

        let mut report = PromoteReport::default();
        if nodes.iter().map(OutlineNode::paragraph_count).sum::<usize>() == 0 {
            log::info!("outline under {root_id} has no paragraphs");
            return Ok(report);
        }

        let context = ParentContext::from(&root);
        for node in nodes {
            self.walk(node, context.clone(), &mut report);
        }

        let mut groups = report.created_by_parent();
        if let Some(pos) = groups.iter().position(|(parent, _)| parent == root_id) {
            let root_group = groups.remove(pos);
            groups.insert(0, root_group);
        }
        for (parent, ids) in &groups {
            let sorted = Reorganizer::new(&mut *self.store)
                .with_observer(self.observer)
                .resort(parent, ids, AffectedOrder::Insertion, true);
            match sorted {
                Ok(outcome) => report.sorted += outcome.sorted,
                Err(e) => {
                    log::error!(
                        "promotion created {} documents but sorting under {} failed: {}",
                        report.created.len(),
                        parent,
                        e
                    );
                    return Err(e);
                }
            }
        }

        log::info!("promotion under {}: {}", root_id, report.summary());
        Ok(report)
    }

    /// Promotes one node under `context` and returns the document it now
    /// stands for, if any. Lists and blocks never stand for a document.
    pub fn promote(
        &mut self,
        node: &OutlineNode,
        context: ParentContext,
        report: &mut PromoteReport,
    ) -> Option<String> {
        self.walk(node, context, report).map(|ctx| ctx.doc_id)
    }

    fn walk(
        &mut self,
        node: &OutlineNode,
        context: ParentContext,
        report: &mut PromoteReport,
    ) -> Option<ParentContext> {
        match node {
            OutlineNode::Paragraph {
                id,
                text,
                existing_ref,
            } => self.promote_paragraph(id, text, existing_ref.as_deref(), &context, report),
            OutlineNode::List { items } => {
                // A nested list hangs off the paragraph right before it.
                let mut last: Option<ParentContext> = None;
                for item in items {
                    if let OutlineNode::List { .. } = item {
                        let parent = last.clone().unwrap_or_else(|| context.clone());
                        self.walk(item, parent, report);
                    } else {
                        last = self.walk(item, context.clone(), report);
                    }
                }
                None
            }
            OutlineNode::Block { .. } => {
                for paragraph in node.paragraphs() {
                    self.walk(paragraph, context.clone(), report);
                }
                None
            }
        }
    }

    fn promote_paragraph(
        &mut self,
        block_id: &str,
        text: &str,
        existing_ref: Option<&str>,
        context: &ParentContext,
        report: &mut PromoteReport,
    ) -> Option<ParentContext> {
        let title = text.trim();
        if title.is_empty() {
            report.skipped += 1;
            return None;
        }

        if let Some(target) = existing_ref {
            return match self.owning_document(target) {
                Ok(doc) => {
                    report.reused += 1;
                    Some(ParentContext::from(&doc))
                }
                Err(e) => {
                    record_failure(report, block_id, title, &e);
                    None
                }
            };
        }

        let hpath = format!("{}/{}", context.hpath, path_safe_title(title));
        let new_id = match self.store.create_document(
            &context.container_id,
            Some(&context.doc_id),
            &hpath,
        ) {
            Ok(id) => id,
            Err(e) => {
                record_failure(report, block_id, title, &e);
                return None;
            }
        };
        report.created.push(CreatedDocument {
            id: new_id.clone(),
            parent_id: context.doc_id.clone(),
            title: title.to_string(),
        });
        log::debug!("created {new_id} at {hpath}");

        if let Err(e) = self
            .store
            .rewrite_block_as_reference(block_id, &new_id, title)
        {
            record_failure(report, block_id, title, &e);
        }

        Some(ParentContext {
            doc_id: new_id,
            container_id: context.container_id.clone(),
            hpath,
        })
    }

    /// The document a reference points into: the target itself when it is a
    /// document, otherwise the document owning the target block.
    fn owning_document(&self, target: &str) -> Result<Document> {
        let block = self.store.resolve_document(target)?;
        if block.is_document() {
            return Ok(block);
        }
        let owner = self.store.resolve_document(&block.root_id)?;
        if owner.is_document() {
            Ok(owner)
        } else {
            Err(DocMoverError::DocumentNotFound(format!(
                "{target} has no owning document"
            )))
        }
    }
}

fn record_failure(report: &mut PromoteReport, block_id: &str, text: &str, err: &DocMoverError) {
    log::warn!("could not promote paragraph {block_id}: {err}");
    report.failures.push(PromoteFailure {
        block_id: block_id.to_string(),
        text: text.to_string(),
        reason: err.to_string(),
    });
}

/// `/` separates hierarchical path segments, so it cannot appear in a title.
fn path_safe_title(title: &str) -> String {
    title.replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BlockRewrite, DocCreate, GraphQuery, Mover, OrderMap, OrderStore, ReferenceEdge, Workspace,
    };
    use tempfile::NamedTempFile;

    fn setup() -> (Workspace, String, String, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let mut ws = Workspace::create(temp.path()).unwrap();
        let container = ws.create_container("Notes").unwrap();
        let root = ws.create_top_level_document(&container, "P").unwrap();
        (ws, container, root, temp)
    }

    fn titles(docs: Vec<Document>) -> Vec<String> {
        docs.into_iter().map(|d| d.title).collect()
    }

    fn para(ws: &mut Workspace, root: &str, text: &str) -> OutlineNode {
        let id = ws.add_paragraph(root, text).unwrap();
        OutlineNode::paragraph(id, text)
    }

    /// Delegates to a workspace but refuses to create documents with the
    /// given titles.
    struct FailingStore {
        inner: Workspace,
        refuse: Vec<&'static str>,
    }

    impl GraphQuery for FailingStore {
        fn resolve_document(&self, id: &str) -> Result<Document> {
            self.inner.resolve_document(id)
        }
        fn find_documents(&self, ids: &[String]) -> Result<Vec<Document>> {
            self.inner.find_documents(ids)
        }
        fn direct_children(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>> {
            self.inner.direct_children(container_id, root_id)
        }
        fn descendants(&self, container_id: &str, root_id: &str) -> Result<Vec<Document>> {
            self.inner.descendants(container_id, root_id)
        }
        fn reference_edges(&self, root_id: &str) -> Result<Vec<ReferenceEdge>> {
            self.inner.reference_edges(root_id)
        }
        fn reference_edges_from_blocks(&self, block_ids: &[String]) -> Result<Vec<ReferenceEdge>> {
            self.inner.reference_edges_from_blocks(block_ids)
        }
    }

    impl OrderStore for FailingStore {
        fn read_order_map(&self, container_id: &str) -> Result<OrderMap> {
            self.inner.read_order_map(container_id)
        }
        fn write_order_map(&mut self, container_id: &str, map: &OrderMap) -> Result<()> {
            self.inner.write_order_map(container_id, map)
        }
    }

    impl Mover for FailingStore {
        fn move_documents(&mut self, ids: &[String], new_parent: &str) -> Result<()> {
            self.inner.move_documents(ids, new_parent)
        }
    }

    impl DocCreate for FailingStore {
        fn create_document(
            &mut self,
            container_id: &str,
            parent_id: Option<&str>,
            hpath: &str,
        ) -> Result<String> {
            if self.refuse.iter().any(|t| hpath.ends_with(&format!("/{t}"))) {
                return Err(DocMoverError::InvalidPath(hpath.to_string()));
            }
            self.inner.create_document(container_id, parent_id, hpath)
        }
    }

    impl BlockRewrite for FailingStore {
        fn rewrite_block_as_reference(&mut self, block_id: &str, target: &str, text: &str) -> Result<()> {
            self.inner.rewrite_block_as_reference(block_id, target, text)
        }
    }

    #[test]
    fn test_promote_creates_and_reuses() {
        let (mut ws, container, root, _temp) = setup();
        let x = ws.create_top_level_document(&container, "Setup").unwrap();
        let intro = para(&mut ws, &root, "Intro");
        let setup_id = ws.add_paragraph(&root, "Setup").unwrap();
        let setup = OutlineNode::reference(setup_id.clone(), "Setup", x.clone());
        let context = ParentContext::from(&ws.resolve_document(&root).unwrap());

        let mut report = PromoteReport::default();
        let mut promoter = OutlinePromoter::new(&mut ws);
        let first = promoter.promote(&intro, context.clone(), &mut report).unwrap();
        let second = promoter.promote(&setup, context, &mut report);
        assert_eq!(second, Some(x));

        let created = ws.resolve_document(&first).unwrap();
        assert_eq!(created.hpath, "/P/Intro");
        assert_eq!(created.parent_id.as_deref(), Some(root.as_str()));
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.reused, 1);

        let OutlineNode::Paragraph { id: intro_id, .. } = &intro else {
            unreachable!()
        };
        let rewritten = ws.resolve_document(intro_id).unwrap();
        assert!(rewritten.content.contains(&format!(r#"data-id="{first}""#)));
        assert_eq!(ws.resolve_document(&setup_id).unwrap().content, "Setup");
    }

    #[test]
    fn test_nested_list_uses_preceding_paragraph_as_parent() {
        let (mut ws, _container, root, _temp) = setup();
        let old = ws.create_child_document(&root, "Old").unwrap();
        let outline = OutlineNode::list(vec![
            para(&mut ws, &root, "A"),
            OutlineNode::list(vec![para(&mut ws, &root, "A1"), para(&mut ws, &root, "A2")]),
            para(&mut ws, &root, "B"),
        ]);
        let mut map = OrderMap::new();
        map.set(old, 1);
        let container = ws.resolve_document(&root).unwrap().container_id;
        ws.write_order_map(&container, &map).unwrap();

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();

        assert_eq!(report.created.len(), 4);
        assert_eq!(report.sorted, 4);
        assert_eq!(titles(ws.sorted_children(&root).unwrap()), vec!["Old", "A", "B"]);
        let a = &report.created[0].id;
        assert_eq!(titles(ws.sorted_children(a).unwrap()), vec!["A1", "A2"]);
        assert_eq!(ws.resolve_document(&report.created[1].id).unwrap().hpath, "/P/A/A1");
    }

    #[test]
    fn test_block_promotes_paragraphs_flat() {
        let (mut ws, _container, root, _temp) = setup();
        let outline = OutlineNode::Block {
            children: vec![
                para(&mut ws, &root, "X"),
                OutlineNode::list(vec![
                    para(&mut ws, &root, "Y"),
                    OutlineNode::list(vec![para(&mut ws, &root, "Z")]),
                ]),
            ],
        };

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();

        assert_eq!(report.created.len(), 3);
        assert_eq!(titles(ws.sorted_children(&root).unwrap()), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_empty_paragraph_children_inherit_parent() {
        let (mut ws, _container, root, _temp) = setup();
        let outline = OutlineNode::list(vec![
            para(&mut ws, &root, "  "),
            OutlineNode::list(vec![para(&mut ws, &root, "Child")]),
        ]);

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(titles(ws.sorted_children(&root).unwrap()), vec!["Child"]);
    }

    #[test]
    fn test_rerun_over_rewritten_outline_creates_nothing() {
        let (mut ws, _container, root, _temp) = setup();
        let a = ws.add_paragraph(&root, "A").unwrap();
        let b = ws.add_paragraph(&root, "B").unwrap();
        let outline = OutlineNode::list(vec![
            OutlineNode::paragraph(a.clone(), "A"),
            OutlineNode::paragraph(b.clone(), "B"),
        ]);
        let first = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();
        let ops_after_first = ws.list_operations(Some("CreateDocument")).unwrap().len();

        let rerun = OutlineNode::list(vec![
            OutlineNode::reference(a, "A", first.created[0].id.clone()),
            OutlineNode::reference(b, "B", first.created[1].id.clone()),
        ]);
        let second = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[rerun])
            .unwrap();

        assert!(second.created.is_empty());
        assert_eq!(second.reused, 2);
        assert_eq!(ws.list_operations(Some("CreateDocument")).unwrap().len(), ops_after_first);
        assert_eq!(ws.sorted_children(&root).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_create_does_not_stop_walk() {
        let (mut ws, _container, root, _temp) = setup();
        let bad = ws.add_paragraph(&root, "Bad").unwrap();
        let outline = OutlineNode::list(vec![
            para(&mut ws, &root, "Good1"),
            OutlineNode::paragraph(bad.clone(), "Bad"),
            OutlineNode::list(vec![para(&mut ws, &root, "Under bad")]),
            para(&mut ws, &root, "Good2"),
        ]);
        let mut store = FailingStore {
            inner: ws,
            refuse: vec!["Bad"],
        };

        let report = OutlinePromoter::new(&mut store)
            .promote_outline(&root, &[outline])
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].block_id, bad);
        assert_eq!(
            titles(store.inner.sorted_children(&root).unwrap()),
            vec!["Good1", "Under bad", "Good2"]
        );
        assert!(report.summary().ends_with("1 failed"));
    }

    #[test]
    fn test_repeated_sibling_title_nests_under_new_document() {
        let (mut ws, container, root, _temp) = setup();
        let old_a = ws.create_child_document(&root, "A").unwrap();
        let outline = OutlineNode::list(vec![
            para(&mut ws, &root, "A"),
            OutlineNode::list(vec![para(&mut ws, &root, "A1")]),
        ]);

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();

        let new_a = report.created[0].id.clone();
        let a1 = report.created[1].id.clone();
        assert_ne!(new_a, old_a);
        assert_eq!(report.created[1].parent_id, new_a);
        assert_eq!(ws.resolve_document(&a1).unwrap().parent_id.as_deref(), Some(new_a.as_str()));
        assert!(ws.sorted_children(&old_a).unwrap().is_empty());
        assert_eq!(report.sorted, 2);
        assert_eq!(ws.read_order_map(&container).unwrap().get(&a1), Some(1));
    }

    #[test]
    fn test_reference_to_inner_block_uses_owning_document() {
        let (mut ws, container, root, _temp) = setup();
        let owner = ws.create_top_level_document(&container, "O").unwrap();
        let inner = ws.add_paragraph(&owner, "inner").unwrap();
        let link = ws.add_paragraph(&root, "ref").unwrap();
        let outline = OutlineNode::list(vec![
            OutlineNode::reference(link, "ref", inner),
            OutlineNode::list(vec![para(&mut ws, &root, "Child")]),
        ]);

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[outline])
            .unwrap();

        assert_eq!(report.reused, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.created[0].parent_id, owner);
        assert_eq!(titles(ws.sorted_children(&owner).unwrap()), vec!["Child"]);
        assert_eq!(ws.resolve_document(&report.created[0].id).unwrap().hpath, "/O/Child");
    }

    #[test]
    fn test_dangling_existing_ref_is_reported() {
        let (mut ws, _container, root, _temp) = setup();
        let id = ws.add_paragraph(&root, "Gone").unwrap();

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[OutlineNode::reference(id, "Gone", "missing")])
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.created.is_empty());
    }

    #[test]
    fn test_outline_without_paragraphs_is_noop() {
        let (mut ws, _container, root, _temp) = setup();
        let ops_before = ws.list_operations(None).unwrap().len();

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[OutlineNode::list(vec![]), OutlineNode::Block { children: vec![] }])
            .unwrap();

        assert!(report.is_noop());
        assert_eq!(report.summary(), "No paragraphs to promote");
        assert_eq!(ws.list_operations(None).unwrap().len(), ops_before);
    }

    #[test]
    fn test_missing_root() {
        let (mut ws, _container, _root, _temp) = setup();
        let err = OutlinePromoter::new(&mut ws)
            .promote_outline("missing", &[OutlineNode::paragraph("p", "T")])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_slash_in_text_stays_in_display_text() {
        let (mut ws, _container, root, _temp) = setup();
        let node = para(&mut ws, &root, "in/out");

        let report = OutlinePromoter::new(&mut ws)
            .promote_outline(&root, &[node])
            .unwrap();

        let doc = ws.resolve_document(&report.created[0].id).unwrap();
        assert_eq!(doc.hpath, "/P/in-out");
        assert_eq!(report.created[0].title, "in/out");
    }
}
