//! Reference-driven relocation and sibling re-ranking.
//!
//! [`Reorganizer`] turns "documents referenced from a root" into "direct
//! children of that root" and rewrites the root's sibling order so that
//! untouched children keep their relative order while the documents the
//! caller cares about are appended in the caller's order.
//!
//! Relocation and re-ranking are independent calls with independent failure
//! domains. A successful [`Reorganizer::relocate`] followed by a failed
//! [`Reorganizer::resort`] leaves documents moved but unranked; running
//! `resort` again repairs that state. Nothing is rolled back across the two.

use crate::{
    AffectedOrder, DocMoverError, Document, NoopObserver, OrderPlan, ReorganizeStore, Result,
    TreeObserver,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// How the caller picks the documents a move-and-sort works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    /// Every document the root references, in discovery order.
    ReferenceScan,
    /// An externally bound, ordered list of IDs (e.g. the rows of a view
    /// attached to the root). Block IDs stand for their owning document;
    /// order is kept verbatim, first occurrence wins.
    BoundList(Vec<String>),
    /// Documents referenced from the given content blocks, in discovery order.
    FromBlocks(Vec<String>),
}

impl Selection {
    fn affected_order(&self) -> AffectedOrder {
        match self {
            Self::BoundList(_) => AffectedOrder::PreserveCandidateOrder,
            Self::ReferenceScan | Self::FromBlocks(_) => AffectedOrder::Insertion,
        }
    }
}

/// Result of one [`Reorganizer::resort`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResortOutcome {
    /// Documents placed at the tail, in caller order.
    pub sorted: usize,
    /// Existing children re-ranked ahead of them.
    pub unaffected: usize,
}

impl ResortOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted == 0 && self.unaffected == 0
    }
}

/// Result of one [`Reorganizer::move_and_sort`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSortOutcome {
    pub moved: Vec<String>,
    pub sorted: usize,
    pub unaffected: usize,
}

impl MoveSortOutcome {
    /// True when nothing was moved and nothing was re-ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.sorted == 0 && self.unaffected == 0
    }

    /// One-line description for the host to show.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.moved.is_empty() {
            parts.push(format!("Moved {} documents", self.moved.len()));
        }
        if self.sorted > 0 || self.unaffected > 0 {
            parts.push(format!(
                "Sorted {} documents ({} affected, {} unaffected)",
                self.sorted + self.unaffected,
                self.sorted,
                self.unaffected
            ));
        }
        if parts.is_empty() {
            "No documents processed".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Result of one [`Reorganizer::multi_level_sort`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiLevelOutcome {
    /// Sibling groups that received a fresh rank sequence.
    pub groups: usize,
    /// Referenced documents placed at the tail of their group.
    pub sorted: usize,
    /// Unreferenced siblings re-ranked ahead of them.
    pub unaffected: usize,
}

impl MultiLevelOutcome {
    #[must_use]
    pub fn summary(&self) -> String {
        if self.groups == 0 {
            return "No documents processed".to_string();
        }
        format!(
            "Sorted {} documents in {} groups ({} affected, {} unaffected)",
            self.sorted + self.unaffected,
            self.groups,
            self.sorted,
            self.unaffected
        )
    }
}

/// Relocates referenced documents under a root and re-ranks its children.
///
/// Borrows the store mutably for its whole lifetime, so one reorganizer is
/// the only writer of the order maps it touches.
pub struct Reorganizer<'a, S: ReorganizeStore> {
    store: &'a mut S,
    observer: &'a dyn TreeObserver,
}

impl<'a, S: ReorganizeStore> Reorganizer<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            observer: &NoopObserver,
        }
    }

    /// Sets the observer notified after every successful order write.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn TreeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Moves candidate documents so they become direct children of `root_id`.
    ///
    /// With an empty `explicit_ids` the candidates are the documents the root
    /// references; otherwise they are the documents owning the given IDs.
    /// Candidates already anywhere below the root, and ancestors of the root,
    /// are skipped. Returns the IDs handed to the mover, which is empty (not
    /// an error) when nothing qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`DocMoverError::DocumentNotFound`] if the root is missing and
    /// store errors from the query or the move. Nothing is mutated unless the
    /// whole candidate set is known.
    pub fn relocate(&mut self, root_id: &str, explicit_ids: &[String]) -> Result<Vec<String>> {
        let root = self.resolve_root(root_id)?;

        let candidates = if explicit_ids.is_empty() {
            let targets = self.reference_targets(root_id)?;
            self.store.find_documents(&targets)?
        } else {
            self.owning_documents(explicit_ids)?
        };

        let to_move = relocation_set(&root, candidates);
        if to_move.is_empty() {
            log::debug!("nothing to relocate under {root_id}");
            return Ok(to_move);
        }

        self.store.move_documents(&to_move, root_id)?;
        log::info!("relocated {} documents under {}", to_move.len(), root_id);
        Ok(to_move)
    }

    /// Re-ranks the direct children of `root_id`.
    ///
    /// Children not named in `affected` take ranks `1..=U` in their prior
    /// order; the `affected` children follow in exactly the order given.
    /// Entries of `affected` that are not currently direct children are
    /// ignored. When none remain, nothing is written.
    ///
    /// `only_sort` marks a call that was not preceded by a relocation; the
    /// partition rule is identical either way.
    ///
    /// # Errors
    ///
    /// Returns [`DocMoverError::DocumentNotFound`] if the root is missing, or
    /// store errors from reading or writing the order map. The map is only
    /// written after it has been fully read and updated in memory.
    pub fn resort(
        &mut self,
        root_id: &str,
        affected: &[String],
        order: AffectedOrder,
        only_sort: bool,
    ) -> Result<ResortOutcome> {
        let root = self.resolve_root(root_id)?;
        let children: Vec<String> = self
            .store
            .direct_children(&root.container_id, root_id)?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let mut map = self.store.read_order_map(&root.container_id)?;

        let plan = OrderPlan::compute(&children, affected, &map);
        let dropped = affected.len() - plan.affected.len();
        if dropped > 0 {
            if only_sort {
                log::debug!("{dropped} requested IDs are not children of {root_id}");
            } else {
                log::warn!("{dropped} requested IDs are not children of {root_id} after relocation");
            }
        }
        if plan.is_empty() {
            log::debug!("nothing to sort under {root_id}");
            return Ok(ResortOutcome::default());
        }

        plan.apply(&mut map);
        self.store.write_order_map(&root.container_id, &map)?;
        log::info!(
            "sorted {} children of {} ({:?}): {} affected, {} unaffected",
            plan.total(),
            root_id,
            order,
            plan.affected.len(),
            plan.unaffected.len()
        );
        self.observer.tree_changed(root_id);

        Ok(ResortOutcome {
            sorted: plan.affected.len(),
            unaffected: plan.unaffected.len(),
        })
    }

    /// Relocates the selected documents (unless `only_sort`) and then ranks
    /// them after the root's other children.
    ///
    /// An empty bound list or block selection is a zero-effect result.
    pub fn move_and_sort(
        &mut self,
        root_id: &str,
        selection: &Selection,
        only_sort: bool,
    ) -> Result<MoveSortOutcome> {
        let explicit: Vec<String> = match selection {
            Selection::ReferenceScan => Vec::new(),
            Selection::BoundList(ids) => self
                .owning_documents(ids)?
                .into_iter()
                .map(|doc| doc.id)
                .collect(),
            Selection::FromBlocks(blocks) => self
                .store
                .reference_edges_from_blocks(blocks)?
                .into_iter()
                .filter(|edge| edge.targets_document())
                .map(|edge| edge.target_root_id)
                .collect(),
        };
        if explicit.is_empty() && *selection != Selection::ReferenceScan {
            log::info!("empty selection for {root_id}");
            return Ok(MoveSortOutcome::default());
        }

        let moved = if only_sort {
            Vec::new()
        } else {
            self.relocate(root_id, &explicit)?
        };

        let affected = match selection {
            Selection::ReferenceScan => self.reference_targets(root_id)?,
            Selection::BoundList(_) | Selection::FromBlocks(_) => explicit,
        };
        let sorted = self.resort(root_id, &affected, selection.affected_order(), only_sort)?;

        Ok(MoveSortOutcome {
            moved,
            sorted: sorted.sorted,
            unaffected: sorted.unaffected,
        })
    }

    /// Re-ranks every sibling group below `root_id` that holds documents the
    /// root references.
    ///
    /// Within each group, unreferenced siblings keep their prior relative
    /// order and come first; referenced ones follow in the order the root
    /// references them. Every touched group gets a fresh sequence `1..=n`.
    /// Groups are processed in lexicographic order of their parent path, and
    /// the whole container map is written once.
    pub fn multi_level_sort(&mut self, root_id: &str) -> Result<MultiLevelOutcome> {
        let root = self.resolve_root(root_id)?;
        let referenced = self.reference_targets(root_id)?;
        let descendants = self.store.descendants(&root.container_id, root_id)?;

        let referenced_set: HashSet<&str> = referenced.iter().map(String::as_str).collect();
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for doc in &descendants {
            groups.entry(doc.parent_path_key()).or_default().push(doc.id.clone());
        }
        groups.retain(|_, members| members.iter().any(|id| referenced_set.contains(id.as_str())));

        if groups.is_empty() {
            log::debug!("no referenced descendants under {root_id}");
            return Ok(MultiLevelOutcome::default());
        }

        let mut map = self.store.read_order_map(&root.container_id)?;
        let mut outcome = MultiLevelOutcome::default();
        for members in groups.values() {
            let plan = OrderPlan::compute(members, &referenced, &map);
            plan.apply(&mut map);
            outcome.groups += 1;
            outcome.sorted += plan.affected.len();
            outcome.unaffected += plan.unaffected.len();
        }

        self.store.write_order_map(&root.container_id, &map)?;
        log::info!(
            "multi-level sort under {}: {} groups, {} documents",
            root_id,
            outcome.groups,
            outcome.sorted + outcome.unaffected
        );
        self.observer.tree_changed(root_id);
        Ok(outcome)
    }

    /// Documents the root references as whole documents, deduplicated, in
    /// discovery order.
    pub fn reference_targets(&self, root_id: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let targets: Vec<String> = self
            .store
            .reference_edges(root_id)?
            .into_iter()
            .filter(|edge| edge.targets_document())
            .map(|edge| edge.target_root_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        log::debug!("{} reference targets from {}", targets.len(), root_id);
        Ok(targets)
    }

    /// Documents owning the given block or document IDs, deduplicated in
    /// first-occurrence order. Unknown IDs are skipped with a warning.
    fn owning_documents(&self, ids: &[String]) -> Result<Vec<Document>> {
        let found = self.store.find_documents(ids)?;
        if found.len() < ids.len() {
            log::warn!(
                "{} of {} requested IDs do not exist",
                ids.len() - found.len(),
                ids.len()
            );
        }
        let mut seen = HashSet::new();
        let owners: Vec<String> = found
            .into_iter()
            .map(|block| block.root_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Ok(self
            .store
            .find_documents(&owners)?
            .into_iter()
            .filter(Document::is_document)
            .collect())
    }

    fn resolve_root(&self, root_id: &str) -> Result<Document> {
        let root = self.store.resolve_document(root_id)?;
        if !root.is_document() {
            return Err(DocMoverError::DocumentNotFound(format!(
                "{root_id} is not a document"
            )));
        }
        Ok(root)
    }
}

/// Filters candidates down to the documents that actually need to move.
///
/// Drops candidates whose path already contains the root (including the
/// root itself), ancestors of the root, and duplicates. Order is kept.
fn relocation_set(root: &Document, candidates: Vec<Document>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for doc in candidates {
        if doc.path_contains(&root.id) {
            continue;
        }
        if root.is_descendant_of(&doc.id) {
            log::warn!("skipping {}: it is an ancestor of {}", doc.id, root.id);
            continue;
        }
        if seen.insert(doc.id.clone()) {
            out.push(doc.id);
        }
    }
    out
}
