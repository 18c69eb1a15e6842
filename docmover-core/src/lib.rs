//! Core library for DocMover: reference-driven reorganization of a document tree.
//!
//! The primary entry points are [`Reorganizer`], which moves referenced
//! documents under a root and re-ranks its children, and [`OutlinePromoter`],
//! which turns outline paragraphs into child documents. Both are written
//! against the collaborator traits in [`store`](core::store); [`Workspace`]
//! implements all of them over a SQLite database.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    document::{encode_path, parse_path, DocKind, Document, ReferenceEdge, PATH_SEPARATOR},
    error::{DocMoverError, Result},
    operation::Operation,
    operation_log::{OperationLog, OperationSummary, PurgeStrategy},
    order::{AffectedOrder, OrderMap, OrderPlan, DEFAULT_RANK},
    outline::{read_outline_file, reference_markup, OutlineNode},
    promote::{CreatedDocument, OutlinePromoter, ParentContext, PromoteFailure, PromoteReport},
    reorganize::{MoveSortOutcome, MultiLevelOutcome, Reorganizer, ResortOutcome, Selection},
    storage::Storage,
    store::{
        BlockRewrite, DocCreate, GraphQuery, Mover, NoopObserver, OrderStore, PromoteStore,
        ReorganizeStore, TreeObserver,
    },
    workspace::{Container, Workspace},
};
