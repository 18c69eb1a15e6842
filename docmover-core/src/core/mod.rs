//! Internal domain modules for the DocMover core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod document;
pub mod error;
pub mod operation;
pub mod operation_log;
pub mod order;
pub mod outline;
pub mod promote;
pub mod reorganize;
pub mod storage;
pub mod store;
pub mod workspace;

#[doc(inline)]
pub use document::{encode_path, parse_path, DocKind, Document, ReferenceEdge, PATH_SEPARATOR};
#[doc(inline)]
pub use error::{DocMoverError, Result};
#[doc(inline)]
pub use operation::Operation;
#[doc(inline)]
pub use operation_log::{OperationLog, OperationSummary, PurgeStrategy};
#[doc(inline)]
pub use order::{AffectedOrder, OrderMap, OrderPlan, DEFAULT_RANK};
#[doc(inline)]
pub use outline::{read_outline_file, reference_markup, OutlineNode};
#[doc(inline)]
pub use promote::{CreatedDocument, OutlinePromoter, ParentContext, PromoteFailure, PromoteReport};
#[doc(inline)]
pub use reorganize::{MoveSortOutcome, MultiLevelOutcome, Reorganizer, ResortOutcome, Selection};
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use store::{
    BlockRewrite, DocCreate, GraphQuery, Mover, NoopObserver, OrderStore, PromoteStore,
    ReorganizeStore, TreeObserver,
};
#[doc(inline)]
pub use workspace::{Container, Workspace};
