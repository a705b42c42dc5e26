//! Indexing, filtering and drag-and-drop validation behind the places tree.
//! 檔案總管樹狀檢視的索引、篩選與拖放驗證核心。

pub mod adapter;
pub mod changes;
pub mod expansion;
pub mod filter;
pub mod index;
pub mod memory;
pub mod moves;
pub mod resource;

pub use adapter::{
    CellFactory, DragPayload, ExplorerError, Modifiers, OpenTarget, TreeViewAdapter, ViewEvent,
};
pub use changes::ChangeSummary;
pub use expansion::ExpansionState;
pub use filter::FilteredView;
pub use index::{TreeIndex, TreeIndexError};
pub use memory::MemoryGraph;
pub use moves::{
    classify, different_hierarchy, valid_move, DropClassification, DropEffect, DropError,
    DropOutcome, ImportFailure,
};
pub use resource::{
    compare_resources, ChangeKind, GraphError, ImportSource, ParentRef, Resource, ResourceChange,
    ResourceGraph, ResourceId, ResourceKind,
};
