use std::path::PathBuf;

use places_settings::{ExplorerPreferences, KeyValueStore, StateStoreError};
use thiserror::Error;
use tracing::debug;

use crate::changes::ChangeSummary;
use crate::expansion::ExpansionState;
use crate::index::{TreeIndex, TreeIndexError};
use crate::moves::{self, DropEffect, DropError, DropOutcome};
use crate::resource::{Resource, ResourceChange, ResourceGraph, ResourceId};

/// Errors surfaced to the tree widget.
/// 樹狀檢視元件可能收到的錯誤。
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Index(#[from] TreeIndexError),
    #[error(transparent)]
    Drop(#[from] DropError),
    #[error("failed to persist view state: {0}")]
    State(#[from] StateStoreError),
}

/// Where an activated file should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenTarget {
    Editor,
    /// Opened without taking focus.
    Background,
    Split,
    /// Handed to the operating system's default application.
    System,
}

/// Keyboard modifiers held during a row activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    /// Alt wins over shift, shift over ctrl.
    pub fn open_target(&self) -> OpenTarget {
        if self.alt {
            OpenTarget::System
        } else if self.shift {
            OpenTarget::Split
        } else if self.ctrl {
            OpenTarget::Background
        } else {
            OpenTarget::Editor
        }
    }
}

/// Notifications queued for the widget; drained with [`TreeViewAdapter::take_events`].
/// 待元件取回的通知事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Reload,
    SelectionChanged(Vec<ResourceId>),
    Open { id: ResourceId, target: OpenTarget },
    Notify(String),
}

/// What is being dragged over the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragPayload {
    Resources(Vec<ResourceId>),
    Files(Vec<PathBuf>),
}

/// Turns a resource into whatever the widget renders for a row.
pub trait CellFactory {
    type Cell;

    fn create_cell(&self, resource: &Resource) -> Self::Cell;
}

/// Query surface polled by a virtualized tree widget.
///
/// Owns the resource graph, the index derived from it and the store holding
/// the expanded node set. Change batches are handed in by the caller through
/// [`TreeViewAdapter::on_resource_change`]; each one queues exactly one
/// [`ViewEvent::Reload`].
/// 提供給虛擬化樹狀元件查詢的介面，組合索引、篩選與拖放驗證。
#[derive(Debug)]
pub struct TreeViewAdapter<G, S> {
    graph: G,
    store: S,
    index: TreeIndex,
    expansion: ExpansionState,
    selection: Vec<ResourceId>,
    events: Vec<ViewEvent>,
    row_height: u32,
}

impl<G, S> TreeViewAdapter<G, S>
where
    G: ResourceGraph,
    S: KeyValueStore,
{
    /// Seeds the index from `graph` and restores the persisted expansion set.
    pub fn new(graph: G, store: S, preferences: &ExplorerPreferences) -> Self {
        let index = TreeIndex::seed(&graph, preferences.hide_scm_private);
        let expansion = ExpansionState::load(&store, preferences.expanded_state_key.as_str());
        debug!(
            indexed = index.len(),
            expanded = expansion.ids().len(),
            "tree view adapter ready"
        );
        Self {
            graph,
            store,
            index,
            expansion,
            selection: Vec::new(),
            events: Vec::new(),
            row_height: preferences.row_height,
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_children(&self, id: Option<ResourceId>) -> bool {
        self.index.has_children(id)
    }

    pub fn child_count(&mut self, id: Option<ResourceId>) -> usize {
        self.index.child_count(&self.graph, id)
    }

    pub fn child_at(
        &mut self,
        id: Option<ResourceId>,
        position: usize,
    ) -> Result<ResourceId, ExplorerError> {
        Ok(self.index.child_at(&self.graph, id, position)?)
    }

    pub fn cell_for<F>(&self, id: ResourceId, factory: &F) -> Result<F::Cell, ExplorerError>
    where
        F: CellFactory + ?Sized,
    {
        let resource = self
            .index
            .resource(id)
            .ok_or(TreeIndexError::UnknownNode(id))?;
        Ok(factory.create_cell(resource))
    }

    /// Every row has the same height.
    pub fn height_for(&self, _id: ResourceId) -> u32 {
        self.row_height
    }

    pub fn selection(&self) -> &[ResourceId] {
        &self.selection
    }

    pub fn on_selection_changed(&mut self, ids: &[ResourceId]) -> Result<(), ExplorerError> {
        if let Some(unknown) = ids.iter().find(|id| !self.index.contains(**id)) {
            return Err(TreeIndexError::UnknownNode(*unknown).into());
        }
        self.selection = ids.to_vec();
        self.events.push(ViewEvent::SelectionChanged(self.selection.clone()));
        Ok(())
    }

    /// Containers toggle their expansion; files are opened where the modifiers say.
    /// 容器切換展開狀態；檔案依修飾鍵決定開啟方式。
    pub fn on_row_activate(
        &mut self,
        id: ResourceId,
        modifiers: Modifiers,
    ) -> Result<(), ExplorerError> {
        let resource = self
            .index
            .resource(id)
            .ok_or(TreeIndexError::UnknownNode(id))?;
        if resource.is_container() {
            let expanded = !self.expansion.is_expanded(id);
            self.expansion.set(&mut self.store, id, expanded)?;
        } else {
            self.events.push(ViewEvent::Open {
                id,
                target: modifiers.open_target(),
            });
        }
        Ok(())
    }

    pub fn is_expanded(&self, id: ResourceId) -> bool {
        self.expansion.is_expanded(id)
    }

    pub fn expanded(&self) -> &[ResourceId] {
        self.expansion.ids()
    }

    pub fn set_expanded(&mut self, id: ResourceId, expanded: bool) -> Result<(), ExplorerError> {
        if !self.index.contains(id) {
            return Err(TreeIndexError::UnknownNode(id).into());
        }
        self.expansion.set(&mut self.store, id, expanded)?;
        Ok(())
    }

    pub fn collapse_all(&mut self) -> Result<(), ExplorerError> {
        self.expansion.clear(&mut self.store)?;
        self.events.push(ViewEvent::Reload);
        Ok(())
    }

    /// Expands every ancestor of `id` and selects it; returns the ancestors, nearest first.
    /// 展開節點的所有祖先並選取該節點。
    pub fn reveal(&mut self, id: ResourceId) -> Result<Vec<ResourceId>, ExplorerError> {
        if !self.index.contains(id) {
            return Err(TreeIndexError::UnknownNode(id).into());
        }
        let chain = self.index.ancestors(id);
        self.expansion.extend(&mut self.store, &chain)?;
        self.selection = vec![id];
        self.events.push(ViewEvent::Reload);
        self.events.push(ViewEvent::SelectionChanged(self.selection.clone()));
        Ok(chain)
    }

    pub fn drop_effect_for(&self, files: &[PathBuf], target: Option<ResourceId>) -> DropEffect {
        moves::drop_effect_for_external(&self.index, files, target)
    }

    pub fn drop_effect_for_internal(
        &self,
        dragged: &[ResourceId],
        target: Option<ResourceId>,
    ) -> DropEffect {
        moves::drop_effect_for_internal(&self.index, dragged, target)
    }

    pub fn allows_drop(&self, payload: &DragPayload, target: Option<ResourceId>) -> bool {
        let effect = match payload {
            DragPayload::Resources(dragged) => self.drop_effect_for_internal(dragged, target),
            DragPayload::Files(files) => self.drop_effect_for(files, target),
        };
        effect != DropEffect::None
    }

    pub fn on_drop_files(
        &mut self,
        target: Option<ResourceId>,
        files: &[PathBuf],
    ) -> Result<DropOutcome, ExplorerError> {
        let result = moves::commit_external_drop(&self.index, &mut self.graph, files, target);
        self.finish_drop(result)
    }

    pub fn on_drop_internal(
        &mut self,
        dragged: &[ResourceId],
        target: Option<ResourceId>,
    ) -> Result<DropOutcome, ExplorerError> {
        let result = moves::commit_internal_drop(&self.index, &mut self.graph, dragged, target);
        self.finish_drop(result)
    }

    fn finish_drop(
        &mut self,
        result: Result<DropOutcome, DropError>,
    ) -> Result<DropOutcome, ExplorerError> {
        result.map_err(|error| {
            if let DropError::ImportFailed { .. } = error {
                self.events.push(ViewEvent::Notify(error.to_string()));
            }
            ExplorerError::Drop(error)
        })
    }

    /// Applies one change batch, prunes the selection and queues a single reload.
    ///
    /// While a filter is active the containers on matching paths are written
    /// back as expanded, so new matches arrive unfolded.
    pub fn on_resource_change(
        &mut self,
        batch: &[ResourceChange],
    ) -> Result<ChangeSummary, ExplorerError> {
        let summary = self.index.apply_changes(&self.graph, batch);
        let before = self.selection.len();
        self.selection.retain(|id| !summary.removed.contains(id));
        if self.selection.len() != before {
            self.events.push(ViewEvent::SelectionChanged(self.selection.clone()));
        }
        self.events.push(ViewEvent::Reload);
        if !summary.is_empty() {
            if let Some(view) = self.index.filter() {
                self.expansion.replace(&mut self.store, view.expanded())?;
            }
        }
        Ok(summary)
    }

    /// Applies or clears the filter.
    ///
    /// Applying overwrites the persisted expansion set with every container on
    /// a matching path; clearing re-reads the persisted set.
    /// 套用或清除篩選，並同步展開狀態。
    pub fn set_filter(&mut self, term: Option<&str>) -> Result<(), ExplorerError> {
        let was_filtered = self.index.is_filtered();
        let expanded = self
            .index
            .set_filter(term)
            .map(|view| view.expanded().to_vec());
        self.events.push(ViewEvent::Reload);
        match expanded {
            Some(ids) => self.expansion.replace(&mut self.store, &ids)?,
            None if was_filtered => self.expansion.reload(&self.store),
            None => {}
        }
        Ok(())
    }

    pub fn filter_term(&self) -> Option<&str> {
        self.index.filter().map(|view| view.term())
    }
}
