use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::index::TreeIndex;
use crate::resource::{GraphError, ImportSource, ResourceGraph, ResourceId};

/// Feedback shown to the pointer while hovering a drop target.
/// 拖曳經過目標時呈現的放置效果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropEffect {
    None,
    Copy,
    Move,
}

impl DropEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropEffect::None => "none",
            DropEffect::Copy => "copy",
            DropEffect::Move => "move",
        }
    }
}

impl fmt::Display for DropEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a drop of internal nodes would be carried out.
/// 內部節點放置後的處理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropClassification {
    /// Copy into another hierarchy.
    Import,
    /// Reparent within the same hierarchy.
    Move,
    Rejected,
}

/// One failed import request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub source: ImportSource,
    pub error: GraphError,
}

fn describe_failures(failures: &[ImportFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.source, failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while committing an accepted drop.
/// 執行放置操作時的錯誤。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DropError {
    #[error("failed to import {} of {attempted} resources ({})", .failures.len(), describe_failures(.failures))]
    ImportFailed {
        failures: Vec<ImportFailure>,
        attempted: usize,
    },
    #[error("move failed: {0}")]
    Move(#[from] GraphError),
}

/// What a committed drop ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Imported(Vec<ResourceId>),
    Moved(Vec<ResourceId>),
    Rejected,
}

/// True when no dragged node shares the target's owning top-level container.
///
/// Stops at the first dragged node found in the target's hierarchy, so a
/// mixed drag set gets a single verdict.
/// 判斷拖曳是否跨越不同的頂層階層。
pub fn different_hierarchy(
    index: &TreeIndex,
    dragged: &[ResourceId],
    target: Option<ResourceId>,
) -> bool {
    let Some(target) = target else {
        return false;
    };
    let target_owner = index.owning_container(target);
    for id in dragged {
        if index.owning_container(*id) == target_owner {
            return false;
        }
    }
    true
}

/// Whether dropping `dragged` onto `target` is a legal reparent inside one hierarchy.
/// 判斷在同一階層內的移動是否合法。
pub fn valid_move(index: &TreeIndex, dragged: &[ResourceId], target: Option<ResourceId>) -> bool {
    let Some(target) = target else {
        return false;
    };
    let Some(target_resource) = index.resource(target) else {
        return false;
    };

    let chain = chain_to_root(index, target);
    if dragged.iter().any(|id| chain.contains(id)) {
        return false;
    }

    let target_owner = index.owning_container(target);
    dragged.iter().all(|id| {
        index.resource(*id).is_some_and(|resource| {
            resource.parent_id() != Some(target_resource.id)
                && index.owning_container(*id) == target_owner
        })
    })
}

/// `target` and every ancestor reachable through parent links.
fn chain_to_root(index: &TreeIndex, target: ResourceId) -> HashSet<ResourceId> {
    let mut chain = HashSet::from([target]);
    let mut current = index.resource(target).and_then(|resource| resource.parent_id());
    while let Some(id) = current {
        if !chain.insert(id) {
            warn!(node = %target, "cycle in resource ancestry");
            break;
        }
        current = index.resource(id).and_then(|resource| resource.parent_id());
    }
    chain
}

fn is_container(index: &TreeIndex, id: ResourceId) -> bool {
    index
        .resource(id)
        .is_some_and(|resource| resource.is_container())
}

pub fn classify(
    index: &TreeIndex,
    dragged: &[ResourceId],
    target: Option<ResourceId>,
) -> DropClassification {
    let Some(target_id) = target else {
        return DropClassification::Rejected;
    };
    if dragged.is_empty() || !is_container(index, target_id) {
        return DropClassification::Rejected;
    }
    if different_hierarchy(index, dragged, target) {
        DropClassification::Import
    } else if valid_move(index, dragged, target) {
        DropClassification::Move
    } else {
        DropClassification::Rejected
    }
}

/// Drop effect while dragging nodes of the tree itself.
pub fn drop_effect_for_internal(
    index: &TreeIndex,
    dragged: &[ResourceId],
    target: Option<ResourceId>,
) -> DropEffect {
    match classify(index, dragged, target) {
        DropClassification::Import => DropEffect::Copy,
        DropClassification::Move => DropEffect::Move,
        DropClassification::Rejected => DropEffect::None,
    }
}

/// Drop effect while dragging files from outside the workspace.
pub fn drop_effect_for_external(
    index: &TreeIndex,
    files: &[PathBuf],
    target: Option<ResourceId>,
) -> DropEffect {
    match target {
        Some(target) if !files.is_empty() && is_container(index, target) => DropEffect::Copy,
        _ => DropEffect::None,
    }
}

/// Commits a drop of internal nodes through the resource graph.
///
/// Imports are issued one per node and never rolled back; every failure is
/// collected into a single [`DropError::ImportFailed`].
/// 透過資源圖執行內部節點的放置。
pub fn commit_internal_drop<G>(
    index: &TreeIndex,
    graph: &mut G,
    dragged: &[ResourceId],
    target: Option<ResourceId>,
) -> Result<DropOutcome, DropError>
where
    G: ResourceGraph + ?Sized,
{
    let Some(destination) = target else {
        return Ok(DropOutcome::Rejected);
    };
    match classify(index, dragged, target) {
        DropClassification::Import => {
            let sources: Vec<ImportSource> =
                dragged.iter().copied().map(ImportSource::Resource).collect();
            import_all(graph, destination, &sources)
        }
        DropClassification::Move => {
            graph.move_to(dragged, destination)?;
            info!(count = dragged.len(), destination = %destination, "moved resources");
            Ok(DropOutcome::Moved(dragged.to_vec()))
        }
        DropClassification::Rejected => Ok(DropOutcome::Rejected),
    }
}

/// Imports external files into the target container.
pub fn commit_external_drop<G>(
    index: &TreeIndex,
    graph: &mut G,
    files: &[PathBuf],
    target: Option<ResourceId>,
) -> Result<DropOutcome, DropError>
where
    G: ResourceGraph + ?Sized,
{
    match target {
        Some(destination) if drop_effect_for_external(index, files, target) == DropEffect::Copy => {
            let sources: Vec<ImportSource> =
                files.iter().cloned().map(ImportSource::External).collect();
            import_all(graph, destination, &sources)
        }
        _ => Ok(DropOutcome::Rejected),
    }
}

fn import_all<G>(
    graph: &mut G,
    destination: ResourceId,
    sources: &[ImportSource],
) -> Result<DropOutcome, DropError>
where
    G: ResourceGraph + ?Sized,
{
    let mut imported = Vec::new();
    let mut failures = Vec::new();
    for source in sources {
        match graph.import_resource(destination, source) {
            Ok(id) => imported.push(id),
            Err(error) => {
                warn!(%source, destination = %destination, %error, "import failed");
                failures.push(ImportFailure {
                    source: source.clone(),
                    error,
                });
            }
        }
    }
    info!(
        imported = imported.len(),
        failed = failures.len(),
        destination = %destination,
        "imported resources"
    );
    if failures.is_empty() {
        Ok(DropOutcome::Imported(imported))
    } else {
        Err(DropError::ImportFailed {
            failures,
            attempted: sources.len(),
        })
    }
}
