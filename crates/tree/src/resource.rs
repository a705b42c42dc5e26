use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a resource supplied by the workspace model.
/// 由工作區模型提供的資源識別碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocates a fresh process-unique identifier.
    /// 配置一個在行程內唯一的識別碼。
    pub fn new() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Closed set of resource variants.
/// 資源的種類（檔案、資料夾、專案）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    File,
    Folder,
    Project,
}

impl ResourceKind {
    pub fn is_container(&self) -> bool {
        matches!(self, ResourceKind::Folder | ResourceKind::Project)
    }
}

/// Where a resource hangs in the hierarchy.
/// 資源在階層中的父節點參照。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    /// The implicit workspace root that owns every project.
    Workspace,
    Resource(ResourceId),
}

impl ParentRef {
    pub fn resource(&self) -> Option<ResourceId> {
        match self {
            ParentRef::Workspace => None,
            ParentRef::Resource(id) => Some(*id),
        }
    }
}

/// Snapshot of an externally owned resource.
/// 外部擁有之資源的快照；索引只讀取、不擁有。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    /// `None` marks an orphan that is no longer attached anywhere.
    #[serde(default)]
    pub parent: Option<ParentRef>,
}

impl Resource {
    pub fn new(
        id: ResourceId,
        name: impl Into<String>,
        kind: ResourceKind,
        parent: Option<ParentRef>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parent,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn parent_id(&self) -> Option<ResourceId> {
        self.parent.and_then(|parent| parent.resource())
    }
}

/// Orders siblings: containers before files, then by case-insensitive name.
/// 排序規則：容器在檔案之前，其次依名稱（不分大小寫）排序。
pub fn compare_resources(a: &Resource, b: &Resource) -> CmpOrdering {
    match (a.is_container(), b.is_container()) {
        (false, true) => CmpOrdering::Greater,
        (true, false) => CmpOrdering::Less,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    }
}

/// Kind of notification emitted by the resource graph.
/// 資源圖發出的變更通知種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Delete,
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub kind: ChangeKind,
    pub resource: Resource,
}

impl ResourceChange {
    pub fn added(resource: Resource) -> Self {
        Self {
            kind: ChangeKind::Add,
            resource,
        }
    }

    pub fn deleted(resource: Resource) -> Self {
        Self {
            kind: ChangeKind::Delete,
            resource,
        }
    }

    pub fn changed(resource: Resource) -> Self {
        Self {
            kind: ChangeKind::Change,
            resource,
        }
    }
}

/// What an import request copies into the destination container.
/// 匯入請求的來源：工作區內的資源或外部檔案。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Resource(ResourceId),
    External(PathBuf),
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSource::Resource(id) => write!(f, "resource {id}"),
            ImportSource::External(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors surfaced by resource-graph mutations.
/// 資源圖變更操作的錯誤。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("resource {0} not found")]
    NotFound(ResourceId),
    #[error("resource {0} cannot accept children")]
    NotAContainer(ResourceId),
    #[error("operation rejected: {0}")]
    Rejected(String),
}

/// The externally owned hierarchy the explorer mirrors.
/// 檔案總管所映射、由外部擁有的資源階層。
pub trait ResourceGraph {
    /// Containers attached directly to the workspace root.
    fn top_level(&self) -> Vec<Resource>;

    /// Live children of `container`; empty for files and unknown ids.
    fn children(&self, container: ResourceId) -> Vec<Resource>;

    /// Visibility hook: resources private to source control are hidden.
    fn is_scm_private(&self, _resource: &Resource) -> bool {
        false
    }

    fn import_resource(
        &mut self,
        destination: ResourceId,
        source: &ImportSource,
    ) -> Result<ResourceId, GraphError>;

    fn move_to(&mut self, resources: &[ResourceId], destination: ResourceId)
        -> Result<(), GraphError>;
}
