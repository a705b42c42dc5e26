use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::filter::FilteredView;
use crate::resource::{compare_resources, Resource, ResourceGraph, ResourceId, ResourceKind};

/// Lookup failures raised by [`TreeIndex`] queries.
/// [`TreeIndex`] 查詢時的錯誤類型。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeIndexError {
    #[error("node {0} is not indexed")]
    UnknownNode(ResourceId),
    #[error("index {index} out of range ({count} children)")]
    IndexOutOfRange {
        parent: Option<ResourceId>,
        index: usize,
        count: usize,
    },
}

/// Identity lookup, ordered top level and lazily sorted children of the workspace.
/// 工作區的識別碼查詢表、排序後的頂層清單，以及延遲建立的子節點快取。
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    pub(crate) by_id: HashMap<ResourceId, Resource>,
    pub(crate) top_level: Vec<ResourceId>,
    pub(crate) children_cache: HashMap<ResourceId, Vec<ResourceId>>,
    pub(crate) filter: Option<FilteredView>,
    hide_private: bool,
}

impl TreeIndex {
    /// Creates an empty index; `hide_private` toggles the SCM visibility predicate.
    /// 建立空索引；`hide_private` 決定是否套用版本控制可見性判斷。
    pub fn new(hide_private: bool) -> Self {
        Self {
            hide_private,
            ..Self::default()
        }
    }

    /// Seeds the index with every visible resource reachable from the graph's
    /// top-level containers, depth first.
    /// 以深度優先方式載入所有可見資源。
    pub fn seed<G>(graph: &G, hide_private: bool) -> Self
    where
        G: ResourceGraph + ?Sized,
    {
        let mut index = Self::new(hide_private);
        let mut visited = HashSet::new();
        let mut stack: Vec<Resource> = graph.top_level().into_iter().rev().collect();
        while let Some(resource) = stack.pop() {
            if !visited.insert(resource.id) || !index.is_visible(graph, &resource) {
                continue;
            }
            if resource.is_container() {
                stack.extend(graph.children(resource.id).into_iter().rev());
            }
            index.by_id.insert(resource.id, resource);
        }

        index.top_level = index
            .by_id
            .values()
            .filter(|resource| index.is_top_level(resource))
            .map(|resource| resource.id)
            .collect();
        index.resort_top_level();
        debug!(
            resources = index.by_id.len(),
            top_level = index.top_level.len(),
            "seeded tree index"
        );
        index
    }

    pub fn hides_private(&self) -> bool {
        self.hide_private
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.by_id.get(&id)
    }

    /// Unfiltered top-level ids in display order.
    pub fn top_level(&self) -> &[ResourceId] {
        &self.top_level
    }

    /// Cached (unfiltered) children of `id`, if the cache has been filled.
    pub fn cached_children(&self, id: ResourceId) -> Option<&[ResourceId]> {
        self.children_cache.get(&id).map(Vec::as_slice)
    }

    pub fn filter(&self) -> Option<&FilteredView> {
        self.filter.as_ref()
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// A resource is top level when it is a project, hangs off the workspace
    /// root, or its parent has no parent of its own.
    pub fn is_top_level(&self, resource: &Resource) -> bool {
        if resource.kind == ResourceKind::Project {
            return true;
        }
        match resource.parent {
            None => false,
            Some(parent) => match parent.resource() {
                None => true,
                Some(parent_id) => self
                    .by_id
                    .get(&parent_id)
                    .is_some_and(|parent| parent.parent.is_none()),
            },
        }
    }

    /// Top-level container owning `id` (itself when already top level).
    /// 取得擁有該節點的頂層容器。
    pub fn owning_container(&self, id: ResourceId) -> Option<ResourceId> {
        let mut visited = HashSet::new();
        let mut current = self.by_id.get(&id)?;
        loop {
            if self.is_top_level(current) {
                return Some(current.id);
            }
            if !visited.insert(current.id) {
                warn!(node = %id, "cycle in resource ancestry");
                return None;
            }
            let parent = current.parent_id()?;
            current = self.by_id.get(&parent)?;
        }
    }

    /// Ancestors of `id`, nearest first, stopping at its top-level owner.
    /// 由近至遠列出祖先節點，止於頂層容器。
    pub fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let Some(mut current) = self.by_id.get(&id) else {
            return chain;
        };
        while !self.is_top_level(current) {
            let Some(parent_id) = current.parent_id() else {
                break;
            };
            if !visited.insert(parent_id) {
                warn!(node = %id, "cycle in resource ancestry");
                break;
            }
            let Some(parent) = self.by_id.get(&parent_id) else {
                break;
            };
            chain.push(parent_id);
            current = parent;
        }
        chain
    }

    /// `None` is the workspace root, which always has children.
    pub fn has_children(&self, id: Option<ResourceId>) -> bool {
        match id {
            None => true,
            Some(id) => self
                .by_id
                .get(&id)
                .is_some_and(|resource| resource.is_container()),
        }
    }

    /// Number of rows under `id`, honouring the active filter.
    /// 回傳節點下的列數；若有篩選則使用篩選結果。
    pub fn child_count<G>(&mut self, graph: &G, id: Option<ResourceId>) -> usize
    where
        G: ResourceGraph + ?Sized,
    {
        if let Some(id) = id {
            if !self.has_children(Some(id)) {
                return 0;
            }
            if self.filter.is_none() {
                self.populate_children(graph, id);
            }
        }
        self.children_of(id).len()
    }

    pub fn child_at<G>(
        &mut self,
        graph: &G,
        id: Option<ResourceId>,
        index: usize,
    ) -> Result<ResourceId, TreeIndexError>
    where
        G: ResourceGraph + ?Sized,
    {
        if let Some(id) = id {
            if !self.by_id.contains_key(&id) {
                return Err(TreeIndexError::UnknownNode(id));
            }
        }
        let count = self.child_count(graph, id);
        self.children_of(id)
            .get(index)
            .copied()
            .ok_or(TreeIndexError::IndexOutOfRange {
                parent: id,
                index,
                count,
            })
    }

    /// Drops every cached children list.
    /// 清空所有子節點快取。
    pub fn clear_cache(&mut self) {
        self.children_cache.clear();
    }

    pub(crate) fn is_visible<G>(&self, graph: &G, resource: &Resource) -> bool
    where
        G: ResourceGraph + ?Sized,
    {
        !(self.hide_private && graph.is_scm_private(resource))
    }

    pub(crate) fn resort_top_level(&mut self) {
        let mut ids = std::mem::take(&mut self.top_level);
        self.sort_ids(&mut ids);
        self.top_level = ids;
    }

    pub(crate) fn sort_ids(&self, ids: &mut [ResourceId]) {
        ids.sort_by(|a, b| match (self.by_id.get(a), self.by_id.get(b)) {
            (Some(left), Some(right)) => compare_resources(left, right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        });
    }

    fn children_of(&self, id: Option<ResourceId>) -> &[ResourceId] {
        match (&self.filter, id) {
            (Some(filter), None) => &filter.top_level,
            (Some(filter), Some(id)) => filter.children(id),
            (None, None) => &self.top_level,
            (None, Some(id)) => self.cached_children(id).unwrap_or(&[]),
        }
    }

    fn populate_children<G>(&mut self, graph: &G, id: ResourceId)
    where
        G: ResourceGraph + ?Sized,
    {
        if self.children_cache.contains_key(&id) {
            return;
        }
        let mut children: Vec<Resource> = graph
            .children(id)
            .into_iter()
            .filter(|child| self.is_visible(graph, child))
            .collect();
        children.sort_by(compare_resources);
        let ids: Vec<ResourceId> = children.iter().map(|child| child.id).collect();
        for child in children {
            self.by_id.insert(child.id, child);
        }
        debug!(parent = %id, children = ids.len(), "filled children cache");
        self.children_cache.insert(id, ids);
    }
}
