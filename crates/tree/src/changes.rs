use std::collections::HashSet;

use tracing::debug;

use crate::index::TreeIndex;
use crate::resource::{ChangeKind, ResourceChange, ResourceGraph, ResourceId};

/// Counts of what a change batch did to the index.
/// 紀錄單一變更批次對索引造成的差異。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub added: Vec<ResourceId>,
    pub removed: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    pub skipped: usize,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

impl TreeIndex {
    /// Applies one coherent batch of graph notifications.
    ///
    /// The top level is fully re-sorted and the children cache dropped once the
    /// whole batch is in; an active filter is rebuilt against the new contents.
    /// 套用一整批變更通知；整批完成後才重新排序並清除快取。
    pub fn apply_changes<G>(&mut self, graph: &G, batch: &[ResourceChange]) -> ChangeSummary
    where
        G: ResourceGraph + ?Sized,
    {
        let mut summary = ChangeSummary::default();
        for change in batch {
            let resource = &change.resource;
            if !self.is_visible(graph, resource) {
                summary.skipped += 1;
                continue;
            }
            match change.kind {
                ChangeKind::Add => {
                    self.by_id.insert(resource.id, resource.clone());
                    if self.is_top_level(resource) && !self.top_level.contains(&resource.id) {
                        self.top_level.push(resource.id);
                    }
                    summary.added.push(resource.id);
                }
                ChangeKind::Delete => {
                    let mut removed = self.descendants_of(resource.id);
                    removed.push(resource.id);
                    removed.retain(|id| self.by_id.remove(id).is_some());
                    self.top_level.retain(|id| !removed.contains(id));
                    summary.removed.extend(removed);
                }
                ChangeKind::Change => {
                    self.by_id.insert(resource.id, resource.clone());
                    let top_level = self.is_top_level(resource);
                    let listed = self.top_level.contains(&resource.id);
                    if top_level && !listed {
                        self.top_level.push(resource.id);
                    } else if !top_level && listed {
                        self.top_level.retain(|id| *id != resource.id);
                    }
                    summary.updated.push(resource.id);
                }
            }
        }

        self.resort_top_level();
        self.clear_cache();
        self.refresh_filter();
        debug!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            updated = summary.updated.len(),
            skipped = summary.skipped,
            "applied resource change batch"
        );
        summary
    }

    /// Indexed nodes whose ancestor chain passes through `root`.
    fn descendants_of(&self, root: ResourceId) -> Vec<ResourceId> {
        let mut found = Vec::new();
        for resource in self.by_id.values() {
            if resource.id == root {
                continue;
            }
            let mut visited = HashSet::new();
            let mut parent = resource.parent_id();
            while let Some(parent_id) = parent {
                if parent_id == root {
                    found.push(resource.id);
                    break;
                }
                if !visited.insert(parent_id) {
                    break;
                }
                parent = self.by_id.get(&parent_id).and_then(|node| node.parent_id());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::moves::valid_move;
    use crate::resource::{ParentRef, Resource, ResourceKind};
    use crate::test_support::{names, sample_workspace};

    #[test]
    fn added_projects_join_sorted_top_level() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        let alpha = graph.add_project("alpha");
        let zulu = graph.add_project("Zulu");
        let batch = graph.take_changes();

        let summary = index.apply_changes(&graph, &batch);
        assert_eq!(summary.added, vec![alpha, zulu]);
        assert_eq!(index.top_level(), &[alpha, ids.project, zulu]);
    }

    #[test]
    fn nested_additions_do_not_reach_top_level() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        assert_eq!(index.child_count(&graph, Some(ids.src)), 1);

        let added = graph.add_file(ids.src, "b.txt").unwrap();
        let batch = graph.take_changes();
        index.apply_changes(&graph, &batch);

        assert!(index.contains(added));
        assert_eq!(index.top_level(), &[ids.project]);
        assert!(index.cached_children(ids.src).is_none());
        assert_eq!(index.child_count(&graph, Some(ids.src)), 2);
    }

    #[test]
    fn deleting_a_folder_prunes_its_subtree() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        graph.remove(ids.src).unwrap();
        let batch = graph.take_changes();

        // Only the folder's own notification is delivered.
        let folder_only: Vec<_> = batch
            .into_iter()
            .filter(|change| change.resource.id == ids.src)
            .collect();
        let summary = index.apply_changes(&graph, &folder_only);

        assert!(!index.contains(ids.src));
        assert!(!index.contains(ids.a_txt));
        assert_eq!(summary.removed.len(), 2);
        assert_eq!(index.child_count(&graph, Some(ids.project)), 1);
    }

    #[test]
    fn deleting_a_project_removes_it_from_top_level() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        graph.remove(ids.project).unwrap();
        let batch = graph.take_changes();
        index.apply_changes(&graph, &batch);
        assert!(index.top_level().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn renames_resort_the_top_level() {
        let mut graph = MemoryGraph::new();
        let first = graph.add_project("a-project");
        let second = graph.add_project("b-project");
        let mut index = TreeIndex::seed(&graph, true);
        assert_eq!(index.top_level(), &[first, second]);

        graph.rename(first, "c-project").unwrap();
        let batch = graph.take_changes();
        let summary = index.apply_changes(&graph, &batch);
        assert_eq!(summary.updated, vec![first]);
        assert_eq!(index.top_level(), &[second, first]);
        assert_eq!(index.resource(first).unwrap().name, "c-project");
    }

    #[test]
    fn private_notifications_are_discarded() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        let secret = graph.add_file(ids.project, ".orig").unwrap();
        graph.mark_scm_private(secret);
        let batch = graph.take_changes();

        let summary = index.apply_changes(&graph, &batch);
        assert_eq!(summary.skipped, 1);
        assert!(summary.is_empty());
        assert!(!index.contains(secret));
    }

    #[test]
    fn active_filter_follows_the_batch() {
        let (mut graph, ids) = sample_workspace();
        let mut index = TreeIndex::seed(&graph, true);
        index.set_filter(Some(".md"));
        assert_eq!(index.child_count(&graph, Some(ids.project)), 1);

        let guide = graph.add_file(ids.src, "guide.md").unwrap();
        let batch = graph.take_changes();
        index.apply_changes(&graph, &batch);

        let view = index.filter().unwrap();
        assert_eq!(names(&index, view.children(ids.project)), vec!["src", "readme.md"]);
        assert_eq!(view.children(ids.src), &[guide]);
    }

    #[test]
    fn cyclic_parent_links_terminate() {
        let graph = MemoryGraph::new();
        let mut index = TreeIndex::new(true);
        let first = ResourceId::new();
        let second = ResourceId::new();
        let batch = vec![
            ResourceChange::added(Resource::new(
                first,
                "alpha",
                ResourceKind::Folder,
                Some(ParentRef::Resource(second)),
            )),
            ResourceChange::added(Resource::new(
                second,
                "beta",
                ResourceKind::Folder,
                Some(ParentRef::Resource(first)),
            )),
        ];
        let summary = index.apply_changes(&graph, &batch);
        assert_eq!(summary.added.len(), 2);
        assert!(index.top_level().is_empty());

        assert_eq!(index.owning_container(first), None);
        assert_eq!(index.ancestors(first), vec![second]);
        let view = index.set_filter(Some("a")).cloned().unwrap();
        assert!(view.top_level().is_empty());
        assert!(!valid_move(&index, &[first], Some(second)));

        let removal = ResourceChange::deleted(index.resource(first).cloned().unwrap());
        let summary = index.apply_changes(&graph, &[removal]);
        assert_eq!(summary.removed.len(), 2);
        assert!(index.is_empty());
    }
}
