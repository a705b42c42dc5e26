use std::collections::{HashMap, HashSet};

use crate::resource::{
    GraphError, ImportSource, ParentRef, Resource, ResourceChange, ResourceGraph, ResourceId,
    ResourceKind,
};

#[derive(Debug, Clone)]
struct MemoryNode {
    resource: Resource,
    children: Vec<ResourceId>,
}

/// In-memory resource graph; every mutation queues the change batch it produced.
/// 記憶體內的資源圖；每次變更都會排入對應的變更批次。
#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    nodes: HashMap<ResourceId, MemoryNode>,
    roots: Vec<ResourceId>,
    scm_private: HashSet<ResourceId>,
    uncopyable: HashSet<ResourceId>,
    pending: Vec<ResourceChange>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new project to the workspace root.
    /// 在工作區根節點下新增專案。
    pub fn add_project(&mut self, name: impl Into<String>) -> ResourceId {
        let resource = Resource::new(
            ResourceId::new(),
            name,
            ResourceKind::Project,
            Some(ParentRef::Workspace),
        );
        let id = resource.id;
        self.roots.push(id);
        self.insert_node(resource);
        id
    }

    pub fn add_folder(
        &mut self,
        parent: ResourceId,
        name: impl Into<String>,
    ) -> Result<ResourceId, GraphError> {
        self.add_child(parent, name.into(), ResourceKind::Folder)
    }

    pub fn add_file(
        &mut self,
        parent: ResourceId,
        name: impl Into<String>,
    ) -> Result<ResourceId, GraphError> {
        self.add_child(parent, name.into(), ResourceKind::File)
    }

    /// Renames a resource in place.
    /// 就地重新命名資源。
    pub fn rename(&mut self, id: ResourceId, name: impl Into<String>) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NotFound(id))?;
        node.resource.name = name.into();
        let snapshot = node.resource.clone();
        self.pending.push(ResourceChange::changed(snapshot));
        Ok(())
    }

    /// Removes a resource together with its whole subtree.
    /// 移除資源及其整個子樹。
    pub fn remove(&mut self, id: ResourceId) -> Result<(), GraphError> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(GraphError::NotFound(id))?
            .resource
            .parent;
        self.detach(id, parent);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
                self.scm_private.remove(&current);
                self.uncopyable.remove(&current);
                self.pending.push(ResourceChange::deleted(node.resource));
            }
        }
        Ok(())
    }

    /// Flags a resource as private to source control.
    /// 將資源標記為版本控制私有。
    pub fn mark_scm_private(&mut self, id: ResourceId) {
        self.scm_private.insert(id);
    }

    /// Makes every import of `id` fail, simulating an unreadable source.
    pub fn mark_uncopyable(&mut self, id: ResourceId) {
        self.uncopyable.insert(id);
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.nodes.get(&id).map(|node| &node.resource)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drains the batch of changes produced since the previous call.
    /// 取出自上次呼叫以來累積的變更批次。
    pub fn take_changes(&mut self) -> Vec<ResourceChange> {
        std::mem::take(&mut self.pending)
    }

    fn add_child(
        &mut self,
        parent: ResourceId,
        name: String,
        kind: ResourceKind,
    ) -> Result<ResourceId, GraphError> {
        let parent_node = self.nodes.get(&parent).ok_or(GraphError::NotFound(parent))?;
        if !parent_node.resource.is_container() {
            return Err(GraphError::NotAContainer(parent));
        }
        let resource = Resource::new(
            ResourceId::new(),
            name,
            kind,
            Some(ParentRef::Resource(parent)),
        );
        let id = resource.id;
        self.insert_node(resource);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    fn insert_node(&mut self, resource: Resource) {
        self.pending.push(ResourceChange::added(resource.clone()));
        self.nodes.insert(
            resource.id,
            MemoryNode {
                resource,
                children: Vec::new(),
            },
        );
    }

    fn detach(&mut self, id: ResourceId, parent: Option<ParentRef>) {
        match parent {
            Some(ParentRef::Workspace) => self.roots.retain(|root| *root != id),
            Some(ParentRef::Resource(parent_id)) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                    parent_node.children.retain(|child| *child != id);
                }
            }
            None => {}
        }
    }

    fn ensure_container(&self, id: ResourceId) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NotFound(id))?;
        if node.resource.is_container() {
            Ok(())
        } else {
            Err(GraphError::NotAContainer(id))
        }
    }

    fn copy_subtree(
        &mut self,
        source: ResourceId,
        destination: ResourceId,
    ) -> Result<ResourceId, GraphError> {
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::NotFound(source));
        }

        // Snapshot the source subtree first so copies landing inside it are not revisited.
        let mut plan: Vec<(ResourceId, Option<ResourceId>, String, ResourceKind)> = Vec::new();
        let mut stack = vec![(source, None)];
        while let Some((current, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            plan.push((current, parent, node.resource.name.clone(), node.resource.kind));
            for child in node.children.iter().rev() {
                stack.push((*child, Some(current)));
            }
        }

        let mut copies: HashMap<ResourceId, ResourceId> = HashMap::new();
        for (original, parent, name, kind) in plan {
            let target = match parent {
                Some(parent) => *copies.get(&parent).ok_or(GraphError::NotFound(parent))?,
                None => destination,
            };
            // A project copied into another hierarchy lands as a plain folder.
            let kind = match kind {
                ResourceKind::Project => ResourceKind::Folder,
                other => other,
            };
            let copy = self.add_child(target, name, kind)?;
            copies.insert(original, copy);
        }
        copies
            .get(&source)
            .copied()
            .ok_or(GraphError::NotFound(source))
    }
}

impl ResourceGraph for MemoryGraph {
    fn top_level(&self) -> Vec<Resource> {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| node.resource.clone())
            .collect()
    }

    fn children(&self, container: ResourceId) -> Vec<Resource> {
        self.nodes
            .get(&container)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|id| self.nodes.get(id))
                    .map(|child| child.resource.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_scm_private(&self, resource: &Resource) -> bool {
        self.scm_private.contains(&resource.id)
    }

    fn import_resource(
        &mut self,
        destination: ResourceId,
        source: &ImportSource,
    ) -> Result<ResourceId, GraphError> {
        self.ensure_container(destination)?;
        match source {
            ImportSource::Resource(id) => {
                if self.uncopyable.contains(id) {
                    return Err(GraphError::Rejected(format!("cannot read resource {id}")));
                }
                self.copy_subtree(*id, destination)
            }
            ImportSource::External(path) => {
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        GraphError::Rejected(format!("no file name in {}", path.display()))
                    })?
                    .to_string();
                let kind = if path.is_dir() {
                    ResourceKind::Folder
                } else {
                    ResourceKind::File
                };
                self.add_child(destination, name, kind)
            }
        }
    }

    fn move_to(&mut self, resources: &[ResourceId], destination: ResourceId) -> Result<(), GraphError> {
        self.ensure_container(destination)?;
        for id in resources {
            let node = self.nodes.get(id).ok_or(GraphError::NotFound(*id))?;
            if node.resource.kind == ResourceKind::Project {
                return Err(GraphError::Rejected(format!("project {id} cannot be moved")));
            }
        }

        for id in resources {
            let parent = self.nodes.get(id).and_then(|node| node.resource.parent);
            self.detach(*id, parent);
            if let Some(node) = self.nodes.get_mut(id) {
                node.resource.parent = Some(ParentRef::Resource(destination));
                let snapshot = node.resource.clone();
                self.pending.push(ResourceChange::changed(snapshot));
            }
            if let Some(target) = self.nodes.get_mut(&destination) {
                target.children.push(*id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ChangeKind;

    #[test]
    fn mutations_queue_change_batches() {
        let mut graph = MemoryGraph::new();
        let project = graph.add_project("P");
        let folder = graph.add_folder(project, "src").unwrap();
        graph.add_file(folder, "a.txt").unwrap();

        let batch = graph.take_changes();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|change| change.kind == ChangeKind::Add));
        assert!(graph.take_changes().is_empty());
    }

    #[test]
    fn files_cannot_accept_children() {
        let mut graph = MemoryGraph::new();
        let project = graph.add_project("P");
        let file = graph.add_file(project, "readme.md").unwrap();
        assert_eq!(
            graph.add_file(file, "nested").unwrap_err(),
            GraphError::NotAContainer(file)
        );
    }

    #[test]
    fn remove_deletes_whole_subtree() {
        let mut graph = MemoryGraph::new();
        let project = graph.add_project("P");
        let folder = graph.add_folder(project, "src").unwrap();
        graph.add_file(folder, "a.txt").unwrap();
        graph.take_changes();

        graph.remove(folder).unwrap();
        let batch = graph.take_changes();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|change| change.kind == ChangeKind::Delete));
        assert!(graph.children(project).is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn import_copies_subtree_with_fresh_ids() {
        let mut graph = MemoryGraph::new();
        let p1 = graph.add_project("P1");
        let folder = graph.add_folder(p1, "lib").unwrap();
        graph.add_file(folder, "mod.rs").unwrap();
        let p2 = graph.add_project("P2");

        let copy = graph
            .import_resource(p2, &ImportSource::Resource(folder))
            .unwrap();
        assert_ne!(copy, folder);
        let copied_children = graph.children(copy);
        assert_eq!(copied_children.len(), 1);
        assert_eq!(copied_children[0].name, "mod.rs");
        assert_eq!(graph.children(folder).len(), 1);
    }

    #[test]
    fn move_reparents_and_reports_change() {
        let mut graph = MemoryGraph::new();
        let project = graph.add_project("P");
        let src = graph.add_folder(project, "src").unwrap();
        let file = graph.add_file(project, "main.rs").unwrap();
        graph.take_changes();

        graph.move_to(&[file], src).unwrap();
        assert_eq!(
            graph.get(file).unwrap().parent,
            Some(ParentRef::Resource(src))
        );
        assert_eq!(graph.children(project).len(), 1);
        let batch = graph.take_changes();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ChangeKind::Change);
    }

    #[test]
    fn projects_cannot_be_moved() {
        let mut graph = MemoryGraph::new();
        let p1 = graph.add_project("P1");
        let p2 = graph.add_project("P2");
        assert!(matches!(
            graph.move_to(&[p1], p2),
            Err(GraphError::Rejected(_))
        ));
    }
}
