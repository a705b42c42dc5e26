use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::index::TreeIndex;
use crate::resource::ResourceId;

/// Reduced tree holding every match of a search term plus its ancestor chain.
/// 篩選後的精簡樹：包含所有符合項目及其祖先路徑。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    term: String,
    pub(crate) top_level: Vec<ResourceId>,
    children: HashMap<ResourceId, Vec<ResourceId>>,
    expanded: Vec<ResourceId>,
}

impl FilteredView {
    /// Builds the reduced tree for `term` (case-sensitive substring match).
    ///
    /// Ascends from each match until it reaches a node that was already visited
    /// or a top-level node, so shared ancestors are only walked once and a
    /// malformed graph cannot loop forever.
    pub fn build(index: &TreeIndex, term: &str) -> Self {
        let mut visited: HashSet<ResourceId> = HashSet::new();
        let mut top_level = Vec::new();
        let mut children: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();

        for matched in index
            .by_id
            .values()
            .filter(|resource| resource.name.contains(term))
        {
            let mut current = matched;
            loop {
                if visited.contains(&current.id) || current.parent.is_none() {
                    break;
                }
                visited.insert(current.id);
                if index.is_top_level(current) {
                    top_level.push(current.id);
                    break;
                }
                let Some(parent_id) = current.parent_id() else {
                    break;
                };
                let Some(parent) = index.by_id.get(&parent_id) else {
                    warn!(node = %current.id, parent = %parent_id, "filter match has unindexed parent");
                    break;
                };
                children.entry(parent_id).or_default().push(current.id);
                current = parent;
            }
        }

        index.sort_ids(&mut top_level);
        for list in children.values_mut() {
            index.sort_ids(list);
        }

        let mut expanded: Vec<ResourceId> = visited
            .into_iter()
            .filter(|id| index.has_children(Some(*id)))
            .collect();
        expanded.sort();

        Self {
            term: term.to_string(),
            top_level,
            children,
            expanded,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn top_level(&self) -> &[ResourceId] {
        &self.top_level
    }

    pub fn children(&self, id: ResourceId) -> &[ResourceId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Containers lying on a matched path; the view expands all of them.
    pub fn expanded(&self) -> &[ResourceId] {
        &self.expanded
    }
}

impl TreeIndex {
    /// Applies `term`, or clears the filter when it is `None` or empty.
    /// 套用篩選字串；若為 `None` 或空字串則清除篩選。
    pub fn set_filter(&mut self, term: Option<&str>) -> Option<&FilteredView> {
        match term.filter(|term| !term.is_empty()) {
            Some(term) => {
                let view = FilteredView::build(self, term);
                debug!(
                    term,
                    top_level = view.top_level.len(),
                    expanded = view.expanded.len(),
                    "applied tree filter"
                );
                self.filter = Some(view);
            }
            None => {
                if self.filter.take().is_some() {
                    debug!("cleared tree filter");
                }
            }
        }
        self.filter.as_ref()
    }

    /// Rebuilds the active filter against the current index contents.
    pub(crate) fn refresh_filter(&mut self) {
        if let Some(term) = self.filter.as_ref().map(|view| view.term.clone()) {
            self.filter = Some(FilteredView::build(self, &term));
        }
    }
}
