use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use places_tree::{MemoryGraph, ResourceId};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File listing SCM-private paths, one relative path per line.
pub const SCM_PRIVATE_FILE: &str = ".scmprivate";

/// Directory roots loaded into an in-memory resource graph.
/// 將資料夾掃描成記憶體中的資源圖。
pub struct ScannedWorkspace {
    pub graph: MemoryGraph,
    paths: HashMap<PathBuf, ResourceId>,
}

impl ScannedWorkspace {
    /// Each root becomes a project; everything below it becomes folders and files.
    pub fn scan(roots: &[PathBuf]) -> Result<Self> {
        let mut graph = MemoryGraph::new();
        let mut paths = HashMap::new();
        for root in roots {
            let root = fs::canonicalize(root)
                .with_context(|| format!("failed to resolve root {}", root.display()))?;
            if !root.is_dir() {
                bail!("root '{}' is not a directory", root.display());
            }
            let name = root
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| root.display().to_string());
            let project = graph.add_project(name);
            paths.insert(root.clone(), project);

            for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(root = %root.display(), %err, "skipping unreadable entry");
                        continue;
                    }
                };
                let path = entry.path();
                let Some(parent) = path.parent().and_then(|parent| paths.get(parent)).copied()
                else {
                    continue;
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                let id = if entry.file_type().is_dir() {
                    graph.add_folder(parent, name)
                } else {
                    graph.add_file(parent, name)
                }
                .map_err(|err| anyhow!("failed to index {}: {err}", path.display()))?;
                paths.insert(path.to_path_buf(), id);
            }

            mark_private_entries(&mut graph, &paths, &root)?;
        }
        graph.take_changes();
        debug!(roots = roots.len(), resources = graph.len(), "scanned workspace");
        Ok(Self { graph, paths })
    }

    /// Resolves a filesystem path to the resource scanned for it.
    pub fn resolve(&self, path: &Path) -> Result<ResourceId> {
        let canonical = fs::canonicalize(path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        self.paths
            .get(&canonical)
            .copied()
            .ok_or_else(|| anyhow!("'{}' is not inside any scanned root", path.display()))
    }
}

fn mark_private_entries(
    graph: &mut MemoryGraph,
    paths: &HashMap<PathBuf, ResourceId>,
    root: &Path,
) -> Result<()> {
    let listing = root.join(SCM_PRIVATE_FILE);
    if !listing.is_file() {
        return Ok(());
    }
    let contents = fs::read_to_string(&listing)
        .with_context(|| format!("failed to read {}", listing.display()))?;
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match paths.get(&root.join(line)) {
            Some(id) => graph.mark_scm_private(*id),
            None => debug!(entry = line, "private entry not found"),
        }
    }
    Ok(())
}
