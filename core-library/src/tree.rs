//! Folder tree derived from record paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{MediaId, MediaRecord};
use crate::path::{canonicalize, file_name};

/// A folder that directly contains at least one record.
///
/// Only folders holding records become nodes; a node hangs under its
/// immediate parent when that parent is itself a node, otherwise it is a
/// root. Children are sorted case-insensitively by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub name: String,
    pub path: PathBuf,
    /// Records directly inside this folder
    pub record_ids: Vec<MediaId>,
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// Builds the forest of folder nodes for `records`.
    pub fn build_tree(records: &[MediaRecord]) -> Vec<FolderNode> {
        let mut by_folder: HashMap<PathBuf, Vec<MediaId>> = HashMap::new();
        for record in records {
            let folder = record
                .path
                .parent()
                .map(canonicalize)
                .unwrap_or_else(|| PathBuf::from("/"));
            by_folder.entry(folder).or_default().push(record.id);
        }

        let mut children: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        let mut roots = Vec::new();
        for folder in by_folder.keys() {
            match folder.parent().filter(|parent| by_folder.contains_key(*parent)) {
                Some(parent) => children
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(folder.clone()),
                None => roots.push(folder.clone()),
            }
        }

        let mut nodes: Vec<FolderNode> = roots
            .iter()
            .map(|root| Self::build_node(root, &mut by_folder, &children))
            .collect();
        sort_by_name(&mut nodes);
        nodes
    }

    fn build_node(
        path: &Path,
        by_folder: &mut HashMap<PathBuf, Vec<MediaId>>,
        children: &HashMap<PathBuf, Vec<PathBuf>>,
    ) -> FolderNode {
        let record_ids = by_folder.remove(path).unwrap_or_default();
        let mut kids: Vec<FolderNode> = children
            .get(path)
            .map(|paths| {
                paths
                    .iter()
                    .map(|child| Self::build_node(child, by_folder, children))
                    .collect()
            })
            .unwrap_or_default();
        sort_by_name(&mut kids);

        let name = match file_name(path) {
            name if name.is_empty() => path.display().to_string(),
            name => name,
        };
        FolderNode {
            name,
            path: path.to_path_buf(),
            record_ids,
            children: kids,
        }
    }

    /// Records directly in this folder.
    pub fn record_count(&self) -> usize {
        self.record_ids.len()
    }

    /// Records in this folder and every descendant.
    pub fn total_count(&self) -> usize {
        self.record_count()
            + self
                .children
                .iter()
                .map(FolderNode::total_count)
                .sum::<usize>()
    }

    /// Depth-first lookup of the node for `path`.
    pub fn find(&self, path: &Path) -> Option<&FolderNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

fn sort_by_name(nodes: &mut [FolderNode]) {
    nodes.sort_by_key(|node| node.name.to_lowercase());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn records(paths: &[&str]) -> Vec<MediaRecord> {
        paths
            .iter()
            .map(|path| MediaRecord::new(path, None, Utc::now()))
            .collect()
    }

    #[test]
    fn nests_folders_with_records() {
        let records = records(&[
            "/photos/a.jpg",
            "/photos/b.jpg",
            "/photos/Trip/c.jpg",
            "/photos/alps/d.jpg",
            "/photos/alps/e.jpg",
        ]);
        let tree = FolderNode::build_tree(&records);

        assert_eq!(tree.len(), 1);
        let root = &tree[0];
        assert_eq!(root.name, "photos");
        assert_eq!(root.record_count(), 2);
        assert_eq!(root.total_count(), 5);
        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alps", "Trip"]);
        assert_eq!(
            root.find(Path::new("/photos/alps")).map(FolderNode::record_count),
            Some(2)
        );
    }

    #[test]
    fn gaps_in_hierarchy_produce_separate_roots() {
        let records = records(&["/a/x.jpg", "/a/b/c/y.jpg", "/Z/z.jpg"]);
        let tree = FolderNode::build_tree(&records);

        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "Z"]);
        assert!(tree.iter().all(|node| node.children.is_empty()));
    }
}
