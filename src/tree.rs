use std::path::{Path, PathBuf};

use crate::classify::SeriesGrouping;

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Modality,
    Reference,
    Series,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Name column.
    pub label: String,
    /// Information column.
    pub info: String,
    pub path: Option<PathBuf>,
    children: Vec<NodeId>,
}

impl TreeNode {
    fn group(kind: NodeKind, label: &str, info: String) -> Self {
        Self {
            kind,
            label: label.to_string(),
            info,
            path: None,
            children: Vec::new(),
        }
    }

    fn file(path: &Path) -> Self {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            kind: NodeKind::File,
            label,
            info: path.display().to_string(),
            path: Some(path.to_path_buf()),
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Navigation tree built from a [`SeriesGrouping`]. Nodes live in one arena
/// and refer to their children by index; index 0 is the invisible root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesTree {
    nodes: Vec<TreeNode>,
}

impl Default for SeriesTree {
    fn default() -> Self {
        Self {
            nodes: vec![TreeNode::group(NodeKind::Root, "", String::new())],
        }
    }
}

impl SeriesTree {
    pub fn render(grouping: &SeriesGrouping) -> Self {
        let mut tree = Self::default();
        for (modality, references) in grouping.modalities() {
            let modality_node = tree.push(
                ROOT,
                TreeNode::group(NodeKind::Modality, modality, "Modality".to_string()),
            );
            for (reference_id, series) in references {
                let reference_node = tree.push(
                    modality_node,
                    TreeNode::group(
                        NodeKind::Reference,
                        reference_id,
                        "Frame of Reference UID".to_string(),
                    ),
                );
                for (series_label, files) in series {
                    let series_node = tree.push(
                        reference_node,
                        TreeNode::group(
                            NodeKind::Series,
                            series_label,
                            format!("Series Description ({} files)", files.len()),
                        ),
                    );
                    for file in files {
                        tree.push(series_node, TreeNode::file(file));
                    }
                }
            }
        }
        tree
    }

    fn push(&mut self, parent: NodeId, node: TreeNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(TreeNode::children)
            .unwrap_or_default()
    }

    pub fn payload(&self, id: NodeId) -> Option<&Path> {
        self.nodes.get(id)?.path.as_deref()
    }

    /// Number of visible nodes (the root is not counted).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends the path of every file at or below `id`.
    pub fn collect_files(&self, id: NodeId, out: &mut Vec<PathBuf>) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.is_leaf() {
            if let Some(path) = &node.path {
                out.push(path.clone());
            }
            return;
        }
        for &child in &node.children {
            self.collect_files(child, out);
        }
    }

    #[cfg(test)]
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.collect_files(ROOT, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationKey;

    fn grouping() -> SeriesGrouping {
        let mut grouping = SeriesGrouping::new();
        let entries = [
            ("CT", "1.2", "Head", "/data/ct/1.dcm"),
            ("CT", "1.2", "Head", "/data/ct/2.dcm"),
            ("CT", "1.2", "Neck", "/data/ct/3.dcm"),
            ("CT", "3.4", "Head", "/data/ct2/1.dcm"),
            ("RTPLAN", "1.2", "Plan A (APPROVED)", "/data/rt/plan.dcm"),
        ];
        for (modality, reference_id, series_label, path) in entries {
            grouping.insert(
                ClassificationKey {
                    modality: modality.to_string(),
                    reference_id: reference_id.to_string(),
                    series_label: series_label.to_string(),
                },
                PathBuf::from(path),
            );
        }
        grouping
    }

    fn nodes_of_kind(tree: &SeriesTree, kind: NodeKind) -> Vec<&TreeNode> {
        (0..=tree.len())
            .filter_map(|id| tree.node(id))
            .filter(|node| node.kind == kind)
            .collect()
    }

    #[test]
    fn render_creates_one_node_per_group_and_file() {
        let tree = SeriesTree::render(&grouping());

        assert_eq!(nodes_of_kind(&tree, NodeKind::Modality).len(), 2);
        assert_eq!(nodes_of_kind(&tree, NodeKind::Reference).len(), 3);
        assert_eq!(nodes_of_kind(&tree, NodeKind::Series).len(), 4);
        assert_eq!(nodes_of_kind(&tree, NodeKind::File).len(), 5);
        assert_eq!(tree.len(), 14);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn nodes_carry_labels_and_annotations() {
        let tree = SeriesTree::render(&grouping());

        let series = nodes_of_kind(&tree, NodeKind::Series);
        let head = series
            .iter()
            .find(|node| node.label == "Head" && node.children().len() == 2)
            .expect("two-file Head series");
        assert_eq!(head.info, "Series Description (2 files)");

        let reference = nodes_of_kind(&tree, NodeKind::Reference)[0];
        assert_eq!(reference.info, "Frame of Reference UID");

        let modality = nodes_of_kind(&tree, NodeKind::Modality);
        assert!(modality.iter().all(|node| node.info == "Modality"));
        assert!(modality.iter().any(|node| node.label == "RTPLAN"));

        let plan = nodes_of_kind(&tree, NodeKind::File)
            .into_iter()
            .find(|node| node.label == "plan.dcm")
            .expect("plan file node");
        assert_eq!(plan.path.as_deref(), Some(Path::new("/data/rt/plan.dcm")));
        assert_eq!(plan.info, Path::new("/data/rt/plan.dcm").display().to_string());
    }

    #[test]
    fn rendering_twice_is_stable() {
        let grouping = grouping();
        let first = SeriesTree::render(&grouping);
        let second = SeriesTree::render(&grouping);

        assert_eq!(first.len(), second.len());
        let mut first_files = first.file_paths();
        let mut second_files = second.file_paths();
        first_files.sort();
        second_files.sort();
        assert_eq!(first_files, second_files);
        assert_eq!(first_files.len(), 5);
    }

    #[test]
    fn collect_files_expands_internal_nodes() {
        let tree = SeriesTree::render(&grouping());
        let ct = tree
            .children(tree.root())
            .iter()
            .copied()
            .find(|&id| tree.node(id).is_some_and(|node| node.label == "CT"))
            .unwrap();

        let mut files = Vec::new();
        tree.collect_files(ct, &mut files);
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|path| path.starts_with("/data/ct") || path.starts_with("/data/ct2")));
    }

    #[test]
    fn payload_is_only_set_on_file_nodes() {
        let tree = SeriesTree::render(&grouping());
        assert!(tree.payload(tree.root()).is_none());
        for node in nodes_of_kind(&tree, NodeKind::File) {
            assert!(node.path.is_some());
            assert!(node.is_leaf());
        }
        assert!(tree.payload(999).is_none());
        assert!(tree.children(999).is_empty());
    }

    #[test]
    fn empty_grouping_renders_empty_tree() {
        let tree = SeriesTree::render(&SeriesGrouping::new());
        assert!(tree.is_empty());
        assert!(tree.file_paths().is_empty());
    }
}
