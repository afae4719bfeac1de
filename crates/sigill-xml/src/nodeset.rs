#![forbid(unsafe_code)]

//! Document subsets for canonicalization and transforms.
//!
//! A `NodeSet` lists the nodes of one parsed document by `NodeId`. roxmltree
//! assigns ids deterministically, so a set built from one parse of a text is
//! valid for any other parse of the same text.

use roxmltree::{Node, NodeId, NodeType};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
///
/// Attribute and namespace nodes are not tracked separately: they are
/// visible exactly when their element is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, comments included.
    pub fn all(doc: &roxmltree::Document<'_>) -> Self {
        Self::tree(doc.root(), true)
    }

    /// Every node except comments. `URI=""` selects this set.
    pub fn all_without_comments(doc: &roxmltree::Document<'_>) -> Self {
        Self::tree(doc.root(), false)
    }

    /// The subtree rooted at `root`.
    pub fn tree(root: Node<'_, '_>, with_comments: bool) -> Self {
        let nodes = root
            .descendants()
            .filter(|n| with_comments || n.node_type() != NodeType::Comment)
            .map(|n| n.id())
            .collect();
        Self { nodes }
    }

    /// The subtree rooted at `root`, without comments. `URI="#id"` selects this set.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        Self::tree(root, false)
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, node: &Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    /// Remove `root` and all of its descendants.
    pub fn subtract_tree(&mut self, root: Node<'_, '_>) {
        for n in root.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_optional() {
        let doc = crate::parse("<a><!--c--><b/></a>").unwrap();
        let with = NodeSet::all(&doc);
        let without = NodeSet::all_without_comments(&doc);
        assert_eq!(with.len(), without.len() + 1);
    }

    #[test]
    fn subtract_removes_whole_subtree() {
        let doc = crate::parse("<a><b><c>t</c></b><d/></a>").unwrap();
        let mut set = NodeSet::all(&doc);
        let b = doc.descendants().find(|n| n.has_tag_name("b")).unwrap();
        let c = doc.descendants().find(|n| n.has_tag_name("c")).unwrap();
        let d = doc.descendants().find(|n| n.has_tag_name("d")).unwrap();
        set.subtract_tree(b);
        assert!(!set.contains(&b));
        assert!(!set.contains(&c));
        assert!(set.contains(&d));
        assert!(set.contains(&doc.root_element()));
    }

    #[test]
    fn ids_survive_reparse() {
        let text = "<a><b/></a>";
        let first = crate::parse(text).unwrap();
        let set = NodeSet::tree(first.root_element().first_child().unwrap(), true);
        let second = crate::parse(text).unwrap();
        assert!(set.contains(&second.root_element().first_child().unwrap()));
        assert!(!set.contains(&second.root_element()));
    }
}
