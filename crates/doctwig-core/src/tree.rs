//! Element tree
//!
//! Elements live in an arena owned by [`Tree`] and refer to each other by
//! [`NodeId`]. Every element except the synthetic root has exactly one
//! parent; detached elements stay in the arena but are no longer reachable
//! from the root and are never serialized.

use crate::tag::{Tag, TagKind};

/// Index of an element in its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What an element stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// XML element (or an orphan end tag)
    Xml,
    /// Twig code token
    Code,
    /// Character data, declarations, comments
    Text,
}

/// One node of the tree
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub start: Option<Tag>,
    pub end: Option<Tag>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    pub(crate) open: bool,
}

impl Element {
    pub fn new(kind: ElementKind, start: Option<Tag>, end: Option<Tag>) -> Self {
        Self {
            kind,
            start,
            end,
            children: Vec::new(),
            parent: None,
            open: false,
        }
    }

    /// Element name: the start tag's name, or the end tag's for orphan ends
    pub fn name(&self) -> Option<&str> {
        self.start
            .as_ref()
            .or(self.end.as_ref())
            .map(|tag| tag.name())
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Self-closing start tag
    pub fn is_self_closing(&self) -> bool {
        matches!(&self.start, Some(tag) if tag.kind() == TagKind::StartAndEnd)
    }

    /// Has a start tag that is neither self-closing nor matched by an end tag
    pub fn is_unclosed(&self) -> bool {
        matches!(&self.start, Some(tag) if tag.kind() == TagKind::Start) && self.end.is_none()
    }

    /// Has an end tag but no start tag
    pub fn is_orphan_end(&self) -> bool {
        self.start.is_none() && self.end.is_some()
    }
}

/// Arena of elements plus the decoded source their tags point into
#[derive(Debug, Clone)]
pub struct Tree {
    source: String,
    elements: Vec<Element>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Tree holding only the tagless root
    pub fn new() -> Self {
        let mut root = Element::new(ElementKind::Xml, None, None);
        root.open = true;
        Self {
            source: String::new(),
            elements: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn set_source(&mut self, source: String) {
        self.source = source;
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.elements[id.0]
    }

    /// Add an element to the arena without attaching it
    pub fn create(&mut self, element: Element) -> NodeId {
        self.elements.push(element);
        NodeId(self.elements.len() - 1)
    }

    /// Add an element as last child of `parent`
    pub fn append(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = self.create(element);
        self.append_child(parent, id);
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.elements[child.0].parent = Some(parent);
        self.elements[parent.0].children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.elements[child.0].parent = Some(parent);
        let children = &mut self.elements[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.elements[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.elements[id.0].parent
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).name()
    }

    /// Position of `id` among its parent's children
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Remove `id` from its parent; returns the former parent and position
    pub fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.elements[parent.0].children.remove(index);
        self.elements[id.0].parent = None;
        Some((parent, index))
    }

    /// Insert `id` into `anchor`'s parent directly before `anchor`
    pub fn insert_before(&mut self, anchor: NodeId, id: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(anchor), self.index_in_parent(anchor)) {
            self.insert_child(parent, index, id);
        }
    }

    /// Insert `id` into `anchor`'s parent directly after `anchor`
    pub fn insert_after(&mut self, anchor: NodeId, id: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(anchor), self.index_in_parent(anchor)) {
            self.insert_child(parent, index + 1, id);
        }
    }

    /// Take `from`'s children, clearing their parent link
    pub fn take_children(&mut self, from: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.elements[from.0].children);
        for &child in &children {
            self.elements[child.0].parent = None;
        }
        children
    }

    /// Detach the children of `parent` from position `at` onward
    pub fn split_children(&mut self, parent: NodeId, at: usize) -> Vec<NodeId> {
        let children = &mut self.elements[parent.0].children;
        let tail = children.split_off(at.min(children.len()));
        for &child in &tail {
            self.elements[child.0].parent = None;
        }
        tail
    }

    /// Replace `id` by its children at the same position; `id` is detached
    pub fn dissolve(&mut self, id: NodeId) {
        let Some((parent, index)) = self.detach(id) else {
            return;
        };
        let children = self.take_children(id);
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, index + offset, child);
        }
    }

    /// Number of ancestors; the root has depth 0
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Whether the subtree rooted at `ancestor` contains `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Whether the element is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).last() == Some(self.root)
    }

    /// Text element made only of whitespace
    pub fn is_whitespace(&self, id: NodeId) -> bool {
        let element = self.get(id);
        element.kind == ElementKind::Text
            && element
                .start
                .as_ref()
                .map(|tag| tag.as_str(&self.source).trim().is_empty())
                .unwrap_or(true)
    }

    /// Previous sibling, skipping whitespace text
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent)[..index]
            .iter()
            .rev()
            .copied()
            .find(|&s| !self.is_whitespace(s))
    }

    /// Next sibling, skipping whitespace text
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent)[index + 1..]
            .iter()
            .copied()
            .find(|&s| !self.is_whitespace(s))
    }

    /// First child, skipping whitespace text
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| !self.is_whitespace(c))
    }

    /// Last child, skipping whitespace text
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .rev()
            .copied()
            .find(|&c| !self.is_whitespace(c))
    }

    /// Whether `child` is the only non-whitespace child of `parent`
    pub fn is_only_child(&self, parent: NodeId, child: NodeId) -> bool {
        let mut significant = self
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| !self.is_whitespace(c));
        significant.next() == Some(child) && significant.next().is_none()
    }

    /// Attached elements in document order, root first
    pub fn descendants(&self, from: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![from],
        }
    }

    /// Lowest element whose subtree holds all of `ids`
    pub fn common_ancestor(&self, ids: &[NodeId]) -> Option<NodeId> {
        let (&first, rest) = ids.split_first()?;
        let mut chain: Vec<NodeId> = std::iter::once(first).chain(self.ancestors(first)).collect();
        for &id in rest {
            let position = chain.iter().position(|&a| self.is_ancestor(a, id))?;
            chain.drain(..position);
        }
        chain.first().copied()
    }
}

/// Pre-order walk over a subtree
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml(tree: &mut Tree, parent: NodeId, name: &str) -> NodeId {
        tree.append(
            parent,
            Element::new(
                ElementKind::Xml,
                Some(Tag::synthetic_start(name)),
                Some(Tag::synthetic_end(name)),
            ),
        )
    }

    #[test]
    fn test_depth_and_ancestors() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = xml(&mut tree, root, "a");
        let b = xml(&mut tree, a, "b");

        assert_eq!(tree.depth(root), 0);
        assert_eq!(tree.depth(a), 1);
        assert_eq!(tree.depth(b), 2);
        assert_eq!(tree.ancestors(b).collect::<Vec<_>>(), vec![a, root]);
        assert!(tree.is_ancestor(a, b));
        assert!(!tree.is_ancestor(b, a));
    }

    #[test]
    fn test_detach_and_insert() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = xml(&mut tree, root, "a");
        let b = xml(&mut tree, root, "b");
        let c = xml(&mut tree, a, "c");

        assert_eq!(tree.detach(c), Some((a, 0)));
        assert!(!tree.is_attached(c));
        tree.insert_after(a, c);
        assert_eq!(tree.children(root), &[a, c, b]);
        assert!(tree.is_attached(c));
        assert_eq!(tree.next_sibling(a), Some(c));
        assert_eq!(tree.prev_sibling(a), None);
    }

    #[test]
    fn test_dissolve_keeps_children_in_place() {
        let mut tree = Tree::new();
        let root = tree.root();
        let x = xml(&mut tree, root, "x");
        let a = xml(&mut tree, root, "a");
        let y = xml(&mut tree, root, "y");
        let b = xml(&mut tree, a, "b");
        let c = xml(&mut tree, a, "c");

        tree.dissolve(a);
        assert_eq!(tree.children(root), &[x, b, c, y]);
        assert_eq!(tree.parent(b), Some(root));
    }

    #[test]
    fn test_common_ancestor() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = xml(&mut tree, root, "a");
        let b = xml(&mut tree, a, "b");
        let c = xml(&mut tree, a, "c");
        let d = xml(&mut tree, c, "d");
        let e = xml(&mut tree, root, "e");

        assert_eq!(tree.common_ancestor(&[b, d]), Some(a));
        assert_eq!(tree.common_ancestor(&[d]), Some(d));
        assert_eq!(tree.common_ancestor(&[b, e]), Some(root));
        assert_eq!(tree.common_ancestor(&[]), None);
    }

    #[test]
    fn test_descendants_in_document_order() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = xml(&mut tree, root, "a");
        let b = xml(&mut tree, a, "b");
        let c = xml(&mut tree, root, "c");

        assert_eq!(tree.descendants(root).collect::<Vec<_>>(), vec![root, a, b, c]);
    }

    #[test]
    fn test_only_child_ignores_whitespace() {
        let mut tree = Tree::new();
        tree.set_source("  ".to_string());
        let root = tree.root();
        let p = xml(&mut tree, root, "p");
        tree.append(p, Element::new(ElementKind::Text, Some(Tag::text(0..2)), None));
        let r = xml(&mut tree, p, "r");

        assert!(tree.is_only_child(p, r));
        assert_eq!(tree.first_child(p), Some(r));
        let s = xml(&mut tree, p, "s");
        assert!(!tree.is_only_child(p, r));
        assert_eq!(tree.last_child(p), Some(s));
    }
}
