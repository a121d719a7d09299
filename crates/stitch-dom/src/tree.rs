//! DOM Tree (arena-based allocation)
//!
//! Core node manipulation: appendChild, removeChild, insertBefore,
//! replaceChild, cloneNode, and cross-tree import.

use crate::{DomError, DomResult, ElementData, Node, NodeData, NodeId};

/// Arena-based DOM tree for memory efficiency
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree holding only the document root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::document()],
        }
    }

    /// The document root
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Number of nodes in the arena (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound)
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomError::NotFound)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::element(tag))
    }

    /// Create a detached element with attributes
    pub fn create_element_with_attrs<'a>(
        &mut self,
        tag: &str,
        attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let mut data = ElementData::new(tag);
        for (name, value) in attrs {
            data.set_attr(name, value);
        }
        self.push(Node::new(NodeData::Element(data)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(Node::text(text))
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(Node::new(NodeData::Comment(text.to_string())))
    }

    /// Create a detached doctype node
    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.push(Node::new(NodeData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        }))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Iterate over the direct children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE),
        }
    }

    /// Snapshot of child IDs, safe to hold while mutating the tree
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).map(|(child, _)| child).collect()
    }

    /// Snapshot of element child IDs
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .filter(|(_, node)| node.is_element())
            .map(|(child, _)| child)
            .collect()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.first_child).filter(|p| p.is_valid())
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.last_child).filter(|p| p.is_valid())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.next_sibling).filter(|p| p.is_valid())
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.prev_sibling).filter(|p| p.is_valid())
    }

    /// All descendants in document order (excluding `id` itself)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.child_ids(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.child_ids(next).into_iter().rev());
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Element data
    // ------------------------------------------------------------------

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    /// Lowercase tag name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.get_attr(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let elem = self.element_mut(id).ok_or(DomError::InvalidNodeType)?;
        elem.set_attr(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<bool> {
        let elem = self.element_mut(id).ok_or(DomError::InvalidNodeType)?;
        Ok(elem.remove_attr(name))
    }

    /// Concatenated text of a node and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        match &node.data {
            NodeData::Text(t) | NodeData::Comment(t) => t.clone(),
            NodeData::Doctype { .. } => String::new(),
            NodeData::Element(_) | NodeData::Document => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| self.get(d).and_then(Node::as_text))
                .collect(),
        }
    }

    /// Replace the content of a node with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(t) | NodeData::Comment(t) => {
                *t = text.to_string();
                return Ok(());
            }
            NodeData::Doctype { .. } => return Err(DomError::InvalidNodeType),
            NodeData::Element(_) | NodeData::Document => {}
        }
        self.remove_children(id)?;
        if !text.is_empty() {
            let child = self.create_text(text);
            self.append_child(id, child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Unlink a node from its parent and siblings (no-op when already detached)
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        let (parent, prev, next) = {
            let node = self.node(id)?;
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if !parent.is_valid() {
            return Ok(());
        }

        if prev.is_valid() {
            self.node_mut(prev)?.next_sibling = next;
        } else {
            self.node_mut(parent)?.first_child = next;
        }
        if next.is_valid() {
            self.node_mut(next)?.prev_sibling = prev;
        } else {
            self.node_mut(parent)?.last_child = prev;
        }

        let node = self.node_mut(id)?;
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
        Ok(())
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        if !matches!(parent_node.data, NodeData::Element(_) | NodeData::Document) {
            return Err(DomError::InvalidNodeType);
        }
        if matches!(self.node(child)?.data, NodeData::Document) {
            return Err(DomError::HierarchyRequest);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        Ok(())
    }

    /// Append a child node, moving it if it is attached elsewhere
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.check_insertion(parent, child)?;
        self.detach(child)?;

        let last = self.node(parent)?.last_child;
        {
            let node = self.node_mut(child)?;
            node.parent = parent;
            node.prev_sibling = last;
            node.next_sibling = NodeId::NONE;
        }
        if last.is_valid() {
            self.node_mut(last)?.next_sibling = child;
        } else {
            self.node_mut(parent)?.first_child = child;
        }
        self.node_mut(parent)?.last_child = child;
        Ok(child)
    }

    /// Insert before a reference node (append when `reference` is `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<NodeId> {
        let Some(reference) = reference else {
            return self.append_child(parent, new_child);
        };
        if self.node(reference)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        if new_child == reference {
            return Ok(new_child);
        }
        self.check_insertion(parent, new_child)?;
        self.detach(new_child)?;

        let prev = self.node(reference)?.prev_sibling;
        {
            let node = self.node_mut(new_child)?;
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        self.node_mut(reference)?.prev_sibling = new_child;
        if prev.is_valid() {
            self.node_mut(prev)?.next_sibling = new_child;
        } else {
            self.node_mut(parent)?.first_child = new_child;
        }
        Ok(new_child)
    }

    /// Insert immediately after a reference child
    pub fn insert_after(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        reference: NodeId,
    ) -> DomResult<NodeId> {
        if self.node(reference)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        let next = self.next_sibling(reference);
        self.insert_before(parent, new_child, next)
    }

    /// Replace `old_child` with `new_child`; returns the removed node
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId> {
        if self.node(old_child)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        if new_child == old_child {
            return Ok(old_child);
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.detach(old_child)?;
        Ok(old_child)
    }

    /// Remove a child node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if self.node(child)?.parent != parent {
            return Err(DomError::NotAChild);
        }
        self.detach(child)?;
        Ok(child)
    }

    /// Detach every child of a node
    pub fn remove_children(&mut self, parent: NodeId) -> DomResult<()> {
        for child in self.child_ids(parent) {
            self.detach(child)?;
        }
        Ok(())
    }

    /// Clone a node within this tree; the clone starts detached
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = self.node(id)?.data.clone();
        let copy = self.push(Node::new(data));
        if deep {
            for child in self.child_ids(id) {
                let child_copy = self.clone_node(child, true)?;
                self.append_child(copy, child_copy)?;
            }
        }
        Ok(copy)
    }

    /// Clone a node that belongs to another tree into this one.
    ///
    /// Nodes can't be shared between arenas, so fragments parsed into a
    /// scratch document are brought over with this before splicing.
    pub fn import_node(&mut self, other: &DomTree, id: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = other.node(id)?.data.clone();
        let copy = self.push(Node::new(data));
        if deep {
            for (child, _) in other.children(id) {
                let child_copy = self.import_node(other, child, true)?;
                self.append_child(copy, child_copy)?;
            }
        }
        Ok(copy)
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's direct children
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl<'a> Iterator for Children<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.next.is_valid() {
            return None;
        }
        let id = self.next;
        let node = self.tree.get(id)?;
        self.next = node.next_sibling;
        Some((id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(tree: &DomTree, parent: NodeId) -> Vec<String> {
        tree.children(parent)
            .map(|(id, node)| match node.as_element() {
                Some(_) => tree.tag_name(id).unwrap_or_default().to_string(),
                None => format!("#{}", tree.text_content(id)),
            })
            .collect()
    }

    #[test]
    fn test_append_and_children() {
        let mut tree = DomTree::new();
        let body = tree.create_element("body");
        tree.append_child(tree.root(), body).unwrap();
        let a = tree.create_element("a");
        let b = tree.create_element("b");
        tree.append_child(body, a).unwrap();
        tree.append_child(body, b).unwrap();

        assert_eq!(tags(&tree, body), vec!["a", "b"]);
        assert_eq!(tree.parent(a), Some(body));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.prev_sibling(b), Some(a));
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let a = tree.create_element("a");
        let c = tree.create_element("c");
        tree.append_child(div, a).unwrap();
        tree.append_child(div, c).unwrap();

        let b = tree.create_element("b");
        tree.insert_before(div, b, Some(c)).unwrap();
        let d = tree.create_element("d");
        tree.insert_after(div, d, c).unwrap();
        let z = tree.create_element("z");
        tree.insert_before(div, z, Some(a)).unwrap();

        assert_eq!(tags(&tree, div), vec!["z", "a", "b", "c", "d"]);
        assert_eq!(tree.first_child(div), Some(z));
        assert_eq!(tree.last_child(div), Some(d));
    }

    #[test]
    fn test_replace_and_remove() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let old = tree.create_element("my-comp");
        let after = tree.create_element("p");
        tree.append_child(div, old).unwrap();
        tree.append_child(div, after).unwrap();

        let h1 = tree.create_element("h1");
        assert_eq!(tree.replace_child(div, h1, old).unwrap(), old);
        assert_eq!(tags(&tree, div), vec!["h1", "p"]);
        assert_eq!(tree.parent(old), None);

        tree.remove_child(div, h1).unwrap();
        assert_eq!(tags(&tree, div), vec!["p"]);
        assert_eq!(tree.remove_child(div, h1), Err(DomError::NotAChild));
    }

    #[test]
    fn test_hierarchy_errors() {
        let mut tree = DomTree::new();
        let outer = tree.create_element("div");
        let inner = tree.create_element("span");
        tree.append_child(outer, inner).unwrap();

        assert_eq!(tree.append_child(inner, outer), Err(DomError::HierarchyRequest));
        assert_eq!(tree.append_child(outer, outer), Err(DomError::HierarchyRequest));

        let text = tree.create_text("x");
        let p = tree.create_element("p");
        assert_eq!(tree.append_child(text, p), Err(DomError::InvalidNodeType));
    }

    #[test]
    fn test_moving_node_between_parents() {
        let mut tree = DomTree::new();
        let first = tree.create_element("ul");
        let second = tree.create_element("ol");
        let li = tree.create_element("li");
        tree.append_child(first, li).unwrap();
        tree.append_child(second, li).unwrap();

        assert!(tree.child_ids(first).is_empty());
        assert_eq!(tree.child_ids(second), vec![li]);
    }

    #[test]
    fn test_clone_and_import() {
        let mut tree = DomTree::new();
        let div = tree.create_element_with_attrs("div", [("class", "item")]);
        let text = tree.create_text("Item");
        tree.append_child(div, text).unwrap();

        let shallow = tree.clone_node(div, false).unwrap();
        assert!(tree.child_ids(shallow).is_empty());
        assert_eq!(tree.get_attribute(shallow, "class"), Some("item"));

        let mut other = DomTree::new();
        let imported = other.import_node(&tree, div, true).unwrap();
        assert_eq!(other.text_content(imported), "Item");
        assert_eq!(other.parent(imported), None);
    }

    #[test]
    fn test_text_content() {
        let mut tree = DomTree::new();
        let p = tree.create_element("p");
        let t1 = tree.create_text("Hello ");
        let b = tree.create_element("b");
        let t2 = tree.create_text("World");
        tree.append_child(p, t1).unwrap();
        tree.append_child(p, b).unwrap();
        tree.append_child(b, t2).unwrap();
        assert_eq!(tree.text_content(p), "Hello World");

        tree.set_text_content(p, "Bye").unwrap();
        assert_eq!(tree.child_ids(p).len(), 1);
        assert_eq!(tree.text_content(p), "Bye");

        tree.set_text_content(p, "").unwrap();
        assert!(tree.child_ids(p).is_empty());
    }

    #[test]
    fn test_descendants_order() {
        let mut tree = DomTree::new();
        let a = tree.create_element("a");
        let b = tree.create_element("b");
        let c = tree.create_element("c");
        let d = tree.create_element("d");
        tree.append_child(tree.root(), a).unwrap();
        tree.append_child(a, b).unwrap();
        tree.append_child(b, c).unwrap();
        tree.append_child(a, d).unwrap();

        assert_eq!(tree.descendants(tree.root()), vec![a, b, c, d]);
    }
}
