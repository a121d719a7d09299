//! Document - High-level document API

use crate::{DomTree, NodeId, Selector};

/// HTML Document: a tree plus shortcuts to its well-known elements
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The DOM tree
    pub tree: DomTree,
}

impl Document {
    /// Create a document with an empty `<html><head></head><body></body></html>` skeleton
    pub fn new() -> Self {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");
        // Fresh nodes under a fresh root cannot violate the hierarchy
        let _ = tree.append_child(tree.root(), html);
        let _ = tree.append_child(html, head);
        let _ = tree.append_child(html, body);
        Self { tree }
    }

    /// Create an empty document (root node only)
    pub fn empty() -> Self {
        Self { tree: DomTree::new() }
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Get `<html>` element (first element child of the root)
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree.element_children(self.tree.root()).into_iter().next()
    }

    /// Get `<head>` element
    pub fn head(&self) -> Option<NodeId> {
        self.html_child("head")
    }

    /// Get `<body>` element
    pub fn body(&self) -> Option<NodeId> {
        self.html_child("body")
    }

    fn html_child(&self, tag: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.tree
            .element_children(html)
            .into_iter()
            .find(|&id| self.tree.tag_name(id) == Some(tag))
    }

    /// Get document title
    pub fn title(&self) -> String {
        self.head()
            .and_then(|head| self.tree.query_selector(head, "title"))
            .map(|title| self.tree.text_content(title).trim().to_string())
            .unwrap_or_default()
    }

    /// Get element by ID
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .find(|&node| self.tree.element(node).and_then(|e| e.id()) == Some(id))
    }

    /// First element matching `selector` anywhere in the document
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.tree.query_selector(self.tree.root(), selector)
    }

    /// Every element matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        self.tree.query_selector_all(self.tree.root(), selector)
    }

    /// Every element matching a pre-parsed selector
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.tree.select(self.tree.root(), selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_structure() {
        let doc = Document::new();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.tree.tag_name(html), Some("html"));
        assert!(doc.head().is_some());
        assert!(doc.body().is_some());
        assert_eq!(doc.title(), "");
    }

    #[test]
    fn test_get_element_by_id() {
        let mut doc = Document::new();
        let body = doc.body().unwrap();
        let div = doc.tree.create_element_with_attrs("div", [("id", "main")]);
        doc.tree.append_child(body, div).unwrap();

        assert_eq!(doc.get_element_by_id("main"), Some(div));
        assert_eq!(doc.get_element_by_id("missing"), None);
    }

    #[test]
    fn test_title() {
        let mut doc = Document::new();
        let head = doc.head().unwrap();
        let title = doc.tree.create_element("title");
        doc.tree.append_child(head, title).unwrap();
        doc.tree.set_text_content(title, " Home ").unwrap();
        assert_eq!(doc.title(), "Home");
    }
}
