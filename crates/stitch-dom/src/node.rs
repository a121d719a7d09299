//! DOM Node - Compact representation
//!
//! Each node carries its own sibling/child links so that insertion and
//! removal are O(1) regardless of how many siblings it has.

use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if detached or root)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    /// Create an unlinked node around `data`
    pub fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Create a new element node
    pub fn element(name: &str) -> Self {
        Self::new(NodeData::Element(ElementData::new(name)))
    }

    /// Create a new text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeData::Text(content.into()))
    }

    /// Create a document node
    pub fn document() -> Self {
        Self::new(NodeData::Document)
    }

    /// Node type as exposed to scripts
    pub fn node_type(&self) -> NodeType {
        match self.data {
            NodeData::Document => NodeType::Document,
            NodeData::Doctype { .. } => NodeType::Doctype,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Document root
    Document,
    /// DOCTYPE
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// DOM node type codes (same numbering as the browser DOM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Comment = 8,
    Document = 9,
    Doctype = 10,
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase local tag name
    pub name: String,
    /// Attributes in source order
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// A custom element name contains at least one hyphen
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.name.contains('-')
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Check for an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_some()
    }

    /// Set an attribute, keeping its original position when it already exists
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(attr) = self.attrs.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            attr.value = value;
            return;
        }
        self.attrs.push(Attribute {
            name: name.to_ascii_lowercase(),
            value,
        });
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(name));
        self.attrs.len() != before
    }

    /// `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }

    /// Whitespace-separated `class` attribute entries
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attr("class").unwrap_or("").split_ascii_whitespace()
    }

    /// Check for a class name
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_attrs() {
        let mut elem = ElementData::new("DIV");
        assert_eq!(elem.name, "div");

        elem.set_attr("data-name", "John");
        elem.set_attr("class", "card  active");
        assert_eq!(elem.get_attr("data-name"), Some("John"));
        assert!(elem.has_class("active"));
        assert!(!elem.has_class("card active"));

        elem.set_attr("data-name", "Jane");
        assert_eq!(elem.attrs.len(), 2);
        assert_eq!(elem.attrs[0].value, "Jane");

        assert!(elem.remove_attr("DATA-NAME"));
        assert!(!elem.has_attr("data-name"));
    }

    #[test]
    fn test_custom_name() {
        assert!(ElementData::new("my-comp").is_custom());
        assert!(!ElementData::new("section").is_custom());
    }

    #[test]
    fn test_node_type() {
        assert_eq!(Node::element("p").node_type(), NodeType::Element);
        assert_eq!(Node::text("hi").node_type(), NodeType::Text);
        assert_eq!(Node::document().node_type() as u8, 9);
    }
}
