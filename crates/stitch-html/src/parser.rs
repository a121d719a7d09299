//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it into the stitch arena tree.
//! Whitespace text and `<template>` contents are kept so that a parse
//! followed by a serialize reproduces the author's markup.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use stitch_dom::{Document, DomTree, NodeId};

/// Nodes parsed out of a markup fragment.
///
/// The nodes belong to `document`, a disposable wrapper; callers import
/// them into their own tree before use.
#[derive(Debug)]
pub struct Fragment {
    pub document: Document,
    pub nodes: Vec<NodeId>,
}

impl Fragment {
    /// True when the fragment has no nodes, or only whitespace text
    pub fn is_blank(&self) -> bool {
        self.nodes.iter().all(|&id| {
            self.document
                .tree
                .get(id)
                .and_then(|n| n.as_text())
                .is_some_and(|t| t.trim().is_empty())
        })
    }
}

/// HTML5 parser
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a full HTML document.
    ///
    /// Custom elements written in `<head>` stay there. html5ever would
    /// otherwise close the head at the first unknown tag and move the
    /// rest into `<body>`.
    pub fn parse(&self, html: &str) -> Document {
        let held = hold_head_content(html);
        let source = held.as_deref().unwrap_or(html);
        let dom = parse_document(RcDom::default(), Default::default()).one(source);

        let mut document = Document::empty();
        let root = document.tree.root();
        self.convert_node(&dom.document, &mut document.tree, root);
        if held.is_some() {
            release_head_content(&mut document);
        }

        tracing::trace!("Parsed {} nodes", document.tree.len());
        document
    }

    /// Parse markup as the content of a disposable `<body>` container
    pub fn parse_fragment(&self, markup: &str) -> Fragment {
        let wrapped = format!("<!doctype html><html><head></head><body>{markup}</body></html>");
        let document = self.parse(&wrapped);
        let nodes = document
            .body()
            .map(|body| document.tree.child_ids(body))
            .unwrap_or_default();
        Fragment { document, nodes }
    }

    /// Convert an RcDom node to our DOM format
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) {
        match &handle.data {
            RcNodeData::Document => {
                for child in handle.children.borrow().iter() {
                    self.convert_node(child, tree, parent);
                }
            }
            RcNodeData::Doctype { name, public_id, system_id } => {
                let id = tree.create_doctype(name, public_id, system_id);
                attach(tree, parent, id);
            }
            RcNodeData::Text { contents } => {
                let id = tree.create_text(&contents.borrow());
                attach(tree, parent, id);
            }
            RcNodeData::Comment { contents } => {
                let id = tree.create_comment(contents);
                attach(tree, parent, id);
            }
            RcNodeData::Element { name, attrs, template_contents, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.element_mut(id) {
                    for attr in attrs.borrow().iter() {
                        let local: &str = &attr.name.local;
                        match &attr.name.prefix {
                            Some(prefix) => elem.set_attr(&format!("{}:{}", &**prefix, local), &*attr.value),
                            None => elem.set_attr(local, &*attr.value),
                        }
                    }
                }
                attach(tree, parent, id);

                // <template> keeps its children in a separate fragment
                if let Some(contents) = template_contents.borrow().as_ref() {
                    for child in contents.children.borrow().iter() {
                        self.convert_node(child, tree, id);
                    }
                }
                for child in handle.children.borrow().iter() {
                    self.convert_node(child, tree, id);
                }
            }
            RcNodeData::ProcessingInstruction { .. } => {
                // Not part of HTML output
            }
        }
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the `<template>` that carries head content through html5ever
const HEAD_HOLDER_ATTR: &str = "data-stitch-head";

/// Wrap the head's content in a marker `<template>` when it contains a
/// custom element. Template contents are parsed in place, so nothing is
/// hoisted into `<body>`.
fn hold_head_content(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let open = find_tag(&lower, 0, "<head")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let close = find_tag(&lower, content_start, "</head")?;
    if !has_custom_tag(&lower[content_start..close]) {
        return None;
    }
    Some(format!(
        "{}<template {HEAD_HOLDER_ATTR}>{}</template>{}",
        &html[..content_start],
        &html[content_start..close],
        &html[close..]
    ))
}

/// Find `pattern` at or after `from` where the tag name ends right after it
fn find_tag(lower: &str, from: usize, pattern: &str) -> Option<usize> {
    lower[from..]
        .match_indices(pattern)
        .map(|(i, _)| from + i)
        .find(|&i| {
            matches!(
                lower.as_bytes().get(i + pattern.len()),
                Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
            )
        })
}

/// Check for a start tag whose name contains a hyphen
fn has_custom_tag(markup: &str) -> bool {
    markup.match_indices('<').any(|(i, _)| {
        let name: String = markup[i + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        name.starts_with(|c: char| c.is_ascii_alphabetic()) && name.contains('-')
    })
}

/// Move the marker template's children back into `<head>` and drop it
fn release_head_content(document: &mut Document) {
    let Some(head) = document.head() else {
        return;
    };
    let tree = &mut document.tree;
    for holder in tree.child_ids(head) {
        let is_holder = tree.tag_name(holder) == Some("template")
            && tree.element(holder).is_some_and(|e| e.has_attr(HEAD_HOLDER_ATTR));
        if !is_holder {
            continue;
        }
        for child in tree.child_ids(holder) {
            if let Err(err) = tree.insert_before(head, child, Some(holder)) {
                tracing::debug!("Dropping head node: {}", err);
            }
        }
        if let Err(err) = tree.remove_child(head, holder) {
            tracing::debug!("Could not unwrap head content: {}", err);
        }
    }
}

fn attach(tree: &mut DomTree, parent: NodeId, child: NodeId) {
    if let Err(err) = tree.append_child(parent, child) {
        tracing::debug!("Dropping parsed node: {}", err);
    }
}
