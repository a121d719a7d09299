//! HTML serializer
//!
//! innerHTML/outerHTML style serialization of the arena tree.

use stitch_dom::{Document, DomTree, NodeData, NodeId};

/// Elements that never have an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Elements whose text children are emitted verbatim
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Normalized doctype emitted in front of every serialized page
pub const DOCTYPE: &str = "<!doctype html>";

/// Check whether a tag is a void element
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Serialize a node including its own tags
pub fn outer_html(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

/// Serialize only the children of a node
pub fn inner_html(tree: &DomTree, id: NodeId) -> String {
    let mut out = String::new();
    write_children(tree, id, &mut out);
    out
}

/// Serialize a whole page with a normalized `<!doctype html>` prefix
pub fn serialize_document(document: &Document) -> String {
    let mut out = String::from(DOCTYPE);
    out.push('\n');
    match document.document_element() {
        Some(html) => write_node(&document.tree, html, &mut out),
        None => {
            for (id, node) in document.tree.children(document.root()) {
                if !matches!(node.data, NodeData::Doctype { .. }) {
                    write_node(&document.tree, id, &mut out);
                }
            }
        }
    }
    out
}

fn write_children(tree: &DomTree, id: NodeId, out: &mut String) {
    for (child, _) in tree.children(id) {
        write_node(tree, child, out);
    }
}

fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => write_children(tree, id, out),
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Text(text) => {
            let raw = tree
                .parent(id)
                .and_then(|p| tree.tag_name(p))
                .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeData::Element(elem) => {
            out.push('<');
            out.push_str(&elem.name);
            for attr in &elem.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attr(&attr.value, out);
                out.push('"');
            }
            out.push('>');

            if is_void_element(&elem.name) {
                return;
            }
            write_children(tree, id, out);
            out.push_str("</");
            out.push_str(&elem.name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HtmlParser;

    #[test]
    fn test_round_trip_fragment() {
        let doc = HtmlParser::new().parse(r#"<body><div class="item">Item</div><br><img src="a.png"></body>"#);
        let body = doc.body().unwrap();
        assert_eq!(
            inner_html(&doc.tree, body),
            r#"<div class="item">Item</div><br><img src="a.png">"#
        );
    }

    #[test]
    fn test_escaping() {
        let mut tree = DomTree::new();
        let p = tree.create_element_with_attrs("p", [("title", "a \"quoted\" & more")]);
        let text = tree.create_text("1 < 2 & 3 > 2");
        tree.append_child(p, text).unwrap();

        assert_eq!(
            outer_html(&tree, p),
            r#"<p title="a &quot;quoted&quot; &amp; more">1 &lt; 2 &amp; 3 &gt; 2</p>"#
        );
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let doc = HtmlParser::new().parse("<head><script>if (a < b && c) {}</script></head>");
        let script = doc.query_selector("script").unwrap();
        assert_eq!(inner_html(&doc.tree, script), "if (a < b && c) {}");
    }

    #[test]
    fn test_serialize_document_prefix() {
        let doc = HtmlParser::new().parse("<!DOCTYPE HTML><html><head></head><body>x</body></html>");
        let html = serialize_document(&doc);
        assert!(html.starts_with("<!doctype html>\n<html>"));
        assert_eq!(html.matches("doctype").count() + html.matches("DOCTYPE").count(), 1);
    }
}
