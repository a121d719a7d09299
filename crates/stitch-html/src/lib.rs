//! stitch HTML
//!
//! HTML5 parsing built on html5ever, plus the serializer that turns the
//! arena tree back into markup.

mod parser;
mod serializer;

use std::borrow::Cow;

use stitch_dom::{Document, DomResult, DomTree, NodeId};

pub use parser::{Fragment, HtmlParser};
pub use serializer::{inner_html, is_void_element, outer_html, serialize_document, DOCTYPE};

/// Parse a full HTML document
pub fn parse(html: &str) -> Document {
    HtmlParser::new().parse(html)
}

/// Parse markup as a body fragment
pub fn parse_fragment(markup: &str) -> Fragment {
    HtmlParser::new().parse_fragment(markup)
}

/// Deep-clone every node of a fragment into `tree`.
///
/// The returned nodes are detached and in fragment order.
pub fn import_fragment(tree: &mut DomTree, fragment: &Fragment) -> DomResult<Vec<NodeId>> {
    fragment
        .nodes
        .iter()
        .map(|&id| tree.import_node(&fragment.document.tree, id, true))
        .collect()
}

/// Replace the children of `id` with the parsed `markup`
pub fn set_inner_html(tree: &mut DomTree, id: NodeId, markup: &str) -> DomResult<Vec<NodeId>> {
    let fragment = parse_fragment(markup);
    let nodes = import_fragment(tree, &fragment)?;
    tree.remove_children(id)?;
    for &node in &nodes {
        tree.append_child(id, node)?;
    }
    Ok(nodes)
}

/// Wrap bare page markup in a minimal document shell.
///
/// Sources that already carry an `<html` tag are returned unchanged.
pub fn ensure_document_shell(source: &str) -> Cow<'_, str> {
    if source.to_ascii_lowercase().contains("<html") {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(format!("<html><head></head><body>{source}</body></html>"))
    }
}

/// Rewrite a leading doctype declaration to the lowercase `<!doctype html>` form
pub fn normalize_doctype(html: &str) -> Cow<'_, str> {
    let start = html.len() - html.trim_start().len();
    let rest = &html[start..];
    let is_doctype = rest
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    if !is_doctype {
        return Cow::Borrowed(html);
    }
    let Some(end) = rest.find('>') else {
        return Cow::Borrowed(html);
    };
    if &rest[..=end] == DOCTYPE {
        return Cow::Borrowed(html);
    }
    Cow::Owned(format!("{}{}{}", &html[..start], DOCTYPE, &rest[end + 1..]))
}
