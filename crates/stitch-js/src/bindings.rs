//! DOM and host bindings
//!
//! `__dom` exposes the arena tree to scripts as plain functions over
//! numeric node handles. `prelude.js` wraps those handles in `Node`/
//! `Element` objects; scripts never call `__dom` directly.
//!
//! `__host` is the file bridge wrapper programs use to hand their output
//! back to the build.

use std::cell::RefCell;
use std::rc::Rc;

use rquickjs::function::IntoJsFunc;
use rquickjs::{Ctx, Exception, Function, Object};
use stitch_dom::{Document, DomError, NodeId, NodeType};

/// Install `__dom` into the global object
pub fn install_dom<'js>(ctx: &Ctx<'js>, doc: Rc<RefCell<Document>>) -> rquickjs::Result<()> {
    let dom = Object::new(ctx.clone())?;

    // Document-level lookups
    let d = doc.clone();
    define(&dom, "documentElement", move || d.borrow().document_element().map(NodeId::index))?;
    let d = doc.clone();
    define(&dom, "head", move || d.borrow().head().map(NodeId::index))?;
    let d = doc.clone();
    define(&dom, "body", move || d.borrow().body().map(NodeId::index))?;
    let d = doc.clone();
    define(&dom, "getElementById", move |id: String| {
        d.borrow().get_element_by_id(&id).map(NodeId::index)
    })?;
    let d = doc.clone();
    define(&dom, "loadDocument", move |markup: String| {
        *d.borrow_mut() = stitch_html::parse(&markup);
    })?;

    // Node creation
    let d = doc.clone();
    define(&dom, "createElement", move |tag: String| {
        d.borrow_mut().tree.create_element(&tag).index()
    })?;
    let d = doc.clone();
    define(&dom, "createTextNode", move |text: String| {
        d.borrow_mut().tree.create_text(&text).index()
    })?;
    let d = doc.clone();
    define(&dom, "createComment", move |text: String| {
        d.borrow_mut().tree.create_comment(&text).index()
    })?;

    // Node inspection
    let d = doc.clone();
    define(&dom, "nodeType", move |id: u32| {
        d.borrow().tree.get(node(id)).map(|n| n.node_type() as i32)
    })?;
    let d = doc.clone();
    define(&dom, "tagName", move |id: u32| {
        d.borrow().tree.tag_name(node(id)).map(str::to_string)
    })?;
    let d = doc.clone();
    define(&dom, "parent", move |id: u32| d.borrow().tree.parent(node(id)).map(NodeId::index))?;
    let d = doc.clone();
    define(&dom, "firstChild", move |id: u32| {
        d.borrow().tree.first_child(node(id)).map(NodeId::index)
    })?;
    let d = doc.clone();
    define(&dom, "lastChild", move |id: u32| {
        d.borrow().tree.last_child(node(id)).map(NodeId::index)
    })?;
    let d = doc.clone();
    define(&dom, "nextSibling", move |id: u32| {
        d.borrow().tree.next_sibling(node(id)).map(NodeId::index)
    })?;
    let d = doc.clone();
    define(&dom, "previousSibling", move |id: u32| {
        d.borrow().tree.prev_sibling(node(id)).map(NodeId::index)
    })?;
    let d = doc.clone();
    define(&dom, "children", move |id: u32| indices(d.borrow().tree.child_ids(node(id))))?;
    let d = doc.clone();
    define(&dom, "elementChildren", move |id: u32| {
        indices(d.borrow().tree.element_children(node(id)))
    })?;

    // Attributes
    let d = doc.clone();
    define(&dom, "getAttribute", move |id: u32, name: String| {
        d.borrow().tree.get_attribute(node(id), &name).map(str::to_string)
    })?;
    let d = doc.clone();
    define(&dom, "hasAttribute", move |id: u32, name: String| {
        d.borrow().tree.get_attribute(node(id), &name).is_some()
    })?;
    let d = doc.clone();
    define(&dom, "attributeNames", move |id: u32| {
        d.borrow()
            .tree
            .element(node(id))
            .map(|e| e.attrs.iter().map(|a| a.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default()
    })?;
    let d = doc.clone();
    define(&dom, "setAttribute", move |ctx: Ctx<'js>, id: u32, name: String, value: String| {
        d.borrow_mut()
            .tree
            .set_attribute(node(id), &name, &value)
            .map_err(|e| throw(&ctx, e))
    })?;
    let d = doc.clone();
    define(&dom, "removeAttribute", move |ctx: Ctx<'js>, id: u32, name: String| {
        d.borrow_mut()
            .tree
            .remove_attribute(node(id), &name)
            .map_err(|e| throw(&ctx, e))
    })?;

    // Content
    let d = doc.clone();
    define(&dom, "textContent", move |id: u32| d.borrow().tree.text_content(node(id)))?;
    let d = doc.clone();
    define(&dom, "setTextContent", move |ctx: Ctx<'js>, id: u32, text: String| {
        d.borrow_mut()
            .tree
            .set_text_content(node(id), &text)
            .map_err(|e| throw(&ctx, e))
    })?;
    let d = doc.clone();
    define(&dom, "innerHTML", move |id: u32| stitch_html::inner_html(&d.borrow().tree, node(id)))?;
    let d = doc.clone();
    define(&dom, "outerHTML", move |id: u32| stitch_html::outer_html(&d.borrow().tree, node(id)))?;
    let d = doc.clone();
    define(&dom, "setInnerHTML", move |ctx: Ctx<'js>, id: u32, markup: String| {
        let mut doc = d.borrow_mut();
        if !doc.tree.get(node(id)).is_some_and(|n| {
            matches!(n.node_type(), NodeType::Element | NodeType::Document)
        }) {
            return Err(throw(&ctx, DomError::InvalidNodeType));
        }
        stitch_html::set_inner_html(&mut doc.tree, node(id), &markup)
            .map(|_| ())
            .map_err(|e| throw(&ctx, e))
    })?;

    // Mutation
    let d = doc.clone();
    define(&dom, "appendChild", move |ctx: Ctx<'js>, parent: u32, child: u32| {
        d.borrow_mut()
            .tree
            .append_child(node(parent), node(child))
            .map(NodeId::index)
            .map_err(|e| throw(&ctx, e))
    })?;
    let d = doc.clone();
    define(
        &dom,
        "insertBefore",
        move |ctx: Ctx<'js>, parent: u32, child: u32, reference: Option<u32>| {
            d.borrow_mut()
                .tree
                .insert_before(node(parent), node(child), reference.map(node))
                .map(NodeId::index)
                .map_err(|e| throw(&ctx, e))
        },
    )?;
    let d = doc.clone();
    define(&dom, "replaceChild", move |ctx: Ctx<'js>, parent: u32, new: u32, old: u32| {
        d.borrow_mut()
            .tree
            .replace_child(node(parent), node(new), node(old))
            .map(NodeId::index)
            .map_err(|e| throw(&ctx, e))
    })?;
    let d = doc.clone();
    define(&dom, "removeChild", move |ctx: Ctx<'js>, parent: u32, child: u32| {
        d.borrow_mut()
            .tree
            .remove_child(node(parent), node(child))
            .map(NodeId::index)
            .map_err(|e| throw(&ctx, e))
    })?;
    let d = doc.clone();
    define(&dom, "cloneNode", move |ctx: Ctx<'js>, id: u32, deep: bool| {
        d.borrow_mut()
            .tree
            .clone_node(node(id), deep)
            .map(NodeId::index)
            .map_err(|e| throw(&ctx, e))
    })?;

    // Queries
    let d = doc.clone();
    define(&dom, "querySelector", move |scope: u32, selector: String| {
        d.borrow().tree.query_selector(node(scope), &selector).map(NodeId::index)
    })?;
    define(&dom, "querySelectorAll", move |scope: u32, selector: String| {
        indices(doc.borrow().tree.query_selector_all(node(scope), &selector))
    })?;

    ctx.globals().set("__dom", dom)?;
    Ok(())
}

/// Install the `__host` file bridge into the global object
pub fn install_host<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let host = Object::new(ctx.clone())?;

    define(&host, "readFile", |ctx: Ctx<'js>, path: String| {
        std::fs::read_to_string(&path)
            .map_err(|e| Exception::throw_message(&ctx, &format!("readFile {path}: {e}")))
    })?;
    define(&host, "writeFile", |ctx: Ctx<'js>, path: String, contents: String| {
        tracing::debug!("Writing sandbox output {}", path);
        std::fs::write(&path, contents)
            .map_err(|e| Exception::throw_message(&ctx, &format!("writeFile {path}: {e}")))
    })?;
    define(&host, "exists", |path: String| std::path::Path::new(&path).exists())?;

    ctx.globals().set("__host", host)?;
    Ok(())
}

fn define<'js, P, F>(object: &Object<'js>, name: &str, f: F) -> rquickjs::Result<()>
where
    F: IntoJsFunc<'js, P> + 'js,
{
    object.set(name, Function::new(object.ctx().clone(), f)?)
}

fn node(id: u32) -> NodeId {
    NodeId::from_index(id)
}

fn indices(ids: Vec<NodeId>) -> Vec<u32> {
    ids.into_iter().map(NodeId::index).collect()
}

fn throw(ctx: &Ctx<'_>, err: DomError) -> rquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn with_dom<R>(doc: Rc<RefCell<Document>>, f: impl FnOnce(Ctx<'_>) -> R) -> R {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            install_dom(&ctx, doc).unwrap();
            install_host(&ctx).unwrap();
            f(ctx)
        })
    }

    #[test]
    fn test_create_and_append() {
        let doc = Rc::new(RefCell::new(Document::new()));
        with_dom(doc.clone(), |ctx| {
            let _: () = ctx
                .eval("const p = __dom.createElement('p'); __dom.appendChild(__dom.body(), p);")
                .unwrap();
        });
        let doc = doc.borrow();
        assert!(doc.query_selector("body > p").is_some());
    }

    #[test]
    fn test_missing_node_lookups_are_undefined() {
        let doc = Rc::new(RefCell::new(Document::new()));
        with_dom(doc, |ctx| {
            let kind: String = ctx.eval("typeof __dom.parent(999999)").unwrap();
            assert_eq!(kind, "undefined");
            let none: bool = ctx.eval("__dom.getElementById('nope') === undefined").unwrap();
            assert!(none);
        });
    }

    #[test]
    fn test_hierarchy_error_throws() {
        let doc = Rc::new(RefCell::new(Document::new()));
        with_dom(doc, |ctx| {
            let message: String = ctx
                .eval(
                    "const html = __dom.documentElement();
                     try { __dom.appendChild(__dom.body(), html); 'no error' } catch (e) { e.message }",
                )
                .unwrap();
            assert_eq!(message, "Hierarchy request error");
        });
    }

    #[test]
    fn test_load_document() {
        let doc = Rc::new(RefCell::new(Document::new()));
        with_dom(doc.clone(), |ctx| {
            let _: () = ctx
                .eval("__dom.loadDocument('<html><head><title>T</title></head><body><main></main></body></html>')")
                .unwrap();
        });
        assert_eq!(doc.borrow().title(), "T");
    }

    #[test]
    fn test_host_exists() {
        let doc = Rc::new(RefCell::new(Document::new()));
        with_dom(doc, |ctx| {
            let found: bool = ctx.eval("__host.exists('/definitely/not/here')").unwrap();
            assert!(!found);
        });
    }
}
