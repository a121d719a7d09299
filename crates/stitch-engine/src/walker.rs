//! Substitution Walker
//!
//! Walks a parsed page and replaces every resolvable custom element with
//! the nodes its component renders to, recursing into the replacement so
//! components can nest. Traversal is in document order and strictly
//! sequential: one component renders at a time.

use std::cell::Cell;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use stitch_dom::{Document, DomError, DomResult, DomTree, NodeId};
use stitch_html::Fragment;
use walkdir::WalkDir;

use crate::component::{is_component_file, is_custom_tag};
use crate::config::BuildConfig;
use crate::render::Renderers;
use crate::resolver::Resolver;
use crate::sandbox::SandboxRunner;
use crate::{BuildError, BuildResult};

/// Where a subtree is being expanded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Directory searched first for definitions
    pub consuming_dir: PathBuf,
    /// Project (workspace) root, the fallback search directory
    pub root_dir: PathBuf,
    /// Tags currently being expanded, outermost first
    pub stack: Vec<String>,
    pub depth: usize,
}

impl ResolutionContext {
    /// Context for the top of a page
    pub fn new(consuming_dir: impl Into<PathBuf>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            consuming_dir: consuming_dir.into(),
            root_dir: root_dir.into(),
            stack: Vec::new(),
            depth: 0,
        }
    }

    /// Context for the output of component `tag` defined in `definition_dir`
    pub fn enter(&self, tag: &str, definition_dir: &Path) -> Self {
        let mut stack = self.stack.clone();
        stack.push(tag.to_string());
        Self {
            consuming_dir: definition_dir.to_path_buf(),
            root_dir: self.root_dir.clone(),
            stack,
            depth: self.depth + 1,
        }
    }

    /// Context for the children of an ordinary element
    pub fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    /// `a -> b -> tag`
    pub fn chain(&self, tag: &str) -> String {
        let mut parts: Vec<&str> = self.stack.iter().map(String::as_str).collect();
        parts.push(tag);
        parts.join(" -> ")
    }
}

/// Outcome of substituting every page in a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionSummary {
    pub pages: usize,
    pub changed: usize,
}

/// Component substitution over element trees
#[derive(Debug)]
pub struct Walker {
    resolver: Resolver,
    renderers: Renderers,
    max_depth: usize,
    depth_warnings: Cell<usize>,
}

impl Walker {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            resolver: Resolver::new(config.kind_order.clone()),
            renderers: Renderers::new(SandboxRunner::new(&config.sandbox)),
            max_depth: config.max_depth,
            depth_warnings: Cell::new(0),
        }
    }

    /// Number of branches cut off by the depth guard so far
    pub fn depth_warnings(&self) -> usize {
        self.depth_warnings.get()
    }

    /// Substitute components among the children of `parent`.
    ///
    /// Returns true when anything was replaced.
    pub async fn walk(
        &self,
        document: &mut Document,
        parent: NodeId,
        ctx: &ResolutionContext,
    ) -> BuildResult<bool> {
        let mut changed = false;
        for child in document.tree.child_ids(parent) {
            if document.tree.element(child).is_none() {
                continue;
            }
            changed |= self.visit(document, child, ctx).await?;
        }
        Ok(changed)
    }

    fn visit<'a>(
        &'a self,
        document: &'a mut Document,
        node: NodeId,
        ctx: &'a ResolutionContext,
    ) -> Pin<Box<dyn Future<Output = BuildResult<bool>> + 'a>> {
        Box::pin(async move {
            let Some(tag) = document.tree.tag_name(node).map(str::to_string) else {
                return Ok(false);
            };
            if ctx.depth > self.max_depth {
                tracing::warn!(
                    "Maximum nesting depth ({}) exceeded at <{}>, not expanding further",
                    self.max_depth,
                    tag
                );
                self.depth_warnings.set(self.depth_warnings.get() + 1);
                return Ok(false);
            }

            let definition = if is_custom_tag(&tag) {
                self.resolver
                    .resolve(&tag, &ctx.consuming_dir, &ctx.root_dir)
                    .await
            } else {
                None
            };
            let Some(definition) = definition else {
                return self.walk(document, node, &ctx.descend()).await;
            };

            if ctx.stack.contains(&tag) {
                return Err(BuildError::CircularDependency {
                    chain: ctx.chain(&tag),
                });
            }

            tracing::debug!("Expanding <{}> from {}", tag, definition.path.display());
            let original = stitch_html::outer_html(&document.tree, node);
            let fragment = self.renderers.render(&definition, &original).await?;
            let inserted = splice(&mut document.tree, node, &fragment)?;

            let inner = ctx.enter(&tag, definition.dir());
            for id in inserted {
                if document.tree.element(id).is_some() {
                    self.visit(document, id, &inner).await?;
                }
            }
            Ok(true)
        })
    }

    /// Substitute a parsed page from its document node
    pub async fn substitute_document(
        &self,
        document: &mut Document,
        page_dir: &Path,
        root_dir: &Path,
    ) -> BuildResult<bool> {
        let ctx = ResolutionContext::new(page_dir, root_dir);
        let root = document.root();
        self.walk(document, root, &ctx).await
    }

    /// Load, substitute, and rewrite one page file
    pub async fn substitute_file(&self, page: &Path, root_dir: &Path) -> BuildResult<bool> {
        let source = smol::fs::read_to_string(page)
            .await
            .map_err(|e| BuildError::io(page, e))?;
        let mut document = stitch_html::parse(&stitch_html::ensure_document_shell(&source));

        let page_dir = page.parent().unwrap_or(root_dir);
        let changed = self.substitute_document(&mut document, page_dir, root_dir).await?;

        let html = stitch_html::serialize_document(&document);
        smol::fs::write(page, html)
            .await
            .map_err(|e| BuildError::io(page, e))?;
        tracing::debug!("Substituted {} (changed: {})", page.display(), changed);
        Ok(changed)
    }

    /// Substitute every page (non-component `.html` file) under `root_dir`
    pub async fn substitute_workspace(&self, root_dir: &Path) -> BuildResult<SubstitutionSummary> {
        let mut summary = SubstitutionSummary::default();
        for page in find_pages(root_dir)? {
            summary.pages += 1;
            if self.substitute_file(&page, root_dir).await? {
                summary.changed += 1;
            }
        }
        Ok(summary)
    }
}

/// Every page under `root`, sorted by path
pub fn find_pages(root: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == "html")
            && !is_component_file(path)
        {
            pages.push(path.to_path_buf());
        }
    }
    Ok(pages)
}

/// Put the fragment's nodes where `node` was.
///
/// A blank fragment removes the node outright. Returns the inserted
/// nodes in order.
fn splice(tree: &mut DomTree, node: NodeId, fragment: &Fragment) -> DomResult<Vec<NodeId>> {
    let parent = tree.parent(node).ok_or(DomError::NotAChild)?;
    if fragment.is_blank() {
        tree.remove_child(parent, node)?;
        return Ok(Vec::new());
    }

    let nodes = stitch_html::import_fragment(tree, fragment)?;
    let mut previous = node;
    for (i, &id) in nodes.iter().enumerate() {
        if i == 0 {
            tree.replace_child(parent, id, node)?;
        } else {
            tree.insert_after(parent, id, previous)?;
        }
        previous = id;
    }
    Ok(nodes)
}
