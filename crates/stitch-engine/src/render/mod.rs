//! Component renderers
//!
//! One renderer per component kind. Each turns a definition (plus the
//! markup of the element being replaced) into a replacement markup string;
//! [`Renderers`] dispatches on kind and parses the result into a fragment.

mod markdown;
mod script;
mod static_markup;

pub use markdown::MarkdownRenderer;
pub use script::ScriptRenderer;
pub use static_markup::StaticRenderer;

use stitch_html::Fragment;

use crate::component::{ComponentDefinition, ComponentKind};
use crate::sandbox::SandboxRunner;
use crate::BuildResult;

/// Produces replacement markup for one kind of component
#[allow(async_fn_in_trait)]
pub trait ComponentRenderer {
    /// Render `definition`; `original` is the outer HTML of the consuming element
    async fn render_markup(
        &self,
        definition: &ComponentDefinition,
        original: &str,
    ) -> BuildResult<String>;
}

/// All renderers, keyed by component kind
#[derive(Debug, Clone)]
pub struct Renderers {
    static_markup: StaticRenderer,
    script: ScriptRenderer,
    markdown: MarkdownRenderer,
}

impl Renderers {
    pub fn new(sandbox: SandboxRunner) -> Self {
        Self {
            static_markup: StaticRenderer,
            script: ScriptRenderer::new(sandbox),
            markdown: MarkdownRenderer::default(),
        }
    }

    /// Render markup for any kind of definition
    pub async fn render_markup(
        &self,
        definition: &ComponentDefinition,
        original: &str,
    ) -> BuildResult<String> {
        match definition.kind {
            ComponentKind::Static => self.static_markup.render_markup(definition, original).await,
            ComponentKind::Script => self.script.render_markup(definition, original).await,
            ComponentKind::Markdown => self.markdown.render_markup(definition, original).await,
        }
    }

    /// Render and parse into a fragment ready for splicing
    pub async fn render(
        &self,
        definition: &ComponentDefinition,
        original: &str,
    ) -> BuildResult<Fragment> {
        let markup = self.render_markup(definition, original).await?;
        tracing::trace!(
            "Rendered <{}> ({:?}, {} bytes)",
            definition.tag,
            definition.kind,
            markup.len()
        );
        Ok(stitch_html::parse_fragment(&markup))
    }
}
