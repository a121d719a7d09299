//! Markdown components
//!
//! CommonMark with the GFM extensions authors expect: tables,
//! strikethrough and task lists.

use pulldown_cmark::{html, Options, Parser};

use crate::component::ComponentDefinition;
use crate::render::ComponentRenderer;
use crate::{BuildError, BuildResult};

#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS,
        }
    }
}

impl MarkdownRenderer {
    /// Convert markdown source to HTML
    pub fn to_html(&self, source: &str) -> String {
        let parser = Parser::new_ext(source, self.options);
        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl ComponentRenderer for MarkdownRenderer {
    async fn render_markup(
        &self,
        definition: &ComponentDefinition,
        _original: &str,
    ) -> BuildResult<String> {
        let source = smol::fs::read_to_string(&definition.path)
            .await
            .map_err(|e| BuildError::io(&definition.path, e))?;
        Ok(self.to_html(&source))
    }
}
