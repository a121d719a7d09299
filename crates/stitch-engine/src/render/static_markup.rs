//! Static components: the file is the markup

use crate::component::ComponentDefinition;
use crate::render::ComponentRenderer;
use crate::{BuildError, BuildResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRenderer;

impl ComponentRenderer for StaticRenderer {
    async fn render_markup(
        &self,
        definition: &ComponentDefinition,
        _original: &str,
    ) -> BuildResult<String> {
        smol::fs::read_to_string(&definition.path)
            .await
            .map_err(|e| BuildError::io(&definition.path, e))
    }
}
