//! Script components, executed in the sandbox

use crate::component::ComponentDefinition;
use crate::render::ComponentRenderer;
use crate::sandbox::SandboxRunner;
use crate::BuildResult;

#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    sandbox: SandboxRunner,
}

impl ScriptRenderer {
    pub fn new(sandbox: SandboxRunner) -> Self {
        Self { sandbox }
    }
}

impl ComponentRenderer for ScriptRenderer {
    async fn render_markup(
        &self,
        definition: &ComponentDefinition,
        original: &str,
    ) -> BuildResult<String> {
        self.sandbox.render_component(definition, original).await
    }
}
