//! Build Configuration
//!
//! Loaded from an optional `stitch.json` in the project directory; every
//! field has a default, so an empty object is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::{BuildError, BuildResult};

/// Name of the project config file
pub const CONFIG_FILE: &str = "stitch.json";

/// Default nesting ceiling for component expansion
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Build options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Directory holding pages and components
    pub source_dir: PathBuf,

    /// Output directory, replaced on every successful build
    pub target_dir: PathBuf,

    /// Which definition file wins when one directory holds several kinds
    pub kind_order: Vec<ComponentKind>,

    /// Nesting depth past which expansion stops with a warning
    pub max_depth: usize,

    /// Passed through to the bundler
    pub minify: bool,

    /// Where build workspaces are created (default: the target's parent)
    pub workspace_root: Option<PathBuf>,

    pub sandbox: SandboxConfig,

    pub bundler: BundlerConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            target_dir: PathBuf::from("dist"),
            kind_order: ComponentKind::ALL.to_vec(),
            max_depth: DEFAULT_MAX_DEPTH,
            minify: false,
            workspace_root: None,
            sandbox: SandboxConfig::default(),
            bundler: BundlerConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::new()
    }

    /// Directory build workspaces are created in
    pub fn workspace_root(&self) -> PathBuf {
        if let Some(root) = &self.workspace_root {
            return root.clone();
        }
        match self.target_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Resolve relative directories against `base`
    pub fn relative_to(mut self, base: &Path) -> Self {
        self.source_dir = base.join(&self.source_dir);
        self.target_dir = base.join(&self.target_dir);
        self.workspace_root = self.workspace_root.map(|root| base.join(root));
        self
    }

    /// Reject settings no build could run with
    pub fn validate(&self) -> BuildResult<()> {
        if self.max_depth == 0 {
            return Err(BuildError::Config("maxDepth must be at least 1".to_string()));
        }
        if self.kind_order.is_empty() {
            return Err(BuildError::Config("kindOrder must name at least one kind".to_string()));
        }
        for (i, kind) in self.kind_order.iter().enumerate() {
            if self.kind_order[..i].contains(kind) {
                return Err(BuildError::Config(format!("kindOrder lists {kind:?} twice")));
            }
        }
        Ok(())
    }
}

/// How script components and pre-render scripts are executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxConfig {
    /// Executable that runs a wrapper program given as its last argument
    pub program: PathBuf,

    /// Arguments placed before the wrapper path
    pub args: Vec<String>,

    /// Kill the subprocess after this long; unset waits forever
    pub timeout_ms: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("stitch")),
            args: vec!["sandbox".to_string()],
            timeout_ms: None,
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Which bundler produces the published artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BundlerConfig {
    /// Publish the processed workspace as-is
    #[default]
    Passthrough,

    /// Run an external bundler; `{root}` and `{outdir}` in `args` are substituted
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Dev server options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevServerConfig {
    pub host: String,
    pub port: u16,
    /// How long shutdown waits for in-flight requests
    pub shutdown_grace_ms: u64,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            shutdown_grace_ms: 500,
        }
    }
}

impl DevServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Contents of `stitch.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    #[serde(flatten)]
    pub build: BuildConfig,
    pub dev: DevServerConfig,
}

impl ProjectConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> BuildResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `stitch.json` from `dir`, falling back to defaults when absent
    pub fn discover(dir: &Path) -> BuildResult<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!("Loading {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Builder for [`BuildConfig`]
#[derive(Debug, Clone, Default)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.source_dir = dir.into();
        self
    }

    pub fn target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.target_dir = dir.into();
        self
    }

    pub fn kind_order(mut self, order: impl Into<Vec<ComponentKind>>) -> Self {
        self.config.kind_order = order.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn minify(mut self, minify: bool) -> Self {
        self.config.minify = minify;
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn sandbox_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.sandbox.program = program.into();
        self
    }

    pub fn sandbox_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sandbox.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn sandbox_timeout(mut self, timeout: Duration) -> Self {
        self.config.sandbox.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn bundler(mut self, bundler: BundlerConfig) -> Self {
        self.config.bundler = bundler;
        self
    }

    pub fn build(self) -> BuildConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.source_dir, PathBuf::from("src"));
        assert_eq!(config.target_dir, PathBuf::from("dist"));
        assert_eq!(config.max_depth, 50);
        assert_eq!(
            config.kind_order,
            vec![ComponentKind::Static, ComponentKind::Script, ComponentKind::Markdown]
        );
        assert_eq!(config.sandbox.args, vec!["sandbox".to_string()]);
        assert_eq!(config.sandbox.timeout(), None);
        assert_eq!(config.bundler, BundlerConfig::Passthrough);
    }

    #[test]
    fn test_workspace_root_defaults_to_target_parent() {
        let config = BuildConfig::builder().target_dir("/srv/site/dist").build();
        assert_eq!(config.workspace_root(), PathBuf::from("/srv/site"));
        assert_eq!(BuildConfig::default().workspace_root(), PathBuf::from("."));
    }

    #[test]
    fn test_parse_project_config() {
        let json = r#"{
            "sourceDir": "pages",
            "kindOrder": ["markdown", "static"],
            "sandbox": { "timeoutMs": 2000 },
            "bundler": { "kind": "command", "program": "esbuild", "args": ["--outdir={outdir}"] },
            "dev": { "port": 4000 }
        }"#;
        let config: ProjectConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.build.source_dir, PathBuf::from("pages"));
        assert_eq!(config.build.target_dir, PathBuf::from("dist"));
        assert_eq!(config.build.kind_order, vec![ComponentKind::Markdown, ComponentKind::Static]);
        assert_eq!(config.build.sandbox.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.build.sandbox.args, vec!["sandbox".to_string()]);
        assert!(matches!(config.build.bundler, BundlerConfig::Command { ref program, .. } if program == "esbuild"));
        assert_eq!(config.dev.port, 4000);
        assert_eq!(config.dev.host, "127.0.0.1");
    }

    #[test]
    fn test_validate() {
        assert!(BuildConfig::default().validate().is_ok());
        assert!(BuildConfig::builder().max_depth(0).build().validate().is_err());
        assert!(BuildConfig::builder().kind_order(Vec::<ComponentKind>::new()).build().validate().is_err());
        let dup = BuildConfig::builder()
            .kind_order(vec![ComponentKind::Static, ComponentKind::Static])
            .build();
        assert!(matches!(dup.validate(), Err(BuildError::Config(_))));
    }

    #[test]
    fn test_discover_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectConfig::discover(dir.path()).unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_discover_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(ProjectConfig::discover(dir.path()), Err(BuildError::Config(_))));
    }
}
