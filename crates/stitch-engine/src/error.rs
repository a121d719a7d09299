//! Build errors

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use stitch_dom::DomError;
use stitch_net::NetError;

/// Result type for build operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Everything that can abort a build or the dev server
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A component expands, directly or indirectly, into itself
    #[error("Circular dependency detected: {chain}")]
    CircularDependency { chain: String },

    /// A component or pre-render script exited unsuccessfully
    #[error("Script {} failed ({status}):\n{stderr}", path.display())]
    ScriptExecution {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
        stdout: String,
    },

    #[error("Script {} did not finish within {timeout:?}", path.display())]
    ScriptTimeout { path: PathBuf, timeout: Duration },

    /// Script and markdown component tags must contain a hyphen
    #[error("Component {} defines `{tag}`, but script and markdown component names must contain a hyphen", path.display())]
    NamingViolation { path: PathBuf, tag: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundling failed:\n{}", diagnostics.join("\n"))]
    Bundle { diagnostics: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Net(#[from] NetError),
}

impl BuildError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Point a script failure under `workspace` at the same file under `source`
    pub fn relocate(self, workspace: &Path, source: &Path) -> Self {
        let remap = |path: PathBuf| match path.strip_prefix(workspace) {
            Ok(relative) => source.join(relative),
            Err(_) => path,
        };
        match self {
            BuildError::ScriptExecution {
                path,
                status,
                stderr,
                stdout,
            } => BuildError::ScriptExecution {
                path: remap(path),
                status,
                stderr,
                stdout,
            },
            BuildError::ScriptTimeout { path, timeout } => BuildError::ScriptTimeout {
                path: remap(path),
                timeout,
            },
            BuildError::NamingViolation { path, tag } => BuildError::NamingViolation {
                path: remap(path),
                tag,
            },
            other => other,
        }
    }
}
