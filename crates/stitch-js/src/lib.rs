//! stitch script sandbox
//!
//! QuickJS-based runtime that executes component and pre-render wrapper
//! programs inside the sandbox subprocess.
//!
//! Features:
//! - QuickJS runtime via rquickjs, with a memory ceiling
//! - Console API routed to `tracing`
//! - A minimal DOM (`document`, `Node`, `Element`) over the stitch arena tree
//! - A host bridge (`__host.readFile/writeFile/exists`) for the output handshake

mod bindings;
mod console;
mod runtime;

use std::path::{Path, PathBuf};

pub use runtime::SandboxRuntime;

/// Memory ceiling for one sandbox runtime
pub const MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Script runtime errors
#[derive(Debug, thiserror::Error)]
pub enum JsError {
    /// The engine itself could not be set up
    #[error("JavaScript runtime error: {0}")]
    Runtime(String),

    /// The script threw and nothing caught it
    #[error("Uncaught exception: {0}")]
    Exception(String),

    #[error("Failed to read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<rquickjs::Error> for JsError {
    fn from(err: rquickjs::Error) -> Self {
        JsError::Runtime(err.to_string())
    }
}

/// Execute a wrapper program from disk in a fresh runtime
pub fn run_file(path: &Path) -> Result<(), JsError> {
    let source = std::fs::read_to_string(path).map_err(|source| JsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Running sandbox program {}", path.display());
    SandboxRuntime::new()?.eval(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_file_missing() {
        let err = run_file(Path::new("/definitely/not/here.ts")).unwrap_err();
        assert!(matches!(err, JsError::Io { .. }));
    }

    #[test]
    fn test_run_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let program = dir.path().join("prog.ts");
        std::fs::write(
            &program,
            format!("__host.writeFile({:?}, 'ok:' + (1 + 2));", out.to_str().unwrap()),
        )
        .unwrap();

        run_file(&program).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "ok:3");
    }

    #[test]
    fn test_run_file_throw_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("prog.ts");
        std::fs::write(&program, "throw new Error('component exploded');").unwrap();

        let err = run_file(&program).unwrap_err();
        assert!(err.to_string().contains("component exploded"), "{err}");
    }
}
