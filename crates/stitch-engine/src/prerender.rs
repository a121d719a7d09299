//! Pre-render Runner
//!
//! `name.pre.ts` scripts mutate `document` for the sibling `name.html`
//! page (starting from a default skeleton when the page is missing) and
//! the result is written back before substitution runs.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::component::{is_prerender_file, PRERENDER_SUFFIX};
use crate::config::SandboxConfig;
use crate::sandbox::SandboxRunner;
use crate::{BuildError, BuildResult};

#[derive(Debug, Clone)]
pub struct PreRenderer {
    sandbox: SandboxRunner,
}

impl PreRenderer {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            sandbox: SandboxRunner::new(config),
        }
    }

    /// Run every pre-render script under `root`; returns how many ran.
    ///
    /// All scripts are found before any runs, so pages a script creates
    /// never affect discovery. The first failure aborts the rest.
    pub async fn run_all(&self, root: &Path) -> BuildResult<usize> {
        let scripts = find_prerender_scripts(root)?;
        for script in &scripts {
            self.run_one(script).await?;
        }
        Ok(scripts.len())
    }

    /// Run a single script against its page
    pub async fn run_one(&self, script: &Path) -> BuildResult<()> {
        let page = page_path_for(script).ok_or_else(|| {
            BuildError::Config(format!("{} is not a pre-render script", script.display()))
        })?;
        tracing::debug!("Pre-rendering {} from {}", page.display(), script.display());
        self.sandbox.prerender(script, &page).await
    }
}

/// `dir/name.pre.ts` -> `dir/name.html`
pub fn page_path_for(script: &Path) -> Option<PathBuf> {
    let name = script.file_name()?.to_str()?;
    let stem = name.strip_suffix(PRERENDER_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(script.with_file_name(format!("{stem}.html")))
}

fn find_prerender_scripts(root: &Path) -> BuildResult<Vec<PathBuf>> {
    let mut scripts = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && is_prerender_file(entry.path()) {
            scripts.push(entry.into_path());
        }
    }
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path_for() {
        assert_eq!(
            page_path_for(Path::new("/site/blog/index.pre.ts")),
            Some(PathBuf::from("/site/blog/index.html"))
        );
        assert_eq!(page_path_for(Path::new("/site/.pre.ts")), None);
        assert_eq!(page_path_for(Path::new("/site/index.ts")), None);
    }

    #[test]
    fn test_discovery_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("index.pre.ts"), "").unwrap();
        std::fs::write(dir.path().join("docs/guide.pre.ts"), "").unwrap();
        std::fs::write(dir.path().join("app.ts"), "").unwrap();

        let scripts = find_prerender_scripts(dir.path()).unwrap();
        assert_eq!(
            scripts,
            vec![dir.path().join("docs/guide.pre.ts"), dir.path().join("index.pre.ts")]
        );
    }

    #[test]
    fn test_no_scripts_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>x</p>").unwrap();
        let ran = smol::block_on(PreRenderer::new(&SandboxConfig::default()).run_all(dir.path())).unwrap();
        assert_eq!(ran, 0);
    }
}
