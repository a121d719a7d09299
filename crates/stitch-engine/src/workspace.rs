//! Workspace Manager
//!
//! A build copies the source tree into a fresh workspace directory, runs
//! pre-render and substitution over the copy, hands it to the bundler,
//! and replaces the target directory with the artifacts. The workspace is
//! removed afterwards whether or not the build succeeded; directories a
//! crashed build left behind are swept by name prefix on the next start.

use std::path::{Component, Path};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::bundler::{Artifact, ArtifactContents, ArtifactKind, BundleRequest, BundleTarget, Bundler, ConfiguredBundler};
use crate::component::discover_definitions;
use crate::config::BuildConfig;
use crate::prerender::PreRenderer;
use crate::walker::{find_pages, Walker};
use crate::{BuildError, BuildResult};

/// Name prefix of every workspace directory
pub const WORKSPACE_PREFIX: &str = ".stitch-workspace-";

/// Marker written at the target root after each successful build
pub const COMPLETION_MARKER: &str = "compdate.txt";

/// Check whether a path component names a build workspace
pub fn is_workspace_dir_name(name: &str) -> bool {
    name.starts_with(WORKSPACE_PREFIX)
}

/// A build-scoped copy of the source tree
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create an empty workspace under `parent`
    pub fn create(parent: &Path) -> BuildResult<Self> {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| BuildError::io(parent, e))?;
        tracing::debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy `source` into the workspace, leaving out `exclude` and any
    /// workspace directories. Returns the number of files copied.
    pub async fn stage(&self, source: &Path, exclude: Option<&Path>) -> BuildResult<usize> {
        let source = source.to_path_buf();
        let dest = self.dir.path().to_path_buf();
        let exclude = exclude.and_then(|p| std::fs::canonicalize(p).ok());
        smol::unblock(move || copy_tree(&source, &dest, exclude.as_deref())).await
    }

    /// Delete the workspace
    pub fn close(self) -> BuildResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| BuildError::io(path, e))
    }
}

fn copy_tree(source: &Path, dest: &Path, exclude: Option<&Path>) -> BuildResult<usize> {
    let source = std::fs::canonicalize(source).map_err(|e| BuildError::io(source, e))?;
    let mut copied = 0;
    let walker = WalkDir::new(&source).into_iter().filter_entry(|entry| {
        let is_workspace = entry
            .file_name()
            .to_str()
            .is_some_and(is_workspace_dir_name);
        !is_workspace && exclude != Some(entry.path())
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&source).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(&source) else {
            continue;
        };
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| BuildError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove workspace directories left under `root` by builds that never
/// reached teardown. Returns how many were removed.
pub fn sweep_orphaned_workspaces(root: &Path) -> BuildResult<usize> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BuildError::io(root, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(root, e))?;
        let is_orphan = entry.file_name().to_str().is_some_and(is_workspace_dir_name)
            && entry.file_type().is_ok_and(|t| t.is_dir());
        if !is_orphan {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!("Removed orphaned workspace {}", path.display());
                removed += 1;
            }
            Err(e) => tracing::warn!("Could not remove orphaned workspace {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

/// Build statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Page files substituted
    pub pages: usize,
    /// Pages in which at least one component was replaced
    pub pages_changed: usize,
    /// Pre-render scripts run
    pub prerendered: usize,
    /// Files written to the target
    pub artifacts: usize,
    /// Branches cut off by the nesting depth guard
    pub depth_warnings: usize,
    pub elapsed: Duration,
}

/// Result of a build request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(BuildSummary),
    /// Input was unusable; nothing was done
    Skipped,
}

/// Runs whole builds
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    config: BuildConfig,
}

impl WorkspaceManager {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Stage, pre-render, substitute, bundle, publish, tear down
    pub async fn build(&self) -> BuildResult<BuildOutcome> {
        let config = &self.config;
        if config.source_dir.as_os_str().is_empty() || config.target_dir.as_os_str().is_empty() {
            tracing::warn!("Build skipped: source and target directories must be set");
            return Ok(BuildOutcome::Skipped);
        }
        config.validate()?;
        if !config.source_dir.is_dir() {
            return Err(BuildError::io(
                &config.source_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source directory not found"),
            ));
        }

        let started = Instant::now();
        tracing::info!(
            "Building {} -> {}",
            config.source_dir.display(),
            config.target_dir.display()
        );

        let workspace = Workspace::create(&config.workspace_root())?;
        let result = self.run_stages(&workspace).await;
        if let Err(err) = workspace.close() {
            tracing::warn!("Workspace teardown failed: {}", err);
        }

        let mut summary = result?;
        summary.elapsed = started.elapsed();
        tracing::info!(
            "Built {} pages ({} changed), {} pre-rendered, {} artifacts in {:?}",
            summary.pages,
            summary.pages_changed,
            summary.prerendered,
            summary.artifacts,
            summary.elapsed
        );
        Ok(BuildOutcome::Built(summary))
    }

    async fn run_stages(&self, workspace: &Workspace) -> BuildResult<BuildSummary> {
        let config = &self.config;
        let root = workspace.path();
        let mut summary = BuildSummary::default();

        let staged = workspace.stage(&config.source_dir, Some(&config.target_dir)).await?;
        tracing::debug!("Staged {} files", staged);

        summary.prerendered = PreRenderer::new(&config.sandbox)
            .run_all(root)
            .await
            .map_err(|e| e.relocate(root, &config.source_dir))?;

        let definitions = discover_definitions(root)?;
        tracing::debug!("Found {} component definitions", definitions.len());

        let walker = Walker::new(config);
        let pages = walker
            .substitute_workspace(root)
            .await
            .map_err(|e| e.relocate(root, &config.source_dir))?;
        summary.pages = pages.pages;
        summary.pages_changed = pages.changed;
        summary.depth_warnings = walker.depth_warnings();

        let request = BundleRequest {
            entrypoints: find_pages(root)?,
            root: root.to_path_buf(),
            minify: config.minify,
            target: BundleTarget::Browser,
        };
        let output = ConfiguredBundler::from_config(&config.bundler)
            .bundle(&request)
            .await?;

        summary.artifacts = publish(&config.target_dir, &output.artifacts).await?;
        Ok(summary)
    }
}

/// Replace `target` with `artifacts` and write the completion marker
pub async fn publish(target: &Path, artifacts: &[Artifact]) -> BuildResult<usize> {
    for artifact in artifacts {
        if !is_contained(&artifact.relative_path) {
            return Err(BuildError::Bundle {
                diagnostics: vec![format!(
                    "artifact path {} leaves the target directory",
                    artifact.relative_path.display()
                )],
            });
        }
    }

    match smol::fs::remove_dir_all(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(BuildError::io(target, e)),
    }
    smol::fs::create_dir_all(target)
        .await
        .map_err(|e| BuildError::io(target, e))?;

    for artifact in artifacts {
        let path = target.join(&artifact.relative_path);
        if let Some(parent) = path.parent() {
            smol::fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }
        let written = match (&artifact.kind, &artifact.contents) {
            (ArtifactKind::Html, ArtifactContents::Text(html)) => {
                smol::fs::write(&path, stitch_html::normalize_doctype(html).as_bytes()).await
            }
            (_, contents) => smol::fs::write(&path, contents.as_bytes()).await,
        };
        written.map_err(|e| BuildError::io(&path, e))?;
    }

    let marker = target.join(COMPLETION_MARKER);
    smol::fs::write(&marker, chrono::Local::now().to_rfc3339())
        .await
        .map_err(|e| BuildError::io(&marker, e))?;
    Ok(artifacts.len())
}

fn is_contained(relative: &Path) -> bool {
    relative.components().count() > 0
        && relative.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Build once with `config`
pub async fn build(config: BuildConfig) -> BuildResult<BuildOutcome> {
    WorkspaceManager::new(config).build().await
}
