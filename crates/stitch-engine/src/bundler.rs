//! Bundler boundary
//!
//! The final JS/CSS bundling step is delegated. A bundler receives the
//! substituted pages as entrypoints plus the workspace root and returns
//! named artifacts; the workspace manager publishes them.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use smol::process::Command;
use walkdir::WalkDir;

use crate::component::is_source_only;
use crate::config::BundlerConfig;
use crate::{BuildError, BuildResult};

/// What the bundle is built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BundleTarget {
    #[default]
    Browser,
}

impl BundleTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleTarget::Browser => "browser",
        }
    }
}

/// Input to a bundler run
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub entrypoints: Vec<PathBuf>,
    pub root: PathBuf,
    pub minify: bool,
    pub target: BundleTarget,
}

/// Artifact category, used for doctype normalization on publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Html,
    Script,
    Stylesheet,
    Asset,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("html" | "htm") => ArtifactKind::Html,
            Some("js" | "mjs") => ArtifactKind::Script,
            Some("css") => ArtifactKind::Stylesheet,
            _ => ArtifactKind::Asset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContents {
    Text(String),
    Bytes(Vec<u8>),
}

impl ArtifactContents {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ArtifactContents::Text(text) => text.as_bytes(),
            ArtifactContents::Bytes(bytes) => bytes,
        }
    }
}

/// One output file, relative to the target directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub relative_path: PathBuf,
    pub contents: ArtifactContents,
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Read a file as an artifact; HTML is kept as text
    pub async fn read(path: &Path, relative_path: PathBuf) -> BuildResult<Self> {
        let kind = ArtifactKind::from_path(path);
        let bytes = smol::fs::read(path)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        let contents = match kind {
            ArtifactKind::Asset => ArtifactContents::Bytes(bytes),
            _ => match String::from_utf8(bytes) {
                Ok(text) => ArtifactContents::Text(text),
                Err(e) => ArtifactContents::Bytes(e.into_bytes()),
            },
        };
        Ok(Self {
            relative_path,
            contents,
            kind,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    pub artifacts: Vec<Artifact>,
}

/// Turns a processed workspace into publishable artifacts
#[allow(async_fn_in_trait)]
pub trait Bundler {
    async fn bundle(&self, request: &BundleRequest) -> BuildResult<BundleOutput>;
}

/// Emits every non-source file of the workspace unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBundler;

impl Bundler for PassthroughBundler {
    async fn bundle(&self, request: &BundleRequest) -> BuildResult<BundleOutput> {
        let artifacts = collect_artifacts(&request.root, is_source_only).await?;
        Ok(BundleOutput { artifacts })
    }
}

/// Runs an external bundler.
///
/// `{root}` and `{outdir}` in the arguments are substituted, the
/// entrypoints are appended, and everything the command leaves in
/// `{outdir}` becomes an artifact.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
}

impl CommandBundler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, root: &Path, outdir: &Path) -> Vec<String> {
        let root = root.to_string_lossy();
        let outdir = outdir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{root}", &root).replace("{outdir}", &outdir))
            .collect()
    }
}

impl Bundler for CommandBundler {
    async fn bundle(&self, request: &BundleRequest) -> BuildResult<BundleOutput> {
        let outdir = tempfile::Builder::new()
            .prefix(".stitch-bundle-")
            .tempdir()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?;

        let mut command = Command::new(&self.program);
        command
            .args(self.expand_args(&request.root, outdir.path()))
            .args(&request.entrypoints)
            .current_dir(&request.root)
            .env("STITCH_MINIFY", if request.minify { "1" } else { "0" })
            .env("STITCH_TARGET", request.target.as_str())
            .stdin(Stdio::null());

        tracing::info!("Bundling {} entrypoints with {}", request.entrypoints.len(), self.program);
        let output = command.output().await.map_err(|source| BuildError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut diagnostics: Vec<String> = stderr
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
            if diagnostics.is_empty() {
                diagnostics.push(format!("{} exited with {}", self.program, output.status));
            }
            return Err(BuildError::Bundle { diagnostics });
        }

        let artifacts = collect_artifacts(outdir.path(), |_| false).await?;
        Ok(BundleOutput { artifacts })
    }
}

/// The bundler selected by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredBundler {
    Passthrough(PassthroughBundler),
    Command(CommandBundler),
}

impl ConfiguredBundler {
    pub fn from_config(config: &BundlerConfig) -> Self {
        match config {
            BundlerConfig::Passthrough => ConfiguredBundler::Passthrough(PassthroughBundler),
            BundlerConfig::Command { program, args } => {
                ConfiguredBundler::Command(CommandBundler::new(program.clone(), args.clone()))
            }
        }
    }
}

impl Bundler for ConfiguredBundler {
    async fn bundle(&self, request: &BundleRequest) -> BuildResult<BundleOutput> {
        match self {
            ConfiguredBundler::Passthrough(bundler) => bundler.bundle(request).await,
            ConfiguredBundler::Command(bundler) => bundler.bundle(request).await,
        }
    }
}

/// Read every file under `dir` as an artifact, skipping `exclude` matches
async fn collect_artifacts(dir: &Path, exclude: fn(&Path) -> bool) -> BuildResult<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || exclude(path) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        artifacts.push(Artifact::read(path, relative.to_path_buf()).await?);
    }
    Ok(artifacts)
}
