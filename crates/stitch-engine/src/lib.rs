//! stitch Engine
//!
//! A component-resolving static site builder.
//!
//! # Pipeline
//! - Stage the source tree into a disposable workspace
//! - Run `*.pre.ts` pre-render scripts against their pages
//! - Substitute `<tag-name>` elements with static, script, or markdown components
//! - Hand the workspace to a bundler and publish its artifacts
//!
//! # Example
//! ```rust,ignore
//! use stitch_engine::{BuildConfig, WorkspaceManager};
//!
//! let config = BuildConfig::builder().source_dir("site").target_dir("dist").build();
//! smol::block_on(WorkspaceManager::new(config).build())?;
//! ```

mod error;
pub mod bundler;
pub mod component;
pub mod config;
pub mod dev_server;
pub mod prerender;
pub mod render;
pub mod resolver;
pub mod sandbox;
pub mod walker;
pub mod watcher;
pub mod workspace;

pub use error::{BuildError, BuildResult};
pub use bundler::{Artifact, ArtifactContents, ArtifactKind, BundleOutput, BundleRequest, Bundler};
pub use component::{ComponentDefinition, ComponentKind};
pub use config::{BuildConfig, BundlerConfig, DevServerConfig, ProjectConfig, SandboxConfig};
pub use dev_server::{DevServer, RunningDevServer};
pub use prerender::PreRenderer;
pub use resolver::Resolver;
pub use sandbox::SandboxRunner;
pub use walker::{ResolutionContext, Walker};
pub use workspace::{sweep_orphaned_workspaces, BuildOutcome, BuildSummary, WorkspaceManager};

// Re-export sub-crates for advanced usage
pub use stitch_dom as dom;
pub use stitch_html as html;
pub use stitch_net as net;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
