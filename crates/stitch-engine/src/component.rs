//! Component definitions
//!
//! A component is a hyphenated custom element backed by a
//! `<tag>.com.<ext>` file. The extension picks the kind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{BuildError, BuildResult};

/// Suffix of pre-render scripts (`index.pre.ts` renders `index.html`)
pub const PRERENDER_SUFFIX: &str = ".pre.ts";

/// How a component produces its markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Raw markup file
    Static,
    /// Program run in the sandbox that computes markup
    Script,
    /// CommonMark + GFM source
    Markdown,
}

impl ComponentKind {
    /// Every kind, in default lookup order
    pub const ALL: [ComponentKind; 3] = [
        ComponentKind::Static,
        ComponentKind::Script,
        ComponentKind::Markdown,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ComponentKind::Static => "html",
            ComponentKind::Script => "ts",
            ComponentKind::Markdown => "md",
        }
    }

    /// `<tag>.com.<ext>`
    pub fn file_name(self, tag: &str) -> String {
        format!("{tag}.com.{}", self.extension())
    }

    /// Script and markdown tags must contain a hyphen
    pub fn requires_hyphen(self) -> bool {
        !matches!(self, ComponentKind::Static)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }
}

/// A located definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    pub tag: String,
    pub kind: ComponentKind,
    pub path: PathBuf,
}

impl ComponentDefinition {
    /// Split a `<tag>.com.<ext>` path into tag and kind
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (stem, ext) = name.rsplit_once('.')?;
        let tag = stem.strip_suffix(".com")?;
        let kind = ComponentKind::from_extension(ext)?;
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            tag: tag.to_string(),
            kind,
            path: path.to_path_buf(),
        })
    }

    /// Directory holding the definition; nested components resolve from here
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Custom elements are the ones with a hyphen in their tag
pub fn is_custom_tag(tag: &str) -> bool {
    tag.contains('-')
}

/// Check whether a path is a component definition of any kind
pub fn is_component_file(path: &Path) -> bool {
    ComponentDefinition::from_path(path).is_some()
}

/// Check whether a path is a pre-render script
pub fn is_prerender_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PRERENDER_SUFFIX) && n.len() > PRERENDER_SUFFIX.len())
}

/// Source files that never reach the output
pub fn is_source_only(path: &Path) -> bool {
    is_component_file(path) || is_prerender_file(path)
}

/// Find and validate every definition under `root`.
///
/// A script or markdown definition without a hyphen is fatal. A static
/// one is ignored with a warning, since the walker only resolves
/// hyphenated tags and it could never be used.
pub fn discover_definitions(root: &Path) -> BuildResult<Vec<ComponentDefinition>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(definition) = ComponentDefinition::from_path(entry.path()) else {
            continue;
        };
        if !is_custom_tag(&definition.tag) {
            if definition.kind.requires_hyphen() {
                return Err(BuildError::NamingViolation {
                    path: definition.path,
                    tag: definition.tag,
                });
            }
            tracing::warn!(
                "Ignoring {}: component names need a hyphen",
                definition.path.display()
            );
            continue;
        }
        found.push(definition);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let def = ComponentDefinition::from_path(Path::new("/site/blog/post-card.com.ts")).unwrap();
        assert_eq!(def.tag, "post-card");
        assert_eq!(def.kind, ComponentKind::Script);
        assert_eq!(def.dir(), Path::new("/site/blog"));

        assert!(ComponentDefinition::from_path(Path::new("index.html")).is_none());
        assert!(ComponentDefinition::from_path(Path::new("x.com.css")).is_none());
        assert!(ComponentDefinition::from_path(Path::new(".com.html")).is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(ComponentKind::Markdown.file_name("doc-intro"), "doc-intro.com.md");
        assert_eq!(ComponentKind::Static.file_name("my-comp"), "my-comp.com.html");
    }

    #[test]
    fn test_source_only_files() {
        assert!(is_source_only(Path::new("a/my-comp.com.html")));
        assert!(is_source_only(Path::new("index.pre.ts")));
        assert!(!is_source_only(Path::new(".pre.ts")));
        assert!(!is_source_only(Path::new("app.ts")));
        assert!(!is_source_only(Path::new("index.html")));
    }

    #[test]
    fn test_discover_rejects_unhyphenated_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good-one.com.md"), "# hi").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/widget.com.ts"), "").unwrap();

        let err = discover_definitions(dir.path()).unwrap_err();
        match err {
            BuildError::NamingViolation { tag, .. } => assert_eq!(tag, "widget"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_skips_unhyphenated_static() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("header.com.html"), "<h1></h1>").unwrap();
        std::fs::write(dir.path().join("site-footer.com.html"), "<footer></footer>").unwrap();

        let defs = discover_definitions(dir.path()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].tag, "site-footer");
    }
}
