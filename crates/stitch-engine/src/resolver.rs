//! Component Resolver
//!
//! Maps a custom tag to its definition file. The consuming directory is
//! searched for every kind before the project root is, so a local
//! definition always overrides a root one regardless of kind. Within a
//! directory the configured kind order breaks ties.

use std::path::Path;

use crate::component::{ComponentDefinition, ComponentKind};

/// Definition file lookup
#[derive(Debug, Clone)]
pub struct Resolver {
    kind_order: Vec<ComponentKind>,
}

impl Resolver {
    pub fn new(kind_order: Vec<ComponentKind>) -> Self {
        Self { kind_order }
    }

    /// Find the definition for `tag`, or `None` for an ordinary custom element
    pub async fn resolve(
        &self,
        tag: &str,
        consuming_dir: &Path,
        root_dir: &Path,
    ) -> Option<ComponentDefinition> {
        let mut dirs = vec![consuming_dir];
        if consuming_dir != root_dir {
            dirs.push(root_dir);
        }

        for dir in dirs {
            for &kind in &self.kind_order {
                let path = dir.join(kind.file_name(tag));
                if is_file(&path).await {
                    tracing::trace!("Resolved <{}> to {}", tag, path.display());
                    return Some(ComponentDefinition {
                        tag: tag.to_string(),
                        kind,
                        path,
                    });
                }
            }
        }
        None
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ComponentKind::ALL.to_vec())
    }
}

async fn is_file(path: &Path) -> bool {
    smol::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_local_beats_root_for_any_kind() {
        let root = tempfile::tempdir().unwrap();
        let section = root.path().join("section");
        fs::create_dir(&section).unwrap();
        fs::write(root.path().join("priority-comp.com.html"), "<div>Root</div>").unwrap();
        fs::write(section.join("priority-comp.com.md"), "Local").unwrap();

        let def = smol::block_on(Resolver::default().resolve("priority-comp", &section, root.path())).unwrap();
        assert_eq!(def.path, section.join("priority-comp.com.md"));
        assert_eq!(def.kind, ComponentKind::Markdown);
    }

    #[test]
    fn test_falls_back_to_root() {
        let root = tempfile::tempdir().unwrap();
        let section = root.path().join("section");
        fs::create_dir(&section).unwrap();
        fs::write(root.path().join("shared-nav.com.ts"), "").unwrap();

        let def = smol::block_on(Resolver::default().resolve("shared-nav", &section, root.path())).unwrap();
        assert_eq!(def.dir(), root.path());
    }

    #[test]
    fn test_kind_order_breaks_ties() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("dual-kind.com.html"), "").unwrap();
        fs::write(root.path().join("dual-kind.com.md"), "").unwrap();

        let default = smol::block_on(Resolver::default().resolve("dual-kind", root.path(), root.path()));
        assert_eq!(default.unwrap().kind, ComponentKind::Static);

        let md_first = Resolver::new(vec![ComponentKind::Markdown, ComponentKind::Static]);
        let def = smol::block_on(md_first.resolve("dual-kind", root.path(), root.path()));
        assert_eq!(def.unwrap().kind, ComponentKind::Markdown);
    }

    #[test]
    fn test_not_found_and_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::default();
        assert!(smol::block_on(resolver.resolve("no-such", root.path(), root.path())).is_none());

        fs::write(root.path().join("my-comp.com.html"), "").unwrap();
        let first = smol::block_on(resolver.resolve("my-comp", root.path(), root.path()));
        let second = smol::block_on(resolver.resolve("my-comp", root.path(), root.path()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_directory_named_like_definition_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("odd-one.com.html")).unwrap();
        assert!(smol::block_on(Resolver::default().resolve("odd-one", root.path(), root.path())).is_none());
    }
}
