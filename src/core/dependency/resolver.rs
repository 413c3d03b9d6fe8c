use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::manifest::{DependencyDeclaration, DependencyKind, Platform, ReleaseManifest};
use crate::core::platforms::{capabilities_for, Capability};

/// Dependency declarations that passed validation, grouped per platform in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    by_platform: BTreeMap<Platform, Vec<DependencyDeclaration>>,
}

impl ResolvedDependencies {
    pub fn for_platform(&self, platform: Platform) -> &[DependencyDeclaration] {
        self.by_platform
            .get(&platform)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_platform.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Local consistency checks for dependency declarations.
///
/// No network lookups happen here; slugs are only checked against each
/// other.
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn resolve(manifest: &ReleaseManifest) -> PublisherResult<ResolvedDependencies> {
        Self::resolve_declarations(manifest.dependencies())
    }

    pub fn resolve_declarations(
        declarations: &[DependencyDeclaration],
    ) -> PublisherResult<ResolvedDependencies> {
        let mut resolved = ResolvedDependencies::default();

        for platform in Platform::ALL {
            let declared: Vec<&DependencyDeclaration> = declarations
                .iter()
                .filter(|d| d.platform == platform)
                .collect();
            if declared.is_empty() {
                continue;
            }

            if !capabilities_for(platform).contains(&Capability::DeclareDependency) {
                warn!(
                    "{} does not support dependencies, ignoring {} declaration(s)",
                    platform,
                    declared.len()
                );
                continue;
            }

            let entries = Self::check_platform(platform, &declared)?;
            debug!("{}: {} dependency declaration(s) accepted", platform, entries.len());
            resolved.by_platform.insert(platform, entries);
        }

        Ok(resolved)
    }

    fn check_platform(
        platform: Platform,
        declared: &[&DependencyDeclaration],
    ) -> PublisherResult<Vec<DependencyDeclaration>> {
        let mut first_kind: HashMap<String, DependencyKind> = HashMap::new();
        let mut conflicts: Vec<String> = Vec::new();
        let mut entries = Vec::with_capacity(declared.len());

        for decl in declared {
            let slug = decl.slug.trim();
            if slug.is_empty() {
                return Err(PublisherError::InvalidTarget(format!(
                    "empty {} dependency slug for {}",
                    decl.kind, platform
                )));
            }

            let key = slug.to_ascii_lowercase();
            match first_kind.get(&key) {
                None => {
                    first_kind.insert(key, decl.kind);
                    entries.push(DependencyDeclaration {
                        platform,
                        slug: slug.to_string(),
                        kind: decl.kind,
                    });
                }
                Some(kind) if *kind == decl.kind => {
                    warn!("{}: duplicate {} dependency '{}' ignored", platform, kind, slug);
                }
                Some(_) => {
                    if !conflicts.iter().any(|c| c.eq_ignore_ascii_case(slug)) {
                        conflicts.push(slug.to_string());
                    }
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(PublisherError::DependencyConflict {
                platform,
                slugs: conflicts,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn decl(platform: Platform, slug: &str, kind: DependencyKind) -> DependencyDeclaration {
        DependencyDeclaration {
            platform,
            slug: slug.into(),
            kind,
        }
    }

    #[test]
    fn consistent_declarations_resolve() {
        let decls = vec![
            decl(Platform::CurseForge, "fabric-api", DependencyKind::Required),
            decl(Platform::CurseForge, "craterlib", DependencyKind::Required),
            decl(Platform::CurseForge, "optional-mod", DependencyKind::Optional),
            decl(Platform::Modrinth, "fabric-api", DependencyKind::Required),
            decl(Platform::Modrinth, "rift", DependencyKind::Embedded),
        ];
        let resolved = DependencyResolver::resolve_declarations(&decls).unwrap();
        assert_eq!(resolved.for_platform(Platform::CurseForge).len(), 3);
        assert_eq!(resolved.for_platform(Platform::Modrinth).len(), 2);
        assert_eq!(resolved.len(), 5);
    }

    #[test]
    fn same_slug_on_different_platforms_is_fine() {
        let decls = vec![
            decl(Platform::CurseForge, "jei", DependencyKind::Required),
            decl(Platform::Modrinth, "jei", DependencyKind::Incompatible),
        ];
        assert!(DependencyResolver::resolve_declarations(&decls).is_ok());
    }

    #[test]
    fn slug_under_two_kinds_conflicts() {
        let decls = vec![
            decl(Platform::Modrinth, "fabric-api", DependencyKind::Required),
            decl(Platform::Modrinth, "sodium", DependencyKind::Optional),
            decl(Platform::Modrinth, "Fabric-API", DependencyKind::Optional),
            decl(Platform::Modrinth, "sodium", DependencyKind::Incompatible),
            decl(Platform::Modrinth, "sodium", DependencyKind::Embedded),
        ];
        let err = DependencyResolver::resolve_declarations(&decls).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyConflict);
        match err {
            PublisherError::DependencyConflict { platform, slugs } => {
                assert_eq!(platform, Platform::Modrinth);
                assert_eq!(slugs, vec!["Fabric-API".to_string(), "sodium".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn every_pair_of_kinds_conflicts() {
        for a in DependencyKind::ALL {
            for b in DependencyKind::ALL {
                if a == b {
                    continue;
                }
                let decls = vec![
                    decl(Platform::CurseForge, "dup", a),
                    decl(Platform::CurseForge, "dup", b),
                ];
                let err = DependencyResolver::resolve_declarations(&decls).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::DependencyConflict, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn repeated_slug_under_same_kind_is_deduplicated() {
        let decls = vec![
            decl(Platform::CurseForge, "jei", DependencyKind::Optional),
            decl(Platform::CurseForge, " jei ", DependencyKind::Optional),
        ];
        let resolved = DependencyResolver::resolve_declarations(&decls).unwrap();
        assert_eq!(resolved.for_platform(Platform::CurseForge).len(), 1);
        assert_eq!(resolved.for_platform(Platform::CurseForge)[0].slug, "jei");
    }

    #[test]
    fn github_dependencies_are_dropped() {
        let decls = vec![decl(Platform::Github, "anything", DependencyKind::Required)];
        let resolved = DependencyResolver::resolve_declarations(&decls).unwrap();
        assert!(resolved.is_empty());
    }
}
