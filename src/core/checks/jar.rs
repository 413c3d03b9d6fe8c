use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::core::error::{PublisherError, PublisherResult};
use crate::core::manifest::ModLoader;

const FORGE_TOML: &str = "META-INF/mods.toml";
const NEOFORGE_TOML: &str = "META-INF/neoforge.mods.toml";
const FORGE_MCMOD: &str = "mcmod.info";
const FABRIC_JSON: &str = "fabric.mod.json";
const QUILT_JSON: &str = "quilt.mod.json";

/// Reject jars that do not carry the metadata file their loaders need.
///
/// Blocking: reads the zip central directory from disk.
pub fn check_jar_contents(path: &Path, loaders: &[ModLoader]) -> PublisherResult<()> {
    if loaders.is_empty() {
        return Ok(());
    }

    let file = File::open(path).map_err(|source| PublisherError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let archive = zip::ZipArchive::new(file).map_err(|e| PublisherError::EmptyJar {
        path: path.to_path_buf(),
        reason: format!("not a readable jar: {}", e),
    })?;
    let entries: HashSet<&str> = archive.file_names().collect();
    let has = |name: &str| entries.contains(name);

    let forge_like = loaders
        .iter()
        .any(|l| matches!(l, ModLoader::Forge | ModLoader::NeoForge));
    if forge_like && !(has(FORGE_TOML) || has(NEOFORGE_TOML) || has(FORGE_MCMOD)) {
        return Err(PublisherError::EmptyJar {
            path: path.to_path_buf(),
            reason: "marked as forge/neoforge, but no mods.toml, neoforge.mods.toml or mcmod.info was found".into(),
        });
    }

    if loaders.contains(&ModLoader::Fabric) && !has(FABRIC_JSON) {
        return Err(PublisherError::EmptyJar {
            path: path.to_path_buf(),
            reason: "marked as fabric, but no fabric.mod.json was found".into(),
        });
    }

    // Fabric mods run on Quilt, so either file is enough.
    if loaders.contains(&ModLoader::Quilt) && !(has(QUILT_JSON) || has(FABRIC_JSON)) {
        return Err(PublisherError::EmptyJar {
            path: path.to_path_buf(),
            reason: "marked as quilt, but no quilt.mod.json or fabric.mod.json was found".into(),
        });
    }

    Ok(())
}
