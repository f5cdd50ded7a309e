// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Ties the activation cache, manifest loader, and install orchestrator
//! into the single operation a shell hook invokes on every prompt:
//! a hit short-circuits to the cached environment directory; a miss
//! parses the project's manifest, installs its packages into a
//! per-project environment, and caches the result. The shell hook itself
//! is an external collaborator (spec.md §1); this module is the
//! interface it requires.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;

use crate::activation::ActivationCache;
use crate::cache::Fetcher;
use crate::install::{InstallOptions, Orchestrator};
use crate::manifest;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] manifest::Error),
    #[error(transparent)]
    Install(#[from] crate::install::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    pub env_dir: PathBuf,
    pub packages: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub from_cache: bool,
}

/// Activate `project_dir`. Returns `None` when no recognized manifest is
/// present (nothing to activate). A fresh, still-valid cache entry is
/// returned without touching the network or the extractor, per spec.md
/// §8 scenario 5; otherwise the manifest is parsed and its packages are
/// installed into the project's per-project environment directory.
pub async fn activate<F: Fetcher + 'static>(
    cache: &ActivationCache,
    orchestrator: &Orchestrator<F>,
    envs_root: &Path,
    project_dir: &Path,
) -> Result<Option<ActivationOutcome>, Error> {
    let Some(source) = manifest::detect(project_dir) else {
        return Ok(None);
    };

    if let Some(entry) = cache.get(project_dir)
        && entry.dep_file == source.path
        && entry.dep_mtime == source.dep_mtime
        && entry.env_dir.exists()
    {
        return Ok(Some(ActivationOutcome {
            env_dir: entry.env_dir,
            packages: Vec::new(),
            env: BTreeMap::new(),
            from_cache: true,
        }));
    }

    let manifest = manifest::parse(&source)?;
    let env_dir = envs_root.join(env_dir_name(project_dir));

    if manifest.packages.is_empty() {
        fs_err::create_dir_all(&env_dir)?;
    } else {
        orchestrator
            .install(&manifest.packages, &env_dir, InstallOptions { force: false, ..Default::default() })
            .await?;
    }

    cache.set(project_dir, &source.path, &env_dir);

    Ok(Some(ActivationOutcome { env_dir, packages: manifest.packages, env: manifest.env, from_cache: false }))
}

/// `{projectName}_{shortHash}`, matching the naming convention
/// `crate::envmanager` lists directories under.
fn env_dir_name(project_dir: &Path) -> String {
    let name = project_dir.file_name().and_then(|n| n.to_str()).unwrap_or("project");

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    project_dir.hash(&mut hasher);
    let short_hash = hasher.finish() & 0xffff_ffff;

    format!("{name}_{short_hash:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheManager, MockFetcher};
    use crate::install::NoopServiceHook;
    use crate::pantry::StaticPantry;
    use std::sync::Arc;

    #[tokio::test]
    async fn no_manifest_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = ActivationCache::load(cache_dir.path().join("env_cache"));

        let orchestrator = Orchestrator::new(
            Arc::new(StaticPantry::new()),
            CacheManager::with_fetcher(cache_dir.path().join("cache"), MockFetcher::default()),
            crate::environment::Config::from_env(),
            Arc::new(NoopServiceHook),
        );

        let envs_root = cache_dir.path().join("envs");
        assert!(activate(&cache, &orchestrator, &envs_root, dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_activation_is_a_cache_hit_with_no_network_access() {
        let project_dir = tempfile::tempdir().unwrap();
        fs_err::write(project_dir.path().join("deps.yaml"), "packages: []\n").unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let cache = ActivationCache::load(state_dir.path().join("env_cache"));

        let orchestrator = Orchestrator::new(
            Arc::new(StaticPantry::new()),
            CacheManager::with_fetcher(state_dir.path().join("cache"), MockFetcher::default()),
            crate::environment::Config::from_env(),
            Arc::new(NoopServiceHook),
        );

        let envs_root = state_dir.path().join("envs");
        let first = activate(&cache, &orchestrator, &envs_root, project_dir.path()).await.unwrap().unwrap();
        assert!(!first.from_cache);

        let second = activate(&cache, &orchestrator, &envs_root, project_dir.path()).await.unwrap().unwrap();
        assert!(second.from_cache);
        assert_eq!(second.env_dir, first.env_dir);
    }
}
