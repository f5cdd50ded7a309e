// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Install orchestrator, per spec.md §4.7.

mod hook;

pub use hook::{NoopServiceHook, ServiceHook};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::cache::{CacheManager, Fetcher};
use crate::deps::{self, ExpandOptions};
use crate::environment::Config;
use crate::extract;
use crate::pantry::Pantry;
use crate::shim::{self, RuntimeEnv};
use crate::spec::ResolvedPackage;

pub const DEFAULT_BASE_URL: &str = "https://dist.launchpad.dev";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("global install timed out after {0:?}")]
    GlobalTimeout(Duration),
}

#[derive(Debug, Clone)]
pub enum PackageOutcome {
    Installed { binaries: Vec<String> },
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct PackageResult {
    pub domain: String,
    pub version: String,
    pub outcome: PackageOutcome,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub results: Vec<PackageResult>,
    pub warnings: Vec<String>,
}

impl InstallReport {
    /// Overall success iff no user-*requested* package failed; companion
    /// and dependency failures are non-fatal per spec.md §4.7/§7.
    pub fn requested_all_succeeded(&self, requested_domains: &[String]) -> bool {
        self.results
            .iter()
            .filter(|r| requested_domains.contains(&r.domain))
            .all(|r| matches!(r.outcome, PackageOutcome::Installed { .. }))
    }
}

pub struct InstallOptions {
    pub base_url: String,
    pub install_dependencies: bool,
    pub force: bool,
    pub global_timeout: Duration,
    /// Per-package timeout (spec.md §4.7). Defaults to the CI-aware value
    /// from `Config::package_timeout_secs`; callers building `InstallOptions`
    /// directly from `Config` should set this explicitly, since `Default`
    /// has no `Config` to consult.
    pub package_timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            install_dependencies: true,
            force: false,
            global_timeout: Duration::from_secs(crate::environment::DEFAULT_GLOBAL_TIMEOUT_SECS),
            package_timeout: Duration::from_secs(crate::environment::DEFAULT_PACKAGE_TIMEOUT_SECS),
        }
    }
}

pub struct Orchestrator<F: Fetcher + 'static> {
    pantry: Arc<dyn Pantry>,
    cache: Arc<CacheManager<F>>,
    config: Config,
    hook: Arc<dyn ServiceHook>,
}

impl<F: Fetcher + 'static> Orchestrator<F> {
    pub fn new(pantry: Arc<dyn Pantry>, cache: CacheManager<F>, config: Config, hook: Arc<dyn ServiceHook>) -> Self {
        Self { pantry, cache: Arc::new(cache), config, hook }
    }

    /// Install `specs` into `prefix`. Entry point for both direct CLI
    /// invocation and the shell hook's miss path (spec.md §4.7).
    #[instrument(skip(self))]
    pub async fn install(&self, specs: &[String], prefix: &Path, opts: InstallOptions) -> Result<InstallReport, Error> {
        fs_err::create_dir_all(prefix)?;

        if !opts.force && self.config.shell_integration && ready_marker_exists(prefix) {
            info!("ready marker present, short-circuiting install");
            return Ok(InstallReport::default());
        }

        let expansion = deps::expand(
            self.pantry.as_ref(),
            specs,
            ExpandOptions { install_dependencies: opts.install_dependencies, install_companions: true },
        );

        let report = self.install_expanded(&expansion.packages, prefix, &opts).await?;

        let mut report = report;
        report.warnings.extend(expansion.warnings);

        if self.config.shell_integration {
            write_ready_marker(prefix);
        }

        Ok(report)
    }

    /// Install only the transitive dependencies of `specs`, skipping the
    /// user-requested packages themselves.
    pub async fn install_dependencies_only(&self, specs: &[String], prefix: &Path, opts: InstallOptions) -> Result<InstallReport, Error> {
        let expansion = deps::expand(
            self.pantry.as_ref(),
            specs,
            ExpandOptions { install_dependencies: true, install_companions: true },
        );
        let requested: std::collections::HashSet<String> = specs
            .iter()
            .map(|s| self.pantry.resolve_alias(&crate::spec::PackageSpec::parse(s).name))
            .collect();
        let deps_only: Vec<_> = expansion.packages.into_iter().filter(|p| !requested.contains(&p.domain)).collect();

        self.install_expanded(&deps_only, prefix, &opts).await
    }

    async fn install_expanded(&self, packages: &[ResolvedPackage], prefix: &Path, opts: &InstallOptions) -> Result<InstallReport, Error> {
        let concurrency = self.config.concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let package_timeout = opts.package_timeout;

        let work = async {
            let mut handles = Vec::new();

            for package in packages.iter().cloned() {
                let semaphore = Arc::clone(&semaphore);
                let cache = Arc::clone(&self.cache);
                let prefix = prefix.to_owned();
                let base_url = opts.base_url.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                    let package_for_timeout = package.clone();
                    let prefix_for_timeout = prefix.clone();
                    let base_url_for_timeout = base_url.clone();

                    let result = tokio::time::timeout(
                        package_timeout,
                        tokio::task::spawn_blocking(move || {
                            install_one(&cache, &package_for_timeout, &prefix_for_timeout, &base_url_for_timeout)
                        }),
                    )
                    .await;

                    match result {
                        Ok(Ok(Ok(binaries))) => PackageResult {
                            domain: package.domain,
                            version: package.version,
                            outcome: PackageOutcome::Installed { binaries },
                        },
                        Ok(Ok(Err(reason))) => {
                            warn!(domain = %package.domain, error = %reason, "package install failed");
                            PackageResult { domain: package.domain, version: package.version, outcome: PackageOutcome::Failed { reason } }
                        }
                        Ok(Err(join_err)) => PackageResult {
                            domain: package.domain,
                            version: package.version,
                            outcome: PackageOutcome::Failed { reason: join_err.to_string() },
                        },
                        Err(_elapsed) => {
                            warn!(domain = %package.domain, "package install timed out");
                            PackageResult { domain: package.domain, version: package.version, outcome: PackageOutcome::TimedOut }
                        }
                    }
                }));
            }

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                results.push(handle.await.unwrap_or_else(|e| PackageResult {
                    domain: "<unknown>".to_owned(),
                    version: String::new(),
                    outcome: PackageOutcome::Failed { reason: e.to_string() },
                }));
            }
            results
        };

        let results = tokio::time::timeout(opts.global_timeout, work)
            .await
            .map_err(|_| Error::GlobalTimeout(opts.global_timeout))?;

        let mut report = InstallReport { results, warnings: Vec::new() };

        self.run_service_hooks(&mut report, prefix).await;

        Ok(report)
    }

    async fn run_service_hooks(&self, report: &mut InstallReport, prefix: &Path) {
        let installed_domains: Vec<String> = report
            .results
            .iter()
            .filter(|r| matches!(r.outcome, PackageOutcome::Installed { .. }))
            .map(|r| r.domain.clone())
            .collect();

        for domain in installed_domains {
            if let Some(service_name) = crate::service::catalog::service_for_domain(&domain)
                && let Err(e) = self.hook.on_package_installed(service_name, prefix).await
            {
                report.warnings.push(format!("service auto-start for '{service_name}' failed: {e}"));
            }
        }
    }
}

fn install_one<F: Fetcher>(cache: &CacheManager<F>, package: &ResolvedPackage, prefix: &Path, base_url: &str) -> Result<Vec<String>, String> {
    let attempt = |domain: &str, version: &str| -> Result<Vec<String>, String> {
        let (archive_path, format) = cache.fetch(base_url, domain, version).map_err(|e| e.to_string())?;
        let pkg_dir = extract::extract_and_fixup(&archive_path, format, domain, version, prefix).map_err(|e| e.to_string())?;

        let env = RuntimeEnv::for_package(&BTreeMap::new(), &pkg_dir);
        let shim_prefix = prefix.to_owned();
        let binaries = shim::generate_shims(&pkg_dir, &shim_prefix, &env).map_err(|e| e.to_string())?;
        Ok(binaries)
    };

    match attempt(&package.domain, &package.version) {
        Ok(binaries) => Ok(binaries),
        Err(first_error) => {
            // OS-prefix fallback: retry with, then without, the version
            // constraint, per spec.md §4.7. The "constraint" here has
            // already been pinned by the dependency expander, so the
            // retry re-resolves against `latest` as the constraint-free
            // form, preserving observable output even though the
            // internal path differs (spec.md §9 Open Question).
            match attempt(&package.domain, "latest") {
                Ok(binaries) => Ok(binaries),
                Err(_) => Err(first_error),
            }
        }
    }
}

fn ready_marker_exists(prefix: &Path) -> bool {
    prefix.join(".ready").exists() || crate::environment::global_ready_marker().exists()
}

fn write_ready_marker(prefix: &Path) {
    let _ = fs_err::write(prefix.join(".ready"), b"");
    if let Some(parent) = crate::environment::global_ready_marker().parent() {
        let _ = fs_err::create_dir_all(parent);
    }
    let _ = fs_err::write(crate::environment::global_ready_marker(), b"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockFetcher;
    use crate::pantry::StaticPantry;

    fn tiny_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write;

        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&tar_bytes).unwrap();
        gz.finish().unwrap()
    }

    #[tokio::test]
    async fn installs_a_simple_package_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("prefix");
        let cache_root = dir.path().join("cache");

        let archive = tiny_tar_gz(&[("bin/tool", b"#!/bin/sh\necho hi\n")]);
        let url = crate::cache::build_url(
            DEFAULT_BASE_URL,
            "pkg.example.org",
            crate::environment::os_name(),
            crate::environment::arch_name(),
            "3.5.0",
            "tar.gz",
        );
        let mock = MockFetcher::default().failing(url.replace("tar.gz", "tar.xz")).with_response(url, archive);

        let cache = CacheManager::with_fetcher(cache_root, mock);
        let pantry = Arc::new(StaticPantry::new());
        let config = Config::from_env();
        let orchestrator = Orchestrator::new(pantry, cache, config, Arc::new(NoopServiceHook));

        let report = orchestrator
            .install(&["pkg^1.1".to_owned()], &prefix, InstallOptions { force: true, ..Default::default() })
            .await
            .unwrap();

        assert!(report.results.iter().any(|r| r.domain == "pkg.example.org"
            && matches!(&r.outcome, PackageOutcome::Installed { binaries } if binaries.contains(&"tool".to_owned()))));
        assert!(report.warnings.iter().any(|w| w == "compatible version 3.5.0 used for ^1.1"));
    }

    /// A fetcher that blocks past any reasonable per-package timeout, to
    /// exercise the timeout path without actually waiting out the real
    /// (multi-minute) default.
    struct SlowFetcher(Duration);

    impl Fetcher for SlowFetcher {
        fn fetch(
            &self,
            _url: &str,
            _dest: &Path,
            _resume_from: Option<u64>,
            _progress: &mut crate::cache::ProgressFn<'_>,
        ) -> Result<crate::cache::FetchStatus, crate::cache::Error> {
            std::thread::sleep(self.0);
            Ok(crate::cache::FetchStatus::Failed(0))
        }
    }

    #[tokio::test]
    async fn a_stuck_package_times_out_without_blocking_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("prefix");
        let cache_root = dir.path().join("cache");

        let cache = CacheManager::with_fetcher(cache_root, SlowFetcher(Duration::from_millis(200)));
        let pantry = Arc::new(StaticPantry::new());
        let config = Config::from_env();
        let orchestrator = Orchestrator::new(pantry, cache, config, Arc::new(NoopServiceHook));

        let opts = InstallOptions {
            force: true,
            install_dependencies: false,
            package_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let report = orchestrator.install(&["npm^10".to_owned()], &prefix, opts).await.unwrap();

        assert!(report
            .results
            .iter()
            .any(|r| r.domain == "npmjs.com" && matches!(r.outcome, PackageOutcome::TimedOut)));
    }
}
