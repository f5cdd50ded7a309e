// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Black-box coverage of the six end-to-end scenarios, exercised entirely
//! through the public API with a mocked pantry and a mocked HTTP layer —
//! no network access, no real subprocess launches (services run under
//! `test_mode`).

use std::io::Write;
use std::sync::Arc;

use launchpad::activate;
use launchpad::activation::ActivationCache;
use launchpad::cache::{build_url, CacheManager, MockFetcher};
use launchpad::environment::Config;
use launchpad::install::{InstallOptions, NoopServiceHook, Orchestrator, PackageOutcome};
use launchpad::pantry::StaticPantry;
use launchpad::service::{ServiceManager, ServiceStatus};

const BASE_URL: &str = "https://dist.launchpad.dev";

fn tiny_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
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

fn mock_with_node() -> MockFetcher {
    let archive = tiny_tar_gz(&[("bin/node", b"#!/bin/sh\necho node\n")]);
    let url = build_url(BASE_URL, "nodejs.org", launchpad::environment::os_name(), launchpad::environment::arch_name(), "22.5.1", "tar.gz");
    MockFetcher::default().failing(url.replace("tar.gz", "tar.xz")).with_response(url, archive)
}

#[tokio::test]
async fn scenario_1_simple_install() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("prefix");

    let cache = CacheManager::with_fetcher(dir.path().join("cache"), mock_with_node());
    let orchestrator = Orchestrator::new(Arc::new(StaticPantry::new()), cache, Config::from_env(), Arc::new(NoopServiceHook));

    let opts = InstallOptions { force: true, install_dependencies: false, ..Default::default() };
    let report = orchestrator.install(&["node@22.5.1".to_owned()], &prefix, opts).await.unwrap();

    assert!(report
        .results
        .iter()
        .any(|r| r.domain == "nodejs.org" && matches!(&r.outcome, PackageOutcome::Installed { binaries } if binaries.contains(&"node".to_owned()))));

    let shim = prefix.join("bin/node");
    assert!(shim.exists());
    let v22 = prefix.join("nodejs.org/v22");
    assert_eq!(fs_err::read_link(&v22).unwrap(), std::path::Path::new("v22.5.1"));
}

#[tokio::test]
async fn scenario_2_constraint_resolution_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("prefix");

    let archive = tiny_tar_gz(&[("bin/tool", b"#!/bin/sh\necho hi\n")]);
    let url = build_url(BASE_URL, "pkg.example.org", launchpad::environment::os_name(), launchpad::environment::arch_name(), "3.5.0", "tar.gz");
    let mock = MockFetcher::default().failing(url.replace("tar.gz", "tar.xz")).with_response(url, archive);
    let cache = CacheManager::with_fetcher(dir.path().join("cache"), mock);
    let orchestrator = Orchestrator::new(Arc::new(StaticPantry::new()), cache, Config::from_env(), Arc::new(NoopServiceHook));

    let opts = InstallOptions { force: true, install_dependencies: false, ..Default::default() };
    let report = orchestrator.install(&["pkg^1.1".to_owned()], &prefix, opts).await.unwrap();

    assert!(report.results.iter().any(|r| r.domain == "pkg.example.org" && matches!(r.outcome, PackageOutcome::Installed { .. })));
    assert_eq!(report.warnings.iter().filter(|w| w.as_str() == "compatible version 3.5.0 used for ^1.1").count(), 1);
}

#[tokio::test]
async fn scenario_3_archive_corruption_self_heals() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(dir.path().join("cache"));

    let src = dir.path().join("package.tar.gz");
    fs_err::write(&src, vec![0u8; 1024]).unwrap();
    let saved = cache.save("demo.org", "1.0.0", "tar.gz", &src).unwrap();

    // Simulate metadata claiming 2048 while the file on disk is 1024.
    fs_err::write(&saved, vec![0u8; 1024]).unwrap();
    let metadata_path = dir.path().join("cache").join("cache-metadata.json");
    let mut doc: serde_json::Value = serde_json::from_slice(&fs_err::read(&metadata_path).unwrap()).unwrap();
    doc["demo.org-1.0.0"]["size"] = serde_json::json!(2048);
    fs_err::write(&metadata_path, serde_json::to_vec(&doc).unwrap()).unwrap();

    assert_eq!(cache.lookup("demo.org", "1.0.0", "tar.gz").unwrap(), None);
    assert!(!saved.exists());
    assert_eq!(cache.lookup("demo.org", "1.0.0", "tar.gz").unwrap(), None);
}

#[tokio::test]
async fn scenario_4_postgres_first_start_under_test_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = ServiceManager::new(true);

    manager.start("postgres", dir.path()).await.unwrap();
    assert_eq!(manager.status("postgres").unwrap().status, ServiceStatus::Running);

    manager.stop("postgres").await.unwrap();
    assert_eq!(manager.status("postgres").unwrap().status, ServiceStatus::Stopped);

    assert_eq!(manager.operation_log().iter().filter(|e| e.action == "start").count(), 1);
    assert_eq!(manager.operation_log().iter().filter(|e| e.action == "stop").count(), 1);
}

#[tokio::test]
async fn scenario_5_activation_fast_path() {
    let project_dir = tempfile::tempdir().unwrap();
    fs_err::write(project_dir.path().join("deps.yaml"), "packages: []\n").unwrap();
    let state_dir = tempfile::tempdir().unwrap();
    let cache = ActivationCache::load(state_dir.path().join("env_cache"));
    let envs_root = state_dir.path().join("envs");

    let orchestrator = Orchestrator::new(
        Arc::new(StaticPantry::new()),
        CacheManager::with_fetcher(state_dir.path().join("cache"), MockFetcher::default()),
        Config::from_env(),
        Arc::new(NoopServiceHook),
    );

    let first = activate::activate(&cache, &orchestrator, &envs_root, project_dir.path()).await.unwrap().unwrap();
    assert!(!first.from_cache);

    let second = activate::activate(&cache, &orchestrator, &envs_root, project_dir.path()).await.unwrap().unwrap();
    assert!(second.from_cache);
    assert_eq!(second.env_dir, first.env_dir);
}

#[tokio::test]
async fn scenario_6_per_package_timeout_does_not_block_others() {
    struct SlowFetcher(std::time::Duration);
    impl launchpad::cache::Fetcher for SlowFetcher {
        fn fetch(
            &self,
            _url: &str,
            _dest: &std::path::Path,
            _resume_from: Option<u64>,
            _progress: &mut launchpad::cache::ProgressFn<'_>,
        ) -> Result<launchpad::cache::FetchStatus, launchpad::cache::Error> {
            std::thread::sleep(self.0);
            Ok(launchpad::cache::FetchStatus::Failed(0))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("prefix");
    let cache = CacheManager::with_fetcher(dir.path().join("cache"), SlowFetcher(std::time::Duration::from_millis(200)));
    let orchestrator = Orchestrator::new(Arc::new(StaticPantry::new()), cache, Config::from_env(), Arc::new(NoopServiceHook));

    let opts = InstallOptions {
        force: true,
        install_dependencies: false,
        package_timeout: std::time::Duration::from_millis(20),
        ..Default::default()
    };
    let report = orchestrator.install(&["npm^10".to_owned()], &prefix, opts).await.unwrap();

    assert!(report.results.iter().any(|r| r.domain == "npmjs.com" && matches!(r.outcome, PackageOutcome::TimedOut)));
}
