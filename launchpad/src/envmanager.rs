// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Per-project environment directory utilities, per spec.md §4.10.
//! Out-of-band maintenance over `~/.local/share/launchpad/envs/`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment '{0}' not found")]
    NotFound(String),
    #[error("refusing to remove non-empty environment '{0}' without force")]
    ForceRequired(String),
}

#[derive(Debug, Clone)]
pub struct EnvironmentSummary {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub package_count: usize,
    pub binary_count: usize,
    pub modified_at: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentDetail {
    pub summary: EnvironmentSummary,
    pub packages: Vec<String>,
    pub first_binaries: Vec<String>,
    pub stub_contents: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanCriteria {
    pub older_than_days: Option<u64>,
    pub zero_packages: bool,
    pub missing_bin: bool,
}

/// `{projectName}_{shortHash}` directories under `envs_dir()`.
pub fn list(envs_dir: &Path) -> Result<Vec<EnvironmentSummary>, Error> {
    if !envs_dir.exists() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in fs_err::read_dir(envs_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        out.push(summarize(&entry.path())?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

pub fn inspect(envs_dir: &Path, name: &str, with_stubs: bool) -> Result<EnvironmentDetail, Error> {
    let path = envs_dir.join(name);
    if !path.exists() {
        return Err(Error::NotFound(name.to_owned()));
    }

    let summary = summarize(&path)?;
    let packages = list_packages(&path);
    let binaries = list_binaries(&path);
    let first_binaries = binaries.iter().take(10).cloned().collect();

    let stub_contents = if with_stubs {
        binaries
            .iter()
            .take(10)
            .filter_map(|name| {
                let stub_path = path.join("bin").join(name);
                fs_err::read_to_string(&stub_path).ok().map(|contents| (name.clone(), contents))
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(EnvironmentDetail { summary, packages, first_binaries, stub_contents })
}

/// Removes environments matching any enabled criterion in `criteria`.
pub fn clean(envs_dir: &Path, criteria: CleanCriteria) -> Result<Vec<String>, Error> {
    let mut removed = Vec::new();
    for summary in list(envs_dir)? {
        let age_days = summary
            .modified_at
            .and_then(|t| t.elapsed().ok())
            .map(|d| d.as_secs() / 86_400)
            .unwrap_or(0);

        let matches_age = criteria.older_than_days.is_some_and(|max| age_days > max);
        let matches_zero_packages = criteria.zero_packages && summary.package_count == 0;
        let matches_missing_bin = criteria.missing_bin && !summary.path.join("bin").exists();

        if matches_age || matches_zero_packages || matches_missing_bin {
            fs_err::remove_dir_all(&summary.path)?;
            removed.push(summary.name);
        }
    }
    Ok(removed)
}

pub fn remove(envs_dir: &Path, name: &str, force: bool) -> Result<(), Error> {
    let path = envs_dir.join(name);
    if !path.exists() {
        return Err(Error::NotFound(name.to_owned()));
    }

    if !force && list_packages(&path).len() > 1 {
        return Err(Error::ForceRequired(name.to_owned()));
    }

    fs_err::remove_dir_all(&path)?;
    Ok(())
}

fn summarize(path: &Path) -> Result<EnvironmentSummary, Error> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let size_bytes = dir_size(path);
    let package_count = list_packages(path).len();
    let binary_count = list_binaries(path).len();
    let modified_at = fs_err::metadata(path).ok().and_then(|m| m.modified().ok());

    Ok(EnvironmentSummary { name, path: path.to_owned(), size_bytes, package_count, binary_count, modified_at })
}

fn list_packages(env_path: &Path) -> Vec<String> {
    let pkgs_dir = env_path.join("pkgs");
    let Ok(entries) = fs_err::read_dir(&pkgs_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn list_binaries(env_path: &Path) -> Vec<String> {
    let bin_dir = env_path.join("bin");
    let Ok(entries) = fs_err::read_dir(&bin_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    let Ok(entries) = fs_err::read_dir(path) else {
        return 0;
    };
    for entry in entries.filter_map(Result::ok) {
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            total += dir_size(&entry.path());
        } else if let Ok(metadata) = entry.metadata() {
            total += metadata.len();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(envs_dir: &Path, name: &str, packages: &[&str], binaries: &[&str]) -> PathBuf {
        let env_path = envs_dir.join(name);
        for pkg in packages {
            fs_err::create_dir_all(env_path.join("pkgs").join(pkg)).unwrap();
        }
        if !binaries.is_empty() {
            fs_err::create_dir_all(env_path.join("bin")).unwrap();
            for binary in binaries {
                fs_err::write(env_path.join("bin").join(binary), b"#!/bin/sh\n").unwrap();
            }
        }
        env_path
    }

    #[test]
    fn list_reports_package_and_binary_counts() {
        let dir = tempfile::tempdir().unwrap();
        make_env(dir.path(), "app_abc123", &["pkg.example.org"], &["tool"]);

        let summaries = list(dir.path()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].package_count, 1);
        assert_eq!(summaries[0].binary_count, 1);
    }

    #[test]
    fn inspect_missing_environment_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = inspect(dir.path(), "missing_000000", false);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn clean_removes_environments_with_zero_packages() {
        let dir = tempfile::tempdir().unwrap();
        make_env(dir.path(), "empty_000000", &[], &[]);
        make_env(dir.path(), "full_111111", &["pkg.example.org"], &["tool"]);

        let removed = clean(dir.path(), CleanCriteria { zero_packages: true, ..Default::default() }).unwrap();
        assert_eq!(removed, vec!["empty_000000".to_owned()]);
        assert!(list(dir.path()).unwrap().iter().any(|s| s.name == "full_111111"));
    }

    #[test]
    fn remove_without_force_refuses_multi_package_environment() {
        let dir = tempfile::tempdir().unwrap();
        make_env(dir.path(), "app_abc123", &["a.example.org", "b.example.org"], &[]);

        let result = remove(dir.path(), "app_abc123", false);
        assert!(matches!(result, Err(Error::ForceRequired(_))));

        remove(dir.path(), "app_abc123", true).unwrap();
        assert!(!dir.path().join("app_abc123").exists());
    }
}
