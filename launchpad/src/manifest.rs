// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Project manifest detection and parsing, per SPEC_FULL.md §4.11.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    DepsYaml,
    DotEnv,
    PackageJson,
    ComposerJson,
}

#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub path: PathBuf,
    pub kind: ManifestKind,
    /// Seconds since epoch, used by the activation cache's invalidation
    /// invariant (spec.md §8).
    pub dep_mtime: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub packages: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub services: Vec<String>,
}

/// Scans `dir` for a recognized manifest, in priority order, per
/// SPEC_FULL.md §4.11.
pub fn detect(dir: &Path) -> Option<ManifestSource> {
    const CANDIDATES: &[(&str, ManifestKind)] = &[
        ("deps.yaml", ManifestKind::DepsYaml),
        ("deps.yml", ManifestKind::DepsYaml),
        ("dependencies.yaml", ManifestKind::DepsYaml),
        ("pkgx.yaml", ManifestKind::DepsYaml),
        (".env", ManifestKind::DotEnv),
        ("package.json", ManifestKind::PackageJson),
        ("composer.json", ManifestKind::ComposerJson),
    ];

    for (filename, kind) in CANDIDATES {
        let path = dir.join(filename);
        if let Ok(metadata) = fs_err::metadata(&path) {
            let dep_mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            return Some(ManifestSource { path, kind: *kind, dep_mtime });
        }
    }
    None
}

pub fn parse(source: &ManifestSource) -> Result<Manifest, Error> {
    let contents = fs_err::read_to_string(&source.path)?;
    match source.kind {
        ManifestKind::DepsYaml => parse_deps_yaml(&contents, &source.path),
        ManifestKind::DotEnv => Ok(parse_dot_env(&contents)),
        ManifestKind::PackageJson => parse_package_json(&contents, &source.path),
        ManifestKind::ComposerJson => parse_composer_json(&contents, &source.path),
    }
}

#[derive(Debug, Deserialize, Default)]
struct DepsYaml {
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    services: Vec<String>,
}

fn parse_deps_yaml(contents: &str, path: &Path) -> Result<Manifest, Error> {
    let parsed: DepsYaml = serde_yaml::from_str(contents).map_err(|e| Error::Parse(path.display().to_string(), e.to_string()))?;
    let mut packages = parsed.packages;
    packages.extend(parsed.dependencies);
    Ok(Manifest { packages, env: parsed.env, services: parsed.services })
}

/// `.env`-style `KEY=VALUE` lines: quotes are stripped, `#` comments and
/// blank lines ignored, per SPEC_FULL.md §4.11.
fn parse_dot_env(contents: &str) -> Manifest {
    let mut env = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        let value = strip_quotes(value.trim());
        if !key.is_empty() {
            env.insert(key.to_owned(), value.to_owned());
        }
    }
    Manifest { packages: Vec::new(), env, services: Vec::new() }
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"') || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    launchpad: Option<LaunchpadField>,
    #[serde(default)]
    engines: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct LaunchpadField {
    #[serde(default)]
    dependencies: Vec<String>,
}

fn parse_package_json(contents: &str, path: &Path) -> Result<Manifest, Error> {
    let parsed: PackageJson = serde_json::from_str(contents).map_err(|e| Error::Parse(path.display().to_string(), e.to_string()))?;
    let mut packages: Vec<String> = parsed.launchpad.map(|l| l.dependencies).unwrap_or_default();
    packages.extend(parsed.engines.keys().cloned());
    Ok(Manifest { packages, env: BTreeMap::new(), services: Vec::new() })
}

#[derive(Debug, Deserialize, Default)]
struct ComposerJson {
    #[serde(default)]
    require: BTreeMap<String, String>,
}

/// Maps PHP-ish `vendor/package` composer requirements through the
/// pantry's alias table by keeping only the package segment, which is
/// resolved by the caller's `Pantry::resolve_alias`.
fn parse_composer_json(contents: &str, path: &Path) -> Result<Manifest, Error> {
    let parsed: ComposerJson = serde_json::from_str(contents).map_err(|e| Error::Parse(path.display().to_string(), e.to_string()))?;
    let packages = parsed
        .require
        .keys()
        .filter(|name| *name != "php")
        .map(|name| name.rsplit('/').next().unwrap_or(name).to_owned())
        .collect();
    Ok(Manifest { packages, env: BTreeMap::new(), services: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_deps_yaml_over_dot_env() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("deps.yaml"), "packages: []").unwrap();
        fs_err::write(dir.path().join(".env"), "FOO=bar").unwrap();

        let source = detect(dir.path()).unwrap();
        assert_eq!(source.kind, ManifestKind::DepsYaml);
    }

    #[test]
    fn parses_deps_yaml_packages_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deps.yaml");
        fs_err::write(&path, "packages:\n  - postgresql.org@17\nenv:\n  DB_NAME: app\nservices:\n  - postgres\n").unwrap();

        let source = ManifestSource { path, kind: ManifestKind::DepsYaml, dep_mtime: 0 };
        let manifest = parse(&source).unwrap();
        assert_eq!(manifest.packages, vec!["postgresql.org@17".to_owned()]);
        assert_eq!(manifest.env.get("DB_NAME").map(String::as_str), Some("app"));
        assert_eq!(manifest.services, vec!["postgres".to_owned()]);
    }

    #[test]
    fn parses_dot_env_stripping_quotes_and_comments() {
        let manifest = parse_dot_env("# comment\nDB_NAME=\"app\"\n\nDB_USER='admin'\nDB_PORT=5432\n");
        assert_eq!(manifest.env.get("DB_NAME").map(String::as_str), Some("app"));
        assert_eq!(manifest.env.get("DB_USER").map(String::as_str), Some("admin"));
        assert_eq!(manifest.env.get("DB_PORT").map(String::as_str), Some("5432"));
    }

    #[test]
    fn parses_package_json_launchpad_key() {
        let path = PathBuf::from("package.json");
        let source = ManifestSource { path, kind: ManifestKind::PackageJson, dep_mtime: 0 };
        let contents = r#"{"launchpad": {"dependencies": ["node.org@20"]}}"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("package.json");
        fs_err::write(&file_path, contents).unwrap();
        let source = ManifestSource { path: file_path, ..source };

        let manifest = parse(&source).unwrap();
        assert_eq!(manifest.packages, vec!["node.org@20".to_owned()]);
    }

    #[test]
    fn parses_composer_json_require_skipping_php() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composer.json");
        fs_err::write(&path, r#"{"require": {"php": "^8.2", "monolog/monolog": "^3.0"}}"#).unwrap();

        let source = ManifestSource { path, kind: ManifestKind::ComposerJson, dep_mtime: 0 };
        let manifest = parse(&source).unwrap();
        assert_eq!(manifest.packages, vec!["monolog".to_owned()]);
    }
}
