// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Archive extraction and post-extract layout fixups, per spec.md §4.5.

mod archive;
mod fixups;
mod symlinks;

use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;
use tracing::{info, instrument, warn};

pub use fixups::{patch_install_names, rewire_pkgconfig};
pub use symlinks::{synthesize_library_symlinks, version_compat_symlinks, version_directory_symlinks};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive does not look like a supported format")]
    InvalidArchive,
    #[error("no package root found in extracted archive")]
    NoPackageRoot,
}

const LAYOUT_MARKERS: &[&str] = &["bin", "sbin", "lib", "include", "share"];

/// Domains for which an empty `bin`/`sbin` is expected and not a warning
/// (certificate bundles, header-only libraries), per spec.md §4.5.
const COMPLETENESS_EXCEPTIONS: &[&str] = &["curl.se/ca-certs", "certifi.io"];

/// Domains whose `lib/` is scanned into dependents' `lib/` at install
/// time (e.g. an event library a database links against), per spec.md
/// §4.5 step 2.
pub const CROSS_LINK_DOMAINS: &[&str] = &["postgresql.org", "redis.io"];

/// A small table of domains needing version-compatibility symlinks from
/// legacy labels, per spec.md §4.5 step 6. The correctness of individual
/// entries is ecosystem policy the spec deliberately leaves open
/// (spec.md §9); the mechanism is what this table drives.
pub const VERSION_COMPAT_TABLE: &[(&str, &[&str])] = &[("openssl.org", &["v1", "v1.1", "v1.0"])];

/// Extract `archive_path` (a tar stream, optionally gzip/xz compressed)
/// into `{prefix}/{domain}/v{version}/`, then run the fixup pipeline.
#[instrument(skip(archive_path, prefix))]
pub fn extract_and_fixup(archive_path: &Path, format: &str, domain: &str, version: &str, prefix: &Path) -> Result<PathBuf, Error> {
    let scratch = tempfile::tempdir()?;
    archive::unpack(archive_path, format, scratch.path())?;

    let package_root = locate_package_root(scratch.path(), domain, version)?;

    let dest = prefix.join(domain).join(format!("v{version}"));
    if dest.exists() {
        fs_err::remove_dir_all(&dest)?;
    }
    fs_err::create_dir_all(&dest)?;
    archive::copy_tree(&package_root, &dest)?;

    let lib_dir = dest.join("lib");
    if lib_dir.is_dir() {
        symlinks::synthesize_library_symlinks(&lib_dir)?;
        if CROSS_LINK_DOMAINS.contains(&domain) {
            symlinks::cross_package_library_symlinks(domain, &lib_dir, prefix)?;
        }
    }

    fixups::rewire_pkgconfig(&dest, prefix)?;

    if cfg!(target_os = "macos") {
        fixups::patch_install_names(domain, &dest, prefix)?;
    }

    symlinks::version_directory_symlinks(prefix, domain, version)?;

    if let Some((_, labels)) = VERSION_COMPAT_TABLE.iter().find(|(d, _)| *d == domain) {
        symlinks::version_compat_symlinks(prefix, domain, version, labels)?;
    }

    validate_completeness(domain, &dest);

    Ok(dest)
}

/// Locate the package root inside the scratch extraction directory, per
/// spec.md §4.5: `{scratch}/{domain}/v{version}/`, `{scratch}`, then each
/// immediate subdirectory, first one containing a layout marker wins.
fn locate_package_root(scratch: &Path, domain: &str, version: &str) -> Result<PathBuf, Error> {
    let nested = scratch.join(domain).join(format!("v{version}"));
    if has_layout_marker(&nested) {
        return Ok(nested);
    }

    if has_layout_marker(scratch) {
        return Ok(scratch.to_owned());
    }

    if let Ok(entries) = fs_err::read_dir(scratch) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && has_layout_marker(&path) {
                return Ok(path);
            }
        }
    }

    Err(Error::NoPackageRoot)
}

fn has_layout_marker(dir: &Path) -> bool {
    LAYOUT_MARKERS.iter().any(|marker| dir.join(marker).is_dir())
}

/// A package is "complete" if `bin/`/`sbin/` has an executable, unless
/// the domain is a known exception. Incomplete packages warn, never fail.
fn validate_completeness(domain: &str, dest: &Path) {
    if COMPLETENESS_EXCEPTIONS.contains(&domain) {
        return;
    }

    let has_executable = ["bin", "sbin"].iter().any(|dir| {
        fs_err::read_dir(dest.join(dir))
            .ok()
            .is_some_and(|entries| entries.flatten().any(|e| is_executable(&e.path())))
    });

    if !has_executable {
        warn!(domain, "package has no executables in bin/ or sbin/");
    } else {
        info!(domain, "package extraction complete");
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs_err::metadata(path).map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_package_root_prefers_nested_layout() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("demo.org/v1.0.0/bin");
        fs_err::create_dir_all(&nested).unwrap();

        let root = locate_package_root(dir.path(), "demo.org", "1.0.0").unwrap();
        assert_eq!(root, dir.path().join("demo.org/v1.0.0"));
    }

    #[test]
    fn locate_package_root_falls_back_to_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("demo-1.0.0/bin");
        fs_err::create_dir_all(&sub).unwrap();

        let root = locate_package_root(dir.path(), "demo.org", "9.9.9").unwrap();
        assert_eq!(root, dir.path().join("demo-1.0.0"));
    }

    #[test]
    fn locate_package_root_errors_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locate_package_root(dir.path(), "demo.org", "1.0.0").is_err());
    }
}
