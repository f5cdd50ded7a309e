// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Library and version-directory symlink synthesis, per spec.md §4.5
//! steps 1, 2, 5, 6.

use std::path::Path;

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;
use tracing::debug;

use super::Error;

static VERSIONED_LIB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(lib\w+)\.(\d+(?:\.\d+)*)\.(dylib|so)$").expect("static regex"));

/// Named compatibility pairs beyond the generic `(lib).(ext)` rule, per
/// spec.md §4.5 step 1.
const NAMED_COMPAT_LINKS: &[(&str, &str)] = &[
    ("libncursesw", "libncurses"),
    ("libpng16.dylib", "libpng.dylib"),
    ("libpcre2-8.0.dylib", "libpcre2-8.dylib"),
    ("libpcre2-8.so.0", "libpcre2-8.so"),
    ("libpcre2-16.0.dylib", "libpcre2-16.dylib"),
    ("libpcre2-16.so.0", "libpcre2-16.so"),
    ("libpcre2-32.0.dylib", "libpcre2-32.dylib"),
    ("libpcre2-32.so.0", "libpcre2-32.so"),
];

/// For every versioned library `lib\w+.N[.N...].{dylib,so}`, create (if
/// absent) the unversioned alias and the major-only alias, plus a small
/// set of named compatibility pairs.
pub fn synthesize_library_symlinks(lib_dir: &Path) -> Result<(), Error> {
    let entries: Vec<_> = fs_err::read_dir(lib_dir)?.filter_map(Result::ok).collect();

    for entry in &entries {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };

        let Some(caps) = VERSIONED_LIB.captures(name) else { continue };
        let lib = &caps[1];
        let version = &caps[2];
        let ext = &caps[3];
        let major = version.split('.').next().unwrap_or(version);

        link_if_absent(lib_dir, name, &format!("{lib}.{ext}"))?;
        link_if_absent(lib_dir, name, &format!("{lib}.{major}.{ext}"))?;
    }

    for (from_stem, to_stem) in NAMED_COMPAT_LINKS {
        link_named_compat(lib_dir, &entries, from_stem, to_stem)?;
    }

    Ok(())
}

fn link_named_compat(lib_dir: &Path, entries: &[fs_err::DirEntry], from_stem: &str, to_stem: &str) -> Result<(), Error> {
    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
        if name.starts_with(from_stem) && name != *to_stem {
            let alias = name.replacen(from_stem, to_stem, 1);
            link_if_absent(lib_dir, &name, &alias)?;
            link_if_absent(lib_dir, &alias, &name)?;
        }
    }
    Ok(())
}

fn link_if_absent(lib_dir: &Path, target_name: &str, link_name: &str) -> Result<(), Error> {
    let link_path = lib_dir.join(link_name);
    if link_path.symlink_metadata().is_ok() {
        return Ok(());
    }
    symlink(target_name, &link_path)?;
    debug!(target = target_name, link = link_name, "synthesized library symlink");
    Ok(())
}

/// Scan sibling installed packages' `lib/` under the same prefix and
/// symlink their libraries into this package's `lib/`, per spec.md §4.5
/// step 2 (used for e.g. a database depending on an event library).
pub fn cross_package_library_symlinks(_domain: &str, lib_dir: &Path, prefix: &Path) -> Result<(), Error> {
    let Ok(domain_dirs) = fs_err::read_dir(prefix) else { return Ok(()) };
    let own_domain_dir = lib_dir.parent().and_then(Path::parent).map(Path::to_path_buf);

    for domain_entry in domain_dirs.flatten() {
        let other_domain_dir = domain_entry.path();
        if !other_domain_dir.is_dir() || own_domain_dir.as_deref() == Some(other_domain_dir.as_path()) {
            continue;
        }

        let Ok(version_dirs) = fs_err::read_dir(&other_domain_dir) else { continue };
        for version_entry in version_dirs.flatten() {
            let other_lib = version_entry.path().join("lib");
            if !other_lib.is_dir() {
                continue;
            }
            let Ok(lib_entries) = fs_err::read_dir(&other_lib) else { continue };
            for lib_entry in lib_entries.flatten() {
                let Some(name) = lib_entry.file_name().to_str().map(str::to_owned) else { continue };
                if !(name.contains(".so") || name.contains(".dylib")) {
                    continue;
                }
                let link_path = lib_dir.join(&name);
                if link_path.symlink_metadata().is_ok() {
                    continue;
                }
                let _ = symlink(&lib_entry.path().to_string_lossy(), &link_path);
            }
        }
    }

    Ok(())
}

/// Point `v`, `v{major}`, `v{major}.{minor}` at the highest installed
/// version matching that major (or major.minor), per spec.md §3/§4.5
/// step 5. Tie-break: lexicographic-descending semver.
pub fn version_directory_symlinks(prefix: &Path, domain: &str, _new_version: &str) -> Result<(), Error> {
    let domain_dir = prefix.join(domain);
    let installed = installed_versions(&domain_dir)?;
    if installed.is_empty() {
        return Ok(());
    }

    let highest = installed.iter().max().cloned();
    if let Some(ref highest) = highest {
        replace_symlink(&domain_dir, "v", &format!("v{highest}"))?;
    }

    let mut by_major: std::collections::HashMap<u64, &Version> = std::collections::HashMap::new();
    let mut by_major_minor: std::collections::HashMap<(u64, u64), &Version> = std::collections::HashMap::new();

    for v in &installed {
        by_major.entry(v.major).and_modify(|cur| if *v > **cur { *cur = v }).or_insert(v);
        by_major_minor
            .entry((v.major, v.minor))
            .and_modify(|cur| if *v > **cur { *cur = v })
            .or_insert(v);
    }

    for (major, v) in by_major {
        replace_symlink(&domain_dir, &format!("v{major}"), &format!("v{v}"))?;
    }
    for ((major, minor), v) in by_major_minor {
        replace_symlink(&domain_dir, &format!("v{major}.{minor}"), &format!("v{v}"))?;
    }

    Ok(())
}

fn installed_versions(domain_dir: &Path) -> Result<Vec<Version>, Error> {
    let mut versions = Vec::new();
    let Ok(entries) = fs_err::read_dir(domain_dir) else { return Ok(versions) };

    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
        let Some(raw) = name.strip_prefix('v') else { continue };
        if let Ok(parsed) = parse_loose_semver(raw) {
            versions.push(parsed);
        }
    }
    Ok(versions)
}

/// `semver::Version` requires exactly three numeric components; pad
/// shorter version strings (`"6.5"`, `"22"`) the way a real pantry's
/// freeform version strings sometimes need.
fn parse_loose_semver(raw: &str) -> Result<Version, semver::Error> {
    let parts: Vec<&str> = raw.splitn(3, '.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => raw.to_owned(),
    };
    Version::parse(&padded)
}

/// Create sibling symlinks from legacy version labels to `v{version}`
/// when absent, per spec.md §4.5 step 6.
pub fn version_compat_symlinks(prefix: &Path, domain: &str, version: &str, labels: &[&str]) -> Result<(), Error> {
    let domain_dir = prefix.join(domain);
    for label in labels {
        replace_symlink_if_absent(&domain_dir, label, &format!("v{version}"))?;
    }
    Ok(())
}

fn replace_symlink(domain_dir: &Path, link_name: &str, target: &str) -> Result<(), Error> {
    let link_path = domain_dir.join(link_name);
    if link_path.symlink_metadata().is_ok() {
        fs_err::remove_file(&link_path)?;
    }
    symlink(target, &link_path)?;
    Ok(())
}

fn replace_symlink_if_absent(domain_dir: &Path, link_name: &str, target: &str) -> Result<(), Error> {
    let link_path = domain_dir.join(link_name);
    if link_path.symlink_metadata().is_ok() {
        return Ok(());
    }
    symlink(target, &link_path)?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_unversioned_and_major_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("libfoo.1.2.3.dylib"), b"x").unwrap();

        synthesize_library_symlinks(dir.path()).unwrap();

        assert!(dir.path().join("libfoo.dylib").symlink_metadata().is_ok());
        assert!(dir.path().join("libfoo.1.dylib").symlink_metadata().is_ok());
    }

    #[test]
    fn pcre2_compat_links_are_unversioned_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("libpcre2-8.0.dylib"), b"x").unwrap();
        fs_err::write(dir.path().join("libpcre2-8.so.0"), b"x").unwrap();

        synthesize_library_symlinks(dir.path()).unwrap();

        assert_eq!(fs_err::read_link(dir.path().join("libpcre2-8.dylib")).unwrap(), Path::new("libpcre2-8.0.dylib"));
        assert_eq!(fs_err::read_link(dir.path().join("libpcre2-8.so")).unwrap(), Path::new("libpcre2-8.so.0"));
    }

    #[test]
    fn version_directory_symlinks_point_at_highest() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::create_dir_all(dir.path().join("demo.org/v1.2.0/bin")).unwrap();
        fs_err::create_dir_all(dir.path().join("demo.org/v1.3.0/bin")).unwrap();

        version_directory_symlinks(dir.path(), "demo.org", "1.3.0").unwrap();

        let v_target = fs_err::read_link(dir.path().join("demo.org/v")).unwrap();
        assert_eq!(v_target, Path::new("v1.3.0"));

        let major_target = fs_err::read_link(dir.path().join("demo.org/v1")).unwrap();
        assert_eq!(major_target, Path::new("v1.3.0"));
    }
}
