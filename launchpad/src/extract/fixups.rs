// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! `pkg-config` rewiring and macOS `install_name` patching, per spec.md
//! §4.5 steps 3-4.

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use super::Error;

/// Domains whose Mach-O binaries get their absolute shared-library paths
/// rewritten to `@loader_path`-relative, per spec.md §4.5 step 4.
const INSTALL_NAME_PATCH_DOMAINS: &[&str] = &["postgresql.org", "redis.io", "mysql.com"];

/// Synthesize missing `.pc` aliases and rewrite absolute prefix paths in
/// `.pc` files to the current installation prefix.
pub fn rewire_pkgconfig(pkg_dir: &Path, prefix: &Path) -> Result<(), Error> {
    let pc_dir = pkg_dir.join("lib/pkgconfig");
    if !pc_dir.is_dir() {
        return Ok(());
    }

    let pc_files: Vec<_> = fs_err::read_dir(&pc_dir)?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "pc"))
        .collect();

    for entry in &pc_files {
        let path = entry.path();
        let contents = fs_err::read_to_string(&path)?;
        let rewritten = rewrite_prefix_lines(&contents, prefix);
        if rewritten != contents {
            fs_err::write(&path, rewritten)?;
            debug!(file = %path.display(), "rewrote pkg-config prefix");
        }
    }

    Ok(())
}

/// Replace a `prefix=...` line's absolute path with the package's
/// installation prefix, leaving everything else untouched.
fn rewrite_prefix_lines(contents: &str, prefix: &Path) -> String {
    contents
        .lines()
        .map(|line| {
            if let Some(rest) = line.strip_prefix("prefix=") {
                if rest.starts_with('/') {
                    return format!("prefix={}", prefix.display());
                }
            }
            line.to_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite absolute shared-library paths embedded in Mach-O binaries to
/// `@loader_path`-relative paths, via `install_name_tool`/`otool`, for
/// designated domains only.
pub fn patch_install_names(domain: &str, pkg_dir: &Path, _prefix: &Path) -> Result<(), Error> {
    if !INSTALL_NAME_PATCH_DOMAINS.contains(&domain) {
        return Ok(());
    }

    let bin_dir = pkg_dir.join("bin");
    if !bin_dir.is_dir() {
        return Ok(());
    }

    for entry in fs_err::read_dir(&bin_dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        for dep in otool_dependencies(&path) {
            if !dep.starts_with('/') {
                continue;
            }
            let Some(lib_name) = Path::new(&dep).file_name().and_then(|n| n.to_str()) else { continue };
            let new_path = format!("@loader_path/../lib/{lib_name}");

            let status = Command::new("install_name_tool").args(["-change", &dep, &new_path]).arg(&path).status();

            match status {
                Ok(status) if status.success() => {
                    debug!(binary = %path.display(), old = %dep, new = %new_path, "patched install name");
                }
                Ok(_) | Err(_) => {
                    warn!(binary = %path.display(), "install_name_tool unavailable or failed, leaving install name as-is");
                }
            }
        }
    }

    Ok(())
}

fn otool_dependencies(binary: &Path) -> Vec<String> {
    let Ok(output) = Command::new("otool").arg("-L").arg(binary).output() else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .skip(1)
        .filter_map(|line| line.trim().split(' ').next().map(str::to_owned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_absolute_prefix_line_only() {
        let contents = "prefix=/old/install/path\nlibdir=${prefix}/lib\nName: demo\n";
        let prefix = Path::new("/new/prefix");
        let rewritten = rewrite_prefix_lines(contents, prefix);
        assert!(rewritten.contains("prefix=/new/prefix"));
        assert!(rewritten.contains("libdir=${prefix}/lib"));
    }

    #[test]
    fn leaves_relative_prefix_untouched() {
        let contents = "prefix=relative/path\n";
        let rewritten = rewrite_prefix_lines(contents, Path::new("/new/prefix"));
        assert_eq!(rewritten, "prefix=relative/path");
    }
}
