// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Shim generator, per spec.md §4.6.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error as ThisError;
use tracing::{debug, instrument};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime environment a shim exports before `exec`ing the real binary.
#[derive(Debug, Default, Clone)]
pub struct RuntimeEnv(pub BTreeMap<String, String>);

impl RuntimeEnv {
    /// Union of the package's own environment with platform-specific
    /// library search paths (on Linux, `{prefix}/lib` is appended to
    /// `LD_LIBRARY_PATH`).
    pub fn for_package(own_env: &BTreeMap<String, String>, prefix: &Path) -> Self {
        let mut env = own_env.clone();

        if cfg!(target_os = "linux") {
            let lib_path = prefix.join("lib");
            let key = "LD_LIBRARY_PATH".to_owned();
            let existing = env.get(&key).cloned().unwrap_or_default();
            let combined = if existing.is_empty() {
                lib_path.display().to_string()
            } else {
                format!("{}:{existing}", lib_path.display())
            };
            env.insert(key, combined);
        } else if cfg!(target_os = "macos") {
            let lib_path = prefix.join("lib");
            let key = "DYLD_LIBRARY_PATH".to_owned();
            let existing = env.get(&key).cloned().unwrap_or_default();
            let combined = if existing.is_empty() {
                lib_path.display().to_string()
            } else {
                format!("{}:{existing}", lib_path.display())
            };
            env.insert(key, combined);
        }

        Self(env)
    }
}

/// Generate shims for every executable in `{pkg_dir}/bin` and
/// `{pkg_dir}/sbin`, writing launchers into `{shim_prefix}/bin` and
/// `{shim_prefix}/sbin`. Overwrites on every call (regenerated on every
/// install), preserving mode `0o755`.
#[instrument(skip(env))]
pub fn generate_shims(pkg_dir: &Path, shim_prefix: &Path, env: &RuntimeEnv) -> Result<Vec<String>, Error> {
    let mut written = Vec::new();

    for subdir in ["bin", "sbin"] {
        let src_dir = pkg_dir.join(subdir);
        if !src_dir.is_dir() {
            continue;
        }

        let dest_dir = shim_prefix.join(subdir);
        fs_err::create_dir_all(&dest_dir)?;

        for entry in fs_err::read_dir(&src_dir)?.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_executable(&path) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };

            let dest = dest_dir.join(name);
            write_shim(&dest, &path, env)?;
            written.push(name.to_owned());
            debug!(binary = name, "generated shim");
        }
    }

    Ok(written)
}

fn write_shim(dest: &Path, real_binary: &Path, env: &RuntimeEnv) -> Result<(), Error> {
    let mut script = String::from("#!/bin/sh\n# Generated by launchpad. Do not edit; regenerated on every install.\n");
    for (key, value) in &env.0 {
        script.push_str(&format!("export {key}={}\n", shell_quote(value)));
    }
    script.push_str(&format!("exec {} \"$@\"\n", shell_quote(&real_binary.display().to_string())));

    fs_err::write(dest, script)?;
    set_executable(dest)?;
    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs_err::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_executable_shim_that_execs_real_binary() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("pkg");
        fs_err::create_dir_all(pkg_dir.join("bin")).unwrap();
        let real_bin = pkg_dir.join("bin/tool");
        fs_err::write(&real_bin, "#!/bin/sh\necho hi\n").unwrap();
        set_executable(&real_bin).unwrap();

        let shim_prefix = dir.path().join("shims");
        let env = RuntimeEnv::for_package(&BTreeMap::new(), &pkg_dir);

        let written = generate_shims(&pkg_dir, &shim_prefix, &env).unwrap();
        assert_eq!(written, vec!["tool".to_owned()]);

        let contents = fs_err::read_to_string(shim_prefix.join("bin/tool")).unwrap();
        assert!(contents.contains("exec"));
        assert!(contents.contains("tool"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs_err::metadata(shim_prefix.join("bin/tool")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
