// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Process-wide naming, paths and environment-variable configuration.
//!
//! Mirrors the teacher's `moss::environment` / `moss::Installation`: a
//! single place that knows the project's name and where things live on
//! disk, constructed once and threaded through every subsystem.

use std::env;
use std::path::{Path, PathBuf};

/// Name used for XDG-ish directories and shim/service naming.
pub const NAME: &str = "launchpad";

/// Default per-package install timeout (local).
pub const DEFAULT_PACKAGE_TIMEOUT_SECS: u64 = 5 * 60;
/// Per-package install timeout under CI.
pub const CI_PACKAGE_TIMEOUT_SECS: u64 = 15 * 60;
/// Global install timeout.
pub const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 10 * 60;
/// Post-start command timeout.
pub const POST_START_TIMEOUT_SECS: u64 = 10;
/// Default bounded-concurrency pool width for direct (non-shell) installs.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Resolved, read-once configuration sourced from the process environment.
///
/// Grounded on `moss::Installation::open`: a small struct assembled at
/// startup from argv/env, then passed by value into subsystems rather than
/// read repeatedly from `std::env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root install prefix, `/usr/local` when writable else `~/.local`.
    pub install_path: PathBuf,
    /// Directory that shims are written into (`{install_path}/bin`, `/sbin`).
    pub shim_path: PathBuf,
    pub verbose: bool,
    pub auto_sudo: bool,
    pub auto_add_path: bool,
    pub shell_integration: bool,
    pub force_sqlite: bool,
    pub test_mode: bool,
    pub allow_network: bool,
    pub suppress_install_summary: bool,
    pub is_ci: bool,
}

impl Config {
    /// Build configuration from the process environment, per spec.md §6.
    pub fn from_env() -> Self {
        let install_path = env::var_os("LAUNCHPAD_INSTALL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_install_path);
        let shim_path = env::var_os("LAUNCHPAD_SHIM_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| install_path.clone());

        let is_ci = env_flag("CI") || env_flag("GITHUB_ACTIONS");

        Self {
            install_path,
            shim_path,
            verbose: env_flag("LAUNCHPAD_VERBOSE"),
            auto_sudo: env_flag("LAUNCHPAD_AUTO_SUDO"),
            auto_add_path: env_flag_default("LAUNCHPAD_AUTO_ADD_PATH", true),
            shell_integration: env_flag("LAUNCHPAD_SHELL_INTEGRATION"),
            force_sqlite: env_flag("LAUNCHPAD_FORCE_SQLITE"),
            test_mode: env_flag("LAUNCHPAD_TEST_MODE"),
            allow_network: env_flag_default("LAUNCHPAD_ALLOW_NETWORK", true),
            suppress_install_summary: env_flag("LAUNCHPAD_SUPPRESS_INSTALL_SUMMARY"),
            is_ci,
        }
    }

    /// Per-package timeout, accounting for the CI override in spec.md §4.7.
    pub fn package_timeout_secs(&self) -> u64 {
        if self.is_ci {
            CI_PACKAGE_TIMEOUT_SECS
        } else {
            DEFAULT_PACKAGE_TIMEOUT_SECS
        }
    }

    /// Bounded-concurrency width: 1 under shell integration (sequential,
    /// legible progress), else the configured default.
    pub fn concurrency(&self) -> usize {
        if self.shell_integration {
            1
        } else {
            DEFAULT_CONCURRENCY
        }
    }
}

fn env_flag(key: &str) -> bool {
    env_flag_default(key, false)
}

fn env_flag_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn default_install_path() -> PathBuf {
    let candidate = PathBuf::from("/usr/local");
    if is_writable(&candidate) {
        return candidate;
    }
    home_dir().join(".local")
}

fn is_writable(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let probe = path.join(format!(".{NAME}-write-probe"));
    match fs_err::File::create(&probe) {
        Ok(_) => {
            let _ = fs_err::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// `$HOME` on unix, `%USERPROFILE%` on windows, per spec.md §6.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| home_dir().join(".cache")).join(NAME)
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| home_dir().join(".local/share")).join(NAME)
}

pub fn envs_dir() -> PathBuf {
    data_dir().join("envs")
}

pub fn binaries_cache_dir() -> PathBuf {
    cache_dir().join("binaries/packages")
}

pub fn cache_metadata_path() -> PathBuf {
    cache_dir().join("cache-metadata.json")
}

pub fn shell_cache_path() -> PathBuf {
    cache_dir().join("shell_cache/env_cache")
}

pub fn global_ready_marker() -> PathBuf {
    cache_dir().join("global_ready")
}

/// Current platform triple components used in the download URL (spec.md §6).
pub fn os_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "freebsd") {
        "freebsd"
    } else if cfg!(target_os = "openbsd") {
        "openbsd"
    } else if cfg!(target_os = "netbsd") {
        "netbsd"
    } else {
        "unknown"
    }
}

pub fn arch_name() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else if cfg!(target_arch = "arm") {
        "armv7l"
    } else {
        "unknown"
    }
}
