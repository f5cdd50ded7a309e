// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Platform-facing primitives for the service supervisor: launchd/systemd
//! unit-file templating, process spawn/signal, and the fallback direct
//! start path, per spec.md §4.8. Kept as its own narrow crate the way the
//! teacher workspace carves OS-primitive code out of `crates/container`
//! rather than scattering `cfg(target_os = ...)` through the main crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("platform command '{0}' exited with status {1}")]
    CommandFailed(String, i32),
    #[error("platform command '{0}' is unavailable")]
    CommandUnavailable(String),
    #[error("unsupported platform for this operation")]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Macos,
    Linux,
    Other,
}

pub fn current() -> Platform {
    if cfg!(target_os = "macos") {
        Platform::Macos
    } else if cfg!(target_os = "linux") {
        Platform::Linux
    } else {
        Platform::Other
    }
}

/// A rendered, not-yet-written unit file.
#[derive(Debug, Clone)]
pub struct UnitFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Render a launchd property list for `label` running `program` with
/// `args`, per spec.md §4.8.
pub fn launchd_plist(label: &str, program: &str, args: &[String], env: &BTreeMap<String, String>, working_dir: Option<&Path>) -> UnitFile {
    let program_args = std::iter::once(program.to_owned())
        .chain(args.iter().cloned())
        .map(|a| format!("        <string>{}</string>", xml_escape(&a)))
        .collect::<Vec<_>>()
        .join("\n");

    let env_xml = if env.is_empty() {
        String::new()
    } else {
        let entries = env
            .iter()
            .map(|(k, v)| format!("        <key>{}</key>\n        <string>{}</string>", xml_escape(k), xml_escape(v)))
            .collect::<Vec<_>>()
            .join("\n");
        format!("    <key>EnvironmentVariables</key>\n    <dict>\n{entries}\n    </dict>\n")
    };

    let working_dir_xml = working_dir
        .map(|dir| format!("    <key>WorkingDirectory</key>\n    <string>{}</string>\n", xml_escape(&dir.display().to_string())))
        .unwrap_or_default();

    let contents = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
{program_args}
    </array>
{env_xml}{working_dir_xml}    <key>RunAtLoad</key>
    <false/>
    <key>KeepAlive</key>
    <false/>
</dict>
</plist>
"#
    );

    let path = home_library_agents().join(format!("{label}.plist"));
    UnitFile { path, contents }
}

/// Render a systemd user unit for `description` running `exec_start`,
/// per spec.md §4.8.
pub fn systemd_unit(unit_name: &str, description: &str, exec_start: &str, env: &BTreeMap<String, String>) -> UnitFile {
    let env_lines = env.iter().map(|(k, v)| format!("Environment={k}={v}")).collect::<Vec<_>>().join("\n");

    let contents = format!(
        "[Unit]\nDescription={description}\n\n[Service]\nType=simple\nExecStart={exec_start}\n{env_lines}\nRestart=no\n\n[Install]\nWantedBy=default.target\n"
    );

    let path = home_systemd_user().join(format!("{unit_name}.service"));
    UnitFile { path, contents }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn home_library_agents() -> PathBuf {
    home_dir().join("Library/LaunchAgents")
}

fn home_systemd_user() -> PathBuf {
    home_dir().join(".config/systemd/user")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

/// Write the unit file to disk, creating its parent directory.
pub fn write_unit(unit: &UnitFile) -> Result<(), Error> {
    if let Some(parent) = unit.path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(&unit.path, &unit.contents)?;
    Ok(())
}

/// `launchctl load` / `systemctl --user enable --now`, per platform.
pub fn load_unit(unit: &UnitFile, unit_name: &str) -> Result<(), Error> {
    match current() {
        Platform::Macos => run_checked("launchctl", &["load", "-w", &unit.path.to_string_lossy()]),
        Platform::Linux => run_checked("systemctl", &["--user", "enable", "--now", &format!("{unit_name}.service")]),
        Platform::Other => Err(Error::Unsupported),
    }
}

pub fn unload_unit(unit: &UnitFile, unit_name: &str) -> Result<(), Error> {
    match current() {
        Platform::Macos => run_checked("launchctl", &["unload", &unit.path.to_string_lossy()]),
        Platform::Linux => run_checked("systemctl", &["--user", "disable", "--now", &format!("{unit_name}.service")]),
        Platform::Other => Err(Error::Unsupported),
    }
}

pub fn enable_unit(unit_name: &str) -> Result<(), Error> {
    match current() {
        Platform::Macos => Ok(()), // launchd: loading with -w is enabling.
        Platform::Linux => run_checked("systemctl", &["--user", "enable", &format!("{unit_name}.service")]),
        Platform::Other => Err(Error::Unsupported),
    }
}

pub fn disable_unit(unit_name: &str) -> Result<(), Error> {
    match current() {
        Platform::Macos => Ok(()),
        Platform::Linux => run_checked("systemctl", &["--user", "disable", &format!("{unit_name}.service")]),
        Platform::Other => Err(Error::Unsupported),
    }
}

fn run_checked(program: &str, args: &[&str]) -> Result<(), Error> {
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|_| Error::CommandUnavailable(program.to_owned()))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed(program.to_owned(), status.code().unwrap_or(-1)))
    }
}

/// Fallback: start the service directly (no platform unit), used on
/// macOS when the launchd load fails, per spec.md §4.8.
pub fn spawn_detached(program: &Path, args: &[String], env: &BTreeMap<String, String>, log_file: Option<&Path>) -> Result<u32, Error> {
    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }

    if let Some(log_file) = log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(log_file)?;
        command.stdout(Stdio::from(file));
    } else {
        command.stdout(Stdio::null());
    }
    command.stderr(Stdio::null());
    command.stdin(Stdio::null());

    let child = command.spawn()?;
    Ok(child.id())
}

/// Send `SIGTERM` (escalating to `SIGKILL` is the caller's decision) to a
/// PID, used for per-package/per-command timeout enforcement and service
/// shutdown.
pub fn terminate(pid: u32) -> Result<(), Error> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|_| Error::CommandFailed("kill".to_owned(), -1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launchd_plist_contains_label_and_program() {
        let unit = launchd_plist("com.launchpad.postgres", "/usr/local/bin/postgres", &["-D".to_owned(), "/data".to_owned()], &BTreeMap::new(), None);
        assert!(unit.contents.contains("com.launchpad.postgres"));
        assert!(unit.contents.contains("/usr/local/bin/postgres"));
        assert!(unit.contents.contains("-D"));
    }

    #[test]
    fn systemd_unit_contains_exec_start() {
        let unit = systemd_unit("launchpad-postgres", "Launchpad postgres", "/usr/local/bin/postgres -D /data", &BTreeMap::new());
        assert!(unit.contents.contains("ExecStart=/usr/local/bin/postgres -D /data"));
    }
}
