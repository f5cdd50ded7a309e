// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Template expansion and timed subprocess execution shared by every
//! stage of the service state machine, per spec.md §4.8.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Expand `{dataDir}`, `{configFile}`, `{logFile}`, `{pidFile}`, `{port}`,
/// `{projectName}`, `{projectDatabase}`, `{dbUsername}`, `{dbPassword}`,
/// `{authMethod}`, plus any instance `config` keys, per spec.md §4.8.
pub fn expand_template(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();
    let mut cursor = 0;

    while let Some((idx, ch)) = chars.next() {
        if ch == '{'
            && let Some(end) = template[idx..].find('}')
        {
            let key = &template[idx + 1..idx + end];
            if let Some(value) = vars.get(key) {
                out.push_str(&template[cursor..idx]);
                out.push_str(value);
                // Advance past the consumed placeholder.
                for _ in 0..end {
                    chars.next();
                }
                cursor = idx + end + 1;
            }
        }
    }
    out.push_str(&template[cursor..]);
    let _ = bytes;
    out
}

/// Split a template into argv after expansion (naive whitespace split;
/// templates in this system never need quoting for the values they
/// carry — paths and identifiers only).
pub fn expand_argv(template: &str, vars: &BTreeMap<String, String>) -> Vec<String> {
    expand_template(template, vars).split_whitespace().map(str::to_owned).collect()
}

/// Run `argv` with a timeout, treating a timed-out process as a failure.
pub async fn run_with_timeout(argv: &[String], timeout: Duration) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome { success: false, code: None, stderr: "empty command".to_owned() };
    };

    let mut command = tokio::process::Command::new(program);
    command.args(args);
    command.stdout(std::process::Stdio::null());
    command.stderr(std::process::Stdio::piped());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutcome { success: false, code: None, stderr: e.to_string() },
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutcome {
            success: output.status.success(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(e)) => CommandOutcome { success: false, code: None, stderr: e.to_string() },
        Err(_elapsed) => CommandOutcome { success: false, code: None, stderr: "timed out".to_owned() },
    }
}

/// Idempotent-provisioning success carve-out, per spec.md §4.8: stderr
/// containing "already exists" or "duplicate" counts as success.
pub fn is_idempotent_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("already exists") || lower.contains("duplicate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_placeholders() {
        let mut vars = BTreeMap::new();
        vars.insert("dataDir".to_owned(), "/env/data".to_owned());
        vars.insert("port".to_owned(), "5432".to_owned());

        let expanded = expand_template("initdb -D {dataDir} --port {port}", &vars);
        assert_eq!(expanded, "initdb -D /env/data --port 5432");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let vars = BTreeMap::new();
        let expanded = expand_template("echo {mystery}", &vars);
        assert_eq!(expanded, "echo {mystery}");
    }

    #[test]
    fn idempotent_failure_detection() {
        assert!(is_idempotent_failure("ERROR: database \"app\" already exists"));
        assert!(is_idempotent_failure("duplicate key value"));
        assert!(!is_idempotent_failure("connection refused"));
    }
}
