// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Error/logging core, per SPEC_FULL.md §4.12: deduplicated stderr lines
//! under shell integration, a signal handler that flushes the progress
//! line before exit, and a summary line per logical unit.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

fn dedup_set() -> &'static Mutex<HashSet<String>> {
    static SET: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    SET.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Installs the process-wide `tracing` subscriber. Verbose mode widens the
/// default filter from `warn` to `debug`; `RUST_LOG` always wins if set.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Emits `message` to stderr at most once per process lifetime when
/// `shell_integration` is set, per spec.md §7; otherwise always emits.
pub fn emit_deduped(shell_integration: bool, message: &str) {
    if shell_integration {
        let mut seen = dedup_set().lock().expect("dedup set lock poisoned");
        if !seen.insert(message.to_owned()) {
            return;
        }
    }
    eprintln!("{message}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// One deduplicated success/failure line per logical unit (package install,
/// service operation), per spec.md §7.
pub fn summary_line(unit: &str, outcome: Outcome, detail: Option<&str>) -> String {
    let marker = match outcome {
        Outcome::Success => "ok",
        Outcome::Failure => "failed",
    };
    match detail {
        Some(detail) => format!("{unit}: {marker} ({detail})"),
        None => format!("{unit}: {marker}"),
    }
}

/// Installs a `SIGINT`/`SIGTERM` handler that clears `progress`'s terminal
/// line before the process exits with the conventional 130/143 code, per
/// spec.md §5.
pub fn install_signal_flush(progress: indicatif::ProgressBar) {
    let progress_for_int = progress.clone();
    let _ = ctrlc_like::set_handler(move |signal| {
        progress_for_int.finish_and_clear();
        std::process::exit(match signal {
            ctrlc_like::Signal::Interrupt => 130,
            ctrlc_like::Signal::Terminate => 143,
        });
    });
}

/// A tiny, dependency-free stand-in for a `ctrlc`-style crate, grounded on
/// the teacher's direct `nix::sys::signal` usage in `crates/container`
/// rather than pulling in a new crate for a single registration.
mod ctrlc_like {
    use std::sync::OnceLock;

    use nix::sys::signal::{self, SigHandler, Signal as NixSignal};

    #[derive(Clone, Copy)]
    pub enum Signal {
        Interrupt,
        Terminate,
    }

    static HANDLER: OnceLock<Box<dyn Fn(Signal) + Send + Sync>> = OnceLock::new();

    extern "C" fn dispatch(raw: i32) {
        let signal = if raw == NixSignal::SIGINT as i32 { Signal::Interrupt } else { Signal::Terminate };
        if let Some(handler) = HANDLER.get() {
            handler(signal);
        }
    }

    /// Registers `handler` for `SIGINT`/`SIGTERM`. Only the first call
    /// takes effect, matching this process's single-installation use.
    pub fn set_handler<F: Fn(Signal) + Send + Sync + 'static>(handler: F) -> Result<(), nix::Error> {
        let _ = HANDLER.set(Box::new(handler));
        // SAFETY: `dispatch` only reads the already-initialized `HANDLER`
        // and calls a `Send + Sync` closure; no unsynchronized state.
        unsafe {
            signal::signal(NixSignal::SIGINT, SigHandler::Handler(dispatch))?;
            signal::signal(NixSignal::SIGTERM, SigHandler::Handler(dispatch))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_formats_success_and_failure() {
        assert_eq!(summary_line("postgresql.org@17", Outcome::Success, None), "postgresql.org@17: ok");
        assert_eq!(summary_line("redis.io@7", Outcome::Failure, Some("timed out")), "redis.io@7: failed (timed out)");
    }
}
