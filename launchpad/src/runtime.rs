// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Process-wide `tokio` runtime handle for the synchronous CLI entry
//! points, per SPEC_FULL.md §4.4.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Runtime;

fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to build tokio runtime"))
}

/// Drives `future` to completion on the process-wide runtime. Entry point
/// for the synchronous CLI subcommand handlers, which call into the async
/// orchestrator/service layers without themselves being async.
pub fn block_on<F: Future>(future: F) -> F::Output {
    runtime().block_on(future)
}
