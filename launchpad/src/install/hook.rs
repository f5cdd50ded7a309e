// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! The orchestrator/service-supervisor seam, per spec.md §9: "installing
//! a database package triggers service init" is a dynamic-import-shaped
//! circular dependency in the original system. Here it is an explicit
//! injected collaborator: the orchestrator takes a `ServiceHook` at
//! construction, the default binds to the real service manager, tests
//! inject a stub.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ServiceHook: Send + Sync {
    /// Called once per newly-installed, service-associated domain.
    /// Initializes and starts the service if `services.autoStart` (the
    /// caller's policy, not this trait's concern) is set.
    fn on_package_installed<'a>(&'a self, service_name: &'a str, prefix: &'a Path) -> BoxFuture<'a, Result<(), String>>;
}

/// Test/CLI-opt-out stub: never starts anything.
pub struct NoopServiceHook;

impl ServiceHook for NoopServiceHook {
    fn on_package_installed<'a>(&'a self, _service_name: &'a str, _prefix: &'a Path) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

/// Binds to the real `crate::service` state machine.
pub struct RealServiceHook {
    pub manager: std::sync::Arc<tokio::sync::Mutex<crate::service::ServiceManager>>,
    pub auto_start: bool,
}

impl ServiceHook for RealServiceHook {
    fn on_package_installed<'a>(&'a self, service_name: &'a str, prefix: &'a Path) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            if !self.auto_start {
                return Ok(());
            }
            let prefix: PathBuf = prefix.to_owned();
            let mut manager = self.manager.lock().await;
            manager.start(service_name, &prefix).await.map_err(|e| e.to_string())
        })
    }
}
