// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! `launchpad` is a developer-workstation package manager and service
//! supervisor: it resolves version constraints against a static pantry,
//! fetches and caches prebuilt binary archives, lays them out under a
//! versioned prefix, generates PATH shims, and supervises a small set of
//! auto-startable database/cache services.

pub mod activate;
pub mod activation;
pub mod cache;
pub mod cli;
pub mod deps;
pub mod envmanager;
pub mod environment;
pub mod extract;
pub mod install;
pub mod logging;
pub mod manifest;
pub mod pantry;
pub mod resolver;
pub mod runtime;
pub mod service;
pub mod shim;
pub mod spec;

pub use environment::Config;
pub use install::{InstallOptions, InstallReport, Orchestrator};
pub use spec::{PackageSpec, ResolvedPackage};
