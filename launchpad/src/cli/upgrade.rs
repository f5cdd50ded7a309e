// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use thiserror::Error;
use tracing::info;

use crate::cache::{CacheManager, HttpFetcher};
use crate::environment::Config;
use crate::install::{InstallOptions, NoopServiceHook, Orchestrator};
use crate::logging;
use crate::pantry::{Pantry, StaticPantry};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] crate::install::Error),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "upgrade", visible_alias = "update", about = "Upgrade installed packages to their latest version")]
pub struct Command {
    /// Limit the upgrade to these packages; defaults to every installed one.
    packages: Vec<String>,

    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());
    let pantry = Arc::new(StaticPantry::new());

    let domains = if command.packages.is_empty() { installed_domains(&prefix) } else { command.packages.clone() };

    let specs: Vec<String> = domains
        .iter()
        .filter_map(|domain| pantry.versions(domain).into_iter().next().map(|latest| format!("{domain}@{latest}")))
        .collect();

    if specs.is_empty() {
        return Ok(());
    }

    let cache = CacheManager::<HttpFetcher>::new(crate::environment::binaries_cache_dir());
    let hook = Arc::new(NoopServiceHook);
    let orchestrator = Orchestrator::new(pantry, cache, config.clone(), hook);

    let opts = InstallOptions {
        force: true,
        package_timeout: std::time::Duration::from_secs(config.package_timeout_secs()),
        ..Default::default()
    };
    let report = crate::runtime::block_on(orchestrator.install(&specs, &prefix, opts))?;

    for result in &report.results {
        let outcome = match &result.outcome {
            crate::install::PackageOutcome::Installed { .. } => logging::Outcome::Success,
            _ => logging::Outcome::Failure,
        };
        info!("{}", logging::summary_line(&format!("{}@{}", result.domain, result.version), outcome, None));
    }
    Ok(())
}

fn installed_domains(prefix: &std::path::Path) -> Vec<String> {
    let Ok(entries) = fs_err::read_dir(prefix) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !["bin", "sbin", "lib", "include", "share", "libexec", "var", "etc", "pkgs"].contains(&name.as_str()))
        .collect()
}
