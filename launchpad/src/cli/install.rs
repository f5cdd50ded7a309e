// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::cache::{CacheManager, HttpFetcher};
use crate::environment::Config;
use crate::install::{InstallOptions, NoopServiceHook, Orchestrator};
use crate::logging;
use crate::pantry::StaticPantry;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] crate::install::Error),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "install", visible_alias = "i", about = "Install one or more packages")]
pub struct Command {
    /// Packages to install, e.g. `node.org@20` or `postgresql.org^17`.
    #[arg(required = true)]
    packages: Vec<String>,

    /// Install into this prefix instead of the configured default.
    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,

    /// Skip transitive dependency/companion installation.
    #[arg(long)]
    no_deps: bool,

    /// Reinstall even if the ready marker is present.
    #[arg(short, long)]
    force: bool,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());

    let cache = CacheManager::<HttpFetcher>::new(crate::environment::binaries_cache_dir());
    let pantry = Arc::new(StaticPantry::new());
    let hook = Arc::new(NoopServiceHook);
    let orchestrator = Orchestrator::new(pantry, cache, config.clone(), hook);

    let opts = InstallOptions {
        install_dependencies: !command.no_deps,
        force: command.force,
        package_timeout: std::time::Duration::from_secs(config.package_timeout_secs()),
        ..Default::default()
    };

    let report = crate::runtime::block_on(orchestrator.install(&command.packages, &prefix, opts))?;

    for result in &report.results {
        let outcome = match &result.outcome {
            crate::install::PackageOutcome::Installed { .. } => logging::Outcome::Success,
            _ => logging::Outcome::Failure,
        };
        let unit = format!("{}@{}", result.domain, result.version);
        info!("{}", logging::summary_line(&unit, outcome, None));
    }
    for warning in &report.warnings {
        logging::emit_deduped(config.shell_integration, warning);
    }

    if !report.requested_all_succeeded(&command.packages) {
        std::process::exit(1);
    }
    Ok(())
}
