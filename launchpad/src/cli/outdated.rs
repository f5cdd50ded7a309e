// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

use crate::environment::Config;
use crate::pantry::{Pantry, StaticPantry};

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "outdated", about = "Show installed packages with a newer version available")]
pub struct Command {
    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());
    let pantry = Arc::new(StaticPantry::new());

    if !prefix.exists() {
        return Ok(());
    }

    for entry in fs_err::read_dir(&prefix)?.filter_map(Result::ok) {
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let domain = entry.file_name().to_string_lossy().into_owned();
        let Some(latest) = pantry.versions(&domain).into_iter().next() else {
            continue;
        };

        let current_link = entry.path().join("v");
        let Some(installed) = fs_err::read_link(&current_link)
            .ok()
            .and_then(|target| target.to_str().map(|s| s.trim_start_matches('v').to_owned()))
        else {
            continue;
        };

        if installed != latest {
            println!("{domain}: {installed} -> {latest}");
        }
    }
    Ok(())
}
