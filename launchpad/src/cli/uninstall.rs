// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

use crate::environment::Config;
use crate::pantry::{Pantry, StaticPantry};
use crate::spec::PackageSpec;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{0}' is not installed")]
    NotInstalled(String),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "uninstall", visible_alias = "rm", about = "Remove an installed package")]
pub struct Command {
    packages: Vec<String>,

    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());
    let pantry = Arc::new(StaticPantry::new());

    for spec in &command.packages {
        let domain = pantry.resolve_alias(&PackageSpec::parse(spec).name);
        let domain_dir = prefix.join(&domain);
        if !domain_dir.exists() {
            return Err(Error::NotInstalled(domain));
        }
        fs_err::remove_dir_all(&domain_dir)?;
        println!("{domain}: removed");
    }
    Ok(())
}
