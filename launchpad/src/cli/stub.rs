// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

use crate::environment::Config;
use crate::shim::{self, RuntimeEnv};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shim(#[from] crate::shim::Error),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "stub", visible_alias = "shim", about = "Regenerate PATH shims for an installed package")]
pub struct Command {
    domain: String,

    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());
    let pkg_dir = prefix.join(&command.domain).join("v");

    let env = RuntimeEnv::for_package(&std::collections::BTreeMap::new(), &pkg_dir);
    let binaries = shim::generate_shims(&pkg_dir, &prefix, &env)?;

    for binary in binaries {
        println!("regenerated shim for {binary}");
    }
    Ok(())
}
