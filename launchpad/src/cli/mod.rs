// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::env;

use clap::{Arg, ArgAction, Command};
use thiserror::Error;

use crate::environment::Config;

#[path = "env.rs"]
mod env_subcommand;
mod install;
mod list;
mod outdated;
mod service;
mod stub;
mod uninstall;
mod upgrade;

fn command() -> Command {
    Command::new("launchpad")
        .about("Developer-workstation package manager and service supervisor")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .help("Prints additional information about what launchpad is doing")
                .action(ArgAction::SetTrue),
        )
        .arg_required_else_help(true)
        .subcommand(install::command())
        .subcommand(uninstall::command())
        .subcommand(list::command())
        .subcommand(stub::command())
        .subcommand(upgrade::command())
        .subcommand(outdated::command())
        .subcommand(env_subcommand::command())
        .subcommand(service::command())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] install::Error),
    #[error(transparent)]
    Uninstall(#[from] uninstall::Error),
    #[error(transparent)]
    List(#[from] list::Error),
    #[error(transparent)]
    Stub(#[from] stub::Error),
    #[error(transparent)]
    Upgrade(#[from] upgrade::Error),
    #[error(transparent)]
    Outdated(#[from] outdated::Error),
    #[error(transparent)]
    Env(#[from] env_subcommand::Error),
    #[error(transparent)]
    Service(#[from] service::Error),
}

/// Process all CLI arguments, per SPEC_FULL.md's CLI surface detail.
pub fn process() -> Result<(), Error> {
    let args = replace_aliases(env::args());
    let matches = command().get_matches_from(args);

    let config = Config::from_env();
    let verbose = config.verbose || matches.get_flag("verbose");
    crate::logging::init(verbose);

    match matches.subcommand() {
        Some(("install", args)) => install::handle(args, config).map_err(Error::Install),
        Some(("uninstall", args)) => uninstall::handle(args, config).map_err(Error::Uninstall),
        Some(("list", args)) => list::handle(args, config).map_err(Error::List),
        Some(("stub", args)) => stub::handle(args, config).map_err(Error::Stub),
        Some(("upgrade", args)) => upgrade::handle(args, config).map_err(Error::Upgrade),
        Some(("outdated", args)) => outdated::handle(args, config).map_err(Error::Outdated),
        Some(("env", args)) => env_subcommand::handle(args, config).map_err(Error::Env),
        Some(("service", args)) => service::handle(args, config).map_err(Error::Service),
        _ => {
            command().print_help().expect("stdout is writable");
            Ok(())
        }
    }
}

/// Rewrites single-token shortcuts not already covered by clap's
/// `visible_alias`, mirroring the teacher's `replace_aliases`.
fn replace_aliases(args: env::Args) -> Vec<String> {
    const ALIASES: &[(&str, &[&str])] = &[("up", &["upgrade"])];

    let mut args: Vec<String> = args.collect();
    for (alias, replacement) in ALIASES {
        if let Some(pos) = args.iter().position(|a| a == *alias) {
            args.splice(pos..pos + 1, replacement.iter().map(|s| (*s).to_owned()));
            break;
        }
    }
    args
}
