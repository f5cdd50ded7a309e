// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{ArgMatches, Parser, Subcommand};
use thiserror::Error;

use crate::environment::Config;
use crate::service::ServiceManager;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Service(#[from] crate::service::Error),
}

pub fn command() -> clap::Command {
    <Args as clap::CommandFactory>::command()
}

#[derive(Debug, Parser)]
#[command(name = "service", about = "Start, stop, and inspect supervised services")]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    Start { name: String, #[arg(long, value_name = "dir")] prefix: Option<PathBuf> },
    Stop { name: String },
    Restart { name: String, #[arg(long, value_name = "dir")] prefix: Option<PathBuf> },
    Enable { name: String },
    Disable { name: String },
    Status { name: String },
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let parsed = <Args as clap::FromArgMatches>::from_arg_matches(args).expect("validated by clap");
    let mut manager = ServiceManager::new(config.test_mode);

    match parsed.action {
        Action::Start { name, prefix } => {
            let prefix = prefix.unwrap_or_else(|| config.install_path.clone());
            crate::runtime::block_on(manager.start(&name, &prefix))?;
            println!("{name}: started");
        }
        Action::Stop { name } => {
            crate::runtime::block_on(manager.stop(&name))?;
            println!("{name}: stopped");
        }
        Action::Restart { name, prefix } => {
            let prefix = prefix.unwrap_or_else(|| config.install_path.clone());
            crate::runtime::block_on(manager.restart(&name, &prefix))?;
            println!("{name}: restarted");
        }
        Action::Enable { name } => {
            manager.enable(&name)?;
            println!("{name}: enabled");
        }
        Action::Disable { name } => {
            manager.disable(&name)?;
            println!("{name}: disabled");
        }
        Action::Status { name } => match manager.status(&name) {
            Some(instance) => println!("{name}: {}", instance.status),
            None => println!("{name}: stopped"),
        },
    }
    Ok(())
}
