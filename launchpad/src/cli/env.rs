// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use clap::{ArgMatches, Parser, Subcommand};
use thiserror::Error;

use crate::envmanager::{self, CleanCriteria};
use crate::environment::{self, Config};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    EnvManager(#[from] envmanager::Error),
}

pub fn command() -> clap::Command {
    <Args as clap::CommandFactory>::command()
}

#[derive(Debug, Parser)]
#[command(name = "env", about = "Manage per-project environment directories")]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// List environments with size, package count, and binary count.
    List,
    /// Pretty-print one environment's layout and contents.
    Inspect {
        name: String,
        #[arg(long)]
        stubs: bool,
    },
    /// Remove environments older than N days, with zero packages, or
    /// missing a `bin/` directory.
    Clean {
        #[arg(long)]
        older_than_days: Option<u64>,
        #[arg(long)]
        zero_packages: bool,
        #[arg(long)]
        missing_bin: bool,
    },
    /// Remove a specific environment.
    Remove {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
}

pub fn handle(args: &ArgMatches, _config: Config) -> Result<(), Error> {
    let parsed = <Args as clap::FromArgMatches>::from_arg_matches(args).expect("validated by clap");
    let envs_dir = environment::envs_dir();

    match parsed.action {
        Action::List => {
            for summary in envmanager::list(&envs_dir)? {
                println!(
                    "{} ({} pkgs, {} bin, {} bytes)",
                    summary.name, summary.package_count, summary.binary_count, summary.size_bytes
                );
            }
        }
        Action::Inspect { name, stubs } => {
            let detail = envmanager::inspect(&envs_dir, &name, stubs)?;
            println!("{}", detail.summary.name);
            println!("  path: {}", detail.summary.path.display());
            println!("  packages: {}", detail.packages.join(", "));
            println!("  first binaries: {}", detail.first_binaries.join(", "));
            for (binary, contents) in &detail.stub_contents {
                println!("  --- {binary} ---\n{contents}");
            }
        }
        Action::Clean { older_than_days, zero_packages, missing_bin } => {
            let removed = envmanager::clean(&envs_dir, CleanCriteria { older_than_days, zero_packages, missing_bin })?;
            for name in removed {
                println!("removed {name}");
            }
        }
        Action::Remove { name, force } => {
            envmanager::remove(&envs_dir, &name, force)?;
            println!("removed {name}");
        }
    }
    Ok(())
}
