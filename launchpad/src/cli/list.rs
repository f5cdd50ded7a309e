// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use thiserror::Error;

use crate::environment::Config;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn command() -> clap::Command {
    Command::command()
}

#[derive(Debug, Parser)]
#[command(name = "list", visible_alias = "ls", about = "List installed packages")]
pub struct Command {
    #[arg(long, value_name = "dir")]
    prefix: Option<PathBuf>,
}

pub fn handle(args: &ArgMatches, config: Config) -> Result<(), Error> {
    let command = Command::from_arg_matches(args).expect("validated by clap");
    let prefix = command.prefix.unwrap_or_else(|| config.install_path.clone());

    if !prefix.exists() {
        return Ok(());
    }

    let mut domains: Vec<String> = fs_err::read_dir(&prefix)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !["bin", "sbin", "lib", "include", "share", "libexec", "var", "etc", "pkgs"].contains(&name.as_str()))
        .collect();
    domains.sort();

    for domain in domains {
        let current_link = prefix.join(&domain).join("v");
        let version = fs_err::read_link(&current_link)
            .ok()
            .and_then(|target| target.to_str().map(|s| s.trim_start_matches('v').to_owned()))
            .unwrap_or_else(|| "unknown".to_owned());
        println!("{domain}@{version}");
    }
    Ok(())
}
