// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

use launchpad::cli;

fn main() {
    if let Err(e) = cli::process() {
        eprintln!("launchpad: {e}");
        std::process::exit(1);
    }
}
