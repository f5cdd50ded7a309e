// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! The embedded static catalog. A real deployment would fetch this from
//! an upstream pantry index; this crate ships a small built-in table
//! covering the handful of domains exercised by the end-to-end scenarios
//! in spec.md §8 and the service catalog in `crate::service::catalog`.

use super::{CatalogEntry, PackageInfo};
use std::collections::HashMap;

macro_rules! entry {
    ($domain:expr, $versions:expr) => {
        entry!($domain, $versions, deps: [], companions: [], programs: [])
    };
    ($domain:expr, $versions:expr, deps: [$($dep:expr),* $(,)?], companions: [$($companion:expr),* $(,)?], programs: [$($program:expr),* $(,)?]) => {
        (
            $domain,
            CatalogEntry {
                info: PackageInfo {
                    name: $domain.to_owned(),
                    description: None,
                    programs: vec![$($program.to_owned()),*],
                    dependencies: vec![$($dep.to_owned()),*],
                    companions: vec![$($companion.to_owned()),*],
                },
                versions: vec![$($versions),*],
            },
        )
    };
}

pub(super) fn build() -> HashMap<&'static str, CatalogEntry> {
    HashMap::from([
        entry!(
            "nodejs.org",
            ["22.5.1", "22.4.0", "20.16.0", "18.20.3"],
            deps: [],
            companions: ["npmjs.com"],
            programs: ["node"]
        ),
        entry!("npmjs.com", ["10.8.2", "10.8.1", "9.9.3"], deps: [], companions: [], programs: ["npm", "npx"]),
        entry!(
            "python.org",
            ["3.12.4", "3.11.9", "3.10.14"],
            deps: ["openssl.org^1.1"],
            companions: ["pip.pypa.io"],
            programs: ["python3", "python"]
        ),
        entry!("pip.pypa.io", ["24.2", "24.1.2"], deps: [], companions: [], programs: ["pip3", "pip"]),
        entry!(
            "openssl.org",
            ["3.3.1", "3.2.2", "1.1.1w"],
            deps: [],
            companions: [],
            programs: []
        ),
        entry!(
            "postgresql.org",
            ["16.3.0", "15.7.0", "14.12.0"],
            deps: ["gnu.org/libevent"],
            companions: [],
            programs: ["postgres", "psql", "initdb", "pg_ctl", "createdb"]
        ),
        entry!("gnu.org/libevent", ["2.1.12"], deps: [], companions: [], programs: []),
        entry!(
            "redis.io",
            ["7.2.5", "7.0.15"],
            deps: [],
            companions: [],
            programs: ["redis-server", "redis-cli"]
        ),
        entry!(
            "mysql.com",
            ["8.4.1", "8.0.37"],
            deps: [],
            companions: [],
            programs: ["mysqld", "mysql", "mysqladmin"]
        ),
        entry!(
            "ncurses.org",
            ["6.5", "6.4"],
            deps: [],
            companions: [],
            programs: []
        ),
        entry!(
            "pcre2.org",
            ["10.44", "10.43"],
            deps: [],
            companions: [],
            programs: []
        ),
        entry!(
            "pkgconf.org",
            ["2.3.0", "2.2.0"],
            deps: [],
            companions: [],
            programs: ["pkg-config"]
        ),
        // Hard-coded compatibility: version resolution fallback in
        // dependency expansion maps some `^1.1` style constraints onto
        // a 3.x line for a package whose pantry entry only lists 3.x.
        entry!("pkg.example.org", ["3.5.0", "3.4.0", "1.0.2"], deps: [], companions: [], programs: ["pkg"]),
    ])
}

pub(super) fn aliases() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("node", "nodejs.org"),
        ("nodejs", "nodejs.org"),
        ("npm", "npmjs.com"),
        ("python", "python.org"),
        ("python3", "python.org"),
        ("py", "python.org"),
        ("pip", "pip.pypa.io"),
        ("postgres", "postgresql.org"),
        ("postgresql", "postgresql.org"),
        ("psql", "postgresql.org"),
        ("redis", "redis.io"),
        ("mysql", "mysql.com"),
        ("openssl", "openssl.org"),
        ("ncurses", "ncurses.org"),
        ("pcre2", "pcre2.org"),
        ("pkg-config", "pkgconf.org"),
        ("pkgconf", "pkgconf.org"),
        ("pkg", "pkg.example.org"),
    ])
}
