// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Read-only view of the package catalog, per spec.md §4.2.
//!
//! Grounded on the teacher's read-only repository/catalog abstraction
//! (`moss`'s registry providers) and generalized to the in-memory static
//! tables this crate's narrower scope calls for, rather than an on-disk
//! index format.

mod catalog;
mod overrides;

use std::collections::HashMap;

/// Catalog entry metadata for one domain.
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    pub name: String,
    pub description: Option<String>,
    pub programs: Vec<String>,
    pub dependencies: Vec<String>,
    pub companions: Vec<String>,
}

struct CatalogEntry {
    info: PackageInfo,
    /// Latest-first.
    versions: Vec<&'static str>,
}

/// Read-only access to the package catalog.
///
/// A trait so the install orchestrator and dependency expander can be
/// driven by a fixture pantry in tests, matching spec.md §4.8's "test mode"
/// philosophy for every subprocess-touching layer.
pub trait Pantry: Send + Sync {
    /// Resolve an alias to its canonical domain, falling back to the
    /// override table, then the built-in alias table, then the name
    /// unchanged (spec.md §4.2).
    fn resolve_alias(&self, name: &str) -> String;

    /// Latest-first version list for a domain. Empty when unknown.
    fn versions(&self, domain: &str) -> Vec<String>;

    /// Catalog metadata for a domain, if known.
    fn info(&self, domain: &str) -> Option<PackageInfo>;
}

/// The built-in static pantry: a small embedded catalog sufficient to
/// drive the install orchestrator for the well-known developer tools this
/// system targets (languages, databases, CLI utilities).
pub struct StaticPantry {
    catalog: HashMap<&'static str, CatalogEntry>,
    aliases: HashMap<&'static str, &'static str>,
    overrides: HashMap<&'static str, &'static str>,
}

impl Default for StaticPantry {
    fn default() -> Self {
        Self {
            catalog: catalog::build(),
            aliases: catalog::aliases(),
            overrides: overrides::table(),
        }
    }
}

impl StaticPantry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pantry for StaticPantry {
    fn resolve_alias(&self, name: &str) -> String {
        if let Some(domain) = self.overrides.get(name) {
            return (*domain).to_owned();
        }
        if self.catalog.contains_key(name) {
            return name.to_owned();
        }
        if let Some(domain) = self.aliases.get(name) {
            return (*domain).to_owned();
        }
        name.to_owned()
    }

    fn versions(&self, domain: &str) -> Vec<String> {
        self.catalog
            .get(domain)
            .map(|entry| entry.versions.iter().map(|v| (*v).to_owned()).collect())
            .unwrap_or_default()
    }

    fn info(&self, domain: &str) -> Option<PackageInfo> {
        self.catalog.get(domain).map(|entry| entry.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_domain_returns_name_unchanged() {
        let pantry = StaticPantry::new();
        assert_eq!(pantry.resolve_alias("totally-unknown-xyz"), "totally-unknown-xyz");
        assert!(pantry.versions("totally-unknown-xyz").is_empty());
        assert!(pantry.info("totally-unknown-xyz").is_none());
    }

    #[test]
    fn alias_resolves_to_domain() {
        let pantry = StaticPantry::new();
        assert_eq!(pantry.resolve_alias("node"), "nodejs.org");
    }

    #[test]
    fn versions_are_latest_first() {
        let pantry = StaticPantry::new();
        let versions = pantry.versions("nodejs.org");
        assert!(!versions.is_empty());
        let parsed: Vec<_> = versions
            .iter()
            .map(|v| v.split('.').map(|p| p.parse::<u32>().unwrap_or(0)).collect::<Vec<_>>())
            .collect();
        for pair in parsed.windows(2) {
            assert!(pair[0] >= pair[1], "expected latest-first ordering");
        }
    }
}
