// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Version constraint resolution against a pantry-supplied version list,
//! per spec.md §4.1 and the invariant in spec.md §8:
//!
//! `resolve(V, "^1.21") = max{v ∈ V : v.major = 1 ∧ v ≥ 1.21.0}`

use regex::Regex;

/// A version broken into numeric components, with missing components
/// defaulting to 0 per spec.md §4.1. Non-numeric suffixes (`1w`) are
/// parsed as their leading integer; unparseable components reject the
/// whole version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Components {
    major: u64,
    minor: u64,
    patch: u64,
    rest: u64,
}

impl Components {
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('.');
        let major = parse_leading_int(parts.next().unwrap_or("0"))?;
        let minor = parts.next().map(parse_leading_int).transpose()?.unwrap_or(0);
        let patch = parts.next().map(parse_leading_int).transpose()?.unwrap_or(0);
        let rest = parts.next().map(parse_leading_int).transpose()?.unwrap_or(0);
        Some(Self { major, minor, patch, rest })
    }
}

fn parse_leading_int(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { digits.parse().ok() }
}

/// Resolve `constraint` against `versions` (assumed latest-first, as the
/// pantry adapter promises). Returns `None` when the list is empty or
/// nothing matches; never panics.
pub fn resolve(versions: &[String], constraint: &str) -> Option<String> {
    if versions.is_empty() {
        return None;
    }

    let constraint = constraint.trim();

    if constraint.is_empty() || constraint == "latest" || constraint == "*" {
        return versions.first().cloned();
    }

    if let Some(exact) = constraint.strip_prefix('=') {
        return versions.iter().find(|v| v.as_str() == exact).cloned();
    }

    if let Some(caret) = constraint.strip_prefix('^') {
        return resolve_caret(versions, caret);
    }

    if let Some(tilde) = constraint.strip_prefix('~') {
        return resolve_tilde(versions, tilde);
    }

    if let Some(rest) = constraint.strip_prefix(">=") {
        return resolve_cmp(versions, rest, |v, c| v >= c);
    }
    if let Some(rest) = constraint.strip_prefix("<=") {
        return resolve_cmp(versions, rest, |v, c| v <= c);
    }
    if let Some(rest) = constraint.strip_prefix('>') {
        return resolve_cmp(versions, rest, |v, c| v > c);
    }
    if let Some(rest) = constraint.strip_prefix('<') {
        return resolve_cmp(versions, rest, |v, c| v < c);
    }

    if let Some((a, b)) = constraint.split_once(" - ") {
        let lo = Components::parse(a.trim())?;
        let hi = Components::parse(b.trim())?;
        return versions
            .iter()
            .filter(|v| Components::parse(v).is_some_and(|c| c >= lo && c <= hi))
            .max_by_key(|v| Components::parse(v))
            .cloned();
    }

    if constraint.contains('x') || constraint.contains('X') {
        return resolve_x_pattern(versions, constraint);
    }

    if Components::parse(constraint).is_some() {
        // A full `x.y.z` literal is an exact match or nothing — it must
        // never fall through to the prefix fallback below, since
        // `starts_with` would happily match "1.2.4" against "1.2.40".
        if constraint.split('.').count() >= 3 {
            return versions.iter().find(|v| v.as_str() == constraint).cloned();
        }
        if versions.iter().any(|v| v == constraint) {
            return Some(constraint.to_owned());
        }
    }

    // Fallback: longest-prefix match, e.g. "3" matches "3.11.4". Must not
    // short-circuit ahead of the numeric-constraint branches above.
    resolve_prefix(versions, constraint)
}

fn resolve_caret(versions: &[String], caret: &str) -> Option<String> {
    let base = Components::parse(caret)?;
    versions
        .iter()
        .filter(|v| Components::parse(v).is_some_and(|c| c.major == base.major && c >= base))
        .max_by_key(|v| Components::parse(v))
        .cloned()
}

fn resolve_tilde(versions: &[String], tilde: &str) -> Option<String> {
    let base = Components::parse(tilde)?;
    versions
        .iter()
        .filter(|v| {
            Components::parse(v)
                .is_some_and(|c| c.major == base.major && c.minor == base.minor && c.patch >= base.patch)
        })
        .max_by_key(|v| Components::parse(v))
        .cloned()
}

fn resolve_cmp(versions: &[String], literal: &str, cmp: impl Fn(Components, Components) -> bool) -> Option<String> {
    let target = Components::parse(literal)?;
    versions
        .iter()
        .filter(|v| Components::parse(v).is_some_and(|c| cmp(c, target)))
        .max_by_key(|v| Components::parse(v))
        .cloned()
}

/// Matches domains such as `1.2.x`, where each `x`/`X` component becomes
/// `\d+` in the compiled pattern (e.g. `1.2.x` → `^1\.2\.\d+$`).
fn resolve_x_pattern(versions: &[String], pattern: &str) -> Option<String> {
    let escaped = regex::escape(pattern).replace(['x', 'X'], r"\d+").replace(r"\\d\+", r"\d+");
    // `regex::escape` would have escaped the literal 'x'/'X' characters too
    // (they need no escaping), so the naive replace above is safe: only the
    // placeholders we just inserted contain a backslash.
    let re = Regex::new(&format!("^{escaped}$")).ok()?;
    versions
        .iter()
        .filter(|v| re.is_match(v))
        .max_by_key(|v| Components::parse(v))
        .cloned()
}

fn resolve_prefix(versions: &[String], prefix: &str) -> Option<String> {
    versions
        .iter()
        .filter(|v| v.starts_with(prefix))
        .max_by_key(|v| Components::parse(v))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_is_none() {
        assert_eq!(resolve(&[], "^1.0"), None);
    }

    #[test]
    fn latest_and_star_take_first() {
        let versions = v(&["3.5.0", "3.4.0", "1.0.2"]);
        assert_eq!(resolve(&versions, ""), Some("3.5.0".into()));
        assert_eq!(resolve(&versions, "latest"), Some("3.5.0".into()));
        assert_eq!(resolve(&versions, "*"), Some("3.5.0".into()));
    }

    #[test]
    fn caret_picks_highest_matching_major() {
        let versions = v(&["22.5.1", "22.4.0", "20.9.0"]);
        assert_eq!(resolve(&versions, "^22.4"), Some("22.5.1".into()));
    }

    #[test]
    fn caret_respects_invariant_example() {
        let versions = v(&["1.25.0", "1.21.3", "1.21.0", "1.20.9", "2.0.0"]);
        assert_eq!(resolve(&versions, "^1.21"), Some("1.25.0".into()));
    }

    #[test]
    fn tilde_pins_minor() {
        let versions = v(&["1.4.9", "1.4.2", "1.5.0"]);
        assert_eq!(resolve(&versions, "~1.4.3"), Some("1.4.9".into()));
    }

    #[test]
    fn gte_lte_gt_lt() {
        let versions = v(&["3.0.0", "2.5.0", "2.0.0", "1.0.0"]);
        assert_eq!(resolve(&versions, ">=2.0.0"), Some("3.0.0".into()));
        assert_eq!(resolve(&versions, "<=2.5.0"), Some("2.5.0".into()));
        assert_eq!(resolve(&versions, "<2.0.0"), Some("1.0.0".into()));
        assert_eq!(resolve(&versions, ">2.5.0"), Some("3.0.0".into()));
    }

    #[test]
    fn range_constraint() {
        let versions = v(&["3.0.0", "2.5.0", "2.0.0", "1.0.0"]);
        assert_eq!(resolve(&versions, "1.0.0 - 2.5.0"), Some("2.5.0".into()));
    }

    #[test]
    fn x_pattern() {
        let versions = v(&["1.2.9", "1.2.3", "1.3.0"]);
        assert_eq!(resolve(&versions, "1.2.x"), Some("1.2.9".into()));
    }

    #[test]
    fn prefix_fallback_does_not_shortcircuit_numeric() {
        let versions = v(&["3.11.4", "3.2.0"]);
        assert_eq!(resolve(&versions, "3"), Some("3.11.4".into()));
    }

    #[test]
    fn no_match_is_none() {
        let versions = v(&["1.0.0"]);
        assert_eq!(resolve(&versions, "^2.0"), None);
    }

    #[test]
    fn exact_version_absent_does_not_fall_back_to_prefix() {
        let versions = v(&["1.2.40"]);
        assert_eq!(resolve(&versions, "1.2.4"), None);
    }

    #[test]
    fn non_numeric_suffix_parsed_as_leading_int() {
        let versions = v(&["1.21.4", "1.20.0"]);
        assert_eq!(resolve(&versions, "^1w"), Some("1.21.4".into()));
    }
}
