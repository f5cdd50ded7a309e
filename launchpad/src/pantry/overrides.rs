// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Shadow table for known-bad catalog aliases, per spec.md §4.2. Entries
//! here win over both the catalog's own key and the built-in alias table.

use std::collections::HashMap;

pub(super) fn table() -> HashMap<&'static str, &'static str> {
    // Currently empty: no known-bad upstream aliases to shadow. Kept as
    // its own table (rather than folded into `catalog::aliases`) because
    // it must take priority even over an exact domain match, per the
    // resolution order in `Pantry::resolve_alias`.
    HashMap::new()
}
