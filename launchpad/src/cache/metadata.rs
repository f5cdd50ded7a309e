// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! The single JSON cache-metadata document, per spec.md §3/§4.4.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub domain: String,
    pub version: String,
    pub format: String,
    pub downloaded_at: i64,
    pub last_accessed: i64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// `"{domain}-{version}"` → entry, per spec.md §3.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Metadata(HashMap<String, CacheEntry>);

impl Metadata {
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs_err::read(path)?;
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(&bytes).map(Self).or_else(|_| Ok(Self::default()))
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let tmp = tmp_path(path);
        let bytes = serde_json::to_vec_pretty(&self.0)?;
        fs_err::write(&tmp, bytes)?;
        fs_err::rename(&tmp, path)?;
        Ok(())
    }

    pub fn key(domain: &str, version: &str) -> String {
        format!("{domain}-{version}")
    }

    pub fn get(&self, domain: &str, version: &str) -> Option<&CacheEntry> {
        self.0.get(&Self::key(domain, version))
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.0.insert(Self::key(&entry.domain, &entry.version), entry);
    }

    pub fn remove(&mut self, domain: &str, version: &str) -> Option<CacheEntry> {
        self.0.remove(&Self::key(domain, version))
    }

    pub fn touch_last_accessed(&mut self, domain: &str, version: &str, now: i64) {
        if let Some(entry) = self.0.get_mut(&Self::key(domain, version)) {
            entry.last_accessed = now;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.0.values()
    }

    pub fn total_size(&self) -> u64 {
        self.0.values().map(|e| e.size).sum()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_owned();
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("metadata");
    tmp.set_file_name(format!(".{file_name}.tmp"));
    tmp
}
