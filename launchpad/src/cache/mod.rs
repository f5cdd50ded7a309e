// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! Download/cache layer, per spec.md §4.4.

mod fetcher;
mod metadata;

pub use fetcher::{FetchStatus, Fetcher, HttpFetcher, MockFetcher, ProgressFn};
pub use metadata::{CacheEntry, Metadata};

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error as ThisError;
use tracing::{debug, instrument, warn};

/// Archive formats tried in order, per spec.md §4.4.
pub const FORMATS: &[&str] = &["tar.xz", "tar.gz"];

const LEGACY_MIN_SIZE: u64 = 100;
const MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_AGE_DAYS: u64 = 30;
const DEFAULT_MAX_SIZE_GB: u64 = 5;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize cache metadata: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("network error: {0}")]
    Network(String),
    #[error("Failed to download package")]
    DownloadFailed,
    #[error("downloaded size {actual} does not match expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Construct the upstream distribution URL, per spec.md §4.4/§6:
/// `{baseUrl}/{domain}/{os}/{arch}/v{version}.{format}`.
pub fn build_url(base_url: &str, domain: &str, os: &str, arch: &str, version: &str, format: &str) -> String {
    format!("{}/{domain}/{os}/{arch}/v{version}.{format}", base_url.trim_end_matches('/'))
}

pub struct CacheManager<F: Fetcher = HttpFetcher> {
    root: PathBuf,
    metadata_path: PathBuf,
    fetcher: F,
}

impl CacheManager<HttpFetcher> {
    pub fn new(cache_root: PathBuf) -> Self {
        Self::with_fetcher(cache_root, HttpFetcher::default())
    }
}

impl<F: Fetcher> CacheManager<F> {
    pub fn with_fetcher(cache_root: PathBuf, fetcher: F) -> Self {
        let metadata_path = cache_root.join("cache-metadata.json");
        Self { root: cache_root, metadata_path, fetcher }
    }

    fn package_path(&self, domain: &str, version: &str, format: &str) -> PathBuf {
        self.root
            .join("binaries/packages")
            .join(format!("{domain}-{version}"))
            .join(format!("package.{format}"))
    }

    /// Look up a cached archive. Self-heals per spec.md §4.4/§8: a size
    /// mismatch against the recorded metadata purges both the file and
    /// the entry in the same operation, then misses.
    #[instrument(skip(self))]
    pub fn lookup(&self, domain: &str, version: &str, format: &str) -> Result<Option<PathBuf>, Error> {
        let path = self.package_path(domain, version, format);
        if !path.exists() {
            return Ok(None);
        }

        let mut metadata = Metadata::load(&self.metadata_path)?;
        let on_disk_size = fs_err::metadata(&path)?.len();

        match metadata.get(domain, version) {
            Some(entry) if entry.size == on_disk_size => {
                metadata.touch_last_accessed(domain, version, now_secs());
                metadata.save(&self.metadata_path)?;
                Ok(Some(path))
            }
            Some(_) => {
                warn!(domain, version, "cache size mismatch, purging");
                fs_err::remove_file(&path)?;
                metadata.remove(domain, version);
                metadata.save(&self.metadata_path)?;
                Ok(None)
            }
            None if on_disk_size > LEGACY_MIN_SIZE => {
                debug!(domain, version, "accepting legacy cache entry without metadata");
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    /// Save a freshly downloaded archive into the cache and record its
    /// metadata.
    pub fn save(&self, domain: &str, version: &str, format: &str, src: &Path) -> Result<PathBuf, Error> {
        let dest = self.package_path(domain, version, format);
        if let Some(parent) = dest.parent() {
            fs_err::create_dir_all(parent)?;
        }
        if src != dest {
            fs_err::copy(src, &dest)?;
        }

        let size = fs_err::metadata(&dest)?.len();
        let now = now_secs();

        let mut metadata = Metadata::load(&self.metadata_path)?;
        metadata.insert(CacheEntry {
            domain: domain.to_owned(),
            version: version.to_owned(),
            format: format.to_owned(),
            downloaded_at: now,
            last_accessed: now,
            size,
            checksum: None,
        });
        metadata.save(&self.metadata_path)?;

        Ok(dest)
    }

    /// Fetch `domain@version`, trying each format in order, caching on
    /// success. Returns the cached path and the format used.
    #[instrument(skip(self))]
    pub fn fetch(&self, base_url: &str, domain: &str, version: &str) -> Result<(PathBuf, &'static str), Error> {
        let os = crate::environment::os_name();
        let arch = crate::environment::arch_name();

        for format in FORMATS {
            if let Some(cached) = self.lookup(domain, version, format)? {
                return Ok((cached, format));
            }

            let url = build_url(base_url, domain, os, arch, version, format);
            let tmp_dir = tempfile::tempdir()?;
            let tmp_path = tmp_dir.path().join(format!("package.{format}"));

            let mut no_op = |_written: u64, _total: Option<u64>| {};
            match self.fetcher.fetch(&url, &tmp_path, None, &mut no_op)? {
                FetchStatus::Full => {
                    let saved = self.save(domain, version, format, &tmp_path)?;
                    return Ok((saved, format));
                }
                FetchStatus::Partial => {
                    let saved = self.save(domain, version, format, &tmp_path)?;
                    return Ok((saved, format));
                }
                FetchStatus::Failed(_status) => continue,
            }
        }

        Err(Error::DownloadFailed)
    }

    /// Resumable fetch with retry, per spec.md §4.4.
    #[instrument(skip(self))]
    pub fn fetch_resumable(
        &self,
        base_url: &str,
        domain: &str,
        version: &str,
        format: &str,
        expected_size: Option<u64>,
    ) -> Result<PathBuf, Error> {
        let os = crate::environment::os_name();
        let arch = crate::environment::arch_name();
        let url = build_url(base_url, domain, os, arch, version, format);

        let tmp_dir = self.root.join("tmp");
        fs_err::create_dir_all(&tmp_dir)?;
        let partial_path = tmp_dir.join(format!("{domain}-{version}.{format}.partial"));

        let mut attempt = 0;
        loop {
            let existing = if partial_path.exists() { fs_err::metadata(&partial_path)?.len() } else { 0 };

            let mut no_op = |_written: u64, _total: Option<u64>| {};
            let result = self
                .fetcher
                .fetch(&url, &partial_path, Some(existing).filter(|n| *n > 0), &mut no_op);

            match result {
                Ok(FetchStatus::Full | FetchStatus::Partial) => {
                    let final_size = fs_err::metadata(&partial_path)?.len();
                    if let Some(expected) = expected_size
                        && final_size != expected
                    {
                        if attempt >= MAX_RETRIES {
                            let _ = fs_err::remove_file(&partial_path);
                            return Err(Error::SizeMismatch { expected, actual: final_size });
                        }
                        attempt += 1;
                        backoff(attempt);
                        continue;
                    }
                    return self.save(domain, version, format, &partial_path);
                }
                Ok(FetchStatus::Failed(_)) | Err(_) => {
                    if attempt >= MAX_RETRIES {
                        let _ = fs_err::remove_file(&partial_path);
                        return Err(Error::DownloadFailed);
                    }
                    attempt += 1;
                    backoff(attempt);
                }
            }
        }
    }

    /// Evict stale and over-quota entries, per spec.md §4.4.
    pub fn evict(&self, max_age_days: Option<u64>, max_size_gb: Option<u64>) -> Result<Vec<String>, Error> {
        let max_age = Duration::from_secs(max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS) * 86_400);
        let max_size_bytes = max_size_gb.unwrap_or(DEFAULT_MAX_SIZE_GB) * 1024 * 1024 * 1024;

        let mut metadata = Metadata::load(&self.metadata_path)?;
        let now = now_secs();
        let mut evicted = Vec::new();

        let stale_keys: Vec<(String, String)> = metadata
            .entries()
            .filter(|e| (now - e.last_accessed) as u64 > max_age.as_secs())
            .map(|e| (e.domain.clone(), e.version.clone()))
            .collect();

        for (domain, version) in stale_keys {
            self.purge_entry(&mut metadata, &domain, &version)?;
            evicted.push(Metadata::key(&domain, &version));
        }

        while metadata.total_size() > max_size_bytes {
            let oldest = metadata
                .entries()
                .min_by_key(|e| e.last_accessed)
                .map(|e| (e.domain.clone(), e.version.clone()));

            let Some((domain, version)) = oldest else { break };
            self.purge_entry(&mut metadata, &domain, &version)?;
            evicted.push(Metadata::key(&domain, &version));
        }

        metadata.save(&self.metadata_path)?;
        Ok(evicted)
    }

    fn purge_entry(&self, metadata: &mut Metadata, domain: &str, version: &str) -> Result<(), Error> {
        if let Some(entry) = metadata.remove(domain, version) {
            let path = self.package_path(domain, version, &entry.format);
            if path.exists() {
                fs_err::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

fn backoff(attempt: u32) {
    std::thread::sleep(Duration::from_millis(200 * 2u64.pow(attempt.min(5))));
}

/// Integrity sniff: accept gzip/xz magic or a `ustar` tar header at
/// offset 257, per spec.md §4.4.
pub fn sniff_archive(bytes: &[u8]) -> bool {
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        return true;
    }
    if bytes.len() >= 6 && bytes[..6] == [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00] {
        return true;
    }
    if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gzip_magic_bytes() -> Vec<u8> {
        let mut bytes = vec![0x1f, 0x8b];
        bytes.extend(std::iter::repeat_n(0u8, 200));
        bytes
    }

    #[test]
    fn url_construction() {
        let url = build_url("https://dist.example.com", "nodejs.org", "darwin", "aarch64", "22.5.1", "tar.xz");
        assert_eq!(url, "https://dist.example.com/nodejs.org/darwin/aarch64/v22.5.1.tar.xz");
    }

    #[test]
    fn sniff_accepts_gzip_and_ustar() {
        assert!(sniff_archive(&gzip_magic_bytes()));
        assert!(sniff_archive(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]));

        let mut tar = vec![0u8; 512];
        tar[257..262].copy_from_slice(b"ustar");
        assert!(sniff_archive(&tar));

        assert!(!sniff_archive(b"not an archive"));
    }

    #[test]
    fn cache_round_trip_and_self_heal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_owned());

        let src = dir.path().join("source.tar.gz");
        fs_err::write(&src, b"hello world archive bytes").unwrap();

        let saved = cache.save("demo.org", "1.0.0", "tar.gz", &src).unwrap();
        assert_eq!(fs_err::read(&saved).unwrap(), b"hello world archive bytes");

        let found = cache.lookup("demo.org", "1.0.0", "tar.gz").unwrap();
        assert_eq!(found, Some(saved.clone()));

        // Corrupt: truncate the file so its size no longer matches metadata.
        fs_err::write(&saved, b"short").unwrap();
        let found_after_corruption = cache.lookup("demo.org", "1.0.0", "tar.gz").unwrap();
        assert_eq!(found_after_corruption, None);
        assert!(!saved.exists());
    }

    #[test]
    fn fetch_falls_back_across_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockFetcher::default()
            .failing("https://dist.example.com/demo.org/linux/x86_64/v1.0.0.tar.xz")
            .with_response("https://dist.example.com/demo.org/linux/x86_64/v1.0.0.tar.gz", b"gzip bytes".to_vec());
        let cache = CacheManager::with_fetcher(dir.path().to_owned(), mock);

        let (path, format) = cache.fetch("https://dist.example.com", "demo.org", "1.0.0").unwrap();
        assert_eq!(format, "tar.gz");
        assert_eq!(fs_err::read(path).unwrap(), b"gzip bytes");
    }

    #[test]
    fn eviction_purges_over_quota_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_owned());

        for i in 0..3 {
            let src = dir.path().join(format!("src{i}"));
            fs_err::write(&src, vec![0u8; 1024]).unwrap();
            cache.save("demo.org", &format!("1.0.{i}"), "tar.gz", &src).unwrap();
        }

        let evicted = cache.evict(Some(30), Some(0)).unwrap();
        assert_eq!(evicted.len(), 3);
    }
}
