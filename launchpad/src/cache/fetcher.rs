// SPDX-FileCopyrightText: Copyright © 2020-2026 Launchpad Developers
//
// SPDX-License-Identifier: MIT

//! The network seam. A trait rather than a bare `reqwest::blocking::Client`
//! so tests can drive the cache/download layer without touching the
//! network, per spec.md §4.4's "tests may mock the fetch" note and the
//! teacher's habit of injecting collaborators (`ServiceHook` in spec.md
//! §9) rather than reaching for globals.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PROGRESS_THROTTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// 200 OK, full body written.
    Full,
    /// 206 Partial Content, body appended from `resume_from`.
    Partial,
    /// Non-2xx/206 status.
    Failed(u16),
}

/// A progress callback: `(bytes_so_far, total_if_known)`.
pub type ProgressFn<'a> = dyn FnMut(u64, Option<u64>) + 'a;

pub trait Fetcher: Send + Sync {
    /// GET `url`, writing (or appending, if `resume_from` is set) the body
    /// to `dest`. Returns the resulting status; the caller inspects the
    /// file itself for size/integrity.
    fn fetch(&self, url: &str, dest: &Path, resume_from: Option<u64>, progress: &mut ProgressFn<'_>) -> Result<FetchStatus, Error>;
}

/// Real HTTP fetcher backed by a blocking `reqwest` client, matching the
/// `blocking` feature carried in the workspace's `reqwest` dependency.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client build");
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path, resume_from: Option<u64>, progress: &mut ProgressFn<'_>) -> Result<FetchStatus, Error> {
        let mut request = self.client.get(url);
        if let Some(from) = resume_from {
            request = request.header(reqwest::header::RANGE, format!("bytes={from}-"));
        }

        let mut response = request.send().map_err(|e| Error::Network(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            return Ok(FetchStatus::Failed(status.as_u16()));
        }

        let resumed = status.as_u16() == 206;
        let total = response.content_length();

        let mut file = if resumed {
            fs_err::OpenOptions::new().append(true).open(dest)?
        } else {
            fs_err::File::create(dest)?
        };

        let mut written: u64 = if resumed { dest.metadata().map(|m| m.len()).unwrap_or(0) } else { 0 };
        let mut last_report = std::time::Instant::now();
        let mut buf = [0u8; 64 * 1024];

        use std::io::Read;
        loop {
            let n = response.read(&mut buf).map_err(|e| Error::Network(e.to_string()))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            written += n as u64;

            if last_report.elapsed() >= PROGRESS_THROTTLE {
                progress(written, total);
                last_report = std::time::Instant::now();
            }
        }
        progress(written, total);

        Ok(if resumed { FetchStatus::Partial } else { FetchStatus::Full })
    }
}

/// Deterministic fetcher for tests: serves canned bytes for a URL,
/// bypassing the real archive-magic requirement per spec.md §4.4.
#[derive(Default)]
pub struct MockFetcher {
    pub responses: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    pub fail_urls: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MockFetcher {
    pub fn with_response(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.responses.lock().unwrap().insert(url.into(), bytes);
        self
    }

    pub fn failing(self, url: impl Into<String>) -> Self {
        self.fail_urls.lock().unwrap().insert(url.into());
        self
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str, dest: &Path, resume_from: Option<u64>, progress: &mut ProgressFn<'_>) -> Result<FetchStatus, Error> {
        if self.fail_urls.lock().unwrap().contains(url) {
            return Ok(FetchStatus::Failed(404));
        }

        let responses = self.responses.lock().unwrap();
        let Some(bytes) = responses.get(url) else {
            return Ok(FetchStatus::Failed(404));
        };

        let slice = match resume_from {
            Some(from) if (from as usize) < bytes.len() => &bytes[from as usize..],
            Some(_) => &[][..],
            None => &bytes[..],
        };

        if resume_from.is_some() {
            let mut file = fs_err::OpenOptions::new().create(true).append(true).open(dest)?;
            file.write_all(slice)?;
        } else {
            fs_err::write(dest, slice)?;
        }

        progress(slice.len() as u64, Some(bytes.len() as u64));

        Ok(if resume_from.is_some() { FetchStatus::Partial } else { FetchStatus::Full })
    }
}
