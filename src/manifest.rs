//! Build manifest for incremental revalidation.
//!
//! Every route the driver writes is recorded with the time it was built and
//! how long it stays fresh. The manifest answers the one question the driver
//! asks before serving or rebuilding a page: is it [`Freshness::Fresh`],
//! [`Freshness::Stale`], or not built at all ([`Freshness::Missing`])?
//!
//! # Design
//!
//! ## Freshness
//!
//! A page with `revalidate_secs = Some(n)` is fresh for `n` seconds after
//! `built_at` and stale afterwards. Stale pages are still served; they are
//! only *eligible* for a rebuild (stale-while-revalidate). Pages with
//! `revalidate_secs = None` (the list page) never go stale on their own and
//! are only rebuilt by an explicit `build`/`regenerate`.
//!
//! An entry whose HTML file has disappeared from the output directory counts
//! as missing, so deleting a page forces it to be generated again.
//!
//! ## Content hashes
//!
//! Each entry stores the SHA-256 of the HTML last written. A rebuild that
//! produces identical markup refreshes `built_at` but skips the write, so
//! file modification times (and whatever syncs the output to a host) only
//! change when content does.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<output_dir>/.build-manifest.json`. It also
//! remembers the set of slugs enumerated at build time; a request for any
//! other slug goes through the fallback path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".build-manifest.json";

/// Bump to discard manifests written by an incompatible version.
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Built,
    /// The CMS had no document for the route; `404.html` is served instead.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    /// Output file relative to the output directory.
    pub file: String,
    pub built_at: DateTime<Utc>,
    pub revalidate_secs: Option<u64>,
    pub content_hash: String,
    pub status: PageStatus,
}

impl PageEntry {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.revalidate_secs {
            Some(secs) => match i64::try_from(secs).ok().and_then(Duration::try_seconds) {
                Some(window) => now.signed_duration_since(self.built_at) >= window,
                // Windows beyond chrono's range never elapse.
                None => false,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
}

/// Whether [`BuildManifest::record`] needs the caller to write the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    Write,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub version: u32,
    /// Route (`/`, `/post/{slug}`) → entry.
    pub pages: BTreeMap<String, PageEntry>,
    /// Slugs pre-rendered by the last full build.
    #[serde(default)]
    pub enumerated: BTreeSet<String>,
}

impl BuildManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            pages: BTreeMap::new(),
            enumerated: BTreeSet::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(output_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(output_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(output_dir), json)
    }

    pub fn get(&self, route: &str) -> Option<&PageEntry> {
        self.pages.get(route)
    }

    pub fn freshness(&self, route: &str, now: DateTime<Utc>, output_dir: &Path) -> Freshness {
        let Some(entry) = self.pages.get(route) else {
            return Freshness::Missing;
        };
        if entry.status == PageStatus::Built && !output_dir.join(&entry.file).exists() {
            return Freshness::Missing;
        }
        if entry.is_stale(now) {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Record a (re)build of `route`. Returns [`WriteDecision::Unchanged`]
    /// when the same markup was already written for it.
    pub fn record(
        &mut self,
        route: &str,
        file: &str,
        html: &str,
        status: PageStatus,
        revalidate_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> WriteDecision {
        let content_hash = hash_html(html);
        let unchanged = self
            .pages
            .get(route)
            .is_some_and(|e| e.content_hash == content_hash && e.file == file && e.status == status);
        self.pages.insert(
            route.to_string(),
            PageEntry {
                file: file.to_string(),
                built_at: now,
                revalidate_secs,
                content_hash,
                status,
            },
        );
        if unchanged {
            WriteDecision::Unchanged
        } else {
            WriteDecision::Write
        }
    }

    pub fn is_enumerated(&self, slug: &str) -> bool {
        self.enumerated.contains(slug)
    }
}

/// SHA-256 of rendered markup, as hex.
pub fn hash_html(html: &str) -> String {
    format!("{:x}", Sha256::digest(html.as_bytes()))
}

/// Resolve the manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

/// Summary of what a build or regenerate run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub written: u32,
    pub unchanged: u32,
    pub fresh: u32,
    pub not_found: u32,
}

impl BuildStats {
    pub fn total(&self) -> u32 {
        self.written + self.unchanged + self.fresh + self.not_found
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} written", self.written)?;
        if self.unchanged > 0 {
            write!(f, ", {} unchanged", self.unchanged)?;
        }
        if self.fresh > 0 {
            write!(f, ", {} still fresh", self.fresh)?;
        }
        if self.not_found > 0 {
            write!(f, ", {} not found", self.not_found)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_manifest_has_no_pages() {
        let m = BuildManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.pages.is_empty());
        assert!(m.enumerated.is_empty());
    }

    #[test]
    fn missing_route_is_missing() {
        let tmp = TempDir::new().unwrap();
        let m = BuildManifest::empty();
        assert_eq!(m.freshness("/post/a", t0(), tmp.path()), Freshness::Missing);
    }

    #[test]
    fn page_is_fresh_within_window_and_stale_after() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("post/a")).unwrap();
        fs::write(tmp.path().join("post/a/index.html"), "x").unwrap();

        let mut m = BuildManifest::empty();
        m.record("/post/a", "post/a/index.html", "x", PageStatus::Built, Some(300), t0());

        let at = |secs| t0() + Duration::seconds(secs);
        assert_eq!(m.freshness("/post/a", at(0), tmp.path()), Freshness::Fresh);
        assert_eq!(m.freshness("/post/a", at(299), tmp.path()), Freshness::Fresh);
        assert_eq!(m.freshness("/post/a", at(300), tmp.path()), Freshness::Stale);
    }

    #[test]
    fn page_without_window_never_goes_stale() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "x").unwrap();
        let mut m = BuildManifest::empty();
        m.record("/", "index.html", "x", PageStatus::Built, None, t0());
        let much_later = t0() + Duration::days(365);
        assert_eq!(m.freshness("/", much_later, tmp.path()), Freshness::Fresh);
    }

    #[test]
    fn deleted_file_counts_as_missing() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty();
        m.record("/post/a", "post/a/index.html", "x", PageStatus::Built, Some(300), t0());
        assert_eq!(m.freshness("/post/a", t0(), tmp.path()), Freshness::Missing);
    }

    #[test]
    fn not_found_entries_need_no_file() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty();
        m.record("/post/gone", "404.html", "", PageStatus::NotFound, Some(300), t0());
        assert_eq!(m.freshness("/post/gone", t0(), tmp.path()), Freshness::Fresh);
    }

    #[test]
    fn identical_rebuild_is_unchanged_but_refreshes_time() {
        let mut m = BuildManifest::empty();
        let first = m.record("/", "index.html", "<p>a</p>", PageStatus::Built, None, t0());
        let later = t0() + Duration::minutes(10);
        let second = m.record("/", "index.html", "<p>a</p>", PageStatus::Built, None, later);
        assert_eq!(first, WriteDecision::Write);
        assert_eq!(second, WriteDecision::Unchanged);
        assert_eq!(m.get("/").unwrap().built_at, later);
    }

    #[test]
    fn changed_markup_is_written() {
        let mut m = BuildManifest::empty();
        m.record("/", "index.html", "<p>a</p>", PageStatus::Built, None, t0());
        let decision = m.record("/", "index.html", "<p>b</p>", PageStatus::Built, None, t0());
        assert_eq!(decision, WriteDecision::Write);
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty();
        m.enumerated.insert("a".into());
        m.record("/post/a", "post/a/index.html", "x", PageStatus::Built, Some(300), t0());
        m.save(tmp.path()).unwrap();

        let loaded = BuildManifest::load(tmp.path());
        assert_eq!(loaded.pages, m.pages);
        assert!(loaded.is_enumerated("a"));
    }

    #[test]
    fn load_corrupt_manifest_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        assert!(BuildManifest::load(tmp.path()).pages.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            manifest_path(tmp.path()),
            r#"{"version":999,"pages":{},"enumerated":["a"]}"#,
        )
        .unwrap();
        assert!(!BuildManifest::load(tmp.path()).is_enumerated("a"));
    }

    #[test]
    fn stats_display() {
        let stats = BuildStats {
            written: 3,
            unchanged: 1,
            fresh: 0,
            not_found: 1,
        };
        assert_eq!(stats.to_string(), "3 written, 1 unchanged, 1 not found (5 total)");
    }
}
