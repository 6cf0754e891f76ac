//! Canonical directory paths and version tokens for catalogued files.
//!
//! Several filesystem layouts hold the same dataset. The normaliser collapses
//! them so that every file of one simulation lands in one directory:
//!
//! * publication trees staged as `output1/<institute>/.../files/<var>_<YYYYMMDD>`
//!   become `.../latest/<var>` when only the latest version is wanted;
//! * replica trees (`replicas/.../output1`, `output2`, `unsolicited`) point at
//!   the merged `combined` tree.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref VERSION_SEGMENT: Regex = Regex::new(r"^v(\d{8})$").unwrap();
    static ref DATED_LEAF: Regex = Regex::new(r"^(.+)_(\d{8})$").unwrap();
}

const REPLICA_ROOT: &str = "replicas";
const COMBINED: &str = "combined";
const UNSOLICITED: &str = "unsolicited";
const STAGING: [&str; 2] = ["output1", "output2"];

/// Answers whether a version directory exists below a dataset root.
pub trait VersionProbe {
    fn has_version(&self, root: &str, version: &str) -> bool;
}

/// Trusts every version found in the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumePresent;

impl VersionProbe for AssumePresent {
    fn has_version(&self, _root: &str, _version: &str) -> bool {
        true
    }
}

/// Looks the version directory up on the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl VersionProbe for FsProbe {
    fn has_version(&self, root: &str, version: &str) -> bool {
        Path::new(root).join(version).is_dir()
    }
}

pub struct PathNormalizer {
    probe: Box<dyn VersionProbe>,
    dated_leaf_publishers: Vec<String>,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        PathNormalizer {
            probe: Box::new(AssumePresent),
            dated_leaf_publishers: vec!["CSIRO-BOM".to_string()],
        }
    }
}

impl PathNormalizer {
    pub fn new(probe: Box<dyn VersionProbe>, dated_leaf_publishers: Vec<String>) -> Self {
        PathNormalizer {
            probe,
            dated_leaf_publishers,
        }
    }

    /// Splits `raw` into its canonical directory and its filename.
    pub fn normalize(&self, raw: &str, latest: bool) -> (String, String) {
        let fixed = self.fix_path(raw, latest);
        match fixed.rsplit_once('/') {
            Some((dir, file)) => (dir.to_string(), file.to_string()),
            None => (String::new(), fixed),
        }
    }

    /// Rewrites `raw` to its canonical form, keeping the filename if any.
    pub fn fix_path(&self, raw: &str, latest: bool) -> String {
        let segments: Vec<&str> = raw.split('/').collect();
        let replica = segments.contains(&REPLICA_ROOT);

        if replica && !latest && segments.iter().any(|s| VERSION_SEGMENT.is_match(s)) {
            return raw.to_string();
        }

        if latest {
            if let Some(rewritten) = self.collapse_dated_leaf(&segments) {
                return rewritten;
            }
        }

        if replica {
            if let Some(rewritten) = self.combine_replica(&segments) {
                return rewritten;
            }
        }

        raw.to_string()
    }

    // output1/<publisher>/.../files/<var>_<date>/ -> output1/<publisher>/.../latest/<var>/
    fn collapse_dated_leaf(&self, segments: &[&str]) -> Option<String> {
        let staging = segments.iter().position(|s| STAGING.contains(s))?;
        let publisher = segments.get(staging + 1)?;
        if !self.dated_leaf_publishers.iter().any(|p| p == publisher) {
            return None;
        }

        let files = (staging + 1..segments.len().saturating_sub(1)).find(|&i| {
            segments[i] == "files" && DATED_LEAF.is_match(segments[i + 1])
        })?;
        let var = DATED_LEAF.captures(segments[files + 1])?.get(1)?.as_str();

        let mut rewritten: Vec<&str> = segments.to_vec();
        rewritten[files] = "latest";
        rewritten[files + 1] = var;

        Some(rewritten.join("/"))
    }

    fn combine_replica(&self, segments: &[&str]) -> Option<String> {
        let idx = segments
            .iter()
            .position(|s| STAGING.contains(s) || *s == UNSOLICITED)?;

        let mut rewritten: Vec<&str> = segments.to_vec();
        rewritten[idx] = COMBINED;

        if segments[idx] == UNSOLICITED {
            // walk version segments from the leaf up, first one confirmed wins
            let confirmed = (idx + 1..rewritten.len())
                .rev()
                .filter(|&i| VERSION_SEGMENT.is_match(rewritten[i]))
                .find(|&i| {
                    let root = rewritten[..i].join("/");
                    self.probe.has_version(&root, rewritten[i])
                });

            if confirmed.is_none() {
                debug!(path = %segments.join("/"), "no combined version found for unsolicited replica");
                return None;
            }
        }

        Some(rewritten.join("/"))
    }
}

/// Extracts the version token from a path: the deepest `vYYYYMMDD` segment,
/// else the date of a trailing `<name>_<YYYYMMDD>` leaf.
pub fn extract_version(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(caps) = segments.iter().rev().find_map(|s| VERSION_SEGMENT.captures(s)) {
        return Some(caps[1].to_string());
    }

    segments
        .last()
        .and_then(|leaf| DATED_LEAF.captures(leaf))
        .map(|caps| caps[2].to_string())
}

/// Joins a canonical directory and one of its filenames.
pub fn file_path(dir: &str, filename: &str) -> PathBuf {
    Path::new(dir).join(filename)
}

// -- Tests -------------------------------------------------------------------
