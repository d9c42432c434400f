//! Comparison between the resolved build version and a published release.
//!
//! Versions are compared component by component as dotted integers, with
//! anything after the first `-` ignored except for the `-SNAPSHOT` marker,
//! which ranks below the release of the same number.

use std::{cmp::Ordering, fmt, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

const SNAPSHOT_MARKER: &str = "-SNAPSHOT";

/// Strips surrounding whitespace and a single leading `v`.
pub fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix(|c: char| c == 'v' || c == 'V')
        .unwrap_or(tag)
}

/// Pulls `tag_name` out of a release API payload.
pub fn extract_tag_name(payload: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| Regex::new(r#""tag_name"\s*:\s*"([^"]+)""#).unwrap());
    let caps = regex.captures(payload)?;
    Some(normalize_tag(&caps[1]).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReleaseNumber {
    parts: Vec<u64>,
    snapshot: bool,
}

impl ReleaseNumber {
    fn parse(raw: &str) -> Option<Self> {
        let core = raw.split('-').next().unwrap_or_default().trim_end_matches('.');
        let parts = core
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            parts,
            snapshot: raw.contains(SNAPSHOT_MARKER),
        })
    }

    fn compare_numbers(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let ours = self.parts.get(i).copied().unwrap_or(0);
                let theirs = other.parts.get(i).copied().unwrap_or(0);
                ours.cmp(&theirs)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Returns true when `candidate` is strictly newer than `current`.
///
/// Unparseable input on either side compares as "not newer".
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let (Some(candidate), Some(current)) =
        (ReleaseNumber::parse(candidate), ReleaseNumber::parse(current))
    else {
        return false;
    };
    match candidate.compare_numbers(&current) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => !candidate.snapshot && current.snapshot,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateStatus {
    Available { current: String, latest: String },
    UpToDate { current: String },
}

impl UpdateStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, UpdateStatus::Available { .. })
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::Available { current, latest } => {
                write!(f, "update available: {current} -> {latest}")
            }
            UpdateStatus::UpToDate { current } => write!(f, "up to date (version {current})"),
        }
    }
}

/// Compares the build version against the latest published release tag.
pub fn check(current: &str, latest_tag: &str) -> UpdateStatus {
    let latest = normalize_tag(latest_tag);
    if is_newer(latest, current) {
        UpdateStatus::Available {
            current: current.to_string(),
            latest: latest.to_string(),
        }
    } else {
        UpdateStatus::UpToDate {
            current: current.to_string(),
        }
    }
}
