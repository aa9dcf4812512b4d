// Segment identity, local path mapping, and broadcast ordering.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use url::Url;

/// One media segment referenced by the live index.
///
/// Identity is the source URL alone: two records with the same URL are the
/// same segment regardless of fetch state. The local path is set exactly
/// once, by the fetch worker that persisted the bytes.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    source_url: Url,
    local_path: Option<PathBuf>,
}

impl SegmentRecord {
    pub fn new(source_url: Url) -> Self {
        Self {
            source_url,
            local_path: None,
        }
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub(crate) fn set_local_path(&mut self, path: PathBuf) {
        debug_assert!(self.local_path.is_none(), "local path is write-once");
        self.local_path = Some(path);
    }
}

impl PartialEq for SegmentRecord {
    fn eq(&self, other: &Self) -> bool {
        self.source_url == other.source_url
    }
}

impl Eq for SegmentRecord {}

impl Hash for SegmentRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_url.hash(state);
    }
}

/// Local file path for a segment URL.
///
/// The last two URL path components are joined as `{parent}-{file}` under
/// the working directory, so the same segment reference always maps to the
/// same file across polls and across runs.
pub fn local_path_for(work_dir: &Path, url: &Url) -> PathBuf {
    let mut components: Vec<&str> = url.path().split('/').filter(|c| !c.is_empty()).collect();
    let file = components.pop().unwrap_or("segment");
    let name = match components.pop() {
        Some(parent) => format!("{parent}-{file}"),
        None => file.to_string(),
    };
    work_dir.join(name)
}

/// Broadcast-order comparison on URL path tokens.
///
/// Tokens come from splitting the path on `/` and `-`; when two tokens
/// differ in length the shorter one is compared as if left-padded with
/// `0`, so `...-9.ts` orders before `...-10.ts`.
pub fn broadcast_cmp(a: &SegmentRecord, b: &SegmentRecord) -> Ordering {
    let tokens_a = path_tokens(a.source_url());
    let tokens_b = path_tokens(b.source_url());
    for (token_a, token_b) in tokens_a.iter().zip(tokens_b.iter()) {
        let ord = padded_cmp(token_a, token_b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    tokens_a.len().cmp(&tokens_b.len())
}

fn path_tokens(url: &Url) -> Vec<&str> {
    url.path()
        .split(['/', '-'])
        .filter(|t| !t.is_empty())
        .collect()
}

fn padded_cmp(a: &str, b: &str) -> Ordering {
    if a.len() == b.len() {
        return a.cmp(b);
    }
    let width = a.len().max(b.len());
    let mut padded_a = String::with_capacity(width);
    let mut padded_b = String::with_capacity(width);
    let _ = write!(padded_a, "{a:0>width$}");
    let _ = write!(padded_b, "{b:0>width$}");
    padded_a.cmp(&padded_b)
}
