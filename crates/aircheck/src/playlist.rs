// Index poller: fetch the live playlist document and enqueue unseen segments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::error::RecorderError;
use crate::queue::SegmentTracker;
use crate::segment::SegmentRecord;

/// Lines starting with this marker are tags or comments, never references.
const COMMENT_MARKER: char = '#';

#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Retrieves the current index document body.
    async fn fetch_index(&self) -> Result<String, RecorderError>;
}

/// HTTP implementation fetching the configured playlist URL.
pub struct HttpIndexSource {
    client: Client,
    playlist_url: Url,
    timeout: Duration,
}

impl HttpIndexSource {
    pub fn new(client: Client, playlist_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            playlist_url,
            timeout,
        }
    }
}

#[async_trait]
impl IndexSource for HttpIndexSource {
    async fn fetch_index(&self) -> Result<String, RecorderError> {
        let response = self
            .client
            .get(self.playlist_url.clone())
            .header(CONTENT_TYPE, "application/x-mpegURL")
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::http_status(
                status,
                self.playlist_url.as_str(),
                "index poll",
            ));
        }
        Ok(response.text().await?)
    }
}

/// Scans index documents and feeds unseen segment references to the tracker.
pub struct IndexPoller {
    source: Arc<dyn IndexSource>,
    tracker: Arc<SegmentTracker>,
    playlist_url: Url,
    segment_extension: String,
}

impl IndexPoller {
    pub fn new(
        source: Arc<dyn IndexSource>,
        tracker: Arc<SegmentTracker>,
        playlist_url: Url,
        segment_extension: String,
    ) -> Self {
        Self {
            source,
            tracker,
            playlist_url,
            segment_extension,
        }
    }

    /// One poll cycle. Returns the number of segments newly enqueued.
    ///
    /// A line is a segment reference iff it does not start with the comment
    /// marker and ends with the configured extension. Transient fetch
    /// errors bubble up to be retried next cycle; a URL that cannot be
    /// constructed from a matching line is a defect and aborts the cycle.
    pub async fn poll_once(&self) -> Result<usize, RecorderError> {
        let body = self.source.fetch_index().await?;
        let mut added = 0;
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }
            if !line.ends_with(self.segment_extension.as_str()) {
                continue;
            }
            let segment_url = resolve_segment_url(&self.playlist_url, line)?;
            if self
                .tracker
                .offer_if_absent(SegmentRecord::new(segment_url.clone()))
            {
                debug!(url = %segment_url, "discovered segment");
                added += 1;
            }
        }
        Ok(added)
    }
}

/// Resolves a segment reference against the index URL.
///
/// The index document's file name (the last path component) is replaced by
/// the reference, which may itself span several path components. Scheme,
/// host, port, and query string are kept intact; `Url::join` would drop
/// the query.
pub fn resolve_segment_url(playlist_url: &Url, reference: &str) -> Result<Url, RecorderError> {
    // Absolute references are used verbatim.
    if let Ok(absolute) = Url::parse(reference) {
        return Ok(absolute);
    }

    let mut url = playlist_url.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            RecorderError::invalid_url(reference, "index URL cannot be a base")
        })?;
        segments.pop();
        for part in reference.split('/') {
            if part.is_empty() {
                continue;
            }
            segments.push(part);
        }
    }
    Ok(url)
}
