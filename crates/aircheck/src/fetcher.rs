// Segment fetch worker: pop one queued record and persist its bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::RecorderError;
use crate::queue::SegmentTracker;
use crate::segment::{self, SegmentRecord};

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Downloads one segment to `dest`, returning the bytes written.
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64, RecorderError>;
}

/// Streams segment bodies over HTTP straight to the target file, so a
/// segment never has to fit in memory as a whole.
pub struct HttpSegmentDownloader {
    client: Client,
    timeout: Duration,
}

impl HttpSegmentDownloader {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn stream_to_file(&self, url: &Url, dest: &Path) -> Result<u64, RecorderError> {
        let response = self
            .client
            .get(url.clone())
            .header(CONTENT_TYPE, "video/MP2T")
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::http_status(
                status,
                url.as_str(),
                "segment fetch",
            ));
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl SegmentDownloader for HttpSegmentDownloader {
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64, RecorderError> {
        match self.stream_to_file(url, dest).await {
            Ok(written) => Ok(written),
            Err(e) => {
                // A partial file must not pass a later existence check.
                if let Err(rm) = fs::remove_file(dest).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %dest.display(), error = %rm, "failed to remove partial segment file");
                }
                Err(e)
            }
        }
    }
}

/// One fetch worker. `fetch_next` runs once per scheduler tick; several
/// workers share the same tracker and working directory.
pub struct SegmentFetcher {
    downloader: Arc<dyn SegmentDownloader>,
    tracker: Arc<SegmentTracker>,
    work_dir: PathBuf,
}

impl SegmentFetcher {
    pub fn new(
        downloader: Arc<dyn SegmentDownloader>,
        tracker: Arc<SegmentTracker>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            downloader,
            tracker,
            work_dir,
        }
    }

    /// Pops the next pending record and persists it.
    ///
    /// Returns the fetched record, or `None` when the queue was empty or
    /// the file was already on disk (no network request is issued then).
    /// On failure the record is lost for this run; losing one segment
    /// degrades audio continuity slightly instead of stalling the
    /// pipeline on retries.
    pub async fn fetch_next(&self) -> Result<Option<SegmentRecord>, RecorderError> {
        let Some(mut record) = self.tracker.poll() else {
            return Ok(None);
        };

        let dest = segment::local_path_for(&self.work_dir, record.source_url());
        if fs::try_exists(&dest).await? {
            debug!(path = %dest.display(), "segment already on disk, skipping fetch");
            return Ok(None);
        }

        let written = self.downloader.download(record.source_url(), &dest).await?;
        debug!(
            url = %record.source_url(),
            bytes = written,
            path = %dest.display(),
            "segment stored"
        );
        record.set_local_path(dest);
        self.tracker.complete(record.clone());
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Counts download requests per URL and writes a marker file.
    struct CountingDownloader {
        requests: Mutex<HashMap<Url, usize>>,
        fail: bool,
    }

    impl CountingDownloader {
        fn new() -> Self {
            Self {
                requests: Mutex::new(HashMap::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                requests: Mutex::new(HashMap::new()),
                fail: true,
            }
        }

        fn request_counts(&self) -> HashMap<Url, usize> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl SegmentDownloader for CountingDownloader {
        async fn download(&self, url: &Url, dest: &Path) -> Result<u64, RecorderError> {
            *self.requests.lock().entry(url.clone()).or_insert(0) += 1;
            if self.fail {
                return Err(RecorderError::http_status(
                    reqwest::StatusCode::NOT_FOUND,
                    url.as_str(),
                    "segment fetch",
                ));
            }
            fs::write(dest, b"ts").await?;
            Ok(2)
        }
    }

    fn record(name: &str) -> SegmentRecord {
        SegmentRecord::new(
            Url::parse(&format!("https://radio.example.com/live/ch/{name}")).unwrap(),
        )
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(SegmentTracker::new());
        let fetcher = SegmentFetcher::new(
            Arc::new(CountingDownloader::new()),
            tracker,
            dir.path().to_path_buf(),
        );
        assert!(fetcher.fetch_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetched_record_lands_in_completed_set() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(SegmentTracker::new());
        tracker.offer_if_absent(record("media-1.ts"));
        let fetcher = SegmentFetcher::new(
            Arc::new(CountingDownloader::new()),
            Arc::clone(&tracker),
            dir.path().to_path_buf(),
        );

        let fetched = fetcher.fetch_next().await.unwrap().unwrap();
        let local = fetched.local_path().unwrap();
        assert!(local.ends_with("ch-media-1.ts"));
        assert!(local.exists());
        assert_eq!(tracker.completed_len(), 1);
    }

    #[tokio::test]
    async fn existing_file_skips_the_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ch-media-1.ts"), b"already here").unwrap();

        let tracker = Arc::new(SegmentTracker::new());
        tracker.offer_if_absent(record("media-1.ts"));
        let downloader = Arc::new(CountingDownloader::new());
        let fetcher = SegmentFetcher::new(
            Arc::clone(&downloader) as Arc<dyn SegmentDownloader>,
            Arc::clone(&tracker),
            dir.path().to_path_buf(),
        );

        assert!(fetcher.fetch_next().await.unwrap().is_none());
        assert!(downloader.request_counts().is_empty());
        assert_eq!(tracker.completed_len(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_loses_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(SegmentTracker::new());
        tracker.offer_if_absent(record("media-1.ts"));
        let fetcher = SegmentFetcher::new(
            Arc::new(CountingDownloader::failing()),
            Arc::clone(&tracker),
            dir.path().to_path_buf(),
        );

        assert!(fetcher.fetch_next().await.is_err());
        assert!(tracker.is_drained());
        assert_eq!(tracker.completed_len(), 0);
        // The lossy policy also means the URL stays refused on re-discovery.
        assert!(!tracker.offer_if_absent(record("media-1.ts")));
    }

    #[tokio::test]
    async fn concurrent_workers_fetch_each_segment_once() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(SegmentTracker::new());
        for i in 0..50 {
            tracker.offer_if_absent(record(&format!("media-{i}.ts")));
        }
        let downloader = Arc::new(CountingDownloader::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let fetcher = SegmentFetcher::new(
                Arc::clone(&downloader) as Arc<dyn SegmentDownloader>,
                Arc::clone(&tracker),
                dir.path().to_path_buf(),
            );
            handles.push(tokio::spawn(async move {
                while fetcher.fetch_next().await.unwrap().is_some() {}
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = downloader.request_counts();
        assert_eq!(counts.len(), 50);
        assert!(counts.values().all(|&count| count == 1));
        assert_eq!(tracker.completed_len(), 50);
    }
}
