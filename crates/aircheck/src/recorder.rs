// Window scheduler: owns the recording lifecycle from waiting through drain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RecorderConfig;
use crate::encode::Encoder;
use crate::error::RecorderError;
use crate::fetcher::{SegmentDownloader, SegmentFetcher};
use crate::playlist::{IndexPoller, IndexSource};
use crate::queue::SegmentTracker;
use crate::segment::{self, SegmentRecord};
use crate::window::WindowStatus;

/// Coarse re-check cadence while today is not an active weekday.
const CLOSED_DAY_SLEEP: Duration = Duration::from_secs(60 * 60);
/// Re-check cadence while waiting for the window to open.
const WAITING_SLEEP: Duration = Duration::from_secs(60);
/// Queue-emptiness polling cadence during the drain phase.
const DRAIN_POLL: Duration = Duration::from_secs(1);

/// Summary of one completed recording window.
#[derive(Debug)]
pub struct WindowOutcome {
    pub segments: usize,
    pub output: Option<PathBuf>,
}

/// Drives the pipeline through `Idle -> WaitingForWindow -> Recording ->
/// Draining -> Done` and hands the window's ordered segment set to the
/// encoder.
pub struct WindowScheduler {
    config: Arc<RecorderConfig>,
    index_source: Arc<dyn IndexSource>,
    downloader: Arc<dyn SegmentDownloader>,
    encoder: Arc<dyn Encoder>,
    shutdown: CancellationToken,
}

impl WindowScheduler {
    pub fn new(
        config: Arc<RecorderConfig>,
        index_source: Arc<dyn IndexSource>,
        downloader: Arc<dyn SegmentDownloader>,
        encoder: Arc<dyn Encoder>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            index_source,
            downloader,
            encoder,
            shutdown,
        }
    }

    /// Records windows until shutdown, or after one window when not in
    /// continuous mode.
    pub async fn run(&self) -> Result<(), RecorderError> {
        loop {
            match self.next_window().await? {
                Some(outcome) => {
                    info!(
                        segments = outcome.segments,
                        output = ?outcome.output,
                        "recording window complete"
                    );
                }
                None => {
                    info!("shutdown requested before a window opened");
                    return Ok(());
                }
            }
            if self.shutdown.is_cancelled() || !self.config.continuous {
                return Ok(());
            }
        }
    }

    /// Waits for the next open window and records it. `None` when shutdown
    /// was requested before recording started.
    async fn next_window(&self) -> Result<Option<WindowOutcome>, RecorderError> {
        let window = self.config.window();
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(None);
            }
            let now = Local::now().naive_local();
            match window.status(now) {
                WindowStatus::ClosedToday => {
                    debug!("outside active weekdays, waiting");
                    if self.wait(CLOSED_DAY_SLEEP).await {
                        return Ok(None);
                    }
                }
                WindowStatus::BeforeWindow { until_open } => {
                    debug!(?until_open, "window not open yet");
                    if self.wait(WAITING_SLEEP.min(until_open)).await {
                        return Ok(None);
                    }
                }
                WindowStatus::AfterWindow => {
                    debug!("window already closed today, waiting for the next day");
                    if self.wait(WAITING_SLEEP).await {
                        return Ok(None);
                    }
                }
                WindowStatus::Open { remaining } => {
                    let records = self.record_window(remaining).await?;
                    let outcome = self.hand_off(records).await?;
                    return Ok(Some(outcome));
                }
            }
        }
    }

    /// Recording plus draining for one open window.
    ///
    /// Errors inside the scheduled poll/fetch invocations are contained in
    /// their tasks; only filesystem setup failures unwind from here and
    /// abort the window.
    async fn record_window(&self, remaining: Duration) -> Result<Vec<SegmentRecord>, RecorderError> {
        let work_dir = self.config.work_dir_for(Local::now().date_naive());
        tokio::fs::create_dir_all(&work_dir).await?;

        info!(
            work_dir = %work_dir.display(),
            duration_secs = remaining.as_secs(),
            "recording window open"
        );

        let tracker = Arc::new(SegmentTracker::new());
        // Discovery stops with the global shutdown; fetch workers keep
        // their own token so they can still drain the queue afterwards.
        let poll_token = self.shutdown.child_token();
        let fetch_token = CancellationToken::new();

        let poller = IndexPoller::new(
            Arc::clone(&self.index_source),
            Arc::clone(&tracker),
            self.config.playlist_url.clone(),
            self.config.segment_extension.clone(),
        );
        let poll_handle = spawn_poll_task(poller, self.config.poll_interval, poll_token.clone());

        let mut handles = Vec::with_capacity(self.config.fetch_workers + 1);
        for slot in 0..self.config.fetch_workers {
            let fetcher = SegmentFetcher::new(
                Arc::clone(&self.downloader),
                Arc::clone(&tracker),
                work_dir.clone(),
            );
            handles.push(spawn_fetch_task(
                fetcher,
                slot,
                self.config.fetch_interval,
                fetch_token.clone(),
            ));
        }

        // Discovery runs until the window deadline or a shutdown request,
        // whichever comes first.
        if self.wait(remaining).await {
            info!("shutdown requested, flushing already-discovered segments");
        }
        poll_token.cancel();

        // Grace period: already-discovered segments still get fetched.
        // Pop-before-fetch guarantees the queue shrinks even when fetches
        // fail, so this loop terminates.
        while !tracker.is_drained() {
            debug!(pending = tracker.pending_len(), "draining segment queue");
            time::sleep(DRAIN_POLL).await;
        }
        fetch_token.cancel();

        handles.push(poll_handle);
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        match time::timeout(self.config.shutdown_grace, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "pipeline task failed to shut down cleanly");
                    }
                }
            }
            Err(_) => {
                warn!("pipeline tasks did not stop within the grace period, aborting");
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        info!(
            segments = tracker.completed_len(),
            "recording window drained"
        );
        Ok(tracker.take_completed())
    }

    /// Sorts the completed set into broadcast order and hands the local
    /// paths to the encoder.
    async fn hand_off(&self, mut records: Vec<SegmentRecord>) -> Result<WindowOutcome, RecorderError> {
        if records.is_empty() {
            warn!("window produced no segments, skipping encode");
            return Ok(WindowOutcome {
                segments: 0,
                output: None,
            });
        }

        records.sort_by(segment::broadcast_cmp);
        let paths: Vec<PathBuf> = records
            .iter()
            .filter_map(|record| record.local_path().map(PathBuf::from))
            .collect();

        info!(segments = paths.len(), "handing ordered segments to the encoder");
        let output = self.encoder.encode(&paths).await?;
        Ok(WindowOutcome {
            segments: paths.len(),
            output: Some(output),
        })
    }

    /// Sleeps unless shutdown fires first. Returns true when cancelled.
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => true,
            _ = time::sleep(duration) => false,
        }
    }
}

fn spawn_poll_task(
    poller: IndexPoller,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    match poller.poll_once().await {
                        Ok(0) => debug!("index poll found no new segments"),
                        Ok(added) => info!(added, "index poll enqueued segments"),
                        Err(e) if e.is_transient() => {
                            warn!(error = %e, "index poll failed, retrying next cycle");
                        }
                        // A URL that cannot be constructed signals a parsing
                        // defect, not a transient network condition.
                        Err(e) => error!(error = %e, "index poll cycle aborted"),
                    }
                }
            }
        }
        debug!("index poll task stopped");
    })
}

fn spawn_fetch_task(
    fetcher: SegmentFetcher,
    slot: usize,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    match fetcher.fetch_next().await {
                        Ok(Some(record)) => debug!(slot, url = %record.source_url(), "segment fetched"),
                        Ok(None) => {}
                        // Lossy policy: the record is gone for this run.
                        Err(e) => warn!(slot, error = %e, "segment fetch failed"),
                    }
                }
            }
        }
        debug!(slot, "fetch task stopped");
    })
}
