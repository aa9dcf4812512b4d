use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Weekday};
use url::Url;

use crate::error::RecorderError;
use crate::proxy::ProxyConfig;
use crate::window::RecordingWindow;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Immutable configuration for one recorder process.
///
/// Constructed once at startup and shared by reference into every
/// component; there is no global configuration state.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Live index (playlist) URL, single audio rendition.
    pub playlist_url: Url,

    /// File extension that marks an index line as a segment reference.
    pub segment_extension: String,

    /// Local wall-clock start of the daily recording window.
    pub start: NaiveTime,

    /// Local wall-clock end of the daily recording window.
    pub end: NaiveTime,

    /// Weekdays on which the window is active.
    pub weekdays: HashSet<Weekday>,

    /// How far ahead of `start` recording may begin.
    pub start_lead: Duration,

    /// Extra wall-clock time past `end` before segment discovery stops.
    pub end_pad: Duration,

    /// Interval between index polls while recording.
    pub poll_interval: Duration,

    /// Number of concurrent segment fetch workers.
    pub fetch_workers: usize,

    /// Tick interval of each fetch worker.
    pub fetch_interval: Duration,

    /// Base directory; segments land in a per-day subdirectory of it.
    pub base_dir: PathBuf,

    /// Total timeout for a single index or segment request.
    pub request_timeout: Duration,

    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Bounded wait for in-flight tasks to observe cancellation before
    /// they are aborted.
    pub shutdown_grace: Duration,

    /// Keep recording windows back to back instead of exiting after one.
    pub continuous: bool,
}

impl RecorderConfig {
    /// Configuration with defaults for everything except the schedule and
    /// the feed location.
    pub fn new(playlist_url: Url, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            playlist_url,
            segment_extension: ".ts".to_string(),
            start,
            end,
            weekdays: HashSet::from([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]),
            start_lead: Duration::from_secs(60),
            end_pad: Duration::from_secs(60),
            poll_interval: Duration::from_secs(20),
            fetch_workers: 2,
            fetch_interval: Duration::from_secs(1),
            base_dir: PathBuf::from("."),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy: None,
            shutdown_grace: Duration::from_secs(10),
            continuous: false,
        }
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.start >= self.end {
            return Err(RecorderError::configuration(format!(
                "window start {} must precede end {} on the same day",
                self.start, self.end
            )));
        }
        if self.weekdays.is_empty() {
            return Err(RecorderError::configuration(
                "at least one active weekday is required",
            ));
        }
        if self.fetch_workers == 0 {
            return Err(RecorderError::configuration(
                "at least one fetch worker is required",
            ));
        }
        if self.poll_interval.is_zero() || self.fetch_interval.is_zero() {
            return Err(RecorderError::configuration(
                "poll and fetch intervals must be non-zero",
            ));
        }
        if !self.segment_extension.starts_with('.') {
            return Err(RecorderError::configuration(format!(
                "segment extension `{}` must start with a dot",
                self.segment_extension
            )));
        }
        Ok(())
    }

    /// Working directory for segments of the window recorded on `date`.
    pub fn work_dir_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir.join(date.format("%Y%m%d").to_string())
    }

    pub fn window(&self) -> RecordingWindow {
        RecordingWindow {
            start: self.start,
            end: self.end,
            weekdays: self.weekdays.clone(),
            lead: self.start_lead,
            pad: self.end_pad,
        }
    }
}
