//! Aircheck: scheduled acquisition of a live HLS audio feed.
//!
//! The engine waits for a configured daily time window, polls the live
//! index document on a fixed interval, fetches every referenced segment
//! exactly once into a per-day working directory, and hands the ordered
//! segment files to an [`Encoder`] when the window closes.

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod fetcher;
pub mod liveness;
pub mod playlist;
pub mod proxy;
pub mod queue;
pub mod recorder;
pub mod segment;
pub mod window;

// Re-exports for easier access
pub use client::build_http_client;
pub use config::RecorderConfig;
pub use encode::{Encoder, FfmpegEncoder};
pub use error::RecorderError;
pub use fetcher::{HttpSegmentDownloader, SegmentDownloader, SegmentFetcher};
pub use liveness::LivenessMonitor;
pub use playlist::{HttpIndexSource, IndexPoller, IndexSource};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use queue::SegmentTracker;
pub use recorder::{WindowOutcome, WindowScheduler};
pub use segment::SegmentRecord;
pub use window::{RecordingWindow, WindowStatus};
