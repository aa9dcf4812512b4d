// Lock-file liveness: deleting the lock file from outside requests shutdown.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::RecorderError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Watches a lock file created at startup. Removing the file is the
/// operator's signal to stop acquiring and flush what exists; the watch
/// answers by cancelling the shutdown token.
pub struct LivenessMonitor {
    lock_file: PathBuf,
    shutdown: CancellationToken,
}

impl LivenessMonitor {
    /// Creates the lock file. Fails if it already exists, since a second
    /// instance must not run against the same state.
    pub async fn create(
        lock_file: PathBuf,
        shutdown: CancellationToken,
    ) -> Result<Self, RecorderError> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_file)
            .await?;
        info!(path = %lock_file.display(), "lock file created");
        Ok(Self {
            lock_file,
            shutdown,
        })
    }

    /// Spawns the polling watch. The task ends once the token is cancelled
    /// (by this watch on deletion, or by anyone else) and removes the lock
    /// file if it still exists.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = time::sleep(POLL_INTERVAL) => {
                        match fs::try_exists(&self.lock_file).await {
                            Ok(true) => {}
                            Ok(false) => {
                                info!(
                                    path = %self.lock_file.display(),
                                    "lock file removed, requesting shutdown"
                                );
                                self.shutdown.cancel();
                                // Nothing left on disk to clean up.
                                return;
                            }
                            Err(e) => warn!(error = %e, "lock file check failed"),
                        }
                    }
                }
            }
            if let Err(e) = fs::remove_file(&self.lock_file).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                error!(
                    path = %self.lock_file.display(),
                    error = %e,
                    "failed to remove lock file"
                );
            }
        })
    }
}
