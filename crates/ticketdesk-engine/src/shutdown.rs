// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that the desk loop monitors. Handlers already in
//! flight are drained before the process exits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Closes `tracker` and waits up to `timeout` for its tasks to finish.
///
/// Returns `true` if every task completed in time.
pub async fn drain(tracker: &TaskTracker, timeout: Duration) -> bool {
    tracker.close();
    if tracker.is_empty() {
        return true;
    }
    info!(in_flight = tracker.len(), "draining in-flight handlers");
    match tokio::time::timeout(timeout, tracker.wait()).await {
        Ok(()) => {
            debug!("all handlers completed");
            true
        }
        Err(_) => {
            warn!(
                remaining = tracker.len(),
                "drain timed out, abandoning remaining handlers"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_waits_for_running_tasks() {
        let tracker = TaskTracker::new();
        tracker.spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        assert!(drain(&tracker, Duration::from_secs(5)).await);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_timeout() {
        let tracker = TaskTracker::new();
        tracker.spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(!drain(&tracker, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn drain_of_idle_tracker_is_immediate() {
        let tracker = TaskTracker::new();
        assert!(drain(&tracker, Duration::from_millis(1)).await);
        assert!(tracker.is_closed());
    }
}
