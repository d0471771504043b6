// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry for idempotent reads.

use std::future::Future;
use std::time::Duration;

use ticketdesk_core::DeskError;
use tracing::warn;

/// Attempts made before a transient failure is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

const BASE_DELAY: Duration = Duration::from_millis(50);

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors for which [`DeskError::is_transient`] holds are retried, with
/// the delay doubling after each attempt. Never wrap a mutation in this.
pub async fn retry_read<T, F, Fut>(what: &'static str, mut op: F) -> Result<T, DeskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeskError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay = BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(what, attempt, error = %e, ?delay, "transient read failure, will retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn transient() -> DeskError {
        DeskError::Storage {
            source: "database is locked".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = &AtomicU32::new(0);
        let value = retry_read("probe", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_read("probe", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_read("probe", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DeskError::Validation("bad".into()))
        })
        .await;
        assert!(matches!(result, Err(DeskError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
