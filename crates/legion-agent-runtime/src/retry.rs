// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::time::Duration;

/// Base backoff delay before the first retry.
pub const BASE_DELAY_MS: u64 = 500;
/// Multiplicative backoff factor applied after each failed attempt.
pub const BACKOFF_FACTOR: u32 = 2;
/// Maximum number of attempts, including the first.
pub const MAX_TRIES: u32 = 5;

/// Whether an error message names a transient model failure, the only
/// class this runtime retries with backoff. Classified
/// by the leading token a provider's error carries, mirroring how
/// `legion_model`'s mock and HTTP adapters report transient upstream
/// outages.
pub fn is_model_transient(err: &anyhow::Error) -> bool {
    err.to_string().starts_with("ModelTransient")
}

/// Retry `f` while it fails with a transient error, sleeping
/// `BASE_DELAY_MS * BACKOFF_FACTOR^attempt` between attempts, up to
/// `MAX_TRIES` total attempts. Non-transient errors and errors on the
/// final attempt are returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(mut f: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < MAX_TRIES && is_model_transient(&err) => {
                let delay_ms = BASE_DELAY_MS * BACKOFF_FACTOR.pow(attempt);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn is_model_transient_matches_prefix() {
        assert!(is_model_transient(&anyhow::anyhow!("ModelTransient: timeout")));
    }

    #[test]
    fn is_model_transient_false_for_other_errors() {
        assert!(!is_model_transient(&anyhow::anyhow!("ModelFatal: bad api key")));
    }

    #[tokio::test]
    async fn succeeds_immediately_without_retry() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("ModelTransient: flaky"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = retry_with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("ModelFatal: bad key")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_tries() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = retry_with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("ModelTransient: always flaky")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_TRIES);
    }
}
