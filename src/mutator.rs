//! Chunked bulk label changes with retry on transient failures
//!
//! Ids are submitted in contiguous chunks of at most [`BATCH_SIZE`] in input
//! order. Chunks are independent: a failing chunk does not undo the ones
//! already applied. Adding a label a message already carries is a no-op on
//! the Gmail side, which makes each chunk safe to resubmit.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::GmailClient;
use crate::error::{GmailError, Result};
use crate::models::{MessageId, LABEL_STARRED, LABEL_TRASH};

/// Maximum ids per `messages.batchModify` call
pub const BATCH_SIZE: usize = 1000;

/// Decides whether a failed attempt may be retried
pub type TransientPredicate = fn(&GmailError) -> bool;

/// Retry policy for a single remote mutation
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Factor applied to the delay after every failed attempt
    pub multiplier: u32,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
    pub is_transient: TransientPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2,
            max_backoff: Duration::from_secs(30),
            is_transient: GmailError::is_transient,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("multiplier", &self.multiplier)
            .field("max_backoff", &self.max_backoff)
            .finish_non_exhaustive()
    }
}

/// Successful result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Full delay schedule between attempts
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.backoff_for(a)).collect()
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(value) => return Ok(RetryOutcome { value, attempts }),
                Err(e) if (self.is_transient)(&e) && attempts < max_attempts => {
                    let delay = self.backoff_for(attempts);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name, attempts, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempts > 1 {
                        warn!("{} gave up after {} attempts: {}", operation_name, attempts, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Applies a label to many messages in fixed-size chunks
#[derive(Debug, Clone)]
pub struct BatchMutator {
    policy: RetryPolicy,
    batch_size: usize,
}

impl Default for BatchMutator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl BatchMutator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the chunk size; values outside 1..=[`BATCH_SIZE`] are clamped
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, BATCH_SIZE);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Add `add_label` to every id, one batch call per chunk.
    ///
    /// Returns the number of ids submitted. The count is not confirmed per
    /// message by Gmail.
    pub async fn apply_bulk_label_change<C>(
        &self,
        client: &C,
        ids: &[MessageId],
        add_label: &str,
    ) -> Result<usize>
    where
        C: GmailClient + ?Sized,
    {
        if ids.is_empty() {
            return Ok(0);
        }

        let add_labels = vec![add_label.to_string()];
        let chunk_count = ids.len().div_ceil(self.batch_size);
        let mut total = 0;

        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            let outcome = self
                .policy
                .run("batch_modify", || client.batch_modify(chunk, &add_labels, &[]))
                .await?;

            total += chunk.len();
            debug!(
                "Chunk {}/{} added {} to {} messages ({} attempts)",
                index + 1,
                chunk_count,
                add_label,
                chunk.len(),
                outcome.attempts
            );
        }

        info!("Added {} to {} messages in {} chunks", add_label, total, chunk_count);
        Ok(total)
    }

    /// Move messages to the trash (reversible for 30 days)
    pub async fn move_to_trash<C>(&self, client: &C, ids: &[MessageId]) -> Result<usize>
    where
        C: GmailClient + ?Sized,
    {
        self.apply_bulk_label_change(client, ids, LABEL_TRASH).await
    }

    pub async fn add_star<C>(&self, client: &C, ids: &[MessageId]) -> Result<usize>
    where
        C: GmailClient + ?Sized,
    {
        self.apply_bulk_label_change(client, ids, LABEL_STARRED).await
    }
}
