//! Durable modification ledger.
//!
//! `ModificationLedger` records every classified modification on the user's
//! [`PromptRecord`] and decides when the pending batch is folded into a new
//! prompt. History is append-only. A stored regeneration removes only the
//! batch it was synthesized from; modifications saved while the oracle was
//! working stay pending for the next batch.
//!
//! Failed regenerations keep the batch and bump `flush_failures`. Once
//! failures reach the configured maximum, each further attempt waits for one
//! more full batch of feedback (see [`FlushPolicy`]).

use std::sync::Arc;

use promptwright_types::config::TrainingConfig;
use promptwright_types::error::RepositoryError;
use promptwright_types::training::{Modification, PromptRecord, UserId};
use tracing::{debug, info, warn};

use crate::repository::prompt::PromptRecordRepository;
use crate::training::synthesizer::PromptSynthesizer;

/// When a pending batch is due for regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    threshold: usize,
    max_consecutive_failures: u32,
}

impl FlushPolicy {
    pub fn new(threshold: usize, max_consecutive_failures: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            max_consecutive_failures,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.flush_threshold, config.max_consecutive_flush_failures)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether a batch of `pending` modifications should be flushed after
    /// `failures` consecutive failed attempts.
    ///
    /// Below `max_consecutive_failures` every qualifying save retries. From
    /// there on the batch must grow by one threshold per extra failure.
    pub fn should_flush(&self, pending: usize, failures: u32) -> bool {
        if pending < self.threshold {
            return false;
        }
        if failures < self.max_consecutive_failures {
            return true;
        }
        let batches = (failures - self.max_consecutive_failures) as usize + 2;
        pending >= self.threshold.saturating_mul(batches)
    }
}

/// Result of one flush check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Fewer pending modifications than the threshold.
    NotDue { pending: usize },
    /// Enough pending, but the retry policy is backing off.
    Deferred { pending: usize, failures: u32 },
    /// A new prompt version was stored from `batch_size` modifications.
    Regenerated { version: i32, batch_size: usize },
    /// Synthesis or storing its result failed; the batch is kept.
    Failed { pending: usize, failures: u32 },
}

/// Result of saving a modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// History length after the save.
    pub history_len: usize,
    pub flush: FlushOutcome,
}

/// Saves modifications and regenerates the prompt in batches.
pub struct ModificationLedger<R: PromptRecordRepository> {
    repo: Arc<R>,
    synthesizer: PromptSynthesizer,
    policy: FlushPolicy,
}

impl<R: PromptRecordRepository> ModificationLedger<R> {
    pub fn new(repo: Arc<R>, synthesizer: PromptSynthesizer, policy: FlushPolicy) -> Self {
        Self {
            repo,
            synthesizer,
            policy,
        }
    }

    /// Record `modification` for `user_id`, then flush if due.
    ///
    /// Only the save itself can fail the call. Problems during the flush are
    /// logged and reported as [`FlushOutcome::Failed`].
    pub async fn save_modification(
        &self,
        user_id: &UserId,
        modification: &Modification,
    ) -> Result<SaveOutcome, RepositoryError> {
        let record = self.repo.append_modification(user_id, modification).await?;
        info!(
            user_id = %user_id,
            modification_type = %modification.modification_type,
            pending = record.pending_modifications.len(),
            history = record.history.len(),
            "Modification recorded"
        );

        let history_len = record.history.len();
        let flush = self.flush(user_id, &record).await;
        Ok(SaveOutcome { history_len, flush })
    }

    /// Regenerate the prompt from `record`'s pending batch if the policy allows.
    pub async fn flush(&self, user_id: &UserId, record: &PromptRecord) -> FlushOutcome {
        let pending = record.pending_modifications.len();
        let failures = record.flush_failures;

        if pending < self.policy.threshold() {
            return FlushOutcome::NotDue { pending };
        }
        if !self.policy.should_flush(pending, failures) {
            debug!(user_id = %user_id, pending, failures, "Flush deferred by retry policy");
            return FlushOutcome::Deferred { pending, failures };
        }

        let prompt = match self
            .synthesizer
            .synthesize(&record.prompt, &record.pending_modifications)
            .await
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(user_id = %user_id, pending, error = %e, "Prompt synthesis failed; keeping batch");
                return self.record_failure(user_id, pending, failures).await;
            }
        };

        let version = match self.repo.store_regenerated(user_id, &prompt, pending).await {
            Ok(version) => version,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to store regenerated prompt; keeping batch");
                return self.record_failure(user_id, pending, failures).await;
            }
        };

        info!(
            user_id = %user_id,
            version = version.version,
            batch_size = pending,
            "Prompt regenerated"
        );
        FlushOutcome::Regenerated {
            version: version.version,
            batch_size: pending,
        }
    }

    async fn record_failure(&self, user_id: &UserId, pending: usize, failures: u32) -> FlushOutcome {
        let failures = failures.saturating_add(1);
        if let Err(e) = self.repo.set_flush_failures(user_id, failures).await {
            warn!(user_id = %user_id, error = %e, "Failed to store flush failure counter");
        }
        FlushOutcome::Failed { pending, failures }
    }
}
