//! Prompt record repository trait definition.

use promptwright_types::error::RepositoryError;
use promptwright_types::training::{
    Modification, PromptChangeReason, PromptRecord, PromptVersion, UserId,
};

/// Repository trait for the durable per-user prompt record.
///
/// Every operation is addressed by an explicit user id. Records are created
/// lazily on first read and never deleted. `history` is append-only.
pub trait PromptRecordRepository: Send + Sync {
    /// Read the full record, inserting the default empty record if absent.
    fn get_or_create(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<PromptRecord, RepositoryError>> + Send;

    /// Read only the current prompt text (empty for a fresh record).
    fn get_prompt(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<String, RepositoryError>> + Send;

    /// Overwrite the prompt and record the change as a new version.
    fn update_prompt(
        &self,
        user_id: &UserId,
        prompt: &str,
        reason: PromptChangeReason,
        modifications_applied: u32,
    ) -> impl std::future::Future<Output = Result<PromptVersion, RepositoryError>> + Send;

    /// Store a regenerated prompt that consumed the `consumed` oldest
    /// pending modifications.
    ///
    /// In one write: records a `Regenerated` version, drops exactly those
    /// entries from the tail of `pending_modifications` (anything saved
    /// since stays pending) and resets `flush_failures`.
    fn store_regenerated(
        &self,
        user_id: &UserId,
        prompt: &str,
        consumed: usize,
    ) -> impl std::future::Future<Output = Result<PromptVersion, RepositoryError>> + Send;

    /// Atomically prepend to `pending_modifications` and append to `history`.
    ///
    /// Returns the record as it stands after the write.
    fn append_modification(
        &self,
        user_id: &UserId,
        modification: &Modification,
    ) -> impl std::future::Future<Output = Result<PromptRecord, RepositoryError>> + Send;

    /// Set the consecutive failed-regeneration counter.
    fn set_flush_failures(
        &self,
        user_id: &UserId,
        failures: u32,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List prompt versions, oldest first.
    fn list_versions(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<PromptVersion>, RepositoryError>> + Send;
}
