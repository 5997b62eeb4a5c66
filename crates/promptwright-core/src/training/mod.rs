//! Training session flow.
//!
//! - `TrainingController`: per-session state machine (Idle / Training)
//! - `ModificationClassifier`: decides whether a turn is prompt feedback
//! - `ModificationLedger`: durable save + batched flush with retry policy
//! - `PromptSynthesizer`: folds a batch of modifications into a new prompt
//! - `TrainingResponder`: ordinary replies driven by the current prompt
//! - `SessionRegistry`: live sessions keyed by session id

pub mod classifier;
pub mod controller;
pub mod ledger;
pub mod replies;
pub mod responder;
pub mod session;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod test_support;
