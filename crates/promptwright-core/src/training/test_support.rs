//! Test doubles for the training flow: scripted oracle, in-memory store,
//! canned transcriber.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use promptwright_types::error::{RepositoryError, TranscriptionError};
use promptwright_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use promptwright_types::message::AudioPayload;
use promptwright_types::training::{
    Modification, PromptChangeReason, PromptRecord, PromptVersion, RecordedModification, UserId,
};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;
use crate::repository::prompt::PromptRecordRepository;
use crate::transcript::Transcriber;

// --- Oracle ---

#[derive(Clone, Debug)]
pub enum Scripted {
    Reply(String),
    Fail,
}

pub fn reply(content: &str) -> Scripted {
    Scripted::Reply(content.to_string())
}

/// Oracle that answers from a queue and records every request it sees.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            capabilities: ProviderCapabilities {
                max_output_tokens: 4_096,
            },
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn push(&self, item: Scripted) {
        self.script.lock().unwrap().push_back(item);
    }

    pub fn boxed(&self) -> Arc<BoxLlmProvider> {
        Arc::new(BoxLlmProvider::new(self.clone()))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        async move {
            match next {
                Some(Scripted::Reply(content)) => Ok(CompletionResponse {
                    id: "resp-scripted".to_string(),
                    content,
                    model: "scripted-model".to_string(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage {
                        input_tokens: 10,
                        output_tokens: 20,
                    },
                }),
                Some(Scripted::Fail) => Err(LlmError::Provider {
                    message: "scripted failure".to_string(),
                }),
                None => Err(LlmError::Provider {
                    message: "script exhausted".to_string(),
                }),
            }
        }
    }
}

// --- Store ---

#[derive(Default)]
struct StoreState {
    records: HashMap<UserId, PromptRecord>,
    versions: HashMap<UserId, Vec<PromptVersion>>,
    calls: usize,
    fail_all: bool,
    fail_prompt_updates: bool,
}

/// `PromptRecordRepository` backed by a `HashMap`.
#[derive(Clone, Default)]
pub struct InMemoryPromptRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPromptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing call counting.
    pub fn seed(&self, user_id: &UserId, prompt: &str, pending: Vec<Modification>) {
        let mut record = PromptRecord::empty(user_id.clone());
        record.prompt = prompt.to_string();
        record.pending_modifications = pending;
        self.state
            .lock()
            .unwrap()
            .records
            .insert(user_id.clone(), record);
    }

    pub fn set_flush_failures_direct(&self, user_id: &UserId, failures: u32) {
        if let Some(record) = self.state.lock().unwrap().records.get_mut(user_id) {
            record.flush_failures = failures;
        }
    }

    pub fn record(&self, user_id: &UserId) -> Option<PromptRecord> {
        self.state.lock().unwrap().records.get(user_id).cloned()
    }

    pub fn versions(&self, user_id: &UserId) -> Vec<PromptVersion> {
        self.state
            .lock()
            .unwrap()
            .versions
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of repository calls made so far.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    /// Make every subsequent call fail with a connection error.
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    /// Make only `update_prompt` fail.
    pub fn fail_prompt_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_prompt_updates = fail;
    }

    fn with_state<T>(
        &self,
        op: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_all {
            return Err(RepositoryError::Connection);
        }
        op(&mut state)
    }
}

fn entry<'a>(state: &'a mut StoreState, user_id: &UserId) -> &'a mut PromptRecord {
    state
        .records
        .entry(user_id.clone())
        .or_insert_with(|| PromptRecord::empty(user_id.clone()))
}

fn write_version(
    state: &mut StoreState,
    user_id: &UserId,
    prompt: &str,
    reason: PromptChangeReason,
    modifications_applied: u32,
) -> PromptVersion {
    let record = entry(state, user_id);
    record.prompt = prompt.to_string();
    record.updated_at = Utc::now();
    let versions = state.versions.entry(user_id.clone()).or_default();
    let version = PromptVersion {
        version: versions.len() as i32 + 1,
        prompt: prompt.to_string(),
        reason,
        modifications_applied,
        created_at: Utc::now(),
    };
    versions.push(version.clone());
    version
}

impl PromptRecordRepository for InMemoryPromptRepository {
    fn get_or_create(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<PromptRecord, RepositoryError>> + Send {
        let result = self.with_state(|s| Ok(entry(s, user_id).clone()));
        async move { result }
    }

    fn get_prompt(&self, user_id: &UserId) -> impl Future<Output = Result<String, RepositoryError>> + Send {
        let result = self.with_state(|s| Ok(entry(s, user_id).prompt.clone()));
        async move { result }
    }

    fn update_prompt(
        &self,
        user_id: &UserId,
        prompt: &str,
        reason: PromptChangeReason,
        modifications_applied: u32,
    ) -> impl Future<Output = Result<PromptVersion, RepositoryError>> + Send {
        let result = self.with_state(|s| {
            if s.fail_prompt_updates {
                return Err(RepositoryError::Query("prompt update rejected".to_string()));
            }
            Ok(write_version(s, user_id, prompt, reason, modifications_applied))
        });
        async move { result }
    }

    fn store_regenerated(
        &self,
        user_id: &UserId,
        prompt: &str,
        consumed: usize,
    ) -> impl Future<Output = Result<PromptVersion, RepositoryError>> + Send {
        let result = self.with_state(|s| {
            if s.fail_prompt_updates {
                return Err(RepositoryError::Query("prompt update rejected".to_string()));
            }
            let record = entry(s, user_id);
            let keep = record.pending_modifications.len().saturating_sub(consumed);
            record.pending_modifications.truncate(keep);
            record.flush_failures = 0;
            Ok(write_version(s, user_id, prompt, PromptChangeReason::Regenerated, consumed as u32))
        });
        async move { result }
    }

    fn append_modification(
        &self,
        user_id: &UserId,
        modification: &Modification,
    ) -> impl Future<Output = Result<PromptRecord, RepositoryError>> + Send {
        let result = self.with_state(|s| {
            let record = entry(s, user_id);
            record.pending_modifications.insert(0, modification.clone());
            record.history.push(RecordedModification {
                modification: modification.clone(),
                recorded_at: Utc::now(),
            });
            Ok(record.clone())
        });
        async move { result }
    }

    fn set_flush_failures(
        &self,
        user_id: &UserId,
        failures: u32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self.with_state(|s| {
            entry(s, user_id).flush_failures = failures;
            Ok(())
        });
        async move { result }
    }

    fn list_versions(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<PromptVersion>, RepositoryError>> + Send {
        let result =
            self.with_state(|s| Ok(s.versions.get(user_id).cloned().unwrap_or_default()));
        async move { result }
    }
}

// --- Transcriber ---

/// Transcriber returning a fixed transcript (or failing) and counting calls.
#[derive(Clone)]
pub struct MockTranscriber {
    transcript: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn ok(transcript: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// For tests that only send text.
    pub fn unused() -> Self {
        Self::failing()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(
        &self,
        _audio: &AudioPayload,
    ) -> impl Future<Output = Result<String, TranscriptionError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let transcript = self.transcript.clone();
        async move {
            transcript.ok_or_else(|| TranscriptionError::Service {
                status: 500,
                body: "transcription backend down".to_string(),
            })
        }
    }
}
