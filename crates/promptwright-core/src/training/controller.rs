//! Training session controller.
//!
//! Per-session state machine with two modes:
//!
//! - **Idle** (no registry entry): the train keyword starts a session and
//!   emits the welcome block; anything else is left for other flows.
//! - **Training**: the exit keyword ends the session. Every other turn is
//!   classified; feedback is recorded on the durable prompt record, ordinary
//!   messages get a reply generated from the current prompt.
//!
//! A turn is staged on a copy of the conversation and committed only when
//! every step succeeded, so a store failure leaves the session exactly as it
//! was before the turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use promptwright_types::config::GlobalConfig;
use promptwright_types::error::TrainingError;
use promptwright_types::message::{InboundMessage, Reply, TurnOutcome};
use promptwright_types::training::{
    ClassifierVerdict, ConversationTurn, SessionId, TrainingMode, UserId,
};

use crate::llm::box_provider::BoxLlmProvider;
use crate::repository::prompt::PromptRecordRepository;
use crate::training::classifier::ModificationClassifier;
use crate::training::ledger::{FlushPolicy, ModificationLedger};
use crate::training::replies::{
    FAILURE_MESSAGE, RETRY_MESSAGE, acknowledgment_entry, exit_block, modification_ack_block,
    welcome_block,
};
use crate::training::responder::TrainingResponder;
use crate::training::session::SessionRegistry;
use crate::training::synthesizer::PromptSynthesizer;
use crate::transcript::{Transcriber, TranscriptNormalizer};

/// Drives training sessions end to end.
///
/// Generic over the prompt store and the transcriber so promptwright-core
/// never depends on promptwright-infra.
pub struct TrainingController<R: PromptRecordRepository, T: Transcriber> {
    normalizer: TranscriptNormalizer<T>,
    classifier: ModificationClassifier,
    ledger: ModificationLedger<R>,
    responder: TrainingResponder<R>,
    registry: Arc<SessionRegistry>,
    train_keyword: String,
    exit_keyword: String,
    default_user_id: UserId,
}

impl<R: PromptRecordRepository, T: Transcriber> TrainingController<R, T> {
    /// Wire a controller from its collaborators and configuration.
    pub fn new(
        repo: Arc<R>,
        provider: Arc<BoxLlmProvider>,
        transcriber: T,
        config: &GlobalConfig,
    ) -> Self {
        let training = &config.training;
        let model = config.provider.model.clone();

        let synthesizer = PromptSynthesizer::new(provider.clone(), model.clone(), training);
        Self {
            normalizer: TranscriptNormalizer::new(transcriber),
            classifier: ModificationClassifier::new(provider.clone(), model.clone(), training),
            ledger: ModificationLedger::new(
                repo.clone(),
                synthesizer,
                FlushPolicy::from_config(training),
            ),
            responder: TrainingResponder::new(repo, provider, model, training),
            registry: Arc::new(SessionRegistry::new(Duration::from_secs(
                training.session_idle_timeout_secs,
            ))),
            train_keyword: training.train_keyword.trim().to_lowercase(),
            exit_keyword: training.exit_keyword.trim().to_lowercase(),
            default_user_id: UserId::new(config.default_user_id.clone()),
        }
    }

    /// Registry of live sessions (used by the idle sweeper and status views).
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle one inbound message.
    ///
    /// Store failures are returned; the session is left as it was.
    #[tracing::instrument(name = "training_turn", skip(self, message), fields(session_id = %message.session_id))]
    pub async fn handle(&self, message: &InboundMessage) -> Result<TurnOutcome, TrainingError> {
        let Some(text) = self.normalizer.normalize(message).await else {
            return Ok(TurnOutcome::Handled(vec![Reply::Text(RETRY_MESSAGE.to_string())]));
        };

        let Some(handle) = self.registry.get(&message.session_id) else {
            return Ok(self.handle_idle(message, &text));
        };

        let mut state = handle.lock().await;
        if state.mode == TrainingMode::Idle {
            // Ended or evicted while this turn waited for the lock.
            drop(state);
            return Ok(self.handle_idle(message, &text));
        }
        if self.registry.is_expired(&state) {
            info!(session_id = %message.session_id, "Training session expired; treating as idle");
            state.mode = TrainingMode::Idle;
            self.registry.end(&message.session_id);
            drop(state);
            return Ok(self.handle_idle(message, &text));
        }

        if self.is_keyword(&text, &self.exit_keyword) {
            state.mode = TrainingMode::Idle;
            state.conversation.clear();
            self.registry.end(&message.session_id);
            info!(
                session_id = %message.session_id,
                user_id = %state.user_id,
                "Training session ended"
            );
            return Ok(TurnOutcome::Handled(vec![exit_block()]));
        }

        let user_id = state.user_id.clone();
        let mut staged = state.conversation.clone();
        staged.push(ConversationTurn::user(text));

        let reply = match self.classifier.classify(&staged).await {
            ClassifierVerdict::Modification(modification) => {
                let outcome = self.ledger.save_modification(&user_id, &modification).await?;
                info!(
                    session_id = %message.session_id,
                    history = outcome.history_len,
                    flush = ?outcome.flush,
                    "Modification detected"
                );
                staged.push(ConversationTurn::assistant(acknowledgment_entry(&modification)));
                modification_ack_block(&modification)
            }
            ClassifierVerdict::NotAModification => {
                let answer = self.responder.respond(&user_id, &staged).await?;
                staged.push(ConversationTurn::assistant(answer.clone()));
                Reply::Text(answer)
            }
        };

        state.conversation = staged;
        state.last_activity = Utc::now();
        Ok(TurnOutcome::Handled(vec![reply]))
    }

    /// Handle a message, turning a failed turn into the generic failure reply.
    pub async fn handle_or_apologize(&self, message: &InboundMessage) -> TurnOutcome {
        match self.handle(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session_id = %message.session_id, error = %e, "Training turn failed");
                TurnOutcome::Handled(vec![Reply::Text(FAILURE_MESSAGE.to_string())])
            }
        }
    }

    /// Whether `session_id` is currently in training.
    pub fn is_training(&self, session_id: &SessionId) -> bool {
        self.registry.get(session_id).is_some()
    }

    fn handle_idle(&self, message: &InboundMessage, text: &str) -> TurnOutcome {
        if !self.is_keyword(text, &self.train_keyword) {
            return TurnOutcome::NotHandled;
        }

        let user_id = message
            .user_id
            .clone()
            .unwrap_or_else(|| self.default_user_id.clone());
        info!(session_id = %message.session_id, user_id = %user_id, "Training session started");
        self.registry.start(message.session_id.clone(), user_id);
        TurnOutcome::Handled(vec![welcome_block(&self.exit_keyword)])
    }

    fn is_keyword(&self, text: &str, keyword: &str) -> bool {
        text.trim().to_lowercase() == keyword
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::replies::RESPONDER_APOLOGY;
    use crate::training::test_support::{
        InMemoryPromptRepository, MockTranscriber, Scripted, ScriptedProvider, reply,
    };
    use promptwright_types::message::AudioPayload;
    use promptwright_types::training::{Modification, TurnRole};

    const TRAILER: &str = "Estos son los datos actualizados al día de hoy del restaurante:";
    const NOT_A_MODIFICATION: &str = r#"{"is_modification": false}"#;

    struct Harness {
        controller: TrainingController<InMemoryPromptRepository, MockTranscriber>,
        repo: Arc<InMemoryPromptRepository>,
        provider: ScriptedProvider,
        transcriber: MockTranscriber,
    }

    fn harness_with(transcriber: MockTranscriber) -> Harness {
        let repo = Arc::new(InMemoryPromptRepository::new());
        let provider = ScriptedProvider::empty();
        let controller = TrainingController::new(
            repo.clone(),
            provider.boxed(),
            transcriber.clone(),
            &GlobalConfig::default(),
        );
        Harness {
            controller,
            repo,
            provider,
            transcriber,
        }
    }

    fn harness() -> Harness {
        harness_with(MockTranscriber::unused())
    }

    fn session() -> SessionId {
        SessionId::new("5491122334455@s.whatsapp.net")
    }

    fn owner() -> UserId {
        UserId::new("default")
    }

    fn text(body: &str) -> InboundMessage {
        InboundMessage::text(session(), body)
    }

    fn modification_json(kind: &str, description: &str) -> String {
        format!(
            r#"{{"is_modification": true, "modification_type": "{kind}", "description": "{description}"}}"#
        )
    }

    async fn conversation(h: &Harness) -> Vec<ConversationTurn> {
        let handle = h.controller.registry().get(&session()).unwrap();
        let state = handle.lock().await;
        state.conversation.clone()
    }

    async fn start_training(h: &Harness) {
        let outcome = h.controller.handle(&text("entrenar")).await.unwrap();
        assert!(outcome.is_handled());
    }

    #[tokio::test]
    async fn test_entrenar_starts_training() {
        let h = harness();
        let outcome = h.controller.handle(&text("  Entrenar ")).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Handled(vec![welcome_block("salir")]));
        assert!(h.controller.is_training(&session()));
        assert!(conversation(&h).await.is_empty());
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_idle_ignores_other_messages() {
        let h = harness();
        let outcome = h.controller.handle(&text("hola, ¿qué tal?")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::NotHandled);
        assert!(!h.controller.is_training(&session()));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_modification_is_recorded_and_acknowledged() {
        let h = harness();
        start_training(&h).await;
        h.provider.push(reply(&modification_json("hours", "Closed Mondays")));

        let outcome = h
            .controller
            .handle(&text("The menu should mention it's closed Mondays"))
            .await
            .unwrap();

        let expected = Modification::new("hours", "Closed Mondays");
        assert_eq!(outcome, TurnOutcome::Handled(vec![modification_ack_block(&expected)]));
        let rendered = outcome.replies()[0].render();
        assert!(rendered.contains("hours"));
        assert!(rendered.contains("Closed Mondays"));

        let record = h.repo.record(&owner()).unwrap();
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.pending_modifications, vec![expected]);

        let turns = conversation(&h).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].content, "The menu should mention it's closed Mondays");
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].content, "Modificación registrada: Closed Mondays");
    }

    #[tokio::test]
    async fn test_third_modification_regenerates_prompt() {
        let h = harness();
        h.repo.seed(
            &owner(),
            "Eres el asistente de La Cantina.",
            vec![
                Modification::new("menu", "Add vegan options"),
                Modification::new("tone", "Be more formal"),
            ],
        );
        start_training(&h).await;
        h.provider.push(reply(&modification_json("hours", "Closed Mondays")));
        h.provider.push(reply(&format!("Eres el asistente formal de La Cantina.\n{TRAILER}")));

        h.controller
            .handle(&text("Closed on Mondays please"))
            .await
            .unwrap();

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        let synthesis = &requests[1].messages[0].content;
        assert!(synthesis.starts_with("Prompt actual:\nEres el asistente de La Cantina.\n"));
        assert_eq!(synthesis.matches("Tipo: ").count(), 3);

        let record = h.repo.record(&owner()).unwrap();
        assert_eq!(
            record.prompt,
            format!("Eres el asistente formal de La Cantina.\n{TRAILER}")
        );
        assert!(record.pending_modifications.is_empty());
        assert_eq!(record.history.len(), 1);
    }

    #[tokio::test]
    async fn test_ordinary_message_gets_prompt_driven_reply() {
        let h = harness();
        h.repo.seed(&owner(), "Eres el asistente de La Cantina.", Vec::new());
        start_training(&h).await;
        h.provider.push(reply(NOT_A_MODIFICATION));
        h.provider.push(reply("Abrimos de martes a domingo."));

        let outcome = h.controller.handle(&text("¿Qué días abren?")).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Handled(vec![Reply::Text("Abrimos de martes a domingo.".to_string())])
        );

        let turns = conversation(&h).await;
        assert_eq!(
            turns,
            vec![
                ConversationTurn::user("¿Qué días abren?"),
                ConversationTurn::assistant("Abrimos de martes a domingo."),
            ]
        );
        assert!(h.repo.record(&owner()).unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn test_responder_failure_is_apology_and_committed() {
        let h = harness();
        start_training(&h).await;
        h.provider.push(reply(NOT_A_MODIFICATION));
        h.provider.push(Scripted::Fail);

        let outcome = h.controller.handle(&text("hola")).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Handled(vec![Reply::Text(RESPONDER_APOLOGY.to_string())])
        );
        assert_eq!(conversation(&h).await.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_case_exit_clears_session() {
        let h = harness();
        start_training(&h).await;
        h.provider.push(reply(NOT_A_MODIFICATION));
        h.provider.push(reply("Claro."));
        h.controller.handle(&text("hola")).await.unwrap();

        let handle = h.controller.registry().get(&session()).unwrap();
        let outcome = h.controller.handle(&text("SALIR")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Handled(vec![exit_block()]));
        assert!(!h.controller.is_training(&session()));
        {
            let state = handle.lock().await;
            assert_eq!(state.mode, TrainingMode::Idle);
            assert!(state.conversation.is_empty());
        }

        let calls = h.provider.calls();
        let later = h.controller.handle(&text("¿Siguen abiertos?")).await.unwrap();
        assert_eq!(later, TurnOutcome::NotHandled);
        assert_eq!(h.provider.calls(), calls);

        let again = h.controller.handle(&text("entrenar")).await.unwrap();
        assert!(again.is_handled());
        assert!(conversation(&h).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_transcription_asks_to_retry() {
        let h = harness_with(MockTranscriber::failing());
        start_training(&h).await;

        let voice = InboundMessage::voice(
            session(),
            AudioPayload {
                data: vec![1, 2, 3],
                mime_type: "audio/ogg".to_string(),
            },
        );
        let outcome = h.controller.handle(&voice).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Handled(vec![Reply::Text(RETRY_MESSAGE.to_string())])
        );
        assert_eq!(h.transcriber.calls(), 1);
        assert_eq!(h.repo.calls(), 0);
        assert_eq!(h.provider.calls(), 0);
        assert!(conversation(&h).await.is_empty());
    }

    #[tokio::test]
    async fn test_voice_note_is_transcribed_into_turn() {
        let h = harness_with(MockTranscriber::ok("¿Tienen opciones veganas?"));
        start_training(&h).await;
        h.provider.push(reply(NOT_A_MODIFICATION));
        h.provider.push(reply("Sí, varias."));

        let voice = InboundMessage::voice(
            session(),
            AudioPayload {
                data: vec![1, 2, 3],
                mime_type: "audio/ogg".to_string(),
            },
        );
        h.controller.handle(&voice).await.unwrap();
        assert_eq!(conversation(&h).await[0].content, "¿Tienen opciones veganas?");
    }

    #[tokio::test]
    async fn test_blank_message_asks_to_retry_when_idle() {
        let h = harness();
        let outcome = h.controller.handle(&text("   ")).await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Handled(vec![Reply::Text(RETRY_MESSAGE.to_string())])
        );
        assert!(!h.controller.is_training(&session()));
    }

    #[tokio::test]
    async fn test_store_failure_leaves_buffer_unchanged() {
        let h = harness();
        start_training(&h).await;
        h.repo.fail_all(true);
        h.provider.push(reply(&modification_json("hours", "Closed Mondays")));

        let result = h.controller.handle(&text("Closed Mondays")).await;
        assert!(matches!(result, Err(TrainingError::Store(_))));
        assert!(conversation(&h).await.is_empty());
        assert!(h.controller.is_training(&session()));
    }

    #[tokio::test]
    async fn test_handle_or_apologize_reports_failure() {
        let h = harness();
        start_training(&h).await;
        h.repo.fail_all(true);
        h.provider.push(reply(NOT_A_MODIFICATION));

        let outcome = h.controller.handle_or_apologize(&text("hola")).await;
        assert_eq!(
            outcome,
            TurnOutcome::Handled(vec![Reply::Text(FAILURE_MESSAGE.to_string())])
        );
        assert!(conversation(&h).await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_user_id_is_bound_to_session() {
        let h = harness();
        let owner = UserId::new("5491100000000");
        h.controller
            .handle(&text("entrenar").with_user(owner.clone()))
            .await
            .unwrap();
        h.provider.push(reply(&modification_json("menu", "Add desserts")));

        // Later messages need not repeat the user id.
        h.controller.handle(&text("Add desserts")).await.unwrap();
        assert_eq!(h.repo.record(&owner).unwrap().history.len(), 1);
        assert!(h.repo.record(&UserId::new("default")).is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_treated_as_idle() {
        let h = harness();
        start_training(&h).await;
        let handle = h.controller.registry().get(&session()).unwrap();
        handle.lock().await.last_activity = Utc::now() - chrono::Duration::hours(2);

        let outcome = h.controller.handle(&text("hola")).await.unwrap();
        assert_eq!(outcome, TurnOutcome::NotHandled);
        assert!(!h.controller.is_training(&session()));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let h = harness();
        let other = SessionId::new("other-chat");
        start_training(&h).await;

        let outcome = h
            .controller
            .handle(&InboundMessage::text(other.clone(), "hola"))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::NotHandled);
        assert!(h.controller.is_training(&session()));
        assert!(!h.controller.is_training(&other));
    }
}
