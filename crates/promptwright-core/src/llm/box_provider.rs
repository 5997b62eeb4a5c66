//! Type-erased language oracle.
//!
//! `LlmProvider` returns `impl Future`, which rules out `dyn LlmProvider`.
//! The classifier, synthesizer and responder all share one oracle chosen at
//! startup, so the concrete provider is erased behind [`BoxLlmProvider`]:
//! a private object-safe mirror trait with boxed futures, blanket-implemented
//! for every `LlmProvider`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use promptwright_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities,
};

use super::provider::LlmProvider;

type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

/// Object-safe mirror of [`LlmProvider`].
trait ErasedProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn provider_capabilities(&self) -> &ProviderCapabilities;

    fn complete_erased<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
}

impl<P: LlmProvider> ErasedProvider for P {
    fn provider_name(&self) -> &str {
        self.name()
    }

    fn provider_capabilities(&self) -> &ProviderCapabilities {
        self.capabilities()
    }

    fn complete_erased<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.complete(request))
    }
}

/// A language oracle of any concrete provider type.
pub struct BoxLlmProvider {
    inner: Box<dyn ErasedProvider>,
}

impl BoxLlmProvider {
    pub fn new<P: LlmProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    /// Provider name as used in logs and `gen_ai.system`.
    pub fn name(&self) -> &str {
        self.inner.provider_name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.provider_capabilities()
    }

    /// Send one completion request.
    ///
    /// `max_tokens` above the model's output limit is lowered to that limit
    /// before the request leaves.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let limit = self.capabilities().max_output_tokens;
        if request.max_tokens <= limit {
            return self.inner.complete_erased(request).await;
        }

        tracing::debug!(
            provider = %self.name(),
            requested = request.max_tokens,
            limit,
            "Clamping max_tokens to the model output limit"
        );
        let clamped = CompletionRequest {
            max_tokens: limit,
            ..request.clone()
        };
        self.inner.complete_erased(&clamped).await
    }
}

impl fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
