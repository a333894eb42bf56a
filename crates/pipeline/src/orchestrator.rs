//! Turn orchestration.
//!
//! Sequences one conversation turn through its phases:
//! received -> bias_checked -> routed -> retrieved -> assembled ->
//! generated -> returned, with no backward transitions. Out-of-scope turns
//! short-circuit retrieval to an empty result.
//!
//! Degradation policy: bias, routing, and retrieval failures are absorbed
//! (the turn continues best-effort with a degraded marker). Only a failed
//! generation call is a hard turn error, and a failed turn is never
//! appended to the session history.

use crate::bias::BiasClassifier;
use crate::intent::IntentRouter;
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::session::SessionStore;
use crate::types::{
    BiasAssessment, ConversationTurn, QueryIntent, RetrievalResult, SourceRef, TurnOutcome,
    TurnPhase,
};
use asha_core::AppResult;
use asha_llm::{LlmClient, LlmRequest};
use std::sync::Arc;

/// Maximum snippet length for source references.
const MAX_SNIPPET_LENGTH: usize = 150;

/// Sampling temperature for conversational answers.
const ANSWER_TEMPERATURE: f32 = 0.7;

/// Token cap for generated answers.
const ANSWER_MAX_TOKENS: u32 = 1024;

/// Sequences the pipeline components for each turn.
pub struct Orchestrator {
    bias: BiasClassifier,
    router: IntentRouter,
    retriever: Retriever,
    assembler: PromptAssembler,
    store: SessionStore,
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl Orchestrator {
    /// Wire up an orchestrator from its components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bias: BiasClassifier,
        router: IntentRouter,
        retriever: Retriever,
        assembler: PromptAssembler,
        store: SessionStore,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            bias,
            router,
            retriever,
            assembler,
            store,
            llm,
            model: model.into(),
        }
    }

    /// Access to the session store (for context inspection by callers).
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Process one user turn and return the answer plus diagnostics.
    ///
    /// Holds the session's lock for the whole turn, so turns within a
    /// session are processed strictly in arrival order while other
    /// sessions proceed in parallel.
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> AppResult<TurnOutcome> {
        let mut degraded = false;

        phase(TurnPhase::Received, session_id);

        let session = self.store.session(session_id);
        let mut session = session.lock().await;
        let history = session.window(self.store.window_size()).to_vec();

        // Bias screening and intent routing are independent; run them
        // concurrently. Retrieval needs both (the routed intent and the
        // reframed query), so it waits.
        let (bias_result, intent_result) = tokio::join!(
            self.bias.assess(message),
            self.router.route(message, &history),
        );

        let bias = bias_result.unwrap_or_else(|e| {
            tracing::warn!("Bias screening degraded, continuing unflagged: {}", e);
            degraded = true;
            BiasAssessment::unbiased(message)
        });
        phase(TurnPhase::BiasChecked, session_id);

        let intent = intent_result.unwrap_or_else(|e| {
            tracing::warn!("Intent routing degraded, defaulting to general: {}", e);
            degraded = true;
            QueryIntent::General
        });
        phase(TurnPhase::Routed, session_id);

        let retrieval = if intent == QueryIntent::OutOfScope {
            RetrievalResult::empty()
        } else {
            self.retriever.retrieve(intent, bias.effective_query()).await
        };
        degraded |= retrieval.degraded;
        phase(TurnPhase::Retrieved, session_id);

        let payload = self.assembler.assemble(intent, &bias, &retrieval, &history);
        let rendered = self.assembler.render(payload)?;
        phase(TurnPhase::Assembled, session_id);

        let request = LlmRequest::new(rendered.user, &self.model)
            .with_system(rendered.system)
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(ANSWER_MAX_TOKENS);

        // Generation is the one hard failure point. On error the turn is
        // abandoned with nothing appended to history.
        let response = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!("Generation failed, turn abandoned: {}", e);
            e
        })?;
        phase(TurnPhase::Generated, session_id);

        // History records the original message, not the reframed one
        session.append(ConversationTurn::user(message, intent, bias.clone()));
        session.append(ConversationTurn::assistant(response.content.clone()));

        let sources_used = retrieval
            .hits
            .iter()
            .map(|hit| SourceRef {
                source_type: hit.document.source_type.as_str().to_string(),
                title: title_line(&hit.document),
                snippet: truncate_snippet(&hit.document.raw_text, MAX_SNIPPET_LENGTH),
            })
            .collect();

        phase(TurnPhase::Returned, session_id);

        if degraded {
            tracing::info!("Turn completed in degraded mode for session {}", session_id);
        }

        Ok(TurnOutcome {
            answer: response.content,
            intent,
            bias,
            sources_used,
            degraded,
        })
    }
}

/// Log a phase transition.
fn phase(phase: TurnPhase, session_id: &str) {
    tracing::debug!(phase = phase.as_str(), session = session_id, "turn phase");
}

/// Title line for a source reference.
fn title_line(doc: &asha_knowledge::Document) -> String {
    match doc.source_type {
        asha_knowledge::SourceType::Job => format!(
            "{} at {}",
            doc.field("job_title").unwrap_or("Unknown role"),
            doc.field("company_name").unwrap_or("Unknown employer"),
        ),
        asha_knowledge::SourceType::Session => format!(
            "{} ({})",
            doc.field("session_name").unwrap_or("Unknown event"),
            doc.field("session_date").unwrap_or("date TBC"),
        ),
    }
}

/// Truncate a snippet at a word boundary.
fn truncate_snippet(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let truncated = &text[..max_len];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}
