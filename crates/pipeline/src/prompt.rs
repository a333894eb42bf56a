//! Prompt assembly.
//!
//! Deterministically composes the generation request for a turn: the static
//! persona, a bias-handling directive when the query was flagged, retrieved
//! documents rendered as compact fact lines, the bounded history, and the
//! current query (reframed when bias was detected).
//!
//! The rendered prompt must fit a configured character budget. Lower-ranked
//! documents are trimmed first, then the oldest history turns. The persona
//! and the bias directive are never trimmed.

use crate::types::{BiasAssessment, ConversationTurn, QueryIntent, RetrievalResult, ScoredDocument};
use asha_core::{AppError, AppResult};
use asha_knowledge::SourceType;
use handlebars::Handlebars;
use serde_json::json;

/// Static persona and grounding instructions.
const PERSONA: &str = "\
You are Asha, a career assistant for a women's professional community. \
You help with job listings, community events, mentorship programs, and \
questions about women's career advancement. Be supportive, factual, and \
empowering, and avoid gender stereotypes.\n\
\n\
Instructions:\n\
- Ground your answer in the provided information when it is present\n\
- If no matching listings or events were found, say so plainly instead of inventing them\n\
- Keep answers concise and practical";

/// Handlebars template for the user message.
const USER_TEMPLATE: &str = "\
{{#if has_context}}Relevant information from the community database:\n{{context}}\n\n{{/if}}\
{{#if has_history}}Conversation so far:\n{{history}}\n\n{{/if}}\
Question: {{query}}";

/// Everything that goes into one generation request, before rendering.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    /// Persona and grounding instructions (never trimmed)
    pub system_instructions: String,

    /// Bias-handling directive, present only for flagged queries (never
    /// trimmed)
    pub bias_directive: Option<String>,

    /// Fact lines for retrieved documents, ranked order
    pub context_lines: Vec<String>,

    /// Role-tagged recent history, oldest first
    pub history_lines: Vec<String>,

    /// The query to answer (reframed when bias was detected)
    pub current_query: String,
}

/// A rendered generation request.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Builds prompts within a character budget.
pub struct PromptAssembler {
    handlebars: Handlebars<'static>,
    max_chars: usize,
}

impl PromptAssembler {
    /// Create an assembler with the given character budget.
    pub fn new(max_chars: usize) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();

        // Plain text prompts, no HTML escaping
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string("chat_turn", USER_TEMPLATE)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        Ok(Self {
            handlebars,
            max_chars,
        })
    }

    /// Compose the payload for one turn.
    pub fn assemble(
        &self,
        intent: QueryIntent,
        bias: &BiasAssessment,
        retrieval: &RetrievalResult,
        history: &[ConversationTurn],
    ) -> PromptPayload {
        let mut context_lines: Vec<String> =
            retrieval.hits.iter().map(render_fact_line).collect();

        // A grounded intent with nothing retrieved still gets an explicit
        // note, so the model acknowledges the gap instead of inventing
        // listings.
        if context_lines.is_empty() {
            if let Some(source) = intent.source() {
                context_lines.push(match source {
                    SourceType::Job => {
                        "- No matching job listings were found in the current data.".to_string()
                    }
                    SourceType::Session => {
                        "- No matching events were found in the current data.".to_string()
                    }
                });
            }
        }

        let history_lines = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.text))
            .collect();

        let bias_directive = if bias.is_biased {
            let category = bias
                .bias_category
                .map(|c| c.as_str())
                .unwrap_or("unspecified");
            Some(format!(
                "The user's question contained a gender-biased premise (category: {}). \
                 Do not answer the biased premise literally. Redirect constructively: \
                 lead with factual, empowering information, then answer the neutral \
                 form of the question.",
                category
            ))
        } else {
            None
        };

        PromptPayload {
            system_instructions: PERSONA.to_string(),
            bias_directive,
            context_lines,
            history_lines,
            current_query: bias.effective_query().to_string(),
        }
    }

    /// Render a payload into system and user messages within budget.
    pub fn render(&self, payload: PromptPayload) -> AppResult<RenderedPrompt> {
        let mut system = payload.system_instructions;
        if let Some(ref directive) = payload.bias_directive {
            system.push_str("\n\n");
            system.push_str(directive);
        }

        let mut context_lines = payload.context_lines;
        let mut history_lines = payload.history_lines;

        loop {
            let vars = json!({
                "has_context": !context_lines.is_empty(),
                "context": context_lines.join("\n"),
                "has_history": !history_lines.is_empty(),
                "history": history_lines.join("\n"),
                "query": payload.current_query,
            });

            let user = self
                .handlebars
                .render("chat_turn", &vars)
                .map_err(|e| AppError::Prompt(format!("Failed to render prompt: {}", e)))?;

            if system.len() + user.len() <= self.max_chars {
                return Ok(RenderedPrompt { system, user });
            }

            // Trim lowest-ranked context first, then the oldest history.
            // The persona and bias directive stay.
            if !context_lines.is_empty() {
                context_lines.pop();
                tracing::debug!("Prompt over budget, dropped lowest-ranked document");
            } else if !history_lines.is_empty() {
                history_lines.remove(0);
                tracing::debug!("Prompt over budget, dropped oldest history turn");
            } else {
                tracing::warn!(
                    "Prompt exceeds budget ({} chars) with nothing left to trim",
                    self.max_chars
                );
                return Ok(RenderedPrompt { system, user });
            }
        }
    }
}

/// Render one retrieved document as a compact fact line.
fn render_fact_line(hit: &ScoredDocument) -> String {
    let doc = &hit.document;

    match doc.source_type {
        SourceType::Job => format!(
            "- [job] {} at {} ({}, {}, remote: {})",
            doc.field("job_title").unwrap_or("Unknown role"),
            doc.field("company_name").unwrap_or("Unknown employer"),
            doc.field("location").unwrap_or("Not specified"),
            doc.field("job_type").unwrap_or("Not specified"),
            doc.field("remote_option").unwrap_or("Not specified"),
        ),
        SourceType::Session => format!(
            "- [session] {} on {} ({}, {}, speaker: {})",
            doc.field("session_name").unwrap_or("Unknown event"),
            doc.field("session_date").unwrap_or("date TBC"),
            doc.field("session_type").unwrap_or("Not specified"),
            doc.field("location").unwrap_or("Online"),
            doc.field("speaker").unwrap_or("To be announced"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BiasCategory, Role};
    use asha_knowledge::Document;
    use std::collections::BTreeMap;

    fn job_hit(title: &str, company: &str, score: f32) -> ScoredDocument {
        let mut fields = BTreeMap::new();
        fields.insert("job_title".to_string(), title.to_string());
        fields.insert("company_name".to_string(), company.to_string());
        fields.insert("location".to_string(), "Bangalore".to_string());
        fields.insert("job_type".to_string(), "Full-time".to_string());
        fields.insert("remote_option".to_string(), "Yes".to_string());

        ScoredDocument {
            document: Document {
                id: format!("job-{}", title),
                source_type: SourceType::Job,
                raw_text: format!("{} at {}", title, company),
                fields,
                embedding: None,
            },
            score,
        }
    }

    fn history_turn(role: Role, text: &str) -> ConversationTurn {
        match role {
            Role::User => ConversationTurn::user(
                text,
                QueryIntent::General,
                BiasAssessment::unbiased(text),
            ),
            Role::Assistant => ConversationTurn::assistant(text),
        }
    }

    #[test]
    fn test_unbiased_prompt_has_no_directive() {
        let assembler = PromptAssembler::new(6000).unwrap();
        let bias = BiasAssessment::unbiased("List job openings in marketing");
        let retrieval = RetrievalResult {
            hits: vec![job_hit("Marketing Manager", "MarketingPro", 0.9)],
            degraded: false,
        };

        let payload = assembler.assemble(QueryIntent::JobSearch, &bias, &retrieval, &[]);
        assert!(payload.bias_directive.is_none());

        let rendered = assembler.render(payload).unwrap();
        assert!(rendered.user.contains("Marketing Manager at MarketingPro"));
        assert!(rendered.user.contains("Question: List job openings in marketing"));
        assert!(!rendered.system.contains("biased premise"));
    }

    #[test]
    fn test_biased_prompt_carries_directive_and_reframed_query() {
        let assembler = PromptAssembler::new(6000).unwrap();
        let bias = BiasAssessment {
            is_biased: true,
            bias_category: Some(BiasCategory::HiringJustification),
            original_query: "Why should we even hire women for tech roles?".to_string(),
            reframed_query: Some(
                "What are the performance benefits of gender-diverse tech teams?".to_string(),
            ),
            rationale: Some("test".to_string()),
        };
        let retrieval = RetrievalResult::empty();

        let payload = assembler.assemble(QueryIntent::General, &bias, &retrieval, &[]);
        let rendered = assembler.render(payload).unwrap();

        assert!(rendered.system.contains("hiring-justification"));
        assert!(rendered.system.contains("Do not answer the biased premise"));
        assert!(rendered
            .user
            .contains("What are the performance benefits of gender-diverse tech teams?"));
        assert!(!rendered.user.contains("Why should we even hire"));
    }

    #[test]
    fn test_empty_retrieval_for_grounded_intent_notes_the_gap() {
        let assembler = PromptAssembler::new(6000).unwrap();
        let bias = BiasAssessment::unbiased("marketing jobs?");

        let payload =
            assembler.assemble(QueryIntent::JobSearch, &bias, &RetrievalResult::empty(), &[]);
        let rendered = assembler.render(payload).unwrap();

        assert!(rendered.user.contains("No matching job listings were found"));
    }

    #[test]
    fn test_general_intent_gets_no_context_block() {
        let assembler = PromptAssembler::new(6000).unwrap();
        let bias = BiasAssessment::unbiased("how do I negotiate a raise?");

        let payload =
            assembler.assemble(QueryIntent::General, &bias, &RetrievalResult::empty(), &[]);
        assert!(payload.context_lines.is_empty());

        let rendered = assembler.render(payload).unwrap();
        assert!(!rendered.user.contains("Relevant information"));
    }

    #[test]
    fn test_history_is_role_tagged_and_ordered() {
        let assembler = PromptAssembler::new(6000).unwrap();
        let bias = BiasAssessment::unbiased("and next week?");
        let history = vec![
            history_turn(Role::User, "What events are coming up?"),
            history_turn(Role::Assistant, "There is a resume workshop on Friday."),
        ];

        let payload =
            assembler.assemble(QueryIntent::EventSearch, &bias, &RetrievalResult::empty(), &history);
        let rendered = assembler.render(payload).unwrap();

        assert!(rendered.user.contains("User: What events are coming up?"));
        assert!(rendered.user.contains("Asha: There is a resume workshop on Friday."));
    }

    #[test]
    fn test_overflow_trims_lowest_ranked_documents_first() {
        let bias = BiasAssessment::unbiased("jobs?");
        let retrieval = RetrievalResult {
            hits: vec![
                job_hit("First Pick", "AlphaCorp", 0.9),
                job_hit("Second Pick", "BetaCorp", 0.8),
                job_hit("Third Pick", "GammaCorp", 0.7),
            ],
            degraded: false,
        };

        // Measure the untrimmed size, then set the budget just below it
        let roomy = PromptAssembler::new(100_000).unwrap();
        let payload = roomy.assemble(QueryIntent::JobSearch, &bias, &retrieval, &[]);
        let full = roomy.render(payload.clone()).unwrap();
        let full_len = full.system.len() + full.user.len();

        let tight = PromptAssembler::new(full_len - 1).unwrap();
        let rendered = tight.render(payload).unwrap();

        // Budget forces trimming from the bottom of the ranking
        assert!(rendered.user.contains("First Pick"));
        assert!(!rendered.user.contains("Third Pick"));
        // System instructions survive untouched
        assert!(rendered.system.contains("You are Asha"));
    }

    #[test]
    fn test_overflow_trims_history_after_documents() {
        let bias = BiasAssessment::unbiased("jobs?");

        // Minimal prompt: no context, no history
        let roomy = PromptAssembler::new(100_000).unwrap();
        let minimal = roomy
            .render(roomy.assemble(QueryIntent::General, &bias, &RetrievalResult::empty(), &[]))
            .unwrap();
        let minimal_len = minimal.system.len() + minimal.user.len();

        let retrieval = RetrievalResult {
            hits: vec![job_hit("Only Pick", "AlphaCorp", 0.9)],
            degraded: false,
        };
        let history = vec![
            history_turn(Role::User, "old question that can be dropped"),
            history_turn(Role::Assistant, "old answer that can be dropped"),
            history_turn(Role::User, "recent question"),
        ];

        // A budget that only the minimal prompt fits forces both the
        // documents and every history line out
        let tight = PromptAssembler::new(minimal_len).unwrap();
        let payload = tight.assemble(QueryIntent::JobSearch, &bias, &retrieval, &history);
        let rendered = tight.render(payload).unwrap();

        assert!(rendered.system.contains("You are Asha"));
        assert!(rendered.user.contains("Question: jobs?"));
        assert!(!rendered.user.contains("Only Pick"));
        assert!(!rendered.user.contains("old question that can be dropped"));
        assert!(!rendered.user.contains("recent question"));
    }
}
