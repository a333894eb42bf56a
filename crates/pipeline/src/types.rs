//! Pipeline type definitions.

use asha_knowledge::{Document, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The classified purpose of a user query.
///
/// Derived per turn and recorded on the turn; never persisted beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Looking for job listings
    JobSearch,
    /// Looking for community events/sessions
    EventSearch,
    /// Career-advice style question with no dataset match
    General,
    /// Outside the assistant's domain
    OutOfScope,
}

impl QueryIntent {
    /// Canonical name used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobSearch => "job_search",
            Self::EventSearch => "event_search",
            Self::General => "general",
            Self::OutOfScope => "out_of_scope",
        }
    }

    /// Which knowledge source this intent retrieves from, if any.
    pub fn source(&self) -> Option<SourceType> {
        match self {
            Self::JobSearch => Some(SourceType::Job),
            Self::EventSearch => Some(SourceType::Session),
            Self::General | Self::OutOfScope => None,
        }
    }
}

/// Fixed taxonomy of gender-bias categories the classifier assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiasCategory {
    /// Doubts women's ability to do a kind of work
    CapabilityDoubt,
    /// Confines women to particular roles or places
    RoleRestriction,
    /// Demands justification for hiring women at all
    HiringJustification,
    /// Questions women's fitness to lead or manage
    LeadershipDoubt,
    /// Trades in gendered character stereotypes
    Stereotype,
}

impl BiasCategory {
    /// Canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapabilityDoubt => "capability-doubt",
            Self::RoleRestriction => "role-restriction",
            Self::HiringJustification => "hiring-justification",
            Self::LeadershipDoubt => "leadership-doubt",
            Self::Stereotype => "stereotype",
        }
    }
}

/// Result of screening one query for gender-biased framing.
///
/// Produced per turn and consumed immediately by the retriever and prompt
/// assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasAssessment {
    /// Whether a bias signal fired
    pub is_biased: bool,

    /// Assigned category when biased
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_category: Option<BiasCategory>,

    /// The query as the user typed it
    pub original_query: String,

    /// Neutral, fact-seeking version of the query (when biased)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reframed_query: Option<String>,

    /// Short explanation of why the query was flagged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl BiasAssessment {
    /// An assessment for a query with no bias signal.
    pub fn unbiased(query: impl Into<String>) -> Self {
        Self {
            is_biased: false,
            bias_category: None,
            original_query: query.into(),
            reframed_query: None,
            rationale: None,
        }
    }

    /// The query retrieval and prompting should use: the reframed version
    /// when one exists, otherwise the original.
    pub fn effective_query(&self) -> &str {
        self.reframed_query.as_deref().unwrap_or(&self.original_query)
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Display tag used when rendering history into a prompt.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Asha",
        }
    }
}

/// One appended entry in a session's turn log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique turn identifier
    pub turn_id: String,

    /// Who spoke
    pub role: Role,

    /// Turn text
    pub text: String,

    /// When the turn was appended
    pub timestamp: DateTime<Utc>,

    /// Intent classified for this turn (user turns)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<QueryIntent>,

    /// Bias assessment for this turn (user turns)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias: Option<BiasAssessment>,
}

impl ConversationTurn {
    /// Create a user turn carrying its per-turn diagnostics.
    pub fn user(text: impl Into<String>, intent: QueryIntent, bias: BiasAssessment) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
            intent: Some(intent),
            bias: Some(bias),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            intent: None,
            bias: None,
        }
    }
}

/// A retrieved document with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Ordered retrieval output.
///
/// Invariant: scores are non-increasing across `hits` and document ids are
/// unique. `degraded` marks that retrieval infrastructure failed and the
/// turn proceeds without grounding.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredDocument>,
    pub degraded: bool,
}

impl RetrievalResult {
    /// No results, healthy infrastructure (general or out-of-scope turns).
    pub fn empty() -> Self {
        Self::default()
    }

    /// No results because retrieval infrastructure failed.
    pub fn degraded() -> Self {
        Self {
            hits: Vec::new(),
            degraded: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// User-facing reference to a document used in an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// "job" or "session"
    pub source_type: String,

    /// Title line (job title and employer, or event name)
    pub title: String,

    /// Short snippet of the underlying document
    pub snippet: String,
}

/// Phases a turn moves through, in order. No backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    BiasChecked,
    Routed,
    Retrieved,
    Assembled,
    Generated,
    Returned,
}

impl TurnPhase {
    /// Name used in phase-transition logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::BiasChecked => "bias_checked",
            Self::Routed => "routed",
            Self::Retrieved => "retrieved",
            Self::Assembled => "assembled",
            Self::Generated => "generated",
            Self::Returned => "returned",
        }
    }
}

/// Final output of one turn: the answer plus diagnostics the caller
/// (the HTTP layer, the CLI) can surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Generated answer text
    pub answer: String,

    /// Intent the turn was routed as
    pub intent: QueryIntent,

    /// Bias screening result for the turn
    pub bias: BiasAssessment,

    /// Documents that grounded the answer
    pub sources_used: Vec<SourceRef>,

    /// Set when any subsystem degraded during the turn
    pub degraded: bool,
}
