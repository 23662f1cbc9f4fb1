//! Error taxonomy for the advisor
//!
//! Every error carries enough structured context (ticker, stage, role) to be
//! logged without re-deriving state. User-facing text comes exclusively from
//! `user_message()` — raw internal detail never reaches the end user.

use thiserror::Error;

use crate::agent::{AgentRole, AgentStatus};

/// Result type alias for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Classification failures. Surfaced to the user as a clarifying prompt and
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("unrecognized intent")]
    UnrecognizedIntent,

    #[error("ambiguous ticker reference: {name} ({} candidates)", candidates.len())]
    AmbiguousTicker {
        name: String,
        candidates: Vec<String>,
    },

    #[error("no ticker in query")]
    MissingTicker,

    #[error("comparison requires two tickers")]
    ComparisonNeedsTwo,
}

impl ClassificationError {
    /// Terse, non-technical prompt shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnrecognizedIntent => {
                "I couldn't understand that. Try /help for available commands.".to_string()
            }
            Self::AmbiguousTicker { name, candidates } => format!(
                "\"{name}\" matches more than one listing ({}). Please use the exact symbol.",
                candidates.join(", ")
            ),
            Self::MissingTicker => {
                "Please include a stock ticker. Example: /a RELIANCE".to_string()
            }
            Self::ComparisonNeedsTwo => {
                "Please give two tickers to compare. Example: /c TCS INFY".to_string()
            }
        }
    }
}

/// Advisor-wide errors.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// A stage that later stages strictly require produced zero usable
    /// results; the plan stops here instead of returning an empty
    /// recommendation.
    #[error("plan aborted for {ticker} at stage {stage}")]
    PlanAborted {
        ticker: String,
        stage: usize,
        failures: Vec<(AgentRole, AgentStatus)>,
    },

    #[error("market data error: {0}")]
    MarketData(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AdvisorError {
    /// Terse, non-technical message shown to the user. Full detail goes to
    /// the structured log at the call site.
    pub fn user_message(&self) -> String {
        match self {
            Self::Classification(err) => err.user_message(),
            Self::PlanAborted { ticker, .. } => {
                format!("Analysis for {ticker} is unavailable right now. Please try again later.")
            }
            Self::MarketData(_) => {
                "Market data is unavailable right now. Please try again later.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}
