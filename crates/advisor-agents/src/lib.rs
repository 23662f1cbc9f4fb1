//! Analyst agents
//!
//! One agent per [`advisor_core::AgentRole`], each backed by the shared
//! [`advisor_core::Inference`] collaborator. Agents read pre-fetched data
//! from the ticker context, never fetch anything themselves, and always
//! return a terminal [`advisor_core::AgentResult`] — errors are classified
//! and logged inside the agent, never raised past it.

mod fundamental;
mod market_intel;
mod output;
mod risk;
mod technical;

pub use fundamental::FundamentalAgent;
pub use market_intel::MarketIntelAgent;
pub use risk::RiskAgent;
pub use technical::TechnicalAgent;

use std::sync::Arc;

use advisor_core::{AgentRegistry, Inference};

/// Build a registry with the full analyst bench wired to one inference
/// backend.
pub fn full_registry(inference: Arc<dyn Inference>) -> AgentRegistry {
    AgentRegistry::builder()
        .register(Arc::new(FundamentalAgent::new(Arc::clone(&inference))))
        .register(Arc::new(TechnicalAgent::new(Arc::clone(&inference))))
        .register(Arc::new(MarketIntelAgent::new(Arc::clone(&inference))))
        .register(Arc::new(RiskAgent::new(inference)))
        .build()
}
