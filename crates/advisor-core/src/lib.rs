//! Core building blocks for the stock advisor
//!
//! This crate defines everything the orchestration layers share:
//!
//! - Domain types (queries, classifications, quotes, holdings, alerts)
//! - The [`AnalysisAgent`] contract and the read-only [`AgentRegistry`]
//! - Collaborator interfaces for transport, storage, market data and
//!   LLM inference
//! - The error taxonomy with terse user-facing messages
//! - Runtime configuration with a validating builder
//!
//! Higher layers (`advisor-engine`, `advisor-portfolio`) depend only on the
//! traits defined here, never on concrete collaborator implementations.

pub mod agent;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;

// Re-export main types for convenience
pub use agent::{
    AgentRegistry, AgentResult, AgentRole, AgentStatus, AnalysisAgent, FailureClass, Findings,
    RiskRating, Signal, TickerContext,
};
pub use collaborators::{Inference, MarketData, Storage, Transport};
pub use config::{AdvisorConfig, PortfolioThresholds, SchedulerSettings, SynthesisWeights};
pub use error::{AdvisorError, ClassificationError, Result};
pub use memory::MemoryStorage;
pub use types::{
    Alert, Classification, Financials, Holding, HoldingAction, NewsItem, Path, Priority, Query,
    Quote, ScheduleConfig,
};
