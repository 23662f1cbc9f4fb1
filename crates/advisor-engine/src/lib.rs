//! Query orchestration engine
//!
//! Takes a raw user query through classification, planning, staged agent
//! execution and synthesis, and renders the outcome as user-facing text.
//! The [`AdvisorEngine`] facade is the only entry point the surrounding
//! process needs.

pub mod classifier;
pub mod engine;
pub mod executor;
pub mod format;
pub mod plan;
pub mod synthesis;

pub use classifier::{IntentClassifier, SymbolDirectory};
pub use engine::{AdvisorEngine, EngineResponse};
pub use executor::PipelineExecutor;
pub use plan::{ExecutionPlan, Planner, Stage};
pub use synthesis::{ComparisonOutcome, Synthesizer, SynthesizedRecommendation, TradeAction};
