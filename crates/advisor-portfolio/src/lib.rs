//! Portfolio evaluation and scheduling
//!
//! Turns a user's holdings into exactly one actionable alert per position by
//! running the full analysis pipeline per ticker and applying a fixed
//! precedence of triggers. The scheduler drives the same cycle unattended at
//! each user's configured local time.

mod alert;
mod evaluator;
mod scheduler;

pub use alert::derive_alert;
pub use evaluator::{PortfolioEvaluator, PortfolioReport, PositionSnapshot};
pub use scheduler::{EvaluationRunner, Scheduler};
