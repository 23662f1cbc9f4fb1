//! Collaborator interfaces
//!
//! The orchestration core talks to the outside world only through these
//! traits. Transport delivers formatted output, storage owns long-lived user
//! state, market data feeds the agents, and inference is an opaque text
//! generator that may fail or time out like any other remote dependency.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{Financials, Holding, NewsItem, Quote, ScheduleConfig};

/// Outbound message delivery. The core never depends on transport-specific
/// formatting, only on this capability.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, user_id: i64, message: &str) -> Result<()>;
}

/// Long-lived user state: holdings and schedules. All calls are fallible;
/// callers re-read rather than caching results across stage boundaries.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn holdings(&self, user_id: i64) -> Result<Vec<Holding>>;

    /// Adds to a position. An existing holding in the same ticker is merged
    /// with a weighted average cost.
    async fn add_holding(&self, user_id: i64, holding: Holding) -> Result<()>;

    /// Removes `quantity` from a position; `None` or the full quantity
    /// deletes the holding. Quantity never drops to zero or below.
    async fn remove_holding(&self, user_id: i64, ticker: &str, quantity: Option<f64>)
    -> Result<()>;

    async fn schedule_config(&self, user_id: i64) -> Result<Option<ScheduleConfig>>;

    async fn set_schedule_config(&self, config: ScheduleConfig) -> Result<()>;

    /// All schedule configs, read once per scheduler tick.
    async fn schedule_configs(&self) -> Result<Vec<ScheduleConfig>>;

    /// Local date of the user's last completed scheduled evaluation.
    async fn last_fired(&self, user_id: i64) -> Result<Option<NaiveDate>>;

    /// Marks a completed scheduled evaluation. Persisted so a process
    /// restart inside the tolerance window cannot fire the same user twice.
    async fn set_last_fired(&self, user_id: i64, date: NaiveDate) -> Result<()>;
}

/// Price, fundamentals and news retrieval. Each call is independently
/// cacheable and independently failable. Agents depend on pre-fetched data
/// from these calls; the PRICE_ONLY path calls `fetch_quote` directly.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> Result<Quote>;

    async fn fetch_financials(&self, ticker: &str) -> Result<Financials>;

    async fn fetch_news(&self, ticker: &str) -> Result<Vec<NewsItem>>;
}

/// Opaque text/structured-output generator. Invoked only from inside agent
/// implementations; the orchestration core treats it as one more
/// potentially-timing-out dependency.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}
