//! Domain types shared across the advisor

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentRole;

/// An inbound user query, immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub user_id: i64,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Coarse routing decision for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Path {
    /// Direct quote fetch, no agents.
    PriceOnly,
    /// Exactly one analyst agent.
    SingleAspect,
    /// Full pipeline: parallel analysts, risk, synthesis.
    Standard,
    /// The standard pipeline per ticker plus a ranking step.
    Comparison,
    /// Standard pipeline with extended deadlines.
    DeepDive,
    /// Portfolio-wide evaluation.
    Portfolio,
}

/// Routing decision derived from a [`Query`]. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub path: Path,
    /// Ordered, deduplicated ticker symbols (1..N).
    pub tickers: Vec<String>,
    pub requested_agents: BTreeSet<AgentRole>,
}

impl Classification {
    pub fn new(
        path: Path,
        tickers: Vec<String>,
        requested_agents: impl IntoIterator<Item = AgentRole>,
    ) -> Self {
        Self {
            path,
            tickers,
            requested_agents: requested_agents.into_iter().collect(),
        }
    }

    pub fn primary_ticker(&self) -> Option<&str> {
        self.tickers.first().map(String::as_str)
    }
}

/// Snapshot price data for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub change_percent: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: u64,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub as_of: DateTime<Utc>,
}

/// Fundamental data snapshot for one ticker. All fields optional because
/// upstream coverage varies by listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Financials {
    pub ticker: String,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub sector: Option<String>,
}

/// One news headline for a ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A user's position in one ticker. Quantity stays positive; removing the
/// full quantity deletes the holding at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub acquired_on: DateTime<Utc>,
}

impl Holding {
    pub fn invested(&self) -> f64 {
        self.quantity * self.average_cost
    }

    pub fn current_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized P&L as a percentage of cost basis.
    pub fn pnl_percent(&self, price: f64) -> f64 {
        let cost = self.invested();
        if cost <= 0.0 {
            return 0.0;
        }
        (self.current_value(price) - cost) / cost * 100.0
    }
}

/// Alert priority, ordered from most to least pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Self::Urgent => "URGENT",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Action recommended for a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldingAction {
    Hold,
    AddMore,
    BookPartial,
    Exit,
}

impl HoldingAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::AddMore => "ADD MORE",
            Self::BookPartial => "BOOK PARTIAL",
            Self::Exit => "EXIT",
        }
    }
}

/// One evaluation cycle's recommendation for a holding. Generated fresh per
/// run, never mutated, superseded by the next run's alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub ticker: String,
    pub priority: Priority,
    pub action: HoldingAction,
    pub trigger_reason: String,
    pub computed_at: DateTime<Utc>,
}

/// Per-user schedule for unattended portfolio evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub user_id: i64,
    pub enabled: bool,
    /// Local time-of-day at which the evaluation fires.
    pub fire_time: NaiveTime,
    /// User timezone as a fixed offset from UTC, in minutes.
    pub utc_offset_minutes: i32,
}

impl ScheduleConfig {
    /// The user's local time for a given UTC instant. Falls back to UTC when
    /// the stored offset is out of range.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).time(),
            None => now.time(),
        }
    }

    /// The user's local date for a given UTC instant.
    pub fn local_date(&self, now: DateTime<Utc>) -> chrono::NaiveDate {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).date_naive(),
            None => now.date_naive(),
        }
    }
}
