//! Agent contract, structured results and the role registry
//!
//! Every analysis module satisfies the [`AnalysisAgent`] trait: it is handed a
//! ticker plus a [`TickerContext`] with pre-fetched data and upstream results,
//! and it always returns an [`AgentResult`] — failures are encoded in the
//! result status, never raised past the agent boundary. The
//! [`AgentRegistry`] maps the closed set of roles to implementations; it is
//! populated once at process start and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Financials, NewsItem, Quote};

/// The closed set of analyst roles. Fixed at compile time; no runtime
/// reflection is involved in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    Fundamental,
    Technical,
    MarketIntel,
    Risk,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Fundamental,
        AgentRole::Technical,
        AgentRole::MarketIntel,
        AgentRole::Risk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental",
            Self::Technical => "technical",
            Self::MarketIntel => "market-intel",
            Self::Risk => "risk",
        }
    }

    /// Base synthesis weight for this role.
    pub fn base_weight(self) -> f64 {
        match self {
            Self::Fundamental => 0.30,
            Self::Technical => 0.40,
            Self::MarketIntel => 0.20,
            Self::Risk => 0.10,
        }
    }

    /// Tie-break precedence for synthesis: lower rank wins.
    /// Fixed order: Risk > Fundamental > Technical > MarketIntel.
    pub fn tiebreak_rank(self) -> u8 {
        match self {
            Self::Risk => 0,
            Self::Fundamental => 1,
            Self::Technical => 2,
            Self::MarketIntel => 3,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Directional opinion of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Risk severity reported by the risk agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRating {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// Why an agent failed. Agents classify their own failures; raw errors stay
/// inside the agent and go to the log, not past the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Required context data (quote, financials, news, upstream result)
    /// was not available.
    UpstreamDataMissing,
    /// The agent produced output that could not be parsed into findings.
    MalformedOutput,
    /// Anything else: inference errors, internal bugs.
    Internal,
}

/// Terminal status of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Ok,
    Failed(FailureClass),
    TimedOut,
}

/// Structured findings produced by an agent. One superset schema covers all
/// roles; role-specific fields stay `None` where they do not apply
/// (stop/target come from Technical, the risk rating from Risk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    /// Overall score 0-100 for the aspect the agent covers.
    pub score: u8,
    #[serde(default)]
    pub signal: Signal,
    /// How strongly the agent holds its directional view, in [0, 1].
    #[serde(default = "default_conviction")]
    pub conviction: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub risk_rating: Option<RiskRating>,
}

fn default_conviction() -> f64 {
    0.5
}

impl Findings {
    pub fn new(score: u8, signal: Signal, conviction: f64) -> Self {
        Self {
            score: score.min(100),
            signal,
            conviction: conviction.clamp(0.0, 1.0),
            summary: String::new(),
            stop_loss: None,
            target: None,
            risk_rating: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_levels(mut self, stop_loss: Option<f64>, target: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.target = target;
        self
    }

    pub fn with_risk_rating(mut self, rating: RiskRating) -> Self {
        self.risk_rating = Some(rating);
        self
    }
}

/// Outcome of one agent invocation. Immutable once produced; a FAILED or
/// TIMED_OUT result carries no findings but is always recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub role: AgentRole,
    pub status: AgentStatus,
    findings: Option<Findings>,
    pub latency: Duration,
}

impl AgentResult {
    pub fn ok(role: AgentRole, findings: Findings, latency: Duration) -> Self {
        Self {
            role,
            status: AgentStatus::Ok,
            findings: Some(findings),
            latency,
        }
    }

    pub fn failed(role: AgentRole, class: FailureClass, latency: Duration) -> Self {
        Self {
            role,
            status: AgentStatus::Failed(class),
            findings: None,
            latency,
        }
    }

    pub fn timed_out(role: AgentRole, latency: Duration) -> Self {
        Self {
            role,
            status: AgentStatus::TimedOut,
            findings: None,
            latency,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok
    }

    /// Findings are present exactly when the status is Ok.
    pub fn findings(&self) -> Option<&Findings> {
        self.findings.as_ref()
    }
}

/// Context handed to an agent: pre-fetched market data plus an arena of
/// upstream results indexed by role. Owned exclusively by a single plan
/// execution; concurrent executions never share a context.
#[derive(Debug, Clone, Default)]
pub struct TickerContext {
    pub ticker: String,
    pub quote: Option<Quote>,
    pub financials: Option<Financials>,
    pub news: Vec<NewsItem>,
    upstream: BTreeMap<AgentRole, AgentResult>,
}

impl TickerContext {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn with_financials(mut self, financials: Financials) -> Self {
        self.financials = Some(financials);
        self
    }

    pub fn with_news(mut self, news: Vec<NewsItem>) -> Self {
        self.news = news;
        self
    }

    /// Record a terminal result in the arena. Called by the executor between
    /// stages; later stages observe earlier stages' outputs through this.
    pub fn record(&mut self, result: AgentResult) {
        self.upstream.insert(result.role, result);
    }

    pub fn result(&self, role: AgentRole) -> Option<&AgentResult> {
        self.upstream.get(&role)
    }

    /// Findings for a role, when that role completed Ok.
    pub fn upstream_findings(&self, role: AgentRole) -> Option<&Findings> {
        self.upstream.get(&role).and_then(AgentResult::findings)
    }

    pub fn results(&self) -> impl Iterator<Item = &AgentResult> {
        self.upstream.values()
    }

    pub fn into_results(self) -> Vec<AgentResult> {
        self.upstream.into_values().collect()
    }
}

/// Contract every analysis module satisfies.
///
/// Implementations must signal failure through
/// [`AgentResult::failed`] / [`AgentResult::timed_out`] rather than panicking
/// or returning errors — the pipeline executor never crashes because an
/// agent failed.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn evaluate(&self, ticker: &str, ctx: &TickerContext) -> AgentResult;
}

/// Read-only mapping from role to implementation. Built once at startup via
/// [`AgentRegistryBuilder`]; safe for unsynchronized concurrent reads.
pub struct AgentRegistry {
    agents: HashMap<AgentRole, Arc<dyn AnalysisAgent>>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    pub fn get(&self, role: AgentRole) -> Option<Arc<dyn AnalysisAgent>> {
        self.agents.get(&role).cloned()
    }

    pub fn contains(&self, role: AgentRole) -> bool {
        self.agents.contains_key(&role)
    }

    pub fn roles(&self) -> BTreeSet<AgentRole> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Consuming builder for [`AgentRegistry`]. Registering the same role twice
/// keeps the last registration.
#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: HashMap<AgentRole, Arc<dyn AnalysisAgent>>,
}

impl AgentRegistryBuilder {
    pub fn register(mut self, agent: Arc<dyn AnalysisAgent>) -> Self {
        self.agents.insert(agent.role(), agent);
        self
    }

    pub fn build(self) -> AgentRegistry {
        AgentRegistry {
            agents: self.agents,
        }
    }
}
