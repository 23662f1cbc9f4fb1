//! Portfolio evaluation cycle
//!
//! One cycle reads the user's holdings, runs the full per-ticker pipeline
//! for each, and folds the results into a report with exactly one alert per
//! holding. Failures are contained per holding; a broken analysis for one
//! ticker never hides the rest of the portfolio.

use std::fmt::Write as _;
use std::sync::Arc;

use advisor_core::{Alert, Holding, MarketData, PortfolioThresholds, Result, Storage};
use advisor_engine::AdvisorEngine;
use chrono::{DateTime, Utc};
use tokio::time;

use crate::alert::derive_alert;

/// One holding's state at evaluation time.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub holding: Holding,
    pub price: Option<f64>,
    pub alert: Alert,
}

impl PositionSnapshot {
    pub fn current_value(&self) -> f64 {
        match self.price {
            Some(price) => self.holding.current_value(price),
            // No live price: carry at cost so totals stay meaningful.
            None => self.holding.invested(),
        }
    }

    pub fn pnl_percent(&self) -> Option<f64> {
        self.price.map(|price| self.holding.pnl_percent(price))
    }
}

/// Result of one evaluation cycle. Immutable; the next cycle supersedes it.
#[derive(Debug, Clone)]
pub struct PortfolioReport {
    pub user_id: i64,
    pub generated_at: DateTime<Utc>,
    pub positions: Vec<PositionSnapshot>,
}

impl PortfolioReport {
    pub fn total_invested(&self) -> f64 {
        self.positions
            .iter()
            .map(|position| position.holding.invested())
            .sum()
    }

    pub fn total_value(&self) -> f64 {
        self.positions.iter().map(PositionSnapshot::current_value).sum()
    }

    pub fn total_pnl_percent(&self) -> f64 {
        let invested = self.total_invested();
        if invested <= 0.0 {
            return 0.0;
        }
        (self.total_value() - invested) / invested * 100.0
    }

    /// One-word portfolio health from total P&L.
    pub fn health(&self) -> &'static str {
        let pnl = self.total_pnl_percent();
        if pnl >= 5.0 {
            "healthy"
        } else if pnl > -5.0 {
            "steady"
        } else {
            "under pressure"
        }
    }

    /// Alerts sorted most pressing first, ties broken by ticker.
    pub fn alerts(&self) -> Vec<&Alert> {
        let mut alerts: Vec<&Alert> = self
            .positions
            .iter()
            .map(|position| &position.alert)
            .collect();
        alerts.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.ticker.cmp(&b.ticker)));
        alerts
    }

    pub fn render(&self) -> String {
        if self.positions.is_empty() {
            return "Your portfolio is empty. Add a position with /add <ticker> <qty> <price>."
                .to_string();
        }

        let mut out = format!(
            "Portfolio: {:.2} invested, {:.2} current ({:+.1}%), {}\n",
            self.total_invested(),
            self.total_value(),
            self.total_pnl_percent(),
            self.health()
        );
        for alert in self.alerts() {
            let _ = writeln!(
                out,
                "[{}] {} - {}: {}",
                alert.priority.label(),
                alert.ticker,
                alert.action.label(),
                alert.trigger_reason
            );
        }
        out.trim_end().to_string()
    }
}

/// Runs evaluation cycles against the engine and collaborators.
pub struct PortfolioEvaluator {
    engine: Arc<AdvisorEngine>,
    market_data: Arc<dyn MarketData>,
    storage: Arc<dyn Storage>,
    thresholds: PortfolioThresholds,
}

impl PortfolioEvaluator {
    pub fn new(
        engine: Arc<AdvisorEngine>,
        market_data: Arc<dyn MarketData>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let thresholds = engine.config().portfolio;
        Self {
            engine,
            market_data,
            storage,
            thresholds,
        }
    }

    /// Evaluate all of one user's holdings. Only storage failures propagate;
    /// per-holding analysis trouble degrades to a HOLD alert.
    pub async fn evaluate(&self, user_id: i64) -> Result<PortfolioReport> {
        let holdings = self.storage.holdings(user_id).await?;
        let generated_at = Utc::now();
        tracing::info!(user_id, holdings = holdings.len(), "portfolio evaluation started");

        let mut positions = Vec::with_capacity(holdings.len());
        for holding in holdings {
            positions.push(self.evaluate_holding(holding, generated_at).await);
        }

        Ok(PortfolioReport {
            user_id,
            generated_at,
            positions,
        })
    }

    async fn evaluate_holding(
        &self,
        holding: Holding,
        now: DateTime<Utc>,
    ) -> PositionSnapshot {
        let ticker = holding.ticker.clone();

        let price = match time::timeout(
            self.engine.config().quote_timeout,
            self.market_data.fetch_quote(&ticker),
        )
        .await
        {
            Ok(Ok(quote)) => Some(quote.price),
            Ok(Err(err)) => {
                tracing::warn!(ticker, %err, "quote fetch failed during evaluation");
                None
            }
            Err(_) => {
                tracing::warn!(ticker, "quote fetch timed out during evaluation");
                None
            }
        };

        let recommendation = match self.engine.standard_recommendation(&ticker).await {
            Ok(rec) => Some(rec),
            Err(err) => {
                tracing::warn!(ticker, %err, "analysis failed during evaluation");
                None
            }
        };

        let alert = derive_alert(
            &holding,
            price,
            recommendation.as_ref(),
            &self.thresholds,
            now,
        );
        PositionSnapshot {
            holding,
            price,
            alert,
        }
    }

    /// Evaluate and render in one step, for transports and the scheduler.
    pub async fn evaluate_and_render(&self, user_id: i64) -> Result<String> {
        Ok(self.evaluate(user_id).await?.render())
    }
}
