//! Runtime configuration for the advisor

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::types::Path;

/// Base synthesis weights per role. Failed or timed-out results contribute
/// zero regardless of these values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SynthesisWeights {
    pub fundamental: f64,
    pub technical: f64,
    pub market_intel: f64,
    pub risk: f64,
}

impl Default for SynthesisWeights {
    fn default() -> Self {
        Self {
            fundamental: 0.30,
            technical: 0.40,
            market_intel: 0.20,
            risk: 0.10,
        }
    }
}

impl SynthesisWeights {
    pub fn total(&self) -> f64 {
        self.fundamental + self.technical + self.market_intel + self.risk
    }
}

/// Thresholds for portfolio alert derivation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortfolioThresholds {
    /// Price within this percentage above the computed stop level counts as
    /// a stop-loss hit.
    pub stop_distance_percent: f64,
    /// Unrealized loss (negative) that forces an EXIT review.
    pub large_loss_percent: f64,
    /// Unrealized profit that forces a BOOK_PARTIAL review.
    pub large_profit_percent: f64,
    /// Fraction to book when a target or large profit is reached.
    pub book_partial_fraction: f64,
    /// Minimum synthesizer confidence for an ADD_MORE suggestion.
    pub add_more_confidence: f64,
    /// ADD_MORE is only suggested while unrealized P&L stays below this.
    pub add_more_max_pnl_percent: f64,
}

impl Default for PortfolioThresholds {
    fn default() -> Self {
        Self {
            stop_distance_percent: 2.0,
            large_loss_percent: -15.0,
            large_profit_percent: 25.0,
            book_partial_fraction: 0.5,
            add_more_confidence: 0.6,
            add_more_max_pnl_percent: 10.0,
        }
    }
}

/// Scheduler loop settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// How often the coordinating loop polls schedule configs.
    pub tick: Duration,
    /// Window around `fire_time` within which a schedule may fire.
    pub tolerance: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            tolerance: Duration::from_secs(300),
        }
    }
}

/// Top-level advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Budget for the direct quote path.
    pub quote_timeout: Duration,
    /// Budget for each context data fetch (quote, financials, news).
    pub data_timeout: Duration,
    /// Deadline shared by all tasks of one stage.
    pub stage_timeout: Duration,
    /// Extended stage deadline for deep-dive plans.
    pub deep_dive_stage_timeout: Duration,
    pub weights: SynthesisWeights,
    pub portfolio: PortfolioThresholds,
    pub scheduler: SchedulerSettings,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            quote_timeout: Duration::from_secs(2),
            data_timeout: Duration::from_secs(10),
            stage_timeout: Duration::from_secs(15),
            deep_dive_stage_timeout: Duration::from_secs(30),
            weights: SynthesisWeights::default(),
            portfolio: PortfolioThresholds::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl AdvisorConfig {
    pub fn builder() -> AdvisorConfigBuilder {
        AdvisorConfigBuilder::default()
    }

    /// Stage deadline for a given execution path.
    pub fn stage_timeout_for(&self, path: Path) -> Duration {
        match path {
            Path::DeepDive => self.deep_dive_stage_timeout,
            _ => self.stage_timeout,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        if [w.fundamental, w.technical, w.market_intel, w.risk]
            .iter()
            .any(|weight| *weight < 0.0)
            || w.total() <= 0.0
        {
            return Err(AdvisorError::Config(
                "synthesis weights must be non-negative with a positive total".to_string(),
            ));
        }

        let p = &self.portfolio;
        if p.large_loss_percent >= 0.0 {
            return Err(AdvisorError::Config(
                "large_loss_percent must be negative".to_string(),
            ));
        }
        if p.large_profit_percent <= 0.0 {
            return Err(AdvisorError::Config(
                "large_profit_percent must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&p.book_partial_fraction) || p.book_partial_fraction == 0.0 {
            return Err(AdvisorError::Config(
                "book_partial_fraction must be in (0, 1]".to_string(),
            ));
        }
        if p.stop_distance_percent < 0.0 {
            return Err(AdvisorError::Config(
                "stop_distance_percent must be non-negative".to_string(),
            ));
        }

        if self.scheduler.tick.is_zero() || self.scheduler.tolerance < self.scheduler.tick {
            return Err(AdvisorError::Config(
                "scheduler tolerance must be at least one tick".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`AdvisorConfig`].
#[derive(Debug, Default)]
pub struct AdvisorConfigBuilder {
    quote_timeout: Option<Duration>,
    data_timeout: Option<Duration>,
    stage_timeout: Option<Duration>,
    deep_dive_stage_timeout: Option<Duration>,
    weights: Option<SynthesisWeights>,
    portfolio: Option<PortfolioThresholds>,
    scheduler: Option<SchedulerSettings>,
}

impl AdvisorConfigBuilder {
    pub fn quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = Some(timeout);
        self
    }

    pub fn data_timeout(mut self, timeout: Duration) -> Self {
        self.data_timeout = Some(timeout);
        self
    }

    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn deep_dive_stage_timeout(mut self, timeout: Duration) -> Self {
        self.deep_dive_stage_timeout = Some(timeout);
        self
    }

    pub fn weights(mut self, weights: SynthesisWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn portfolio(mut self, thresholds: PortfolioThresholds) -> Self {
        self.portfolio = Some(thresholds);
        self
    }

    pub fn scheduler(mut self, settings: SchedulerSettings) -> Self {
        self.scheduler = Some(settings);
        self
    }

    pub fn build(self) -> Result<AdvisorConfig> {
        let defaults = AdvisorConfig::default();
        let config = AdvisorConfig {
            quote_timeout: self.quote_timeout.unwrap_or(defaults.quote_timeout),
            data_timeout: self.data_timeout.unwrap_or(defaults.data_timeout),
            stage_timeout: self.stage_timeout.unwrap_or(defaults.stage_timeout),
            deep_dive_stage_timeout: self
                .deep_dive_stage_timeout
                .unwrap_or(defaults.deep_dive_stage_timeout),
            weights: self.weights.unwrap_or(defaults.weights),
            portfolio: self.portfolio.unwrap_or(defaults.portfolio),
            scheduler: self.scheduler.unwrap_or(defaults.scheduler),
        };
        config.validate()?;
        Ok(config)
    }
}
