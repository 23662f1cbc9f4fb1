//! Engine facade
//!
//! Single entry point for query handling: classify, gather data, plan,
//! execute, synthesize, render. Errors surface to the caller as friendly
//! text; full detail goes to the structured log here.

use std::sync::Arc;

use advisor_core::{
    AdvisorConfig, AdvisorError, AgentRegistry, AgentRole, Classification, ClassificationError,
    MarketData, Path, Query, Result, TickerContext,
};
use tokio::time;

use crate::classifier::IntentClassifier;
use crate::executor::PipelineExecutor;
use crate::format;
use crate::plan::Planner;
use crate::synthesis::{ComparisonOutcome, SynthesizedRecommendation, Synthesizer};

/// What the caller should do with a handled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResponse {
    /// Deliver this text to the user.
    Text(String),
    /// The query asks for a portfolio evaluation, which lives outside the
    /// per-ticker engine.
    PortfolioRequested,
}

pub struct AdvisorEngine {
    classifier: IntentClassifier,
    registry: Arc<AgentRegistry>,
    market_data: Arc<dyn MarketData>,
    executor: PipelineExecutor,
    synthesizer: Synthesizer,
    config: Arc<AdvisorConfig>,
}

impl AdvisorEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        market_data: Arc<dyn MarketData>,
        config: Arc<AdvisorConfig>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: IntentClassifier::new()?,
            executor: PipelineExecutor::new(Arc::clone(&registry), Arc::clone(&config)),
            synthesizer: Synthesizer::new(config.weights),
            registry,
            market_data,
            config,
        })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Handle one query end to end. Never returns an error: failures become
    /// user-facing text and a log entry.
    pub async fn handle_query(&self, query: &Query) -> EngineResponse {
        let text = query.text.trim();
        if matches!(text, "/help" | "/start") {
            return EngineResponse::Text(format::HELP_TEXT.to_string());
        }

        match self.respond(query).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(user_id = query.user_id, %err, "query failed");
                EngineResponse::Text(err.user_message())
            }
        }
    }

    async fn respond(&self, query: &Query) -> Result<EngineResponse> {
        let classification = self.classifier.classify(&query.text)?;
        tracing::info!(
            user_id = query.user_id,
            path = ?classification.path,
            tickers = ?classification.tickers,
            "query classified"
        );

        match classification.path {
            Path::Portfolio => Ok(EngineResponse::PortfolioRequested),
            Path::PriceOnly => {
                let ticker = required_ticker(&classification)?;
                let quote = time::timeout(
                    self.config.quote_timeout,
                    self.market_data.fetch_quote(ticker),
                )
                .await
                .map_err(|_| {
                    AdvisorError::MarketData(format!("quote fetch for {ticker} timed out"))
                })??;
                Ok(EngineResponse::Text(format::quote(&quote)))
            }
            Path::Comparison => self.compare(&classification).await,
            Path::SingleAspect | Path::Standard | Path::DeepDive => {
                let ticker = required_ticker(&classification)?;
                let (ctx, recommendation) = self.analyze(&classification, ticker).await?;
                let text = match recommendation {
                    Some(rec) => format::recommendation(&rec),
                    None => {
                        // Single aspect: exactly one requested role.
                        let role = classification
                            .requested_agents
                            .iter()
                            .next()
                            .copied()
                            .ok_or_else(|| {
                                AdvisorError::Config("single-aspect plan without a role".into())
                            })?;
                        format::single_aspect(role, &ctx)
                    }
                };
                Ok(EngineResponse::Text(text))
            }
        }
    }

    /// Run the plan for one ticker; synthesis only where the path calls for
    /// it.
    async fn analyze(
        &self,
        classification: &Classification,
        ticker: &str,
    ) -> Result<(TickerContext, Option<SynthesizedRecommendation>)> {
        let plans = Planner::plan(classification, &self.registry)?;
        let plan = plans
            .into_iter()
            .find(|plan| plan.ticker == ticker)
            .ok_or_else(|| AdvisorError::Config(format!("no plan produced for {ticker}")))?;

        let ctx = self.gather_context(ticker).await;
        let ctx = self.executor.execute(&plan, ctx).await?;

        let recommendation = plan
            .synthesize
            .then(|| self.synthesizer.synthesize(&classification.requested_agents, &ctx));
        Ok((ctx, recommendation))
    }

    /// Full-pipeline recommendation for one ticker, independent of any
    /// query. Used by the portfolio evaluation cycle.
    pub async fn standard_recommendation(
        &self,
        ticker: &str,
    ) -> Result<SynthesizedRecommendation> {
        let classification =
            Classification::new(Path::Standard, vec![ticker.to_string()], AgentRole::ALL);
        let (_, recommendation) = self.analyze(&classification, ticker).await?;
        recommendation.ok_or_else(|| {
            AdvisorError::Config("standard plan produced no recommendation".into())
        })
    }

    async fn compare(&self, classification: &Classification) -> Result<EngineResponse> {
        let mut recommendations = Vec::new();
        let mut unavailable = Vec::new();
        let mut first_error = None;

        // Tickers run sequentially; each one's stages are parallel inside.
        for ticker in &classification.tickers {
            match self.analyze(classification, ticker).await {
                Ok((_, Some(rec))) => recommendations.push(rec),
                Ok((_, None)) => unavailable.push(ticker.clone()),
                Err(err) => {
                    tracing::warn!(ticker, %err, "comparison leg failed");
                    unavailable.push(ticker.clone());
                    first_error.get_or_insert(err);
                }
            }
        }

        if recommendations.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                AdvisorError::Config("comparison produced no results".into())
            }));
        }
        let outcome = ComparisonOutcome::rank(recommendations, unavailable);
        Ok(EngineResponse::Text(format::comparison(&outcome)))
    }

    /// Fetch quote, financials and news concurrently. Each fetch fails or
    /// times out independently; agents decide what they can work without.
    async fn gather_context(&self, ticker: &str) -> TickerContext {
        let budget = self.config.data_timeout;
        let (quote, financials, news) = tokio::join!(
            time::timeout(budget, self.market_data.fetch_quote(ticker)),
            time::timeout(budget, self.market_data.fetch_financials(ticker)),
            time::timeout(budget, self.market_data.fetch_news(ticker)),
        );

        let mut ctx = TickerContext::new(ticker);
        match quote {
            Ok(Ok(quote)) => ctx.quote = Some(quote),
            Ok(Err(err)) => tracing::warn!(ticker, %err, "quote fetch failed"),
            Err(_) => tracing::warn!(ticker, "quote fetch timed out"),
        }
        match financials {
            Ok(Ok(financials)) => ctx.financials = Some(financials),
            Ok(Err(err)) => tracing::warn!(ticker, %err, "financials fetch failed"),
            Err(_) => tracing::warn!(ticker, "financials fetch timed out"),
        }
        match news {
            Ok(Ok(news)) => ctx.news = news,
            Ok(Err(err)) => tracing::warn!(ticker, %err, "news fetch failed"),
            Err(_) => tracing::warn!(ticker, "news fetch timed out"),
        }
        ctx
    }
}

fn required_ticker(classification: &Classification) -> Result<&str> {
    classification
        .primary_ticker()
        .ok_or_else(|| ClassificationError::MissingTicker.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{
        AgentResult, AnalysisAgent, FailureClass, Financials, Findings, NewsItem, Quote, Signal,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    struct StubMarketData;

    #[async_trait]
    impl MarketData for StubMarketData {
        async fn fetch_quote(&self, ticker: &str) -> Result<Quote> {
            Ok(Quote {
                ticker: ticker.to_string(),
                price: 3850.0,
                change_percent: 0.8,
                day_high: 3880.0,
                day_low: 3810.0,
                volume: 900_000,
                week_52_high: Some(4250.0),
                week_52_low: Some(3100.0),
                as_of: Utc::now(),
            })
        }

        async fn fetch_financials(&self, ticker: &str) -> Result<Financials> {
            Ok(Financials {
                ticker: ticker.to_string(),
                pe_ratio: Some(28.0),
                ..Financials::default()
            })
        }

        async fn fetch_news(&self, _ticker: &str) -> Result<Vec<NewsItem>> {
            Ok(vec![NewsItem {
                headline: "Order book grows".to_string(),
                source: "wire".to_string(),
                published_at: None,
            }])
        }
    }

    struct FixedAgent {
        role: AgentRole,
        signal: Signal,
        score: u8,
    }

    #[async_trait]
    impl AnalysisAgent for FixedAgent {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn evaluate(&self, _ticker: &str, _ctx: &TickerContext) -> AgentResult {
            AgentResult::ok(
                self.role,
                Findings::new(self.score, self.signal, 0.8),
                Duration::from_millis(2),
            )
        }
    }

    struct BrokenAgent(AgentRole);

    #[async_trait]
    impl AnalysisAgent for BrokenAgent {
        fn role(&self) -> AgentRole {
            self.0
        }

        async fn evaluate(&self, _ticker: &str, _ctx: &TickerContext) -> AgentResult {
            AgentResult::failed(self.0, FailureClass::Internal, Duration::ZERO)
        }
    }

    fn bullish_registry() -> Arc<AgentRegistry> {
        let mut builder = AgentRegistry::builder();
        for role in AgentRole::ALL {
            builder = builder.register(Arc::new(FixedAgent {
                role,
                signal: Signal::Bullish,
                score: 72,
            }));
        }
        Arc::new(builder.build())
    }

    fn engine_with(registry: Arc<AgentRegistry>) -> AdvisorEngine {
        AdvisorEngine::new(
            registry,
            Arc::new(StubMarketData),
            Arc::new(AdvisorConfig::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn price_command_returns_a_quote() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "/p TCS")).await;
        match response {
            EngineResponse::Text(text) => assert!(text.contains("TCS: 3850.00")),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_analysis_synthesizes_a_buy() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "/a TCS")).await;
        match response {
            EngineResponse::Text(text) => {
                assert!(text.contains("BUY"));
                assert!(text.contains("confidence 100%"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn comparison_ranks_both_tickers() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "/c TCS INFY")).await;
        match response {
            EngineResponse::Text(text) => {
                assert!(text.contains("Pick:"));
                assert!(text.contains("TCS"));
                assert!(text.contains("INFY"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn portfolio_query_is_delegated() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "/portfolio")).await;
        assert_eq!(response, EngineResponse::PortfolioRequested);
    }

    #[tokio::test]
    async fn broken_risk_agent_still_yields_a_recommendation() {
        let mut builder = AgentRegistry::builder();
        for role in [
            AgentRole::Fundamental,
            AgentRole::Technical,
            AgentRole::MarketIntel,
        ] {
            builder = builder.register(Arc::new(FixedAgent {
                role,
                signal: Signal::Bullish,
                score: 72,
            }));
        }
        builder = builder.register(Arc::new(BrokenAgent(AgentRole::Risk)));
        let engine = engine_with(Arc::new(builder.build()));

        let response = engine.handle_query(&Query::new(1, "/a TCS")).await;
        match response {
            EngineResponse::Text(text) => {
                assert!(text.contains("BUY"));
                // Risk carries 0.10 of the requested weight.
                assert!(text.contains("confidence 90%"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_agents_broken_yields_friendly_text() {
        let mut builder = AgentRegistry::builder();
        for role in AgentRole::ALL {
            builder = builder.register(Arc::new(BrokenAgent(role)));
        }
        let engine = engine_with(Arc::new(builder.build()));

        let response = engine.handle_query(&Query::new(1, "/a TCS")).await;
        match response {
            EngineResponse::Text(text) => {
                assert!(text.contains("unavailable"));
                assert!(!text.contains("Internal"));
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn classification_errors_become_prompts() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "what now")).await;
        match response {
            EngineResponse::Text(text) => assert!(text.contains("/help")),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[tokio::test]
    async fn help_is_served_directly() {
        let engine = engine_with(bullish_registry());
        let response = engine.handle_query(&Query::new(1, "/help")).await;
        match response {
            EngineResponse::Text(text) => assert!(text.contains("/portfolio")),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
