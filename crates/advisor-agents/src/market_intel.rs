//! Market intelligence agent

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use advisor_core::{
    AgentResult, AgentRole, AnalysisAgent, FailureClass, Inference, NewsItem, TickerContext,
};
use async_trait::async_trait;

use crate::output::{self, OUTPUT_CONTRACT};

const SYSTEM_PROMPT: &str = r#"You are a market intelligence analyst gauging sentiment from recent headlines.

Weigh the headlines provided for the company:
- Materiality: earnings, orders, regulation and management changes matter
  more than routine coverage
- Recency: newer items outweigh older ones
- Direction: positive, negative or noise

Score 0-100 where 100 is overwhelmingly positive news flow. Base your view
only on the headlines provided.
"#;

/// Gauges news sentiment from pre-fetched headlines.
pub struct MarketIntelAgent {
    inference: Arc<dyn Inference>,
}

impl MarketIntelAgent {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    fn build_prompt(ticker: &str, news: &[NewsItem]) -> String {
        let mut prompt = format!("Assess recent news sentiment for {ticker}.\nHeadlines:\n");
        for item in news {
            let _ = writeln!(prompt, "- {} ({})", item.headline, item.source);
        }
        prompt
    }
}

#[async_trait]
impl AnalysisAgent for MarketIntelAgent {
    fn role(&self) -> AgentRole {
        AgentRole::MarketIntel
    }

    async fn evaluate(&self, ticker: &str, ctx: &TickerContext) -> AgentResult {
        let started = Instant::now();
        let role = self.role();

        if ctx.news.is_empty() {
            tracing::warn!(ticker, %role, "no headlines in context");
            return AgentResult::failed(role, FailureClass::UpstreamDataMissing, started.elapsed());
        }

        let system = format!("{SYSTEM_PROMPT}{OUTPUT_CONTRACT}");
        let prompt = Self::build_prompt(ticker, &ctx.news);
        match self.inference.generate(&system, &prompt).await {
            Ok(raw) => match output::parse_findings(&raw) {
                Ok(findings) => AgentResult::ok(role, findings, started.elapsed()),
                Err(err) => {
                    tracing::warn!(ticker, %role, %err, "unparseable model output");
                    AgentResult::failed(role, FailureClass::MalformedOutput, started.elapsed())
                }
            },
            Err(err) => {
                tracing::warn!(ticker, %role, %err, "inference call failed");
                AgentResult::failed(role, FailureClass::Internal, started.elapsed())
            }
        }
    }
}
