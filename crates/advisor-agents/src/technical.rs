//! Technical analysis agent

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use advisor_core::{
    AgentResult, AgentRole, AnalysisAgent, FailureClass, Inference, Quote, TickerContext,
};
use async_trait::async_trait;

use crate::output;

const SYSTEM_PROMPT: &str = r#"You are a technical analysis expert reading price action and momentum.

Assess the stock from the snapshot provided:
- Position of the price within the day range and the 52-week range
- Momentum implied by today's change
- Volume relative to what the range suggests

Score 0-100 where 100 is a strongly constructive setup. Propose a
protective stop-loss below the current price and a realistic price target.
"#;

// Stop/target extend the base contract; both are plain price levels.
const OUTPUT_CONTRACT: &str = r#"
Respond with a single JSON object and nothing else:
{
  "score": <integer 0-100>,
  "signal": "BULLISH" | "BEARISH" | "NEUTRAL",
  "conviction": <number 0.0-1.0>,
  "summary": "<one or two sentences>",
  "stop_loss": <price level>,
  "target": <price level>
}
"#;

/// Reads price action from the quote snapshot and proposes stop/target
/// levels.
pub struct TechnicalAgent {
    inference: Arc<dyn Inference>,
}

impl TechnicalAgent {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    fn build_prompt(ticker: &str, quote: &Quote) -> String {
        let mut prompt = format!(
            "Analyze the price action of {ticker}.\n\
             Price: {:.2} ({:+.2}% today)\n\
             Day range: {:.2} - {:.2}\n\
             Volume: {}\n",
            quote.price, quote.change_percent, quote.day_low, quote.day_high, quote.volume
        );
        if let (Some(low), Some(high)) = (quote.week_52_low, quote.week_52_high) {
            let _ = writeln!(prompt, "52-week range: {low:.2} - {high:.2}");
        }
        prompt
    }
}

#[async_trait]
impl AnalysisAgent for TechnicalAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Technical
    }

    async fn evaluate(&self, ticker: &str, ctx: &TickerContext) -> AgentResult {
        let started = Instant::now();
        let role = self.role();

        let Some(quote) = &ctx.quote else {
            tracing::warn!(ticker, %role, "no quote in context");
            return AgentResult::failed(role, FailureClass::UpstreamDataMissing, started.elapsed());
        };

        let system = format!("{SYSTEM_PROMPT}{OUTPUT_CONTRACT}");
        let prompt = Self::build_prompt(ticker, quote);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInference;
    use advisor_core::AgentStatus;
    use chrono::Utc;

    fn quote() -> Quote {
        Quote {
            ticker: "INFY".to_string(),
            price: 1500.0,
            change_percent: 1.2,
            day_high: 1512.0,
            day_low: 1488.0,
            volume: 4_200_000,
            week_52_high: Some(1650.0),
            week_52_low: Some(1200.0),
            as_of: Utc::now(),
        }
    }

    #[tokio::test]
    async fn carries_stop_and_target_levels() {
        let agent = TechnicalAgent::new(Arc::new(ScriptedInference::replies(
            r#"{"score": 66, "signal": "BULLISH", "conviction": 0.7,
                "stop_loss": 1440.0, "target": 1620.0}"#,
        )));
        let ctx = TickerContext::new("INFY").with_quote(quote());

        let result = agent.evaluate("INFY", &ctx).await;
        let findings = result.findings().unwrap();
        assert_eq!(findings.stop_loss, Some(1440.0));
        assert_eq!(findings.target, Some(1620.0));
    }

    #[tokio::test]
    async fn missing_quote_is_upstream_data_missing() {
        let agent = TechnicalAgent::new(Arc::new(ScriptedInference::replies("{}")));
        let result = agent.evaluate("INFY", &TickerContext::new("INFY")).await;
        assert_eq!(
            result.status,
            AgentStatus::Failed(FailureClass::UpstreamDataMissing)
        );
    }
}
