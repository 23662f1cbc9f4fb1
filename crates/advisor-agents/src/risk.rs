//! Risk assessment agent
//!
//! Runs after the parallel analyst stage and reads their findings from the
//! context arena. At least one of the fundamental or technical views must be
//! present; with neither there is nothing to assess risk against.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use advisor_core::{
    AgentResult, AgentRole, AnalysisAgent, FailureClass, Findings, Inference, TickerContext,
};
use async_trait::async_trait;

use crate::output;

const SYSTEM_PROMPT: &str = r#"You are a risk assessment expert reviewing the work of other analysts.

Given their findings for a stock, assess the downside:
- Disagreement between the analysts is itself a risk signal
- Stretched valuation or weak balance sheet raises risk
- A wide gap between price and the proposed stop-loss raises risk

Score 0-100 where 100 means risk is very well contained. Rate the overall
risk level explicitly.
"#;

const OUTPUT_CONTRACT: &str = r#"
Respond with a single JSON object and nothing else:
{
  "score": <integer 0-100>,
  "signal": "BULLISH" | "BEARISH" | "NEUTRAL",
  "conviction": <number 0.0-1.0>,
  "summary": "<one or two sentences>",
  "risk_rating": "LOW" | "MODERATE" | "HIGH" | "VERY_HIGH"
}
"#;

/// Weighs the upstream analyst findings into a downside view.
pub struct RiskAgent {
    inference: Arc<dyn Inference>,
}

impl RiskAgent {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    fn build_prompt(ticker: &str, ctx: &TickerContext) -> String {
        let mut prompt = format!("Assess the risk of a position in {ticker}.\n");
        if let Some(quote) = &ctx.quote {
            let _ = writeln!(prompt, "Current price: {:.2}", quote.price);
        }
        for role in [
            AgentRole::Fundamental,
            AgentRole::Technical,
            AgentRole::MarketIntel,
        ] {
            if let Some(findings) = ctx.upstream_findings(role) {
                push_findings(&mut prompt, role, findings);
            }
        }
        prompt
    }
}

fn push_findings(prompt: &mut String, role: AgentRole, findings: &Findings) {
    let _ = writeln!(
        prompt,
        "{role} view: score {}, signal {:?}, conviction {:.2}",
        findings.score, findings.signal, findings.conviction
    );
    if let Some(stop) = findings.stop_loss {
        let _ = writeln!(prompt, "{role} stop-loss: {stop:.2}");
    }
    if !findings.summary.is_empty() {
        let _ = writeln!(prompt, "{role} summary: {}", findings.summary);
    }
}

#[async_trait]
impl AnalysisAgent for RiskAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Risk
    }

    async fn evaluate(&self, ticker: &str, ctx: &TickerContext) -> AgentResult {
        let started = Instant::now();
        let role = self.role();

        let has_input = ctx.upstream_findings(AgentRole::Fundamental).is_some()
            || ctx.upstream_findings(AgentRole::Technical).is_some();
        if !has_input {
            tracing::warn!(ticker, %role, "no analyst findings to assess");
            return AgentResult::failed(role, FailureClass::UpstreamDataMissing, started.elapsed());
        }

        let system = format!("{SYSTEM_PROMPT}{OUTPUT_CONTRACT}");
        let prompt = Self::build_prompt(ticker, ctx);
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
