//! Fundamental analysis agent

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use advisor_core::{
    AgentResult, AgentRole, AnalysisAgent, FailureClass, Financials, Inference, TickerContext,
};
use async_trait::async_trait;

use crate::output::{self, OUTPUT_CONTRACT};

const SYSTEM_PROMPT: &str = r#"You are a fundamental analysis expert specializing in company valuation and financial health.

Assess the company from the metrics provided:
- Valuation (P/E, P/B relative to what is typical for the sector)
- Profitability (EPS, ROE)
- Balance sheet strength (debt-to-equity)
- Shareholder returns (dividend yield)

Score 0-100 where 100 is an exceptionally strong, attractively valued
business. Do not invent numbers that were not provided.
"#;

/// Scores valuation and financial health from pre-fetched financials.
pub struct FundamentalAgent {
    inference: Arc<dyn Inference>,
}

impl FundamentalAgent {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    fn build_prompt(ticker: &str, ctx: &TickerContext, financials: &Financials) -> String {
        let mut prompt = format!("Analyze the fundamentals of {ticker}.\n");
        if let Some(quote) = &ctx.quote {
            let _ = writeln!(
                prompt,
                "Current price: {:.2} ({:+.2}% today)",
                quote.price, quote.change_percent
            );
        }
        push_metric(&mut prompt, "Market cap", financials.market_cap);
        push_metric(&mut prompt, "P/E", financials.pe_ratio);
        push_metric(&mut prompt, "P/B", financials.pb_ratio);
        push_metric(&mut prompt, "EPS", financials.eps);
        push_metric(&mut prompt, "ROE %", financials.roe);
        push_metric(&mut prompt, "Debt/Equity", financials.debt_to_equity);
        push_metric(&mut prompt, "Dividend yield %", financials.dividend_yield);
        if let Some(sector) = &financials.sector {
            let _ = writeln!(prompt, "Sector: {sector}");
        }
        prompt
    }
}

fn push_metric(prompt: &mut String, label: &str, value: Option<f64>) {
    if let Some(value) = value {
        let _ = writeln!(prompt, "{label}: {value:.2}");
    }
}

#[async_trait]
impl AnalysisAgent for FundamentalAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Fundamental
    }

    async fn evaluate(&self, ticker: &str, ctx: &TickerContext) -> AgentResult {
        let started = Instant::now();
        let role = self.role();

        let Some(financials) = &ctx.financials else {
            tracing::warn!(ticker, %role, "no financials in context");
            return AgentResult::failed(role, FailureClass::UpstreamDataMissing, started.elapsed());
        };

        let system = format!("{SYSTEM_PROMPT}{OUTPUT_CONTRACT}");
        let prompt = Self::build_prompt(ticker, ctx, financials);
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
