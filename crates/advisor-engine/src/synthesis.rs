//! Deterministic synthesis of agent results
//!
//! A pure weighted vote over whatever usable results a plan produced. No
//! randomness and no model calls: the same inputs always yield the same
//! recommendation. Failed and timed-out agents contribute nothing; missing
//! weight shows up as reduced confidence instead.

use std::collections::BTreeSet;

use advisor_core::{
    AgentResult, AgentRole, Findings, RiskRating, Signal, SynthesisWeights, TickerContext,
};

const TALLY_EPSILON: f64 = 1e-9;

/// Final directional call for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy,
    Hold,
    Sell,
}

impl TradeAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
        }
    }

    /// Ranking order for comparisons: Buy over Hold over Sell.
    fn rank(self) -> u8 {
        match self {
            Self::Buy => 2,
            Self::Hold => 1,
            Self::Sell => 0,
        }
    }
}

fn lean(signal: Signal) -> TradeAction {
    match signal {
        Signal::Bullish => TradeAction::Buy,
        Signal::Bearish => TradeAction::Sell,
        Signal::Neutral => TradeAction::Hold,
    }
}

/// Synthesized view over one ticker's agent results.
#[derive(Debug, Clone)]
pub struct SynthesizedRecommendation {
    pub ticker: String,
    pub action: TradeAction,
    /// Fraction of the requested analytical weight that actually
    /// contributed, in [0, 1].
    pub confidence: f64,
    /// Weighted average of contributing scores, 0-100.
    pub weighted_score: f64,
    pub rationale: String,
    pub contributing: Vec<AgentResult>,
}

impl SynthesizedRecommendation {
    fn findings_of(&self, role: AgentRole) -> Option<&Findings> {
        self.contributing
            .iter()
            .find(|result| result.role == role && result.is_ok())
            .and_then(AgentResult::findings)
    }

    /// Protective stop proposed by the technical view, when present.
    pub fn stop_loss(&self) -> Option<f64> {
        self.findings_of(AgentRole::Technical)?.stop_loss
    }

    /// Price target proposed by the technical view, when present.
    pub fn target(&self) -> Option<f64> {
        self.findings_of(AgentRole::Technical)?.target
    }

    pub fn risk_rating(&self) -> Option<RiskRating> {
        self.findings_of(AgentRole::Risk)?.risk_rating
    }

    /// Fraction of contributing views that lean the same way as the final
    /// action.
    pub fn agreement(&self) -> f64 {
        let ok: Vec<&Findings> = self
            .contributing
            .iter()
            .filter_map(AgentResult::findings)
            .collect();
        if ok.is_empty() {
            return 0.0;
        }
        let agreeing = ok
            .iter()
            .filter(|findings| lean(findings.signal) == self.action)
            .count();
        agreeing as f64 / ok.len() as f64
    }
}

/// Weighted-vote synthesizer. Stateless apart from its weight table.
pub struct Synthesizer {
    weights: SynthesisWeights,
}

impl Synthesizer {
    pub fn new(weights: SynthesisWeights) -> Self {
        Self { weights }
    }

    fn weight(&self, role: AgentRole) -> f64 {
        match role {
            AgentRole::Fundamental => self.weights.fundamental,
            AgentRole::Technical => self.weights.technical,
            AgentRole::MarketIntel => self.weights.market_intel,
            AgentRole::Risk => self.weights.risk,
        }
    }

    /// Fold the context's results into one recommendation.
    pub fn synthesize(
        &self,
        requested: &BTreeSet<AgentRole>,
        ctx: &TickerContext,
    ) -> SynthesizedRecommendation {
        let contributing: Vec<AgentResult> = ctx.results().cloned().collect();

        let requested_weight: f64 = requested.iter().map(|role| self.weight(*role)).sum();
        let usable: Vec<&AgentResult> = contributing
            .iter()
            .filter(|result| requested.contains(&result.role) && result.is_ok())
            .collect();
        let present_weight: f64 = usable.iter().map(|result| self.weight(result.role)).sum();

        let confidence = if requested_weight > 0.0 {
            (present_weight / requested_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if usable.is_empty() || present_weight <= 0.0 {
            return SynthesizedRecommendation {
                ticker: ctx.ticker.clone(),
                action: TradeAction::Hold,
                confidence: 0.0,
                weighted_score: 0.0,
                rationale: "no analyst input was available".to_string(),
                contributing,
            };
        }

        let mut buy = 0.0;
        let mut hold = 0.0;
        let mut sell = 0.0;
        let mut weighted_score = 0.0;
        for result in &usable {
            let findings = match result.findings() {
                Some(findings) => findings,
                None => continue,
            };
            let share = self.weight(result.role) / present_weight;
            weighted_score += share * f64::from(findings.score);
            let vote = share * findings.conviction;
            match lean(findings.signal) {
                TradeAction::Buy => buy += vote,
                TradeAction::Hold => hold += vote,
                TradeAction::Sell => sell += vote,
            }
        }

        let top = buy.max(hold).max(sell);
        let tied: Vec<TradeAction> = [
            (TradeAction::Buy, buy),
            (TradeAction::Hold, hold),
            (TradeAction::Sell, sell),
        ]
        .into_iter()
        .filter(|(_, tally)| (top - tally).abs() < TALLY_EPSILON)
        .map(|(action, _)| action)
        .collect();

        let action = if tied.len() == 1 {
            tied[0]
        } else {
            break_tie(&usable, &tied)
        };

        let rationale = build_rationale(requested, &contributing, buy, sell);

        SynthesizedRecommendation {
            ticker: ctx.ticker.clone(),
            action,
            confidence,
            weighted_score,
            rationale,
            contributing,
        }
    }
}

/// Exact ties defer to a fixed role precedence: risk first, then
/// fundamental, technical and market-intel.
fn break_tie(usable: &[&AgentResult], tied: &[TradeAction]) -> TradeAction {
    let mut ordered: Vec<&&AgentResult> = usable.iter().collect();
    ordered.sort_by_key(|result| result.role.tiebreak_rank());
    for result in ordered {
        if let Some(findings) = result.findings() {
            let action = lean(findings.signal);
            if tied.contains(&action) {
                return action;
            }
        }
    }
    TradeAction::Hold
}

fn build_rationale(
    requested: &BTreeSet<AgentRole>,
    contributing: &[AgentResult],
    buy: f64,
    sell: f64,
) -> String {
    let mut lines = Vec::new();
    for role in AgentRole::ALL {
        if !requested.contains(&role) {
            continue;
        }
        let line = match contributing.iter().find(|result| result.role == role) {
            Some(result) => match result.findings() {
                Some(findings) => format!(
                    "{role}: {:?} {}/100, conviction {:.2}",
                    findings.signal, findings.score, findings.conviction
                ),
                None => format!("{role}: unavailable ({:?})", result.status),
            },
            None => format!("{role}: not run"),
        };
        lines.push(line);
    }
    if buy > TALLY_EPSILON && sell > TALLY_EPSILON {
        lines.push("analyst views conflict; treat with caution".to_string());
    }
    lines.join("\n")
}

/// Outcome of ranking several synthesized recommendations.
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    /// Best first.
    pub ranked: Vec<SynthesizedRecommendation>,
    /// Tickers whose analysis was unavailable.
    pub unavailable: Vec<String>,
}

impl ComparisonOutcome {
    /// Rank by action first (Buy over Hold over Sell), then by
    /// confidence-weighted directional agreement, then by ticker for
    /// stability.
    pub fn rank(mut recommendations: Vec<SynthesizedRecommendation>, unavailable: Vec<String>) -> Self {
        recommendations.sort_by(|a, b| {
            b.action
                .rank()
                .cmp(&a.action.rank())
                .then_with(|| {
                    let a_score = a.confidence * a.agreement();
                    let b_score = b.confidence * b.agreement();
                    b_score.partial_cmp(&a_score).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        Self {
            ranked: recommendations,
            unavailable,
        }
    }

    pub fn winner(&self) -> Option<&SynthesizedRecommendation> {
        self.ranked.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::Findings;
    use std::time::Duration;

    fn ok(role: AgentRole, score: u8, signal: Signal, conviction: f64) -> AgentResult {
        AgentResult::ok(
            role,
            Findings::new(score, signal, conviction),
            Duration::from_millis(5),
        )
    }

    fn ctx_with(results: Vec<AgentResult>) -> TickerContext {
        let mut ctx = TickerContext::new("TCS");
        for result in results {
            ctx.record(result);
        }
        ctx
    }

    fn all_roles() -> BTreeSet<AgentRole> {
        AgentRole::ALL.into_iter().collect()
    }

    #[test]
    fn unanimous_bullish_is_a_confident_buy() {
        let ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 75, Signal::Bullish, 0.8),
            ok(AgentRole::Technical, 70, Signal::Bullish, 0.7),
            ok(AgentRole::MarketIntel, 65, Signal::Bullish, 0.6),
            ok(AgentRole::Risk, 60, Signal::Bullish, 0.5),
        ]);

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        assert_eq!(rec.action, TradeAction::Buy);
        assert!((rec.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_agent_reduces_confidence_not_direction() {
        let mut ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 75, Signal::Bullish, 0.8),
            ok(AgentRole::Technical, 70, Signal::Bullish, 0.7),
            ok(AgentRole::MarketIntel, 65, Signal::Bullish, 0.6),
        ]);
        ctx.record(AgentResult::timed_out(
            AgentRole::Risk,
            Duration::from_secs(15),
        ));

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        assert_eq!(rec.action, TradeAction::Buy);
        // Risk carries 0.10 of 1.00 total weight.
        assert!((rec.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn exact_tie_defers_to_role_precedence() {
        // Contributions: fundamental 0.30/0.70 * 0.4, technical
        // 0.40/0.70 * 0.3 -- numerically identical tallies.
        let ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 60, Signal::Bullish, 0.4),
            ok(AgentRole::Technical, 40, Signal::Bearish, 0.3),
        ]);

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        // Fundamental outranks technical in the fixed precedence.
        assert_eq!(rec.action, TradeAction::Buy);
    }

    #[test]
    fn synthesis_is_idempotent() {
        let ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 75, Signal::Bullish, 0.8),
            ok(AgentRole::Technical, 30, Signal::Bearish, 0.9),
            ok(AgentRole::Risk, 50, Signal::Neutral, 0.5),
        ]);
        let synthesizer = Synthesizer::new(SynthesisWeights::default());

        let first = synthesizer.synthesize(&all_roles(), &ctx);
        let second = synthesizer.synthesize(&all_roles(), &ctx);
        assert_eq!(first.action, second.action);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.rationale, second.rationale);
    }

    #[test]
    fn conflicting_views_are_called_out() {
        let ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 75, Signal::Bullish, 0.8),
            ok(AgentRole::Technical, 30, Signal::Bearish, 0.9),
        ]);

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        assert!(rec.rationale.contains("conflict"));
    }

    #[test]
    fn no_usable_results_is_a_zero_confidence_hold() {
        let mut ctx = TickerContext::new("TCS");
        ctx.record(AgentResult::timed_out(
            AgentRole::Fundamental,
            Duration::from_secs(15),
        ));

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        assert_eq!(rec.action, TradeAction::Hold);
        assert!(rec.confidence.abs() < 1e-9);
    }

    #[test]
    fn technical_levels_surface_on_the_recommendation() {
        let mut ctx = TickerContext::new("TCS");
        ctx.record(AgentResult::ok(
            AgentRole::Technical,
            Findings::new(70, Signal::Bullish, 0.7).with_levels(Some(3400.0), Some(4100.0)),
            Duration::from_millis(5),
        ));

        let rec = Synthesizer::new(SynthesisWeights::default()).synthesize(&all_roles(), &ctx);
        assert_eq!(rec.stop_loss(), Some(3400.0));
        assert_eq!(rec.target(), Some(4100.0));
    }

    #[test]
    fn comparison_ranks_buy_over_hold_then_by_confidence() {
        let synthesizer = Synthesizer::new(SynthesisWeights::default());

        let buy_ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 80, Signal::Bullish, 0.8),
            ok(AgentRole::Technical, 75, Signal::Bullish, 0.7),
        ]);
        let mut buy = synthesizer.synthesize(&all_roles(), &buy_ctx);
        buy.ticker = "INFY".to_string();

        let hold_ctx = ctx_with(vec![
            ok(AgentRole::Fundamental, 50, Signal::Neutral, 0.9),
            ok(AgentRole::Technical, 50, Signal::Neutral, 0.9),
            ok(AgentRole::MarketIntel, 50, Signal::Neutral, 0.9),
            ok(AgentRole::Risk, 50, Signal::Neutral, 0.9),
        ]);
        let mut hold = synthesizer.synthesize(&all_roles(), &hold_ctx);
        hold.ticker = "TCS".to_string();

        let outcome = ComparisonOutcome::rank(vec![hold, buy], Vec::new());
        assert_eq!(outcome.winner().unwrap().ticker, "INFY");
        assert_eq!(outcome.ranked[1].ticker, "TCS");
    }
}
