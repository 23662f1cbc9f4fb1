//! User-facing text rendering
//!
//! The only place where results turn into prose. Transports deliver these
//! strings verbatim, so everything here stays plain text.

use std::fmt::Write as _;

use advisor_core::{AgentRole, AgentStatus, Quote, TickerContext};

use crate::synthesis::{ComparisonOutcome, SynthesizedRecommendation};

pub const HELP_TEXT: &str = "\
Commands:
  /p <ticker>          current price
  /t <ticker>          technical view
  /f <ticker>          fundamental view
  /n <ticker>          news sentiment
  /a <ticker>          full analysis
  /dd <ticker>         deep dive (longer, more patient analysis)
  /c <t1> <t2>         compare two stocks
  /portfolio           evaluate your holdings
Free-text questions work too, e.g. \"should i buy infosys\".";

pub fn quote(quote: &Quote) -> String {
    let mut out = format!(
        "{}: {:.2} ({:+.2}%)\nDay range: {:.2} - {:.2}\nVolume: {}",
        quote.ticker,
        quote.price,
        quote.change_percent,
        quote.day_low,
        quote.day_high,
        quote.volume
    );
    if let (Some(low), Some(high)) = (quote.week_52_low, quote.week_52_high) {
        let _ = write!(out, "\n52-week range: {low:.2} - {high:.2}");
    }
    out
}

/// Render one analyst's view for the single-aspect path. A failed result
/// becomes an apology rather than an error.
pub fn single_aspect(role: AgentRole, ctx: &TickerContext) -> String {
    let Some(result) = ctx.result(role) else {
        return format!("{} analysis for {} is unavailable right now.", role, ctx.ticker);
    };
    match result.findings() {
        Some(findings) => {
            let mut out = format!(
                "{} view on {}: {:?}, score {}/100",
                role, ctx.ticker, findings.signal, findings.score
            );
            if let Some(stop) = findings.stop_loss {
                let _ = write!(out, "\nSuggested stop-loss: {stop:.2}");
            }
            if let Some(target) = findings.target {
                let _ = write!(out, "\nTarget: {target:.2}");
            }
            if !findings.summary.is_empty() {
                let _ = write!(out, "\n{}", findings.summary);
            }
            out
        }
        None => {
            let reason = match result.status {
                AgentStatus::TimedOut => "it took too long",
                _ => "the data was not available",
            };
            format!(
                "{} analysis for {} is unavailable right now ({reason}). Please try again later.",
                role, ctx.ticker
            )
        }
    }
}

pub fn recommendation(rec: &SynthesizedRecommendation) -> String {
    let mut out = format!(
        "{}: {} (confidence {:.0}%)\nComposite score: {:.0}/100",
        rec.ticker,
        rec.action.label(),
        rec.confidence * 100.0,
        rec.weighted_score
    );
    if let Some(stop) = rec.stop_loss() {
        let _ = write!(out, "\nStop-loss: {stop:.2}");
    }
    if let Some(target) = rec.target() {
        let _ = write!(out, "\nTarget: {target:.2}");
    }
    if let Some(rating) = rec.risk_rating() {
        let _ = write!(out, "\nRisk: {rating:?}");
    }
    let _ = write!(out, "\n\n{}", rec.rationale);
    out
}

pub fn comparison(outcome: &ComparisonOutcome) -> String {
    let mut out = String::new();
    if let Some(winner) = outcome.winner() {
        let _ = writeln!(out, "Pick: {}\n", winner.ticker);
    }
    for (position, rec) in outcome.ranked.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} - {} (confidence {:.0}%, score {:.0}/100)",
            position + 1,
            rec.ticker,
            rec.action.label(),
            rec.confidence * 100.0,
            rec.weighted_score
        );
    }
    for ticker in &outcome.unavailable {
        let _ = writeln!(out, "{ticker}: analysis unavailable right now");
    }
    out.trim_end().to_string()
}
