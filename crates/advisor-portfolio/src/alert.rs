//! Alert derivation
//!
//! Pure precedence cascade from one holding's state to one alert. Checks run
//! in a fixed order and the first hit wins: stop-loss, large loss, large
//! profit, target reached, strong positive view, hold. A holding always gets
//! exactly one alert, even when price or analysis is missing.

use advisor_core::{Alert, Holding, HoldingAction, PortfolioThresholds, Priority};
use advisor_engine::{SynthesizedRecommendation, TradeAction};
use chrono::{DateTime, Utc};

pub fn derive_alert(
    holding: &Holding,
    price: Option<f64>,
    recommendation: Option<&SynthesizedRecommendation>,
    thresholds: &PortfolioThresholds,
    now: DateTime<Utc>,
) -> Alert {
    let make = |priority, action, reason: String| Alert {
        ticker: holding.ticker.clone(),
        priority,
        action,
        trigger_reason: reason,
        computed_at: now,
    };

    let Some(price) = price else {
        return make(
            Priority::Low,
            HoldingAction::Hold,
            "market data unavailable, holding as-is".to_string(),
        );
    };
    let pnl = holding.pnl_percent(price);

    // 1. Stop-loss proximity. The protective stop exists to be respected;
    //    everything else yields to it.
    if let Some(stop) = recommendation.and_then(SynthesizedRecommendation::stop_loss) {
        let trigger_level = stop * (1.0 + thresholds.stop_distance_percent / 100.0);
        if stop > 0.0 && price <= trigger_level {
            return make(
                Priority::Urgent,
                HoldingAction::Exit,
                format!("price {price:.2} is at or within {:.0}% of stop-loss {stop:.2}",
                    thresholds.stop_distance_percent),
            );
        }
    }

    // 2. Large unrealized loss forces a review regardless of what the
    //    analysts currently think.
    if pnl <= thresholds.large_loss_percent {
        return make(
            Priority::Urgent,
            HoldingAction::Exit,
            format!("position is down {pnl:.1}%, cut-loss review required"),
        );
    }

    // 3. Large unrealized profit: protect gains even on a bullish view.
    if pnl >= thresholds.large_profit_percent {
        return make(
            Priority::High,
            HoldingAction::BookPartial,
            format!(
                "position is up {pnl:.1}%, consider booking {:.0}% of it",
                thresholds.book_partial_fraction * 100.0
            ),
        );
    }

    // 4. Analyst target reached.
    if let Some(target) = recommendation.and_then(SynthesizedRecommendation::target) {
        if target > 0.0 && price >= target {
            return make(
                Priority::High,
                HoldingAction::BookPartial,
                format!(
                    "target {target:.2} reached, consider booking {:.0}%",
                    thresholds.book_partial_fraction * 100.0
                ),
            );
        }
    }

    // 5. Strong positive view while the position has room to add.
    if let Some(rec) = recommendation {
        if rec.action == TradeAction::Buy
            && rec.confidence >= thresholds.add_more_confidence
            && pnl < thresholds.add_more_max_pnl_percent
        {
            return make(
                Priority::Medium,
                HoldingAction::AddMore,
                format!(
                    "analysts lean BUY at {:.0}% confidence",
                    rec.confidence * 100.0
                ),
            );
        }
    }

    // 6. Nothing notable; a failed analysis also lands here.
    let reason = if recommendation.is_some() {
        format!("no trigger hit, P&L {pnl:.1}%")
    } else {
        format!("analysis unavailable, P&L {pnl:.1}%")
    };
    make(Priority::Low, HoldingAction::Hold, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{AgentResult, AgentRole, Findings, Signal};
    use std::time::Duration;

    fn holding(cost: f64) -> Holding {
        Holding {
            ticker: "TCS".to_string(),
            quantity: 10.0,
            average_cost: cost,
            acquired_on: Utc::now(),
        }
    }

    fn rec(
        action: TradeAction,
        confidence: f64,
        stop: Option<f64>,
        target: Option<f64>,
    ) -> SynthesizedRecommendation {
        let mut contributing = Vec::new();
        if stop.is_some() || target.is_some() {
            contributing.push(AgentResult::ok(
                AgentRole::Technical,
                Findings::new(60, Signal::Bullish, 0.7).with_levels(stop, target),
                Duration::from_millis(5),
            ));
        }
        SynthesizedRecommendation {
            ticker: "TCS".to_string(),
            action,
            confidence,
            weighted_score: 60.0,
            rationale: String::new(),
            contributing,
        }
    }

    fn thresholds() -> PortfolioThresholds {
        PortfolioThresholds::default()
    }

    #[test]
    fn price_below_stop_is_urgent_exit() {
        // Stop at 100, price 3% below it.
        let alert = derive_alert(
            &holding(110.0),
            Some(97.0),
            Some(&rec(TradeAction::Buy, 0.9, Some(100.0), None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::Urgent);
        assert_eq!(alert.action, HoldingAction::Exit);
        assert!(alert.trigger_reason.contains("stop-loss"));
    }

    #[test]
    fn price_just_above_stop_window_does_not_trigger() {
        // Stop at 100, window ends at 102; price 103 is clear.
        let alert = derive_alert(
            &holding(100.0),
            Some(103.0),
            Some(&rec(TradeAction::Hold, 0.5, Some(100.0), None)),
            &thresholds(),
            Utc::now(),
        );
        assert_ne!(alert.priority, Priority::Urgent);
    }

    #[test]
    fn large_loss_overrides_a_bullish_view() {
        // Down 20% while analysts still say BUY.
        let alert = derive_alert(
            &holding(100.0),
            Some(80.0),
            Some(&rec(TradeAction::Buy, 0.95, None, None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::Urgent);
        assert_eq!(alert.action, HoldingAction::Exit);
    }

    #[test]
    fn large_profit_books_partial_even_without_target() {
        let alert = derive_alert(
            &holding(100.0),
            Some(130.0),
            Some(&rec(TradeAction::Buy, 0.9, None, None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::High);
        assert_eq!(alert.action, HoldingAction::BookPartial);
    }

    #[test]
    fn stop_hit_outranks_large_profit() {
        // Profitable position whose price has fallen back to the stop.
        let alert = derive_alert(
            &holding(70.0),
            Some(98.0),
            Some(&rec(TradeAction::Buy, 0.9, Some(100.0), None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::Urgent);
        assert_eq!(alert.action, HoldingAction::Exit);
    }

    #[test]
    fn target_reached_books_partial() {
        let alert = derive_alert(
            &holding(100.0),
            Some(112.0),
            Some(&rec(TradeAction::Buy, 0.9, Some(90.0), Some(110.0))),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::High);
        assert_eq!(alert.action, HoldingAction::BookPartial);
        assert!(alert.trigger_reason.contains("target"));
    }

    #[test]
    fn confident_buy_with_room_suggests_adding() {
        let alert = derive_alert(
            &holding(100.0),
            Some(105.0),
            Some(&rec(TradeAction::Buy, 0.8, None, None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.priority, Priority::Medium);
        assert_eq!(alert.action, HoldingAction::AddMore);
    }

    #[test]
    fn extended_position_is_not_added_to() {
        // Up 15%, above the add-more ceiling of 10%.
        let alert = derive_alert(
            &holding(100.0),
            Some(115.0),
            Some(&rec(TradeAction::Buy, 0.8, None, None)),
            &thresholds(),
            Utc::now(),
        );
        assert_eq!(alert.action, HoldingAction::Hold);
        assert_eq!(alert.priority, Priority::Low);
    }

    #[test]
    fn missing_analysis_still_yields_one_alert() {
        let alert = derive_alert(&holding(100.0), Some(104.0), None, &thresholds(), Utc::now());
        assert_eq!(alert.priority, Priority::Low);
        assert_eq!(alert.action, HoldingAction::Hold);
        assert!(alert.trigger_reason.contains("unavailable"));
    }

    #[test]
    fn missing_price_still_yields_one_alert() {
        let alert = derive_alert(&holding(100.0), None, None, &thresholds(), Utc::now());
        assert_eq!(alert.action, HoldingAction::Hold);
        assert!(alert.trigger_reason.contains("market data"));
    }

    #[test]
    fn pnl_trigger_applies_even_when_analysis_failed() {
        // Quote worked, pipeline did not; the loss check still fires.
        let alert = derive_alert(&holding(100.0), Some(80.0), None, &thresholds(), Utc::now());
        assert_eq!(alert.priority, Priority::Urgent);
        assert_eq!(alert.action, HoldingAction::Exit);
    }
}
