//! Threshold decision and the human-readable rationale behind it.

use crate::types::{Decision, Flags, MetricsRecord, PipelineError, ThresholdOverride, Thresholds};

/// Sentiment at or above this reads as positive.
const POSITIVE_SENTIMENT: f64 = 0.3;
/// Sentiment at or below this reads as negative.
const NEGATIVE_SENTIMENT: f64 = -0.3;
/// Peer discount (%) above which the valuation is called cheap.
const CHEAP_GAP_PCT: f64 = 10.0;
/// Peer premium (%) below which the valuation is called rich.
const RICH_GAP_PCT: f64 = -5.0;

/// BUY at or above `buy_prob`, HOLD at or above `hold_prob`, else AVOID.
/// Callers guarantee `hold_prob <= buy_prob`.
pub fn decide(probability: f64, buy_prob: f64, hold_prob: f64) -> Decision {
    if probability >= buy_prob {
        Decision::Buy
    } else if probability >= hold_prob {
        Decision::Hold
    } else {
        Decision::Avoid
    }
}

/// Apply a per-run override on top of the configured thresholds and
/// validate the result.
pub fn effective_thresholds(
    base: Thresholds,
    over: Option<ThresholdOverride>,
) -> Result<Thresholds, PipelineError> {
    let mut t = base;
    if let Some(o) = over {
        if let Some(b) = o.buy_prob {
            t.buy_prob = b;
        }
        if let Some(h) = o.hold_prob {
            t.hold_prob = h;
        }
    }
    t.validate()?;
    Ok(t)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReasoningError {
    #[error("non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Everything the rationale mentions.
#[derive(Debug, Clone, Copy)]
pub struct RationaleInputs<'a> {
    pub symbol: &'a str,
    pub decision: Decision,
    pub sentiment: f64,
    pub metrics: &'a MetricsRecord,
    pub flags: Flags,
    pub probability: f64,
    pub expected_gain_pct: f64,
}

/// Render the bullet list explaining a decision, in fixed order: sentiment,
/// valuation gap (when known and notable), one line per satisfied flag,
/// model output.
pub fn build_rationale(r: &RationaleInputs<'_>) -> Result<String, ReasoningError> {
    for (field, value) in [
        ("probability", r.probability),
        ("expected gain", r.expected_gain_pct),
        ("sentiment", r.sentiment),
    ] {
        if !value.is_finite() {
            return Err(ReasoningError::NonFinite { field, value });
        }
    }

    let mut points = Vec::with_capacity(6);

    let tone = if r.sentiment >= POSITIVE_SENTIMENT {
        "positive"
    } else if r.sentiment <= NEGATIVE_SENTIMENT {
        "negative"
    } else {
        "mixed"
    };
    points.push(format!("News sentiment {tone} ({:+.2})", r.sentiment));

    if let Some(gap) = r.metrics.peer_gap_pct {
        if gap > CHEAP_GAP_PCT {
            points.push("Valuation cheaper than peers (>10% discount)".to_string());
        } else if gap < RICH_GAP_PCT {
            points.push("Valuation richer than peers (>5% premium)".to_string());
        }
    }

    if r.flags.roe_ok {
        points.push("ROE ≥ 15%".to_string());
    }
    if r.flags.leverage_ok {
        points.push("Debt-to-Equity ≤ 1.0 (manageable leverage)".to_string());
    }
    if r.flags.growth_ok {
        points.push("Revenue CAGR ≥ 20% (growth)".to_string());
    }

    points.push(format!(
        "Model gain probability {:.2}, expected gain ≈ {:.1}%",
        r.probability, r.expected_gain_pct
    ));

    Ok(format!(
        "**{}** for {} because:\n- {}",
        r.decision,
        r.symbol,
        points.join("\n- ")
    ))
}

/// Text used when the rationale cannot be built.
pub fn fallback_rationale(decision: Decision, symbol: &str) -> String {
    format!("{decision} for {symbol} based on model output.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs<'a>(m: &'a MetricsRecord, sentiment: f64, flags: Flags) -> RationaleInputs<'a> {
        RationaleInputs {
            symbol: "ACME.NS",
            decision: Decision::Hold,
            sentiment,
            metrics: m,
            flags,
            probability: 0.55,
            expected_gain_pct: 12.0,
        }
    }

    #[test]
    fn test_decide_boundaries() {
        assert_eq!(decide(0.62, 0.62, 0.45), Decision::Buy);
        assert_eq!(decide(0.619, 0.62, 0.45), Decision::Hold);
        assert_eq!(decide(0.45, 0.62, 0.45), Decision::Hold);
        assert_eq!(decide(0.449, 0.62, 0.45), Decision::Avoid);
    }

    #[test]
    fn test_override_merges_and_validates() {
        let t = effective_thresholds(
            Thresholds::default(),
            Some(ThresholdOverride {
                buy_prob: Some(0.7),
                hold_prob: None,
            }),
        )
        .unwrap();
        assert_eq!(t.buy_prob, 0.7);
        assert_eq!(t.hold_prob, 0.45);

        let bad = effective_thresholds(
            Thresholds::default(),
            Some(ThresholdOverride {
                buy_prob: Some(0.3),
                hold_prob: None,
            }),
        );
        assert!(matches!(bad, Err(PipelineError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rationale_full() {
        let m = MetricsRecord {
            peer_gap_pct: Some(20.0),
            ..Default::default()
        };
        let flags = Flags {
            roe_ok: true,
            leverage_ok: false,
            growth_ok: true,
        };
        let text = build_rationale(&inputs(&m, 0.42, flags)).unwrap();
        assert_eq!(
            text,
            "**HOLD** for ACME.NS because:\n\
             - News sentiment positive (+0.42)\n\
             - Valuation cheaper than peers (>10% discount)\n\
             - ROE ≥ 15%\n\
             - Revenue CAGR ≥ 20% (growth)\n\
             - Model gain probability 0.55, expected gain ≈ 12.0%"
        );
    }

    #[test]
    fn test_rationale_mixed_without_gap() {
        let m = MetricsRecord::default();
        let text = build_rationale(&inputs(&m, 0.0, Flags::default())).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "- News sentiment mixed (+0.00)");
        assert!(lines[2].starts_with("- Model gain probability"));
    }

    #[test]
    fn test_rationale_rich_and_negative() {
        let m = MetricsRecord {
            peer_gap_pct: Some(-8.0),
            ..Default::default()
        };
        let text = build_rationale(&inputs(&m, -0.3, Flags::default())).unwrap();
        assert!(text.contains("News sentiment negative (-0.30)"));
        assert!(text.contains("Valuation richer than peers"));
    }

    #[test]
    fn test_small_gap_not_mentioned() {
        let m = MetricsRecord {
            peer_gap_pct: Some(3.0),
            ..Default::default()
        };
        let text = build_rationale(&inputs(&m, 0.0, Flags::default())).unwrap();
        assert!(!text.contains("Valuation"));
    }

    #[test]
    fn test_non_finite_probability_rejected() {
        let m = MetricsRecord::default();
        let mut r = inputs(&m, 0.0, Flags::default());
        r.probability = f64::NAN;
        assert!(matches!(
            build_rationale(&r),
            Err(ReasoningError::NonFinite { field: "probability", .. })
        ));
    }

    #[test]
    fn test_fallback_text() {
        assert_eq!(
            fallback_rationale(Decision::Avoid, "TSLA"),
            "AVOID for TSLA based on model output."
        );
    }

    proptest! {
        #[test]
        fn prop_decision_monotone_in_probability(
            p1 in 0.0f64..=1.0,
            p2 in 0.0f64..=1.0,
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let (hold, buy) = if a <= b { (a, b) } else { (b, a) };
            let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            prop_assert!(decide(lo, buy, hold) <= decide(hi, buy, hold));
        }
    }
}
