//! Shared handling of model output
//!
//! Models are asked for a single JSON object but routinely wrap it in prose
//! or markdown fences. Extraction takes the outermost brace span and parses
//! that; anything else is malformed output.

use advisor_core::Findings;

/// Instructions appended to every analyst system prompt. Findings fields the
/// role does not produce are simply omitted by the model.
pub(crate) const OUTPUT_CONTRACT: &str = r#"
Respond with a single JSON object and nothing else:
{
  "score": <integer 0-100>,
  "signal": "BULLISH" | "BEARISH" | "NEUTRAL",
  "conviction": <number 0.0-1.0>,
  "summary": "<one or two sentences>"
}
"#;

/// Parse model output into findings, tolerating fences and surrounding prose.
pub(crate) fn parse_findings(raw: &str) -> Result<Findings, serde_json::Error> {
    serde_json::from_str(extract_object(raw))
}

/// The outermost `{ ... }` span, or the input unchanged when no braces are
/// present (letting serde produce the error).
fn extract_object(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::Signal;

    #[test]
    fn parses_bare_object() {
        let findings =
            parse_findings(r#"{"score": 70, "signal": "BULLISH", "conviction": 0.8}"#).unwrap();
        assert_eq!(findings.score, 70);
        assert_eq!(findings.signal, Signal::Bullish);
    }

    #[test]
    fn strips_fences_and_prose() {
        let raw = "Here is my analysis:\n```json\n{\"score\": 40, \"signal\": \"BEARISH\"}\n```\nLet me know.";
        let findings = parse_findings(raw).unwrap();
        assert_eq!(findings.score, 40);
        assert_eq!(findings.signal, Signal::Bearish);
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_findings("the stock looks fine to me").is_err());
    }

    #[test]
    fn optional_levels_survive() {
        let raw = r#"{"score": 65, "signal": "BULLISH", "stop_loss": 94.5, "target": 120.0}"#;
        let findings = parse_findings(raw).unwrap();
        assert_eq!(findings.stop_loss, Some(94.5));
        assert_eq!(findings.target, Some(120.0));
    }
}
