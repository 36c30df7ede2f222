use analysis_core::ClassificationRequest;

/// Most flow entries listed in a prompt.
pub const MAX_FLOW_LINES: usize = 8;
/// Most headlines listed in a prompt.
pub const MAX_HEADLINES: usize = 5;

pub const SYSTEM_PROMPT: &str = r#"You are a professional options trading AI.

You receive:
- Unusual options flow
- RSI momentum
- Current price
- News headlines

Return STRICT JSON:

{
 "bias":"CALLS|PUTS|NEUTRAL",
 "confidence":0-100,
 "summary":"short",
 "reasons":["",""],
 "suggested_trades":[
   {
     "type":"CALL or PUT",
     "strike":"number",
     "expiration":"weekly",
     "logic":"why"
   }
 ]
}

JSON ONLY."#;

/// User message describing one ticker.
pub fn build_user_prompt(request: &ClassificationRequest) -> String {
    let flow_text: String = request
        .flow
        .iter()
        .take(MAX_FLOW_LINES)
        .map(|f| format!("Strike {} premium {}\n", f.contract.strike, f.premium.round()))
        .collect();

    let news = request
        .headlines
        .iter()
        .take(MAX_HEADLINES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Ticker: {}\nCurrent Price: {}\nRSI: {}\n\nUnusual Flow:\n{}\nNews:\n{}\n",
        request.ticker, request.price, request.rsi, flow_text, news
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{OptionContract, OptionSide, UnusualFlowEntry};

    fn entry(strike: f64, premium: f64) -> UnusualFlowEntry {
        UnusualFlowEntry {
            contract: OptionContract {
                strike,
                last_price: 1.0,
                volume: 1,
                open_interest: 0,
                implied_volatility: 0.0,
                side: OptionSide::Call,
            },
            premium,
        }
    }

    #[test]
    fn test_prompt_lists_flow_and_news() {
        let request = ClassificationRequest {
            ticker: "TSLA".to_string(),
            price: 180.5,
            rsi: 28.4,
            flow: vec![entry(175.0, 250_000.4), entry(190.0, 310_000.6)],
            headlines: vec!["Deliveries beat".to_string(), "Recall announced".to_string()],
        };

        let prompt = build_user_prompt(&request);
        assert!(prompt.contains("Ticker: TSLA"));
        assert!(prompt.contains("Current Price: 180.5"));
        assert!(prompt.contains("RSI: 28.4"));
        assert!(prompt.contains("Strike 175 premium 250000\n"));
        assert!(prompt.contains("Strike 190 premium 310001\n"));
        assert!(prompt.contains("Deliveries beat\nRecall announced"));
    }

    #[test]
    fn test_prompt_caps_flow_and_headlines() {
        let request = ClassificationRequest {
            ticker: "SPY".to_string(),
            price: 500.0,
            rsi: 70.0,
            flow: (0..12).map(|i| entry(500.0 + i as f64, 300_000.0)).collect(),
            headlines: (0..9).map(|i| format!("headline {}", i)).collect(),
        };

        let prompt = build_user_prompt(&request);
        assert_eq!(prompt.matches("Strike ").count(), MAX_FLOW_LINES);
        assert!(prompt.contains("headline 4"));
        assert!(!prompt.contains("headline 5"));
    }
}
