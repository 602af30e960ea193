//! Market metadata parsing
//!
//! Market questions follow a fixed house style ("Bitcoin Up or Down -
//! August 5, 3:00PM-3:15PM ET"). We recover the underlying asset and
//! the market window from that text rather than trusting any
//! downstream field to carry it.

use std::collections::HashMap;

use serde::Serialize;

use persistence::repository::MarketRow;

const UP_OR_DOWN_MARKER: &str = " Up or Down";

/// Window length for markets whose question carries an explicit
/// clock range (e.g. "3:00PM-3:15PM").
const QUARTER_HOUR_SECS: i64 = 900;
const HOUR_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize)]
pub struct MarketInfo {
    pub condition_id: String,
    pub asset: Option<String>,
    pub duration_secs: i64,
    pub open_ts: Option<i64>,
    pub end_ts: Option<i64>,
}

/// Asset name is everything before the "Up or Down" marker.
pub fn parse_asset(question: &str) -> Option<String> {
    let pos = question.find(UP_OR_DOWN_MARKER)?;
    let asset = question[..pos].trim();
    if asset.is_empty() {
        None
    } else {
        Some(asset.to_string())
    }
}

/// Detect a "H:MM(AM|PM)-H:MM(AM|PM)" clock range anywhere in the
/// question. Such markets are 15-minute windows; everything else in
/// this family is hourly.
pub fn has_clock_range(question: &str) -> bool {
    let chars: Vec<char> = question.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if let Some(next) = scan_clock(&chars, i) {
            // Separator between the two clock times may be an ASCII
            // hyphen or a unicode dash.
            let mut j = next;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() && matches!(chars[j], '-' | '\u{2013}' | '\u{2014}') {
                j += 1;
                while j < chars.len() && chars[j] == ' ' {
                    j += 1;
                }
                if scan_clock(&chars, j).is_some() {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}

/// If `chars[start..]` begins with "H:MM(AM|PM)" (or "HH:MM"), return
/// the index just past the meridiem.
fn scan_clock(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    let mut digits = 0;
    while i < chars.len() && chars[i].is_ascii_digit() && digits < 2 {
        i += 1;
        digits += 1;
    }
    if digits == 0 || i >= chars.len() || chars[i] != ':' {
        return None;
    }
    i += 1;
    let minute_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i - minute_start != 2 {
        return None;
    }
    let rest: String = chars[i..].iter().take(2).collect();
    let upper = rest.to_ascii_uppercase();
    if upper == "AM" || upper == "PM" {
        Some(i + 2)
    } else {
        None
    }
}

pub fn market_duration_secs(question: &str) -> i64 {
    if has_clock_range(question) {
        QUARTER_HOUR_SECS
    } else {
        HOUR_SECS
    }
}

/// Build the market info map used by the execution and temporal
/// stages. Open time is inferred by walking back the window length
/// from the market's end time.
pub fn build_market_info(markets: &[MarketRow]) -> HashMap<String, MarketInfo> {
    let mut out = HashMap::with_capacity(markets.len());
    for m in markets {
        let question = m.question.as_deref().unwrap_or("");
        let duration = market_duration_secs(question);
        let info = MarketInfo {
            condition_id: m.condition_id.clone(),
            asset: parse_asset(question),
            duration_secs: duration,
            open_ts: m.end_ts.map(|end| end - duration),
            end_ts: m.end_ts,
        };
        out.insert(m.condition_id.clone(), info);
    }
    out
}

/// Per-asset market counts, ordered by count descending.
pub fn asset_breakdown(infos: &HashMap<String, MarketInfo>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for info in infos.values() {
        if let Some(asset) = info.asset.as_deref() {
            *counts.entry(asset).or_default() += 1;
        }
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(condition_id: &str, question: &str, end_ts: Option<i64>) -> MarketRow {
        MarketRow {
            condition_id: condition_id.to_string(),
            question: Some(question.to_string()),
            slug: None,
            end_ts,
            volume: None,
            liquidity: None,
            neg_risk: None,
        }
    }

    #[test]
    fn asset_is_text_before_marker() {
        assert_eq!(
            parse_asset("Bitcoin Up or Down - August 5, 3PM ET"),
            Some("Bitcoin".to_string())
        );
        assert_eq!(
            parse_asset("Ethereum Up or Down - August 5, 3:00PM-3:15PM ET"),
            Some("Ethereum".to_string())
        );
        assert_eq!(parse_asset("Will it rain tomorrow?"), None);
    }

    #[test]
    fn clock_range_means_quarter_hour() {
        assert_eq!(
            market_duration_secs("Bitcoin Up or Down - August 5, 3:00PM-3:15PM ET"),
            900
        );
        assert_eq!(
            market_duration_secs("Solana Up or Down - August 5, 11:45AM\u{2013}12:00PM ET"),
            900
        );
        assert_eq!(
            market_duration_secs("Bitcoin Up or Down - August 5, 3PM ET"),
            3600
        );
    }

    #[test]
    fn open_ts_walks_back_from_end() {
        let infos = build_market_info(&[
            row("c1", "Bitcoin Up or Down - August 5, 3:00PM-3:15PM ET", Some(10_000)),
            row("c2", "Bitcoin Up or Down - August 5, 4PM ET", Some(20_000)),
        ]);
        assert_eq!(infos["c1"].open_ts, Some(9_100));
        assert_eq!(infos["c2"].open_ts, Some(16_400));
    }

    #[test]
    fn breakdown_orders_by_count() {
        let infos = build_market_info(&[
            row("a", "Bitcoin Up or Down - 1PM ET", Some(1)),
            row("b", "Bitcoin Up or Down - 2PM ET", Some(2)),
            row("c", "Ethereum Up or Down - 1PM ET", Some(3)),
        ]);
        let breakdown = asset_breakdown(&infos);
        assert_eq!(breakdown[0], ("Bitcoin".to_string(), 2));
        assert_eq!(breakdown[1], ("Ethereum".to_string(), 1));
    }
}
