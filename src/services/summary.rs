//! Human-readable summary of a classification.

use crate::config::AnalysisConfig;
use crate::types::{ClassificationResult, RsiSignal};

const RULE: &str = "====================";

/// Render the multi-line report delivered alongside a classification.
pub fn render_summary(result: &ClassificationResult, config: &AnalysisConfig) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("*** Instrument ***".to_string());
    lines.push(format!("Instrument: {}", result.instrument_id));
    lines.push(format!("Analysis date: {}", result.analysis_date));
    lines.push(format!("Open: {:.2}", result.open));
    lines.push(format!("Close: {:.2}", result.close));
    lines.push(format!("High: {:.2}", result.high));
    lines.push(format!("Low: {:.2}", result.low));
    for (window, value) in &result.close_ma {
        lines.push(format!("MA{}: {}", window, fmt_price(*value)));
    }
    lines.push(format!("Volume: {}", group_thousands(result.volume)));

    lines.push(String::new());
    lines.push(RULE.to_string());
    lines.push("*** Conditions ***".to_string());

    let trend = config.windows.trend;
    if result.condition1 {
        lines.push(format!(
            "[+] Close below MA{} for each of the last {} days",
            config.trend_short_ma, trend
        ));
        if result.condition2 {
            lines.push(format!("[+] Also below MA{}", config.trend_long_ma));
        } else {
            lines.push(format!("[-] But not all below MA{}", config.trend_long_ma));
        }
    } else {
        lines.push(format!(
            "[-] Close did not stay below MA{} for the last {} days",
            config.trend_short_ma, trend
        ));
    }

    if result.volume_condition {
        lines.push(format!(
            "[+] Volume above its {}-day average on {} of the last {} days",
            config.volume_ma,
            result.volume_hits.len(),
            config.windows.volume
        ));
        lines.push("Qualifying days:".to_string());
        for hit in &result.volume_hits {
            lines.push(format!(
                "  {}: volume={}, MA{}={}",
                hit.date,
                group_thousands(hit.volume),
                config.volume_ma,
                group_thousands(hit.volume_ma.round() as u64)
            ));
        }
    } else {
        lines.push(format!(
            "[-] Volume condition not met in the last {} days",
            config.windows.volume
        ));
    }

    lines.push(String::new());
    lines.push(RULE.to_string());
    lines.push("*** RSI ***".to_string());
    lines.push(format!(
        "RSI{} (short): {:.3}",
        config.rsi_short_period, result.rsi_short
    ));
    lines.push(format!(
        "RSI{} (medium): {:.3}",
        config.rsi_medium_period, result.rsi_medium
    ));
    lines.push(short_band_line(result.rsi_short_signal, config));
    lines.push(medium_band_line(result.rsi_medium_signal, config));

    lines.push(String::new());
    lines.push(format!(
        "Composite: {} ({})",
        result.composite.label(),
        result.composite.explanation()
    ));

    lines.join("\n")
}

fn short_band_line(signal: RsiSignal, config: &AnalysisConfig) -> String {
    let p = config.rsi_short_period;
    let t = &config.thresholds;
    match signal {
        RsiSignal::SevereOversold => format!(
            "RSI{} < {}: short term severely oversold, a rebound is possible",
            p, t.severe_oversold
        ),
        RsiSignal::SevereOverbought => format!(
            "RSI{} > {}: short term severely overbought, a pullback is possible",
            p, t.severe_overbought
        ),
        RsiSignal::Oversold => format!("RSI{} < {}: short term oversold", p, t.oversold),
        RsiSignal::Overbought => format!("RSI{} > {}: short term overbought", p, t.overbought),
        RsiSignal::Neutral => format!("RSI{} is in the neutral range", p),
    }
}

fn medium_band_line(signal: RsiSignal, config: &AnalysisConfig) -> String {
    let p = config.rsi_medium_period;
    let t = &config.thresholds;
    match signal {
        RsiSignal::Oversold | RsiSignal::SevereOversold => format!(
            "RSI{} < {}: medium term oversold, consider preparing to buy",
            p, t.oversold
        ),
        RsiSignal::Overbought | RsiSignal::SevereOverbought => format!(
            "RSI{} > {}: medium term overbought, consider preparing to sell",
            p, t.overbought
        ),
        RsiSignal::Neutral => format!("RSI{} is in the neutral range", p),
    }
}

fn fmt_price(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

/// 1234567 -> "1,234,567"
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
