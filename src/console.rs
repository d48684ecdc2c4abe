use crate::processor::{PcrReport, Ratio, StrikePcrRow};
use crate::rules::Signal;
use colored::{ColoredString, Colorize};

/// Print a report to stdout
pub fn print_report(report: &PcrReport, strike_rows: Option<usize>) {
    println!("{}", render_report(report, strike_rows));
}

/// Render a report as coloured terminal text.
///
/// `strike_rows` limits the strike table to the rows nearest the underlying.
pub fn render_report(report: &PcrReport, strike_rows: Option<usize>) -> String {
    let analysis = &report.analysis;
    let mut out = Vec::new();

    out.push(format!("{}", "=".repeat(60).blue()));
    out.push(format!(
        "{} {} ({})",
        "PCR Analysis".green().bold(),
        report.symbol.yellow(),
        report.expiry
    ));
    out.push(format!("{}", "=".repeat(60).blue()));
    out.push(format!("{} Timestamp: {}", "✓".green(), report.timestamp));
    out.push(format!("{} Underlying: {:.2}", "✓".green(), report.underlying_value));
    out.push(String::new());

    out.push(format!("{} Put OI: {}", "ℹ".blue(), analysis.totals.put_oi));
    out.push(format!("{} Call OI: {}", "ℹ".blue(), analysis.totals.call_oi));
    out.push(format!("{} Put OI Change: {}", "ℹ".blue(), analysis.totals.put_oi_change));
    out.push(format!("{} Call OI Change: {}", "ℹ".blue(), analysis.totals.call_oi_change));
    out.push(format!("{} PCR: {}", "→".cyan(), format_ratio(&analysis.aggregate.put_call_ratio_oi)));
    out.push(format!(
        "{} PCR (OI Change): {}",
        "→".cyan(),
        format_ratio(&analysis.aggregate.put_call_ratio_oi_change)
    ));
    out.push(String::new());

    let strikes = nearest_strikes(&analysis.strikes, report.underlying_value, strike_rows);
    if strikes.is_empty() {
        out.push(format!("{} No strikes quoted on both sides", "ℹ".blue()));
    } else {
        out.push(format!("{}", "Strike-wise PCR".cyan().bold()));
        out.push(format!(
            "  {:>10} {:>12} {:>12} {:>10} {:>10} {:>8} {:>10}",
            "Strike", "Call OI", "Put OI", "Call Chg", "Put Chg", "PCR", "PCR Chg"
        ));
        for row in strikes {
            out.push(format!(
                "  {:>10.2} {:>12} {:>12} {:>10} {:>10} {:>8} {:>10}",
                row.strike_price,
                row.call_oi,
                row.put_oi,
                row.call_oi_change,
                row.put_oi_change,
                format_ratio(&row.pcr),
                format_ratio(&row.pcr_oi_change),
            ));
        }
    }
    out.push(String::new());

    out.push(format!("Trading Signal: {}", paint_signal(analysis.signal)));
    out.push(format!("{}", "=".repeat(60).blue()));

    out.join("\n")
}

/// Ratio to 2 decimals, or a marker when the denominator was zero
pub fn format_ratio(ratio: &Ratio) -> String {
    if ratio.zero_denominator {
        "0.00 (no call data)".to_string()
    } else {
        format!("{:.2}", ratio.value)
    }
}

fn paint_signal(signal: Signal) -> ColoredString {
    match signal {
        Signal::StrongBullish => signal.label().green().bold(),
        Signal::StrongBearish => signal.label().red().bold(),
        Signal::Neutral => signal.label().yellow(),
    }
}

/// Keep the `limit` strikes closest to the underlying, still ascending
fn nearest_strikes(rows: &[StrikePcrRow], underlying: f64, limit: Option<usize>) -> &[StrikePcrRow] {
    let Some(limit) = limit else {
        return rows;
    };
    if rows.len() <= limit {
        return rows;
    }

    // Rows are sorted, so the window is contiguous around the closest strike
    let closest = rows
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.strike_price - underlying).abs().total_cmp(&(b.strike_price - underlying).abs())
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    let start = closest.saturating_sub(limit / 2).min(rows.len() - limit);
    &rows[start..start + limit]
}
