//! Text report for a holder risk analysis

use std::collections::HashMap;
use std::fmt::Write;

use super::clustering::GroupingResult;
use super::risk::{score_risk, RiskLevel, RiskScore};
use super::types::{total_balance, Holder};
use crate::analyzer::truncate_address;

/// Render the full report: risk summary, holders by descending score, then
/// the similarity section when groups were found
pub fn format_report(holders: &[Holder], token: &str, grouping: Option<&GroupingResult>) -> String {
    let heavy = "=".repeat(80);
    let light = "─".repeat(80);
    let mut out = String::new();

    let mut scored: Vec<(&Holder, RiskScore)> = holders
        .iter()
        .map(|h| (h, score_risk(h, holders, grouping)))
        .collect();

    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(out, "TOP {} TOKEN HOLDERS - RISK ANALYSIS", holders.len());
    let _ = writeln!(out, "Token: {}", token);
    let _ = writeln!(out, "{}\n", heavy);

    let mut summary: HashMap<RiskLevel, usize> = HashMap::new();
    for (_, risk) in &scored {
        *summary.entry(risk.level).or_default() += 1;
    }

    let _ = writeln!(out, "RISK SUMMARY:");
    for (level, label) in RiskLevel::all().iter().zip(["Critical", "High", "Medium", "Low"]) {
        let _ = writeln!(
            out,
            "   {} Risk: {} holders",
            label,
            summary.get(level).copied().unwrap_or(0)
        );
    }
    let _ = writeln!(out, "\n{}\n", heavy);

    // Stable: equal scores keep balance order
    scored.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    let total = total_balance(holders);

    for (idx, (holder, risk)) in scored.iter().enumerate() {
        let pct = if total > 0.0 {
            holder.balance / total * 100.0
        } else {
            0.0
        };

        let _ = writeln!(
            out,
            "#{:2} {} (Score: {}/100) ─────────────────────",
            idx + 1,
            risk.level,
            risk.score
        );
        let _ = writeln!(out, "    {}", risk.level.description());
        let _ = writeln!(out, "    Wallet:          {}", holder.owner);
        let _ = writeln!(
            out,
            "    Balance:         {} tokens ({:.2}% of top {})",
            group_thousands(holder.balance, 6),
            pct,
            holders.len()
        );
        let _ = writeln!(out, "    First Purchase:  {}", holder.purchase_time_display());
        let _ = writeln!(
            out,
            "    Trading History: {} different tokens traded",
            holder.token_count
        );

        if !risk.factors.is_empty() {
            let _ = writeln!(out, "    Risk Factors:");
            for factor in &risk.factors {
                let _ = writeln!(out, "       • {}", factor);
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(
        out,
        "Total Balance (Top {}): {} tokens",
        holders.len(),
        group_thousands(total, 6)
    );
    let _ = write!(out, "{}", heavy);

    let Some(grouping) = grouping.filter(|g| !g.groups.is_empty()) else {
        return out;
    };

    let _ = writeln!(out, "\n\n{}", heavy);
    let _ = writeln!(out, "TRADING PATTERN SIMILARITY ANALYSIS");
    let _ = writeln!(out, "{}\n", heavy);
    let _ = writeln!(
        out,
        "Found {} group(s) of wallets with similar trading patterns\n",
        grouping.total_groups()
    );

    for (idx, group) in grouping.groups.iter().enumerate() {
        let _ = writeln!(out, "GROUP #{} - {} Wallets", idx + 1, group.wallet_count());
        let _ = writeln!(out, "{}", light);
        let _ = writeln!(out, "Common Tokens Traded: {} tokens\n", group.common_token_count());
        let _ = writeln!(out, "Wallets in this group:");
        for wallet in &group.wallets {
            if let Some(holder) = holders.iter().find(|h| &h.owner == wallet) {
                let _ = writeln!(out, "  • {}", wallet);
                let _ = writeln!(out, "    Balance: {} tokens", group_thousands(holder.balance, 2));
            }
        }
        let _ = writeln!(out);

        if !group.common_tokens.is_empty() {
            let _ = writeln!(out, "Sample Common Tokens (showing up to 10):");
            for token in group.common_tokens.iter().take(10) {
                let _ = writeln!(out, "  • {}", truncate_address(token, 20, 10));
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Note: These wallets may be controlled by the same entity");
        let _ = writeln!(out, "      or coordinated buyers (pump groups).\n");
    }

    let _ = write!(out, "{}", heavy);
    out
}

/// Fixed-precision number with comma thousands separators
fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
