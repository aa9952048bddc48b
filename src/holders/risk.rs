//! Additive risk scoring for token holders
//!
//! Four independent factors each contribute the points of the first bracket
//! that matches:
//!
//! | Factor        | Bracket                                   | Points |
//! |---------------|-------------------------------------------|--------|
//! | Diversity     | 0 tokens / 1-2 / 3-5                      | 25 / 20 / 10 |
//! | Concentration | >=10% / >=5% / >=2% of analysed balance   | 30 / 20 / 10 |
//! | Coordination  | size>=3 and common>=7 / common>=5 or size>=2 / common>=3 | 30 / 20 / 10 |
//! | Mismatch      | balance>1M with <=1 token / balance<100 with >=10 tokens | 15 / 10 |
//!
//! The sum is not clamped. Scoring is pure: same inputs, same result.

use serde::Serialize;
use std::fmt;

use super::clustering::GroupingResult;
use super::types::{total_balance, Holder};

/// Risk tier derived from the total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            70.. => RiskLevel::Critical,
            50..=69 => RiskLevel::High,
            30..=49 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "High risk of manipulation/coordination",
            RiskLevel::High => "Significant risk indicators present",
            RiskLevel::Medium => "Moderate risk factors detected",
            RiskLevel::Low => "Normal holder behavior",
        }
    }

    /// All levels, most severe first
    pub fn all() -> [RiskLevel; 4] {
        [RiskLevel::Critical, RiskLevel::High, RiskLevel::Medium, RiskLevel::Low]
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

/// One contributing factor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub points: u32,
    pub reason: String,
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}pts)", self.reason, self.points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    pub score: u32,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    /// Share of the analysed holders' combined balance
    pub holder_percentage: f64,
}

/// Membership summary for the coordination factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMembership {
    pub wallet_count: usize,
    pub common_tokens: usize,
}

/// Everything the brackets look at
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInputs {
    pub token_count: usize,
    pub holder_percentage: f64,
    pub balance: f64,
    pub group: Option<GroupMembership>,
}

struct Bracket {
    points: u32,
    applies: fn(&RiskInputs) -> bool,
    reason: fn(&RiskInputs) -> String,
}

const DIVERSITY: &[Bracket] = &[
    Bracket {
        points: 25,
        applies: |i| i.token_count == 0,
        reason: |_| "No trading history".to_string(),
    },
    Bracket {
        points: 20,
        applies: |i| i.token_count <= 2,
        reason: |i| format!("Low token diversity: {} tokens", i.token_count),
    },
    Bracket {
        points: 10,
        applies: |i| i.token_count <= 5,
        reason: |i| format!("Limited token diversity: {} tokens", i.token_count),
    },
];

const CONCENTRATION: &[Bracket] = &[
    Bracket {
        points: 30,
        applies: |i| i.holder_percentage >= 10.0,
        reason: |i| format!("Large holder: {:.2}% of supply", i.holder_percentage),
    },
    Bracket {
        points: 20,
        applies: |i| i.holder_percentage >= 5.0,
        reason: |i| format!("Significant holder: {:.2}%", i.holder_percentage),
    },
    Bracket {
        points: 10,
        applies: |i| i.holder_percentage >= 2.0,
        reason: |i| format!("Notable holder: {:.2}%", i.holder_percentage),
    },
];

const COORDINATION: &[Bracket] = &[
    Bracket {
        points: 30,
        applies: |i| matches!(i.group, Some(g) if g.wallet_count >= 3 && g.common_tokens >= 7),
        reason: |i| coordination_reason("High", i),
    },
    Bracket {
        points: 20,
        applies: |i| matches!(i.group, Some(g) if g.common_tokens >= 5 || g.wallet_count >= 2),
        reason: |i| coordination_reason("Moderate", i),
    },
    Bracket {
        points: 10,
        applies: |i| matches!(i.group, Some(g) if g.common_tokens >= 3),
        reason: |i| coordination_reason("Possible", i),
    },
];

const MISMATCH: &[Bracket] = &[
    Bracket {
        points: 15,
        applies: |i| i.balance > 1_000_000.0 && i.token_count <= 1,
        reason: |_| "Large holder with minimal trading activity".to_string(),
    },
    Bracket {
        points: 10,
        applies: |i| i.balance < 100.0 && i.token_count >= 10,
        reason: |_| "Small holder with unusually high activity".to_string(),
    },
];

fn coordination_reason(strength: &str, inputs: &RiskInputs) -> String {
    let (wallets, common) = inputs
        .group
        .map(|g| (g.wallet_count, g.common_tokens))
        .unwrap_or_default();
    format!(
        "{} coordination: Group of {} wallets, {} common tokens",
        strength, wallets, common
    )
}

/// First bracket in `table` that applies
fn first_match(table: &[Bracket], inputs: &RiskInputs) -> Option<RiskFactor> {
    table.iter().find(|b| (b.applies)(inputs)).map(|b| RiskFactor {
        points: b.points,
        reason: (b.reason)(inputs),
    })
}

/// Score from raw inputs
pub fn evaluate(inputs: &RiskInputs) -> RiskScore {
    let factors: Vec<RiskFactor> = [DIVERSITY, CONCENTRATION, COORDINATION, MISMATCH]
        .iter()
        .filter_map(|table| first_match(table, inputs))
        .collect();

    let score = factors.iter().map(|f| f.points).sum();

    RiskScore {
        score,
        level: RiskLevel::from_score(score),
        factors,
        holder_percentage: inputs.holder_percentage,
    }
}

/// Score one holder against the full analysed set and optional grouping
pub fn score_risk(holder: &Holder, holders: &[Holder], grouping: Option<&GroupingResult>) -> RiskScore {
    let total = total_balance(holders);
    let holder_percentage = if total > 0.0 {
        holder.balance / total * 100.0
    } else {
        0.0
    };

    let group = grouping
        .and_then(|g| g.group_for(&holder.owner))
        .map(|g| GroupMembership {
            wallet_count: g.wallet_count(),
            common_tokens: g.common_token_count(),
        });

    evaluate(&RiskInputs {
        token_count: holder.token_count,
        holder_percentage,
        balance: holder.balance,
        group,
    })
}
