use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::portfolio::{value_by_category, PortfolioReport};
use crate::error::TrackerError;

/// One category line of the rebalancing plan
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RebalanceEntry {
    pub category: String,
    pub current_value: Decimal,
    pub current_pct: Decimal,
    pub target_pct: Decimal,
    /// Home-currency amount to buy (positive) or sell (negative) to reach
    /// the target share
    pub delta: Decimal,
}

/// Tolerance on the target sum: percentages must add up to 100 +/- 0.01
const TARGET_SUM_TOLERANCE: &str = "0.01";

/// Compute per-category buy/sell amounts against the configured targets.
///
/// Categories held but absent from the targets get an implicit 0% target
/// (full sell-down suggestion); target categories not currently held show
/// up with a zero current value.
pub fn calculate_rebalance(
    report: &PortfolioReport,
    targets: &BTreeMap<String, Decimal>,
) -> Result<Vec<RebalanceEntry>> {
    if targets.is_empty() {
        return Err(TrackerError::ValidationError(
            "no rebalancing targets configured".to_string(),
        )
        .into());
    }

    let target_sum: Decimal = targets.values().copied().sum();
    let tolerance: Decimal = TARGET_SUM_TOLERANCE.parse().unwrap();
    if (target_sum - Decimal::from(100)).abs() > tolerance {
        return Err(TrackerError::ValidationError(format!(
            "rebalancing targets must sum to 100, got {}",
            target_sum
        ))
        .into());
    }

    let current = value_by_category(report);
    let total: Decimal = current.values().copied().sum();

    // Union of held categories and target categories
    let mut categories: BTreeMap<String, Decimal> = BTreeMap::new();
    for (category, value) in &current {
        categories.insert(category.as_str().to_string(), *value);
    }
    for category in targets.keys() {
        categories.entry(category.to_uppercase()).or_insert(Decimal::ZERO);
    }

    let hundred = Decimal::from(100);
    let entries = categories
        .into_iter()
        .map(|(category, current_value)| {
            let target_pct = targets
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&category))
                .map(|(_, pct)| *pct)
                .unwrap_or(Decimal::ZERO);
            let current_pct = if total > Decimal::ZERO {
                (current_value / total) * hundred
            } else {
                Decimal::ZERO
            };
            let target_value = total * target_pct / hundred;

            RebalanceEntry {
                category,
                current_value,
                current_pct,
                target_pct,
                delta: target_value - current_value,
            }
        })
        .collect();

    Ok(entries)
}
