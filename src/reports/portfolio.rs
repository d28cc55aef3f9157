use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::db::{self, Category};

/// Summary of a single position
#[derive(Debug, Clone, serde::Serialize)]
pub struct PositionSummary {
    pub isin: String,
    pub product: String,
    pub ticker: Option<String>,
    pub category: Category,
    pub quantity: Decimal,
    /// Net cash deployed into the instrument (purchases minus proceeds)
    pub net_invested: Decimal,
    pub current_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub unrealized_pl: Option<Decimal>,
    pub unrealized_pl_pct: Option<Decimal>,
}

/// Complete portfolio report
#[derive(Debug, serde::Serialize)]
pub struct PortfolioReport {
    pub positions: Vec<PositionSummary>,
    pub total_invested: Decimal,
    pub total_value: Decimal,
    pub total_pl: Decimal,
    pub total_pl_pct: Decimal,
}

#[derive(Debug, Default)]
struct Accumulated {
    product: String,
    quantity: Decimal,
    net_invested: Decimal,
}

/// Calculate current holdings from the chronological transaction stream.
///
/// Quantities are cumulative sums of the signed deltas; positions that have
/// been fully closed are dropped. Instruments without a ticker mapping or a
/// stored price are shown unvalued rather than failing the report.
pub fn calculate_portfolio(conn: &Connection) -> Result<PortfolioReport> {
    let transactions = db::get_all_transactions(conn)?;
    let mappings = db::get_mappings_by_isin(conn)?;

    let mut accumulated: BTreeMap<String, Accumulated> = BTreeMap::new();
    for tx in &transactions {
        let entry = accumulated.entry(tx.isin.clone()).or_default();
        if entry.product.is_empty() {
            entry.product = tx.product.clone();
        }
        entry.quantity += tx.quantity;
        entry.net_invested += -tx.local_value;
    }

    let mut positions = Vec::new();
    let mut total_invested = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;

    for (isin, acc) in accumulated {
        if acc.quantity.is_zero() {
            continue;
        }

        let mapping = mappings.get(&isin);
        let ticker = mapping.map(|m| m.ticker.clone());
        let category = mapping.map(|m| m.category).unwrap_or(Category::Other);

        let current_price = match &ticker {
            Some(t) => db::get_latest_price(conn, t)?.map(|p| p.close_price),
            None => None,
        };

        let (current_value, unrealized_pl, unrealized_pl_pct) = match current_price {
            Some(price) => {
                let value = price * acc.quantity;
                let pl = value - acc.net_invested;
                let pl_pct = if acc.net_invested > Decimal::ZERO {
                    (pl / acc.net_invested) * Decimal::from(100)
                } else {
                    Decimal::ZERO
                };
                (Some(value), Some(pl), Some(pl_pct))
            }
            None => (None, None, None),
        };

        total_invested += acc.net_invested;
        if let Some(value) = current_value {
            total_value += value;
        }

        positions.push(PositionSummary {
            isin,
            product: acc.product,
            ticker,
            category,
            quantity: acc.quantity,
            net_invested: acc.net_invested,
            current_price,
            current_value,
            unrealized_pl,
            unrealized_pl_pct,
        });
    }

    // Largest positions first
    positions.sort_by(|a, b| {
        let a_val = a.current_value.unwrap_or(a.net_invested);
        let b_val = b.current_value.unwrap_or(b.net_invested);
        b_val.cmp(&a_val)
    });

    let total_pl = total_value - total_invested;
    let total_pl_pct = if total_invested > Decimal::ZERO {
        (total_pl / total_invested) * Decimal::from(100)
    } else {
        Decimal::ZERO
    };

    Ok(PortfolioReport {
        positions,
        total_invested,
        total_value,
        total_pl,
        total_pl_pct,
    })
}

/// Current value per category, used by the rebalancing report. Unvalued
/// positions fall back to their net invested amount.
pub fn value_by_category(report: &PortfolioReport) -> BTreeMap<Category, Decimal> {
    let mut by_category: BTreeMap<Category, Decimal> = BTreeMap::new();
    for position in &report.positions {
        let value = position.current_value.unwrap_or(position.net_invested);
        *by_category.entry(position.category).or_insert(Decimal::ZERO) += value;
    }
    by_category
}
