use anyhow::Result;
use chrono::Datelike;
use itertools::Itertools;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db;

/// One month of cash movements, from the signed local values
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MonthlyCashFlow {
    pub year: i32,
    pub month: u32,
    /// Cash spent on purchases (positive number)
    pub invested: Decimal,
    /// Cash received from sales and distributions (positive number)
    pub returned: Decimal,
    /// invested - returned
    pub net: Decimal,
}

/// Group the transaction stream into a month-by-month budget view,
/// chronologically ordered. Months without activity are absent.
pub fn monthly_cash_flows(conn: &Connection) -> Result<Vec<MonthlyCashFlow>> {
    let transactions = db::get_all_transactions(conn)?;

    let flows = transactions
        .iter()
        .chunk_by(|tx| (tx.trade_date.year(), tx.trade_date.month()))
        .into_iter()
        .map(|((year, month), group)| {
            let mut invested = Decimal::ZERO;
            let mut returned = Decimal::ZERO;
            for tx in group {
                if tx.local_value < Decimal::ZERO {
                    invested += -tx.local_value;
                } else {
                    returned += tx.local_value;
                }
            }
            MonthlyCashFlow {
                year,
                month,
                invested,
                returned,
                net: invested - returned,
            }
        })
        .collect();

    Ok(flows)
}
