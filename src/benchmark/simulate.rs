//! Cash-flow replication and valuation.
//!
//! [`replicate`] walks the daily timeline and turns each day's net real
//! cash movement into an equivalent trade in the reference instrument,
//! accumulating the shadow position and the real per-instrument holdings.
//! [`evaluate`] then values both sides for every day on the timeline.
//!
//! Neither function returns an error: inside the simulation every failure
//! degrades to a skipped day or a zero contribution so a run always
//! completes (missing data is normal here, not exceptional).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::series::DailySeries;
use crate::db::Transaction;

/// One synthetic trade in the reference instrument.
///
/// `cash_amount` is the day's net real cash movement, positive when cash
/// was spent (net purchase), negative when cash came back (net sale).
#[derive(Debug, Clone, Serialize)]
pub struct ShadowTrade {
    pub day: NaiveDate,
    pub cash_amount: Decimal,
    pub quantity: Decimal,
    pub price: Decimal,
    pub currency: String,
}

impl ShadowTrade {
    /// Row kind in the audit-log table
    pub const KIND: &'static str = "BENCHMARK";
}

/// Output of the replication stage
#[derive(Debug, Clone)]
pub struct Replication {
    /// Chronological log of synthetic reference trades
    pub ledger: Vec<ShadowTrade>,
    /// Accumulated reference quantity, observable as of any day
    pub reference_units: DailySeries,
    /// Accumulated reference quantity at the end of the timeline
    pub final_units: Decimal,
    /// Per-day quantity deltas for mapped real instruments, keyed by ticker
    pub holdings_deltas: BTreeMap<NaiveDate, Vec<(String, Decimal)>>,
}

/// One day of the comparison output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationPoint {
    pub day: NaiveDate,
    pub real_value: Decimal,
    pub reference_value: Decimal,
}

/// Replay the real cash-flow history into the reference instrument.
///
/// For each timeline day with transactions, the signed local values are
/// aggregated into one net movement (`daily_cash = -sum(local_value)`,
/// positive = net spend) and converted into reference units at that day's
/// forward-filled price. When `fx` is given the cash is converted into the
/// instrument's trading currency first (`converted = cash * rate`). Days
/// whose price (or rate) cannot be resolved are skipped, not failed.
///
/// Independently, every transaction whose ISIN resolves through `mappings`
/// contributes its quantity delta to the real holdings stream.
pub fn replicate(
    timeline: &[NaiveDate],
    transactions: &[Transaction],
    mappings: &HashMap<String, String>,
    reference: &DailySeries,
    fx: Option<&DailySeries>,
    reference_currency: &str,
) -> Replication {
    // Bucket transactions by calendar day; same-day order is irrelevant
    // since only sums are consumed.
    let mut by_day: BTreeMap<NaiveDate, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        by_day.entry(tx.trade_date).or_default().push(tx);
    }

    let mut ledger = Vec::new();
    let mut unit_points = Vec::new();
    let mut holdings_deltas: BTreeMap<NaiveDate, Vec<(String, Decimal)>> = BTreeMap::new();
    let mut units = Decimal::ZERO;

    for &day in timeline {
        let Some(day_txs) = by_day.get(&day) else {
            continue;
        };

        // Stored values are negative for outflows, so net spend is the
        // negated sum.
        let daily_cash: Decimal = -day_txs.iter().map(|tx| tx.local_value).sum::<Decimal>();

        if daily_cash != Decimal::ZERO {
            match resolve_trade(day, daily_cash, reference, fx) {
                Some((quantity, price)) => {
                    units += quantity;
                    unit_points.push((day, units));
                    ledger.push(ShadowTrade {
                        day,
                        cash_amount: daily_cash,
                        quantity,
                        price,
                        currency: reference_currency.to_string(),
                    });
                }
                None => {
                    debug!("No reference price as of {}; day skipped", day);
                }
            }
        }

        for tx in day_txs {
            if let Some(ticker) = mappings.get(&tx.isin) {
                holdings_deltas
                    .entry(day)
                    .or_default()
                    .push((ticker.clone(), tx.quantity));
            }
        }
    }

    Replication {
        ledger,
        reference_units: DailySeries::from_observations(unit_points),
        final_units: units,
        holdings_deltas,
    }
}

/// Price one day's cash movement in reference units. None means the day
/// cannot be priced (before the series starts, or a non-positive price)
/// and must be skipped.
fn resolve_trade(
    day: NaiveDate,
    daily_cash: Decimal,
    reference: &DailySeries,
    fx: Option<&DailySeries>,
) -> Option<(Decimal, Decimal)> {
    let price = reference.value_as_of(day)?;
    if price <= Decimal::ZERO {
        return None;
    }

    let converted = match fx {
        Some(rates) => daily_cash * rates.value_as_of(day)?,
        None => daily_cash,
    };

    Some((converted / price, price))
}

/// Value real holdings and the shadow position for every timeline day.
///
/// Real value: sum over instruments of held quantity times the instrument's
/// most recent known price as of that day. Instruments with no observation
/// on or before a day contribute zero, which under-counts early history by
/// design. Reference value: accumulated units times the reference price,
/// divided by the day's FX rate when one is active (back to home currency).
///
/// Leading days where both sides are exactly zero are trimmed from the
/// output; a run with no deployed capital yields an empty result.
pub fn evaluate(
    timeline: &[NaiveDate],
    replication: &Replication,
    holdings_prices: &HashMap<String, DailySeries>,
    reference: &DailySeries,
    fx: Option<&DailySeries>,
) -> Vec<ValuationPoint> {
    let mut holdings: HashMap<String, Decimal> = HashMap::new();
    let mut points = Vec::with_capacity(timeline.len());

    for &day in timeline {
        if let Some(deltas) = replication.holdings_deltas.get(&day) {
            for (ticker, delta) in deltas {
                *holdings.entry(ticker.clone()).or_insert(Decimal::ZERO) += *delta;
            }
        }

        let mut real_value = Decimal::ZERO;
        for (ticker, quantity) in &holdings {
            if quantity.is_zero() {
                continue;
            }
            let Some(price) = holdings_prices
                .get(ticker)
                .and_then(|series| series.value_as_of(day))
            else {
                continue;
            };
            real_value += *quantity * price;
        }

        let reference_value = reference_value_at(day, replication, reference, fx);

        points.push(ValuationPoint {
            day,
            real_value,
            reference_value,
        });
    }

    let first_active = points
        .iter()
        .position(|p| !p.real_value.is_zero() || !p.reference_value.is_zero());

    match first_active {
        Some(idx) => points.split_off(idx),
        None => Vec::new(),
    }
}

fn reference_value_at(
    day: NaiveDate,
    replication: &Replication,
    reference: &DailySeries,
    fx: Option<&DailySeries>,
) -> Decimal {
    let Some(units) = replication.reference_units.value_as_of(day) else {
        return Decimal::ZERO;
    };
    let Some(price) = reference.value_as_of(day) else {
        return Decimal::ZERO;
    };

    let value = units * price;
    match fx.and_then(|rates| rates.value_as_of(day)) {
        Some(rate) if rate > Decimal::ZERO => value / rate,
        _ => value,
    }
}
