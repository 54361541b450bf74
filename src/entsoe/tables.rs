//! Fixed-schema normalized tables built from parsed points.
//!
//! Direction-pivoted datasets come out as row structs with every column
//! always present; a series absent from the source is NaN, never a missing
//! field. Consumers can rely on the schema without branching.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entsoe::parse::{
    ActivationPricePoint, AggregatedVolumePoint, DayAheadPoint, Direction,
};

/// One hour (or market time unit) of day-ahead prices.
#[derive(Debug, Clone, Serialize)]
pub struct DayAheadRow {
    pub timestamp: DateTime<Utc>,
    pub price_eur_mwh: f64,
}

/// Activated balancing-energy prices, pivoted by direction.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationPriceRow {
    pub timestamp: DateTime<Utc>,
    pub afrr_plus_price: f64,
    pub afrr_minus_price: f64,
}

/// Aggregated bid volumes, pivoted by direction.
///
/// Minus-direction magnitudes are negated so the two directions plot as
/// symmetric bands around zero.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedBidsRow {
    pub timestamp: DateTime<Utc>,
    pub afrr_plus_offered: f64,
    pub afrr_plus_activated: f64,
    pub afrr_plus_unavailable: f64,
    pub afrr_minus_offered: f64,
    pub afrr_minus_activated: f64,
    pub afrr_minus_unavailable: f64,
}

/// Overwrite a pivot slot, keeping the last non-NaN value on collision.
fn assign(slot: &mut f64, value: f64) {
    if !value.is_nan() {
        *slot = value;
    }
}

/// Sort day-ahead points into a table, last value winning per timestamp.
pub fn day_ahead_table(points: Vec<DayAheadPoint>) -> Vec<DayAheadRow> {
    let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for point in points {
        by_time.insert(point.timestamp, point.price);
    }
    by_time
        .into_iter()
        .map(|(timestamp, price_eur_mwh)| DayAheadRow {
            timestamp,
            price_eur_mwh,
        })
        .collect()
}

/// Pivot activated prices on direction into plus/minus columns.
///
/// Points with an unknown direction have no column and are dropped here.
pub fn pivot_activation_prices(points: &[ActivationPricePoint]) -> Vec<ActivationPriceRow> {
    let mut by_time: BTreeMap<DateTime<Utc>, (f64, f64)> = BTreeMap::new();
    for point in points {
        let slot = by_time
            .entry(point.timestamp)
            .or_insert((f64::NAN, f64::NAN));
        match point.direction {
            Direction::Up => assign(&mut slot.0, point.price),
            Direction::Down => assign(&mut slot.1, point.price),
            Direction::Unknown => {}
        }
    }
    by_time
        .into_iter()
        .map(|(timestamp, (plus, minus))| ActivationPriceRow {
            timestamp,
            afrr_plus_price: plus,
            afrr_minus_price: minus,
        })
        .collect()
}

/// Pivot aggregated bid volumes on direction, fill offered-volume gaps by
/// nearest neighbor, then negate the minus-direction columns.
///
/// Offered volume is piecewise-stable between update events, so its gaps are
/// filled; activated and unavailable volumes stay true gaps.
pub fn pivot_aggregated_bids(points: &[AggregatedVolumePoint]) -> Vec<AggregatedBidsRow> {
    let mut by_time: BTreeMap<DateTime<Utc>, [f64; 6]> = BTreeMap::new();
    for point in points {
        let slots = by_time.entry(point.timestamp).or_insert([f64::NAN; 6]);
        let offset = match point.direction {
            Direction::Up => 0,
            Direction::Down => 3,
            Direction::Unknown => continue,
        };
        assign(&mut slots[offset], point.offered_mw);
        assign(&mut slots[offset + 1], point.activated_mw);
        assign(&mut slots[offset + 2], point.unavailable_mw);
    }

    let timestamps: Vec<DateTime<Utc>> = by_time.keys().copied().collect();
    let mut columns: [Vec<f64>; 6] = Default::default();
    for slots in by_time.values() {
        for (column, value) in columns.iter_mut().zip(slots) {
            column.push(*value);
        }
    }

    // offered columns only (plus at 0, minus at 3)
    fill_nearest(&mut columns[0]);
    fill_nearest(&mut columns[3]);

    // negate the minus direction after filling
    for column in &mut columns[3..6] {
        for value in column.iter_mut() {
            *value = -*value;
        }
    }

    timestamps
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| AggregatedBidsRow {
            timestamp,
            afrr_plus_offered: columns[0][i],
            afrr_plus_activated: columns[1][i],
            afrr_plus_unavailable: columns[2][i],
            afrr_minus_offered: columns[3][i],
            afrr_minus_activated: columns[4][i],
            afrr_minus_unavailable: columns[5][i],
        })
        .collect()
}

/// Replace NaN entries with the value of the nearest non-NaN entry by row
/// distance, ties going to the earlier row. Leading and trailing gaps take
/// the first and last valid values. A column with no valid entry is left
/// untouched.
pub(crate) fn fill_nearest(column: &mut [f64]) {
    let valid: Vec<usize> = (0..column.len())
        .filter(|&i| !column[i].is_nan())
        .collect();
    if valid.is_empty() {
        return;
    }

    for i in 0..column.len() {
        if !column[i].is_nan() {
            continue;
        }
        let nearest = valid
            .iter()
            .copied()
            .min_by_key(|&v| (v.abs_diff(i), v))
            .expect("valid is non-empty");
        column[i] = column[nearest];
    }
}
