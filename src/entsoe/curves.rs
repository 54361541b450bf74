//! Merit-order cumulative supply curves.
//!
//! A curve ranks the priced tranches of one hour and one direction in
//! activation order and accumulates their power, so a consumer can read
//! "how much capacity is available up to this price" directly. Two anchor
//! policies exist: raw bid curves start at the min (Up) or max (Down)
//! observed price, procurement curves start at the first priced tranche.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entsoe::parse::{BidPoint, CapacityPoint, Direction};

/// One step of a cumulative curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub cumulative_power_mw: f64,
    pub price: f64,
}

/// A merit-order curve for one hour and one direction.
#[derive(Debug, Clone, Serialize)]
pub struct CumulativeCurve {
    pub direction: Direction,
    pub points: Vec<CurvePoint>,
    pub weighted_average_price: f64,
}

impl CumulativeCurve {
    fn empty(direction: Direction) -> Self {
        Self {
            direction,
            points: Vec::new(),
            weighted_average_price: 0.0,
        }
    }
}

/// One priced tranche after per-(timestamp, price) aggregation.
#[derive(Debug, Clone, Copy)]
struct Tranche {
    timestamp: DateTime<Utc>,
    price: f64,
    power: f64,
}

/// Build the merit-order curve of raw balancing-energy bids.
///
/// Upward regulation sorts by (price ascending, power ascending); downward
/// regulation sorts by (price descending, power ascending), because the
/// cheapest bid to activate for downward regulation is the highest-priced
/// one. The zero anchor sits at the first price of the sorted sequence.
pub fn build_bid_curve(bids: &[BidPoint], direction: Direction) -> CumulativeCurve {
    let tranches = bids
        .iter()
        .filter(|bid| bid.direction == direction)
        .map(|bid| Tranche {
            timestamp: bid.timestamp,
            price: bid.price_eur_mwh,
            power: bid.power_mw,
        })
        .collect();
    let descending = direction == Direction::Down;
    assemble(tranches, direction, descending, AnchorPolicy::FirstSorted)
}

/// Build the merit-order curve of procured reserve capacity.
///
/// Procurement curves are conventionally increasing for both directions,
/// and their zero anchor takes the smallest strictly-positive price when
/// one exists, falling back to the minimum price otherwise.
pub fn build_capacity_curve(tranches: &[CapacityPoint], direction: Direction) -> CumulativeCurve {
    let tranches = tranches
        .iter()
        .filter(|point| point.direction == direction)
        .map(|point| Tranche {
            timestamp: point.timestamp,
            price: point.price_eur_mw,
            power: point.capacity_mw,
        })
        .collect();
    assemble(tranches, direction, false, AnchorPolicy::SmallestPositive)
}

#[derive(Clone, Copy)]
enum AnchorPolicy {
    /// Anchor at the first price of the merit-order sequence.
    FirstSorted,
    /// Anchor at the smallest strictly-positive price, min price fallback.
    SmallestPositive,
}

fn merit_order(a: &Tranche, b: &Tranche, descending_price: bool) -> Ordering {
    let by_price = if descending_price {
        b.price.total_cmp(&a.price)
    } else {
        a.price.total_cmp(&b.price)
    };
    by_price.then(a.power.total_cmp(&b.power))
}

fn assemble(
    mut tranches: Vec<Tranche>,
    direction: Direction,
    descending_price: bool,
    anchor: AnchorPolicy,
) -> CumulativeCurve {
    if tranches.is_empty() {
        return CumulativeCurve::empty(direction);
    }

    // The feed may carry several bids at the same price within the same
    // market time unit; they are one tranche, not separate curve steps.
    tranches.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.price.total_cmp(&b.price))
    });
    let mut aggregated: Vec<Tranche> = Vec::with_capacity(tranches.len());
    for tranche in tranches {
        match aggregated.last_mut() {
            Some(last) if last.timestamp == tranche.timestamp && last.price == tranche.price => {
                last.power += tranche.power;
            }
            _ => aggregated.push(tranche),
        }
    }

    let weighted_average_price = weighted_average(&aggregated);

    aggregated.sort_by(|a, b| merit_order(a, b, descending_price));

    let mut points = Vec::with_capacity(aggregated.len() + 1);
    let mut cumulative = 0.0;
    for tranche in &aggregated {
        cumulative += tranche.power;
        points.push(CurvePoint {
            cumulative_power_mw: cumulative,
            price: tranche.price,
        });
    }

    let anchor_price = match anchor {
        AnchorPolicy::FirstSorted => aggregated[0].price,
        AnchorPolicy::SmallestPositive => aggregated
            .iter()
            .map(|tranche| tranche.price)
            .filter(|price| *price > 0.0)
            .min_by(f64::total_cmp)
            .unwrap_or(aggregated[0].price),
    };
    points.insert(
        0,
        CurvePoint {
            cumulative_power_mw: 0.0,
            price: anchor_price,
        },
    );

    // The anchor can coincide with a zero-power tranche; exact duplicates
    // render as stacked markers and are dropped, first occurrence kept.
    let mut deduped: Vec<CurvePoint> = Vec::with_capacity(points.len());
    for point in points {
        let seen = deduped.iter().any(|existing| {
            existing.cumulative_power_mw == point.cumulative_power_mw
                && existing.price == point.price
        });
        if !seen {
            deduped.push(point);
        }
    }

    // Re-sort so the prepended anchor lands in monotonic display order.
    deduped.sort_by(|a, b| {
        let by_price = if descending_price {
            b.price.total_cmp(&a.price)
        } else {
            a.price.total_cmp(&b.price)
        };
        by_price.then(a.cumulative_power_mw.total_cmp(&b.cumulative_power_mw))
    });

    CumulativeCurve {
        direction,
        points: deduped,
        weighted_average_price,
    }
}

/// Volume-weighted average price over strictly-positive-power tranches.
///
/// 0.0 when no positive power exists; callers distinguish "no meaningful
/// average" by checking total volume, not by looking for NaN.
fn weighted_average(tranches: &[Tranche]) -> f64 {
    let mut volume = 0.0;
    let mut weighted = 0.0;
    for tranche in tranches {
        if tranche.power > 0.0 {
            volume += tranche.power;
            weighted += tranche.power * tranche.price;
        }
    }
    if volume > 0.0 { weighted / volume } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()
    }

    fn bid(price: f64, power: f64, direction: Direction) -> BidPoint {
        bid_at(hour_ts(), price, power, direction)
    }

    fn bid_at(
        timestamp: DateTime<Utc>,
        price: f64,
        power: f64,
        direction: Direction,
    ) -> BidPoint {
        BidPoint {
            timestamp,
            bid_id: "b".to_string(),
            power_mw: power,
            price_eur_mwh: price,
            direction,
            process_type: "A51".to_string(),
            connecting_domain: "10YCZ-CEPS-----N".to_string(),
        }
    }

    fn capacity(price: f64, power: f64) -> CapacityPoint {
        CapacityPoint {
            timestamp: hour_ts(),
            series_id: "c".to_string(),
            capacity_mw: power,
            price_eur_mw: price,
            direction: Direction::Up,
            process_type: "A51".to_string(),
            area_domain: "10YCZ-CEPS-----N".to_string(),
            market_agreement_type: "A01".to_string(),
        }
    }

    fn pairs(curve: &CumulativeCurve) -> Vec<(f64, f64)> {
        curve
            .points
            .iter()
            .map(|p| (p.cumulative_power_mw, p.price))
            .collect()
    }

    #[test]
    fn test_empty_input_yields_empty_curve() {
        let curve = build_bid_curve(&[], Direction::Up);
        assert!(curve.points.is_empty());
        assert_eq!(curve.weighted_average_price, 0.0);

        // bids of the other direction only are also an empty curve
        let down_only = [bid(10.0, 5.0, Direction::Down)];
        let curve = build_bid_curve(&down_only, Direction::Up);
        assert!(curve.points.is_empty());
        assert_eq!(curve.weighted_average_price, 0.0);
    }

    #[test]
    fn test_single_bid_yields_anchor_plus_point() {
        let curve = build_bid_curve(&[bid(42.0, 8.0, Direction::Up)], Direction::Up);
        assert_eq!(pairs(&curve), vec![(0.0, 42.0), (8.0, 42.0)]);
        assert_eq!(curve.weighted_average_price, 42.0);
    }

    #[test]
    fn test_upward_merit_order_and_duplicate_price_aggregation() {
        let bids = [
            bid(50.0, 10.0, Direction::Up),
            bid(30.0, 5.0, Direction::Up),
            bid(50.0, 10.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        // the two 50 EUR bids merge into one 20 MW tranche
        assert_eq!(pairs(&curve), vec![(0.0, 30.0), (5.0, 30.0), (25.0, 50.0)]);
        assert_eq!(
            curve.weighted_average_price,
            (5.0 * 30.0 + 20.0 * 50.0) / 25.0
        );
    }

    #[test]
    fn test_doubled_power_equals_duplicated_row() {
        let doubled = [
            bid(30.0, 5.0, Direction::Up),
            bid(50.0, 20.0, Direction::Up),
        ];
        let duplicated = [
            bid(30.0, 5.0, Direction::Up),
            bid(50.0, 10.0, Direction::Up),
            bid(50.0, 10.0, Direction::Up),
        ];
        let a = build_bid_curve(&doubled, Direction::Up);
        let b = build_bid_curve(&duplicated, Direction::Up);
        assert_eq!(pairs(&a), pairs(&b));
        assert_eq!(a.weighted_average_price, b.weighted_average_price);
    }

    #[test]
    fn test_same_price_different_timestamps_stay_separate_tranches() {
        let bids = [
            bid_at(hour_ts(), 50.0, 10.0, Direction::Up),
            bid_at(hour_ts() + chrono::Duration::minutes(15), 50.0, 10.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        assert_eq!(pairs(&curve), vec![(0.0, 50.0), (10.0, 50.0), (20.0, 50.0)]);
    }

    #[test]
    fn test_downward_curve_is_non_increasing() {
        let bids = [
            bid(10.0, 5.0, Direction::Down),
            bid(80.0, 3.0, Direction::Down),
            bid(40.0, 7.0, Direction::Down),
        ];
        let curve = build_bid_curve(&bids, Direction::Down);
        // anchor at the max price, cheapest-to-activate (highest price) first
        assert_eq!(
            pairs(&curve),
            vec![(0.0, 80.0), (3.0, 80.0), (10.0, 40.0), (15.0, 10.0)]
        );
        for window in curve.points.windows(2) {
            assert!(window[0].price >= window[1].price);
        }
    }

    #[test]
    fn test_upward_curve_is_non_decreasing() {
        let bids = [
            bid(40.0, 7.0, Direction::Up),
            bid(10.0, 5.0, Direction::Up),
            bid(80.0, 3.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        for window in curve.points.windows(2) {
            assert!(window[0].price <= window[1].price);
            assert!(window[0].cumulative_power_mw <= window[1].cumulative_power_mw);
        }
    }

    #[test]
    fn test_weighted_average_two_equal_volumes() {
        let bids = [
            bid(10.0, 5.0, Direction::Up),
            bid(20.0, 5.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        assert_eq!(curve.weighted_average_price, 15.0);
    }

    #[test]
    fn test_weighted_average_ignores_non_positive_power() {
        let bids = [
            bid(10.0, 5.0, Direction::Up),
            bid(500.0, 0.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        assert_eq!(curve.weighted_average_price, 10.0);

        let zero_only = [bid(500.0, 0.0, Direction::Up)];
        let curve = build_bid_curve(&zero_only, Direction::Up);
        assert_eq!(curve.weighted_average_price, 0.0);
        // the curve itself still exists, the average alone is defined as 0.0
        assert!(!curve.points.is_empty());
    }

    #[test]
    fn test_capacity_anchor_prefers_smallest_positive_price() {
        let tranches = [capacity(0.0, 100.0), capacity(7.5, 50.0), capacity(12.0, 30.0)];
        let curve = build_capacity_curve(&tranches, Direction::Up);
        assert_eq!(curve.points[0].cumulative_power_mw, 0.0);
        assert_eq!(curve.points[0].price, 7.5);
    }

    #[test]
    fn test_capacity_anchor_falls_back_to_min_price() {
        let tranches = [capacity(0.0, 100.0), capacity(-4.0, 20.0)];
        let curve = build_capacity_curve(&tranches, Direction::Up);
        assert_eq!(curve.points[0], CurvePoint {
            cumulative_power_mw: 0.0,
            price: -4.0,
        });
    }

    #[test]
    fn test_capacity_curve_is_non_decreasing_for_down() {
        let mut tranches = vec![capacity(12.0, 30.0), capacity(3.0, 50.0)];
        for tranche in &mut tranches {
            tranche.direction = Direction::Down;
        }
        let curve = build_capacity_curve(&tranches, Direction::Down);
        assert_eq!(pairs(&curve), vec![(0.0, 3.0), (50.0, 3.0), (80.0, 12.0)]);
    }

    #[test]
    fn test_anchor_duplicate_is_dropped() {
        // a zero-power bid at the minimum price collides with the anchor
        let bids = [
            bid(30.0, 0.0, Direction::Up),
            bid(50.0, 10.0, Direction::Up),
        ];
        let curve = build_bid_curve(&bids, Direction::Up);
        assert_eq!(pairs(&curve), vec![(0.0, 30.0), (10.0, 50.0)]);
    }
}
