//! Walkers turning one XML document into typed time-series points.
//!
//! Every walker shares the same failure posture: a document that does not
//! parse as well-formed markup logs a warning and yields an empty vector, a
//! period missing its interval start or resolution is skipped, and a point
//! missing a required value is dropped. Nothing here propagates an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::entsoe::documents::{
    BalancingDocument, Period, PublicationDocument, ReserveBidDocument,
};
use crate::entsoe::time::{parse_interval_start, point_timestamp};

/// Regulation direction of a series, from the two-valued flow-direction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Up,
    Down,
    Unknown,
}

impl Direction {
    /// `A01` is upward regulation, `A02` downward; any other code (or a
    /// missing one) is carried as `Unknown` rather than rejected.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("A01") => Direction::Up,
            Some("A02") => Direction::Down,
            _ => Direction::Unknown,
        }
    }
}

/// One raw balancing-energy bid observation (A37).
#[derive(Debug, Clone, Serialize)]
pub struct BidPoint {
    pub timestamp: DateTime<Utc>,
    pub bid_id: String,
    pub power_mw: f64,
    pub price_eur_mwh: f64,
    pub direction: Direction,
    pub process_type: String,
    pub connecting_domain: String,
}

/// One activated-price observation (A84).
#[derive(Debug, Clone)]
pub struct ActivationPricePoint {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub price: f64,
}

/// One procured-capacity observation (A15).
#[derive(Debug, Clone, Serialize)]
pub struct CapacityPoint {
    pub timestamp: DateTime<Utc>,
    pub series_id: String,
    pub capacity_mw: f64,
    pub price_eur_mw: f64,
    pub direction: Direction,
    pub process_type: String,
    pub area_domain: String,
    pub market_agreement_type: String,
}

/// One aggregated-bid volume observation (A24).
#[derive(Debug, Clone)]
pub struct AggregatedVolumePoint {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub offered_mw: f64,
    pub activated_mw: f64,
    pub unavailable_mw: f64,
}

/// One day-ahead price observation (A44).
#[derive(Debug, Clone)]
pub struct DayAheadPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Resolve a period's start instant and resolution tag, or skip it.
fn period_frame(period: &Period) -> Option<(DateTime<Utc>, &str)> {
    let raw_start = period.time_interval.as_ref()?.start.as_deref()?;
    let resolution = period.resolution.as_deref()?;
    match parse_interval_start(raw_start) {
        Some(start) => Some((start, resolution)),
        None => {
            warn!("unparseable period start: {raw_start}");
            None
        }
    }
}

/// Parse a reserve-bid document (A37) into bid points.
///
/// Process type and connecting domain are request metadata the document does
/// not repeat per point, so the caller supplies them.
pub fn parse_reserve_bids(
    xml: &str,
    process_type: &str,
    connecting_domain: &str,
) -> Vec<BidPoint> {
    let document: ReserveBidDocument = match quick_xml::de::from_str(xml) {
        Ok(document) => document,
        Err(err) => {
            warn!("failed to parse reserve-bid document: {err}");
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    for series in &document.series {
        let bid_id = series.mrid.clone().unwrap_or_else(|| "N/A".to_string());
        let direction = Direction::from_code(series.flow_direction.as_deref());
        for period in &series.periods {
            let Some((start, resolution)) = period_frame(period) else {
                continue;
            };
            for point in &period.points {
                let Some(power) = point.bid_power() else {
                    continue;
                };
                let position = point.position.unwrap_or(0);
                points.push(BidPoint {
                    timestamp: point_timestamp(start, resolution, position),
                    bid_id: bid_id.clone(),
                    power_mw: power,
                    price_eur_mwh: point.bid_price().unwrap_or(0.0),
                    direction,
                    process_type: process_type.to_string(),
                    connecting_domain: connecting_domain.to_string(),
                });
            }
        }
    }
    points
}

/// Parse a balancing document carrying activated prices (A84).
///
/// A missing activation price is an availability-only point and comes out as
/// NaN, not zero.
pub fn parse_activation_prices(xml: &str) -> Vec<ActivationPricePoint> {
    let document: BalancingDocument = match quick_xml::de::from_str(xml) {
        Ok(document) => document,
        Err(err) => {
            warn!("failed to parse activated-price document: {err}");
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    for series in &document.series {
        let direction = Direction::from_code(series.flow_direction.as_deref());
        for period in &series.periods {
            let Some((start, resolution)) = period_frame(period) else {
                continue;
            };
            for point in &period.points {
                let position = point.position.unwrap_or(0);
                points.push(ActivationPricePoint {
                    timestamp: point_timestamp(start, resolution, position),
                    direction,
                    price: point.activation_price.unwrap_or(f64::NAN),
                });
            }
        }
    }
    points
}

/// Parse a balancing document carrying procured capacity (A15).
pub fn parse_procured_capacity(
    xml: &str,
    process_type: &str,
    area_domain: &str,
    market_agreement_type: &str,
) -> Vec<CapacityPoint> {
    let document: BalancingDocument = match quick_xml::de::from_str(xml) {
        Ok(document) => document,
        Err(err) => {
            warn!("failed to parse procured-capacity document: {err}");
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    for series in &document.series {
        let series_id = series.mrid.clone().unwrap_or_else(|| "N/A".to_string());
        let direction = Direction::from_code(series.flow_direction.as_deref());
        for period in &series.periods {
            let Some((start, resolution)) = period_frame(period) else {
                continue;
            };
            for point in &period.points {
                let Some(capacity) = point.quantity else {
                    continue;
                };
                let position = point.position.unwrap_or(0);
                points.push(CapacityPoint {
                    timestamp: point_timestamp(start, resolution, position),
                    series_id: series_id.clone(),
                    capacity_mw: capacity,
                    price_eur_mw: point.procurement_price.unwrap_or(0.0),
                    direction,
                    process_type: process_type.to_string(),
                    area_domain: area_domain.to_string(),
                    market_agreement_type: market_agreement_type.to_string(),
                });
            }
        }
    }
    points
}

/// Parse a balancing document carrying aggregated bid volumes (A24).
///
/// The three volumes are independent; a point keeps its row even when every
/// volume is absent.
pub fn parse_aggregated_bids(xml: &str) -> Vec<AggregatedVolumePoint> {
    let document: BalancingDocument = match quick_xml::de::from_str(xml) {
        Ok(document) => document,
        Err(err) => {
            warn!("failed to parse aggregated-bid document: {err}");
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    for series in &document.series {
        let direction = Direction::from_code(series.flow_direction.as_deref());
        for period in &series.periods {
            let Some((start, resolution)) = period_frame(period) else {
                continue;
            };
            for point in &period.points {
                let position = point.position.unwrap_or(0);
                points.push(AggregatedVolumePoint {
                    timestamp: point_timestamp(start, resolution, position),
                    direction,
                    offered_mw: point.quantity.unwrap_or(f64::NAN),
                    activated_mw: point.secondary_quantity.unwrap_or(f64::NAN),
                    unavailable_mw: point.unavailable_quantity.unwrap_or(f64::NAN),
                });
            }
        }
    }
    points
}

/// Parse a publication document carrying day-ahead prices (A44).
pub fn parse_day_ahead_prices(xml: &str) -> Vec<DayAheadPoint> {
    let document: PublicationDocument = match quick_xml::de::from_str(xml) {
        Ok(document) => document,
        Err(err) => {
            warn!("failed to parse day-ahead price document: {err}");
            return Vec::new();
        }
    };

    let mut points = Vec::new();
    for series in &document.series {
        for period in &series.periods {
            let Some((start, resolution)) = period_frame(period) else {
                continue;
            };
            for point in &period.points {
                let Some(price) = point.price_amount else {
                    continue;
                };
                let position = point.position.unwrap_or(0);
                points.push(DayAheadPoint {
                    timestamp: point_timestamp(start, resolution, position),
                    price,
                });
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RESERVE_BID_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ReserveBid_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-7:reservebiddocument:7:1">
    <mRID>doc-1</mRID>
    <Bid_TimeSeries>
        <mRID>bid-42</mRID>
        <flowDirection.direction>A01</flowDirection.direction>
        <Period>
            <timeInterval>
                <start>2024-02-01T00:00Z</start>
                <end>2024-02-01T02:00Z</end>
            </timeInterval>
            <resolution>PT60M</resolution>
            <Point>
                <position>1</position>
                <quantity.quantity>10</quantity.quantity>
                <energy_Price.amount>55.5</energy_Price.amount>
            </Point>
            <Point>
                <position>2</position>
                <quantity>20</quantity>
            </Point>
        </Period>
    </Bid_TimeSeries>
</ReserveBid_MarketDocument>"#;

    #[test]
    fn test_reserve_bid_two_points_hourly() {
        let points = parse_reserve_bids(RESERVE_BID_XML, "A51", "10YCZ-CEPS-----N");
        assert_eq!(points.len(), 2);

        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(points[0].timestamp, start);
        assert_eq!(points[1].timestamp, start + chrono::Duration::hours(1));

        assert_eq!(points[0].bid_id, "bid-42");
        assert_eq!(points[0].direction, Direction::Up);
        assert_eq!(points[0].power_mw, 10.0);
        assert_eq!(points[0].price_eur_mwh, 55.5);
        // fallback power spelling, price defaults to zero when absent
        assert_eq!(points[1].power_mw, 20.0);
        assert_eq!(points[1].price_eur_mwh, 0.0);
        assert_eq!(points[0].process_type, "A51");
        assert_eq!(points[0].connecting_domain, "10YCZ-CEPS-----N");
    }

    #[test]
    fn test_malformed_xml_yields_empty() {
        let truncated = &RESERVE_BID_XML[..RESERVE_BID_XML.len() / 2];
        assert!(parse_reserve_bids(truncated, "A51", "X").is_empty());
        assert!(parse_activation_prices("<TimeSer").is_empty());
        assert!(parse_aggregated_bids("not xml at all").is_empty());
    }

    #[test]
    fn test_no_matching_series_is_empty_not_error() {
        let xml = r#"<Acknowledgement_MarketDocument><mRID>x</mRID></Acknowledgement_MarketDocument>"#;
        assert!(parse_reserve_bids(xml, "A51", "X").is_empty());
    }

    #[test]
    fn test_period_without_start_is_skipped() {
        let xml = r#"<ReserveBid_MarketDocument>
            <Bid_TimeSeries>
                <mRID>b</mRID>
                <flowDirection.direction>A02</flowDirection.direction>
                <Period>
                    <resolution>PT15M</resolution>
                    <Point><position>1</position><quantity>5</quantity></Point>
                </Period>
                <Period>
                    <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T01:00Z</end></timeInterval>
                    <resolution>PT15M</resolution>
                    <Point><position>1</position><quantity>5</quantity></Point>
                </Period>
            </Bid_TimeSeries>
        </ReserveBid_MarketDocument>"#;
        let points = parse_reserve_bids(xml, "A51", "X");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].direction, Direction::Down);
    }

    #[test]
    fn test_point_without_power_is_dropped() {
        let xml = r#"<ReserveBid_MarketDocument>
            <Bid_TimeSeries>
                <flowDirection.direction>A01</flowDirection.direction>
                <Period>
                    <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T01:00Z</end></timeInterval>
                    <resolution>PT15M</resolution>
                    <Point><position>1</position><energy_Price.amount>10</energy_Price.amount></Point>
                    <Point><position>2</position><quantity>7.5</quantity></Point>
                </Period>
            </Bid_TimeSeries>
        </ReserveBid_MarketDocument>"#;
        let points = parse_reserve_bids(xml, "A51", "X");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].power_mw, 7.5);
        // series without an mRID falls back to the placeholder id
        assert_eq!(points[0].bid_id, "N/A");
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(Direction::from_code(Some("A01")), Direction::Up);
        assert_eq!(Direction::from_code(Some("A02")), Direction::Down);
        assert_eq!(Direction::from_code(Some("A99")), Direction::Unknown);
        assert_eq!(Direction::from_code(None), Direction::Unknown);
    }

    #[test]
    fn test_activation_prices_missing_price_is_nan() {
        let xml = r#"<Balancing_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-6:balancingdocument:4:1">
            <TimeSeries>
                <mRID>1</mRID>
                <flowDirection.direction>A01</flowDirection.direction>
                <Period>
                    <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T00:30Z</end></timeInterval>
                    <resolution>PT15M</resolution>
                    <Point><position>1</position><activation_Price.amount>120.5</activation_Price.amount></Point>
                    <Point><position>2</position></Point>
                </Period>
            </TimeSeries>
        </Balancing_MarketDocument>"#;
        let points = parse_activation_prices(xml);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 120.5);
        assert!(points[1].price.is_nan());
        assert_eq!(
            points[1].timestamp - points[0].timestamp,
            chrono::Duration::minutes(15)
        );
    }

    #[test]
    fn test_aggregated_bids_volume_triple() {
        let xml = r#"<Balancing_MarketDocument>
            <TimeSeries>
                <flowDirection.direction>A02</flowDirection.direction>
                <Period>
                    <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T00:15Z</end></timeInterval>
                    <resolution>PT15M</resolution>
                    <Point>
                        <position>1</position>
                        <quantity>100</quantity>
                        <secondaryQuantity>40</secondaryQuantity>
                    </Point>
                </Period>
            </TimeSeries>
        </Balancing_MarketDocument>"#;
        let points = parse_aggregated_bids(xml);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].direction, Direction::Down);
        assert_eq!(points[0].offered_mw, 100.0);
        assert_eq!(points[0].activated_mw, 40.0);
        assert!(points[0].unavailable_mw.is_nan());
    }

    #[test]
    fn test_procured_capacity_requires_quantity() {
        let xml = r#"<Balancing_MarketDocument>
            <TimeSeries>
                <mRID>cap-1</mRID>
                <flowDirection.direction>A01</flowDirection.direction>
                <Period>
                    <timeInterval><start>2024-02-01T00:00Z</start><end>2024-02-01T02:00Z</end></timeInterval>
                    <resolution>PT60M</resolution>
                    <Point><position>1</position><quantity>50</quantity><procurement_Price.amount>8.1</procurement_Price.amount></Point>
                    <Point><position>2</position><procurement_Price.amount>9.9</procurement_Price.amount></Point>
                </Period>
            </TimeSeries>
        </Balancing_MarketDocument>"#;
        let points = parse_procured_capacity(xml, "A51", "10YCZ-CEPS-----N", "A01");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].capacity_mw, 50.0);
        assert_eq!(points[0].price_eur_mw, 8.1);
        assert_eq!(points[0].market_agreement_type, "A01");
    }

    #[test]
    fn test_day_ahead_prices() {
        let xml = r#"<Publication_MarketDocument xmlns="urn:iec62325.351:tc57wg16:451-3:publicationdocument:7:0">
            <TimeSeries>
                <Period>
                    <timeInterval><start>2024-02-01T23:00Z</start><end>2024-02-02T01:00Z</end></timeInterval>
                    <resolution>PT60M</resolution>
                    <Point><position>1</position><price.amount>84.12</price.amount></Point>
                    <Point><position>2</position><price.amount>79.03</price.amount></Point>
                </Period>
            </TimeSeries>
        </Publication_MarketDocument>"#;
        let points = parse_day_ahead_prices(xml);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 84.12);
        assert_eq!(
            points[1].timestamp,
            Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap()
        );
    }
}
