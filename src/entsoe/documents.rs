//! Serde models for the ENTSO-E document families consumed by this service.
//!
//! Four schema families arrive on the wire: reserve-bid documents (A37,
//! `...:451-7:reservebiddocument:7:1`), balancing documents (A84, A15 and A24
//! all share `...:451-6:balancingdocument:4:1`) and publication documents
//! (A44 day-ahead prices). Real documents omit fields freely, so everything
//! the walkers can tolerate losing is an `Option` and repeated elements
//! default to empty.

use serde::Deserialize;

/// Reserve-bid document (`documentType=A37`), one `Bid_TimeSeries` per bid.
#[derive(Debug, Deserialize)]
pub struct ReserveBidDocument {
    #[serde(rename = "Bid_TimeSeries", default)]
    pub series: Vec<BidTimeSeries>,
}

#[derive(Debug, Deserialize)]
pub struct BidTimeSeries {
    #[serde(rename = "mRID")]
    pub mrid: Option<String>,
    #[serde(rename = "flowDirection.direction")]
    pub flow_direction: Option<String>,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

/// Balancing document (`documentType` A84, A15 or A24); the families are
/// told apart by request parameters, not by the payload shape.
#[derive(Debug, Deserialize)]
pub struct BalancingDocument {
    #[serde(rename = "TimeSeries", default)]
    pub series: Vec<BalancingTimeSeries>,
}

#[derive(Debug, Deserialize)]
pub struct BalancingTimeSeries {
    #[serde(rename = "mRID")]
    pub mrid: Option<String>,
    #[serde(rename = "flowDirection.direction")]
    pub flow_direction: Option<String>,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

/// Publication document (`documentType=A44`), day-ahead market prices.
#[derive(Debug, Deserialize)]
pub struct PublicationDocument {
    #[serde(rename = "TimeSeries", default)]
    pub series: Vec<PublicationTimeSeries>,
}

#[derive(Debug, Deserialize)]
pub struct PublicationTimeSeries {
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
pub struct Period {
    #[serde(rename = "timeInterval")]
    pub time_interval: Option<TimeInterval>,
    pub resolution: Option<String>,
    #[serde(rename = "Point", default)]
    pub points: Vec<Point>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeInterval {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// One observation inside a period.
///
/// All value tags the four families use live here; each walker reads the
/// subset its schema defines and applies its own fallback chain.
#[derive(Debug, Deserialize, Default)]
pub struct Point {
    pub position: Option<i64>,
    #[serde(rename = "quantity.quantity")]
    pub bid_quantity: Option<f64>,
    pub quantity: Option<f64>,
    #[serde(rename = "secondaryQuantity")]
    pub secondary_quantity: Option<f64>,
    #[serde(rename = "unavailable_Quantity.quantity")]
    pub unavailable_quantity: Option<f64>,
    #[serde(rename = "energy_Price.amount")]
    pub energy_price: Option<f64>,
    #[serde(rename = "price.amount")]
    pub price_amount: Option<f64>,
    #[serde(rename = "Price.amount")]
    pub price_amount_legacy: Option<f64>,
    #[serde(rename = "activation_Price.amount")]
    pub activation_price: Option<f64>,
    #[serde(rename = "procurement_Price.amount")]
    pub procurement_price: Option<f64>,
}

impl Point {
    /// Power of a reserve bid: `quantity.quantity` with plain `quantity` as
    /// the fallback spelling.
    pub fn bid_power(&self) -> Option<f64> {
        self.bid_quantity.or(self.quantity)
    }

    /// Price of a reserve bid; the feed has used three spellings over time.
    pub fn bid_price(&self) -> Option<f64> {
        self.energy_price
            .or(self.price_amount)
            .or(self.price_amount_legacy)
    }
}
