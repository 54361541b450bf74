//! Dataset fetchers: one high-level retrieval per published dataset.
//!
//! Every fetcher resolves the country to its market area, builds the query
//! for one or more UTC days, runs the archive unwrapper and the document
//! parser over each answer and returns a fixed-schema table. The documented
//! failure mode of each fetcher is an empty table: transport errors, schema
//! errors and "no matching data" answers are logged here and never escape.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{error, info};

use crate::entsoe::archive::{is_empty_marker, unwrap_payloads};
use crate::entsoe::areas::{MarketArea, get_primary_area};
use crate::entsoe::parse::{
    BidPoint, CapacityPoint, parse_activation_prices, parse_aggregated_bids,
    parse_day_ahead_prices, parse_procured_capacity, parse_reserve_bids,
};
use crate::entsoe::tables::{
    ActivationPriceRow, AggregatedBidsRow, DayAheadRow, day_ahead_table,
    pivot_activation_prices, pivot_aggregated_bids,
};
use crate::entsoe::time::{compact_period, falls_on_local_date, local_midnight_utc, utc_midnight};
use crate::entsoe::{ARCHIVE_TIMEOUT, EntsoeClient, XML_TIMEOUT};

/// Aggregated bid tables for both selection processes.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedBidTables {
    /// Central selection (process type A67).
    pub central: Vec<AggregatedBidsRow>,
    /// Local selection (process type A68).
    pub local: Vec<AggregatedBidsRow>,
}

fn resolve_area(country: &str, dataset: &str) -> Option<&'static MarketArea> {
    let area = get_primary_area(country);
    if area.is_none() {
        error!("{dataset}: unsupported country code {country:?}");
    }
    area
}

impl EntsoeClient {
    /// Fetch one answer and peel it down to parseable XML payloads.
    async fn fetch_documents(
        &self,
        dataset: &str,
        params: &[(&str, &str)],
        timeout: StdDuration,
    ) -> Vec<String> {
        let raw = match self.fetch_raw(params, timeout).await {
            Ok(raw) => raw,
            Err(err) => {
                error!("{dataset}: request failed: {err}");
                return Vec::new();
            }
        };
        unwrap_payloads(&raw.bytes, &raw.content_type)
            .into_iter()
            .filter(|payload| {
                if is_empty_marker(payload) {
                    info!("{dataset}: platform reported no matching data");
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    /// Day-ahead market prices (A44) for one local civil day.
    ///
    /// The request window runs local midnight to local midnight, converted
    /// to UTC, so no post-filter is needed.
    pub async fn fetch_day_ahead_prices(&self, country: &str, date: NaiveDate) -> Vec<DayAheadRow> {
        let Some(area) = resolve_area(country, "day-ahead prices") else {
            return Vec::new();
        };
        let (Some(start), Some(end)) = (
            local_midnight_utc(date, area.timezone),
            local_midnight_utc(date + Duration::days(1), area.timezone),
        ) else {
            return Vec::new();
        };
        info!("fetching day-ahead prices for {} on {date}", area);

        let start = compact_period(start);
        let end = compact_period(end);
        let params = [
            ("documentType", "A44"),
            ("in_Domain", area.code),
            ("out_Domain", area.code),
            ("periodStart", start.as_str()),
            ("periodEnd", end.as_str()),
        ];

        let mut points = Vec::new();
        for payload in self
            .fetch_documents("day-ahead prices", &params, XML_TIMEOUT)
            .await
        {
            points.extend(parse_day_ahead_prices(&payload));
        }
        day_ahead_table(points)
    }

    /// Activated aFRR balancing-energy prices (A84) for one local civil day.
    ///
    /// The previous UTC day is fetched as well: a market interval can span
    /// local midnight, and its trailing points belong to the requested day.
    pub async fn fetch_activation_prices(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Vec<ActivationPriceRow> {
        let Some(area) = resolve_area(country, "activated prices") else {
            return Vec::new();
        };
        info!("fetching activated aFRR prices for {} on {date}", area);

        let mut points = Vec::new();
        for day in [date - Duration::days(1), date] {
            let start = compact_period(utc_midnight(day));
            let end = compact_period(utc_midnight(day + Duration::days(1)));
            let params = [
                ("documentType", "A84"),
                ("processType", "A16"),
                ("businessType", "A96"),
                ("controlArea_Domain", area.code),
                ("periodStart", start.as_str()),
                ("periodEnd", end.as_str()),
            ];
            for payload in self
                .fetch_documents("activated prices", &params, XML_TIMEOUT)
                .await
            {
                points.extend(parse_activation_prices(&payload));
            }
        }

        pivot_activation_prices(&points)
            .into_iter()
            .filter(|row| falls_on_local_date(row.timestamp, area.timezone, date))
            .collect()
    }

    /// Raw balancing-energy bids (A37) for one UTC day.
    pub async fn fetch_balancing_bids(&self, country: &str, date: NaiveDate) -> Vec<BidPoint> {
        let Some(area) = resolve_area(country, "balancing bids") else {
            return Vec::new();
        };
        info!("fetching balancing-energy bids for {} on {date}", area);

        let process_type = "A51";
        let start = compact_period(utc_midnight(date));
        let end = compact_period(utc_midnight(date + Duration::days(1)));
        let params = [
            ("documentType", "A37"),
            ("businessType", "B74"),
            ("processType", process_type),
            ("connecting_Domain", area.code),
            ("periodStart", start.as_str()),
            ("periodEnd", end.as_str()),
        ];

        let mut points = Vec::new();
        for payload in self
            .fetch_documents("balancing bids", &params, ARCHIVE_TIMEOUT)
            .await
        {
            points.extend(parse_reserve_bids(&payload, process_type, area.code));
        }
        points
    }

    /// Procured balancing reserves (A15), day-ahead market agreement, for
    /// one UTC day.
    pub async fn fetch_procured_capacity(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> Vec<CapacityPoint> {
        let Some(area) = resolve_area(country, "procured capacity") else {
            return Vec::new();
        };
        info!("fetching procured reserve capacity for {} on {date}", area);

        let process_type = "A51";
        let market_agreement_type = "A01";
        let start = compact_period(utc_midnight(date));
        let end = compact_period(utc_midnight(date + Duration::days(1)));
        let params = [
            ("documentType", "A15"),
            ("processType", process_type),
            ("area_Domain", area.code),
            ("periodStart", start.as_str()),
            ("periodEnd", end.as_str()),
            ("Type_MarketAgreement.Type", market_agreement_type),
        ];

        let mut points = Vec::new();
        for payload in self
            .fetch_documents("procured capacity", &params, ARCHIVE_TIMEOUT)
            .await
        {
            points.extend(parse_procured_capacity(
                &payload,
                process_type,
                area.code,
                market_agreement_type,
            ));
        }
        points
    }

    /// Aggregated bid volumes (A24) for one selection process (A67 central,
    /// A68 local) and one local civil day.
    ///
    /// Fetches the previous UTC day too, filters the raw points to the
    /// local date and only then pivots, so the offered-volume gap fill
    /// works on exactly the rows of the requested day.
    pub async fn fetch_aggregated_bids(
        &self,
        country: &str,
        date: NaiveDate,
        process_type: &str,
    ) -> Vec<AggregatedBidsRow> {
        let Some(area) = resolve_area(country, "aggregated bids") else {
            return Vec::new();
        };
        info!(
            "fetching aggregated bids ({process_type}) for {} on {date}",
            area
        );

        let mut points = Vec::new();
        for day in [date - Duration::days(1), date] {
            let start = compact_period(utc_midnight(day));
            let end = compact_period(utc_midnight(day + Duration::days(1)));
            let params = [
                ("documentType", "A24"),
                ("processType", process_type),
                ("area_Domain", area.code),
                ("periodStart", start.as_str()),
                ("periodEnd", end.as_str()),
            ];
            for payload in self
                .fetch_documents("aggregated bids", &params, XML_TIMEOUT)
                .await
            {
                points.extend(parse_aggregated_bids(&payload));
            }
        }

        points.retain(|point| falls_on_local_date(point.timestamp, area.timezone, date));
        pivot_aggregated_bids(&points)
    }

    /// Aggregated bid volumes for both selection processes.
    pub async fn fetch_all_aggregated_bids(
        &self,
        country: &str,
        date: NaiveDate,
    ) -> AggregatedBidTables {
        AggregatedBidTables {
            central: self.fetch_aggregated_bids(country, date, "A67").await,
            local: self.fetch_aggregated_bids(country, date, "A68").await,
        }
    }
}
