use std::collections::HashMap;

use chrono_tz::Tz;
use once_cell::sync::Lazy;

/// ISO 3166-1 alpha-2 country code
pub type CountryCode = &'static str;

/// EIC (Energy Identification Code) of a control area or bidding zone
pub type AreaCode = &'static str;

/// A market area the service can query: its EIC, owning country and the
/// civil timezone used for local-date filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketArea {
    pub code: AreaCode,
    pub country_code: CountryCode,
    pub name: &'static str,
    pub tso: Option<&'static str>,
    pub timezone: Tz,
}

impl MarketArea {
    pub const fn new(
        code: AreaCode,
        country_code: CountryCode,
        name: &'static str,
        tso: Option<&'static str>,
        timezone: Tz,
    ) -> Self {
        Self {
            code,
            country_code,
            name,
            tso,
            timezone,
        }
    }
}

/// The closed set of supported market areas.
///
/// An unlisted country is a configuration error and short-circuits every
/// fetcher to an empty result.
pub static MARKET_AREAS: Lazy<HashMap<CountryCode, Vec<MarketArea>>> = Lazy::new(|| {
    use chrono_tz::Europe;

    let areas = vec![
        MarketArea::new("10YCZ-CEPS-----N", "CZ", "Czech Republic", None, Europe::Prague),
        MarketArea::new("10Y1001A1001A83F", "DE", "Germany", None, Europe::Berlin),
        MarketArea::new("10YDE-VE-------2", "DE", "Germany", Some("50Hertz"), Europe::Berlin),
        MarketArea::new("10YDE-RWENET---I", "DE", "Germany", Some("Amprion"), Europe::Berlin),
        MarketArea::new("10YDE-EON------1", "DE", "Germany", Some("TenneT"), Europe::Berlin),
        MarketArea::new("10YDE-ENBW-----N", "DE", "Germany", Some("TransnetBW"), Europe::Berlin),
        MarketArea::new("10YAT-APG------L", "AT", "Austria", None, Europe::Vienna),
        MarketArea::new("10YPL-AREA-----S", "PL", "Poland", None, Europe::Warsaw),
        MarketArea::new("10YSK-SEPS-----K", "SK", "Slovakia", None, Europe::Bratislava),
        MarketArea::new("10YBE----------2", "BE", "Belgium", None, Europe::Brussels),
        MarketArea::new("10YFR-RTE------C", "FR", "France", None, Europe::Paris),
    ];

    let mut map: HashMap<CountryCode, Vec<MarketArea>> = HashMap::new();
    for area in areas {
        map.entry(area.country_code).or_default().push(area);
    }
    map
});

/// Get all market areas for a country
pub fn get_areas_by_country(country_code: &str) -> Option<&'static Vec<MarketArea>> {
    MARKET_AREAS.get(country_code)
}

/// Get the primary market area for a country (first one if multiple exist)
pub fn get_primary_area(country_code: &str) -> Option<&'static MarketArea> {
    MARKET_AREAS.get(country_code).and_then(|areas| areas.first())
}

/// List all available country codes
pub fn list_countries() -> Vec<CountryCode> {
    let mut countries: Vec<_> = MARKET_AREAS.keys().copied().collect();
    countries.sort();
    countries
}

impl std::fmt::Display for MarketArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tso {
            Some(tso) => write!(f, "{} ({}) - {}", self.name, self.country_code, tso),
            None => write!(f, "{} ({})", self.name, self.country_code),
        }
    }
}
