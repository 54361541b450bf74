use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cache::AppCaches;
use crate::entsoe::EntsoeClient;
use crate::entsoe::areas::{self, MarketArea, get_primary_area};
use crate::entsoe::curves::{CumulativeCurve, build_bid_curve, build_capacity_curve};
use crate::entsoe::datasets::AggregatedBidTables;
use crate::entsoe::parse::{BidPoint, CapacityPoint, Direction};
use crate::entsoe::tables::{ActivationPriceRow, AggregatedBidsRow, DayAheadRow};
use crate::entsoe::time::local_hour_to_utc;

const BIND_ADDR: &str = "0.0.0.0:3046";

#[derive(Clone)]
struct AppState {
    client: Arc<EntsoeClient>,
    caches: Arc<AppCaches>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// An empty dataset travels through this: the consumer renders its
    /// "no data" indicator from the error message.
    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

#[derive(Deserialize)]
struct AggregatedBidsQuery {
    date: NaiveDate,
    /// A67 (central selection) or A68 (local selection); both when absent.
    process_type: Option<String>,
}

#[derive(Deserialize)]
struct CurveQuery {
    date: NaiveDate,
    /// Local wall-clock hour of the requested day, 0..=23.
    hour: u32,
}

fn require_area(country: &str) -> Result<&'static MarketArea, StatusCode> {
    get_primary_area(country).ok_or(StatusCode::BAD_REQUEST)
}

fn table_response<T: Serialize>(rows: Vec<T>, what: &str, country: &str) -> Json<ApiResponse<Vec<T>>> {
    if rows.is_empty() {
        Json(ApiResponse::error(format!("no {what} data for {country}")))
    } else {
        Json(ApiResponse::success(rows))
    }
}

/// GET /api/v1/day-ahead/{country}?date=YYYY-MM-DD
async fn get_day_ahead(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<DayAheadRow>>>, StatusCode> {
    require_area(&country)?;
    let key = (country.clone(), query.date);
    let rows = match state.caches.day_ahead.get(&key) {
        Some(rows) => rows,
        None => {
            let rows = state.client.fetch_day_ahead_prices(&country, query.date).await;
            state.caches.day_ahead.insert(key, rows)
        }
    };
    Ok(table_response((*rows).clone(), "day-ahead price", &country))
}

/// GET /api/v1/activation-prices/{country}?date=YYYY-MM-DD
async fn get_activation_prices(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<ActivationPriceRow>>>, StatusCode> {
    require_area(&country)?;
    let key = (country.clone(), query.date);
    let rows = match state.caches.activation_prices.get(&key) {
        Some(rows) => rows,
        None => {
            let rows = state
                .client
                .fetch_activation_prices(&country, query.date)
                .await;
            state.caches.activation_prices.insert(key, rows)
        }
    };
    Ok(table_response(
        (*rows).clone(),
        "activated aFRR price",
        &country,
    ))
}

#[derive(Serialize)]
#[serde(untagged)]
enum AggregatedBidsData {
    Single(Vec<AggregatedBidsRow>),
    Both(AggregatedBidTables),
}

/// GET /api/v1/aggregated-bids/{country}?date=YYYY-MM-DD&process_type=A67|A68
///
/// Both selection processes are fetched and cached together; the query
/// parameter only selects which table the answer carries.
async fn get_aggregated_bids(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<AggregatedBidsQuery>,
) -> Result<Json<ApiResponse<AggregatedBidsData>>, StatusCode> {
    require_area(&country)?;
    let process_type = query.process_type.as_deref();
    if !matches!(process_type, None | Some("A67") | Some("A68")) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let tables = cached_aggregated_bids(&state, &country, query.date).await;

    let data = match process_type {
        Some("A67") => AggregatedBidsData::Single(tables.central.clone()),
        Some("A68") => AggregatedBidsData::Single(tables.local.clone()),
        _ => AggregatedBidsData::Both((*tables).clone()),
    };

    let empty = match &data {
        AggregatedBidsData::Single(rows) => rows.is_empty(),
        AggregatedBidsData::Both(tables) => tables.central.is_empty() && tables.local.is_empty(),
    };
    if empty {
        return Ok(Json(ApiResponse::error(format!(
            "no aggregated bid data for {country}"
        ))));
    }
    Ok(Json(ApiResponse::success(data)))
}

async fn cached_aggregated_bids(
    state: &AppState,
    country: &str,
    date: NaiveDate,
) -> Arc<AggregatedBidTables> {
    let key = (country.to_string(), date);
    match state.caches.aggregated_bids.get(&key) {
        Some(tables) => tables,
        None => {
            let tables = state.client.fetch_all_aggregated_bids(country, date).await;
            state.caches.aggregated_bids.insert(key, tables)
        }
    }
}

/// GET /api/v1/balancing-bids/{country}?date=YYYY-MM-DD
async fn get_balancing_bids(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<BidPoint>>>, StatusCode> {
    require_area(&country)?;
    let bids = cached_balancing_bids(&state, &country, query.date).await;
    Ok(table_response((*bids).clone(), "balancing bid", &country))
}

async fn cached_balancing_bids(
    state: &AppState,
    country: &str,
    date: NaiveDate,
) -> Arc<Vec<BidPoint>> {
    let key = (country.to_string(), date);
    match state.caches.balancing_bids.get(&key) {
        Some(bids) => bids,
        None => {
            let bids = state.client.fetch_balancing_bids(country, date).await;
            state.caches.balancing_bids.insert(key, bids)
        }
    }
}

/// GET /api/v1/procured-capacity/{country}?date=YYYY-MM-DD
async fn get_procured_capacity(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<CapacityPoint>>>, StatusCode> {
    require_area(&country)?;
    let points = cached_procured_capacity(&state, &country, query.date).await;
    Ok(table_response(
        (*points).clone(),
        "procured capacity",
        &country,
    ))
}

async fn cached_procured_capacity(
    state: &AppState,
    country: &str,
    date: NaiveDate,
) -> Arc<Vec<CapacityPoint>> {
    let key = (country.to_string(), date);
    match state.caches.procured_capacity.get(&key) {
        Some(points) => points,
        None => {
            let points = state.client.fetch_procured_capacity(country, date).await;
            state.caches.procured_capacity.insert(key, points)
        }
    }
}

#[derive(Serialize)]
struct CurvePair {
    up: CumulativeCurve,
    down: CumulativeCurve,
}

/// GET /api/v1/bid-curve/{country}?date=YYYY-MM-DD&hour=0..23
///
/// The hour is local wall clock in the country's timezone.
async fn get_bid_curve(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<CurveQuery>,
) -> Result<Json<ApiResponse<CurvePair>>, StatusCode> {
    let area = require_area(&country)?;
    if query.hour > 23 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let Some(hour_start) = local_hour_to_utc(query.date, query.hour, area.timezone) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let hour_end = hour_start + Duration::hours(1);

    let bids = cached_balancing_bids(&state, &country, query.date).await;
    let in_hour: Vec<_> = bids
        .iter()
        .filter(|bid| bid.timestamp >= hour_start && bid.timestamp < hour_end)
        .cloned()
        .collect();

    let pair = CurvePair {
        up: build_bid_curve(&in_hour, Direction::Up),
        down: build_bid_curve(&in_hour, Direction::Down),
    };
    if pair.up.points.is_empty() && pair.down.points.is_empty() {
        return Ok(Json(ApiResponse::error(format!(
            "no balancing bids for {country} at hour {}",
            query.hour
        ))));
    }
    Ok(Json(ApiResponse::success(pair)))
}

/// GET /api/v1/capacity-curve/{country}?date=YYYY-MM-DD&hour=0..23
async fn get_capacity_curve(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(query): Query<CurveQuery>,
) -> Result<Json<ApiResponse<CurvePair>>, StatusCode> {
    let area = require_area(&country)?;
    if query.hour > 23 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let Some(hour_start) = local_hour_to_utc(query.date, query.hour, area.timezone) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let hour_end = hour_start + Duration::hours(1);

    let points = cached_procured_capacity(&state, &country, query.date).await;
    let in_hour: Vec<_> = points
        .iter()
        .filter(|point| point.timestamp >= hour_start && point.timestamp < hour_end)
        .cloned()
        .collect();

    let pair = CurvePair {
        up: build_capacity_curve(&in_hour, Direction::Up),
        down: build_capacity_curve(&in_hour, Direction::Down),
    };
    if pair.up.points.is_empty() && pair.down.points.is_empty() {
        return Ok(Json(ApiResponse::error(format!(
            "no procured capacity for {country} at hour {}",
            query.hour
        ))));
    }
    Ok(Json(ApiResponse::success(pair)))
}

/// GET /api/v1/countries
async fn list_countries() -> Json<ApiResponse<Vec<String>>> {
    let countries = areas::list_countries()
        .into_iter()
        .map(|code| code.to_string())
        .collect();
    Json(ApiResponse::success(countries))
}

#[derive(Serialize)]
struct AreaInfo {
    code: String,
    name: String,
    tso: Option<String>,
    timezone: String,
}

/// GET /api/v1/areas/{country}
async fn get_country_areas(
    Path(country): Path<String>,
) -> Result<Json<ApiResponse<Vec<AreaInfo>>>, StatusCode> {
    let areas = areas::get_areas_by_country(&country).ok_or(StatusCode::NOT_FOUND)?;
    let info = areas
        .iter()
        .map(|area| AreaInfo {
            code: area.code.to_string(),
            name: area.name.to_string(),
            tso: area.tso.map(|tso| tso.to_string()),
            timezone: area.timezone.name().to_string(),
        })
        .collect();
    Ok(Json(ApiResponse::success(info)))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

pub async fn start_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("ENTSOE_API_KEY")
        .context("ENTSOE_API_KEY environment variable not set")?;

    let state = AppState {
        client: Arc::new(EntsoeClient::new(api_key)),
        caches: Arc::new(AppCaches::new()),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/countries", get(list_countries))
        .route("/api/v1/areas/{country}", get(get_country_areas))
        .route("/api/v1/day-ahead/{country}", get(get_day_ahead))
        .route(
            "/api/v1/activation-prices/{country}",
            get(get_activation_prices),
        )
        .route("/api/v1/aggregated-bids/{country}", get(get_aggregated_bids))
        .route("/api/v1/balancing-bids/{country}", get(get_balancing_bids))
        .route(
            "/api/v1/procured-capacity/{country}",
            get(get_procured_capacity),
        )
        .route("/api/v1/bid-curve/{country}", get(get_bid_curve))
        .route("/api/v1/capacity-curve/{country}", get(get_capacity_curve))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(BIND_ADDR).await?;
    println!("Server running on http://{BIND_ADDR}");
    println!("\nAvailable endpoints:");
    println!("  GET /health");
    println!("  GET /api/v1/countries");
    println!("  GET /api/v1/areas/:country");
    println!("  GET /api/v1/day-ahead/:country?date=YYYY-MM-DD");
    println!("  GET /api/v1/activation-prices/:country?date=YYYY-MM-DD");
    println!("  GET /api/v1/aggregated-bids/:country?date=YYYY-MM-DD&process_type=A67|A68");
    println!("  GET /api/v1/balancing-bids/:country?date=YYYY-MM-DD");
    println!("  GET /api/v1/procured-capacity/:country?date=YYYY-MM-DD");
    println!("  GET /api/v1/bid-curve/:country?date=YYYY-MM-DD&hour=0..23");
    println!("  GET /api/v1/capacity-curve/:country?date=YYYY-MM-DD&hour=0..23");
    println!("\nExamples:");
    println!("  curl 'http://localhost:3046/api/v1/day-ahead/CZ?date=2024-02-01'");

    axum::serve(listener, app).await?;

    Ok(())
}
