//! Client for the National Weather Service forecast API.
//!
//! Three sequential calls: point lookup by lat/long, narrative periods from
//! the simple-forecast URL, and the grid-data payload the eight numeric
//! series come from. Any failure aborts the stage before rendering.

use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;

use crate::error::StageError;
use crate::model::{Forecast, ForecastPeriod, GridSeries, ResolvedLocation, Sample, TimeSeries, Unit};

const USER_AGENT: &str = concat!("wxframe/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client with the User-Agent and timeout the upstream service expects.
/// Timeouts surface as the same failure class as non-200 responses.
pub fn default_client() -> Result<Client, StageError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(StageError::ClientBuild)
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Client,
    base_url: String,
}

impl ForecastClient {
    pub fn new(base_url: &str) -> Result<Self, StageError> {
        Ok(Self {
            http: default_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run the full fetch pipeline: resolve the location, pick today's and
    /// tomorrow's narratives, pull the grid series.
    pub async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<Forecast, StageError> {
        let location = self.resolve_location(latitude, longitude).await?;
        log::info!("resolved {} ({})", location.name, location.timezone);

        let periods = self.narrative_periods(&location.forecast_url).await?;
        let today = now.with_timezone(&location.timezone).date_naive();
        let (today_period, tomorrow_period) =
            select_daily_periods(&periods, location.timezone, today)?;
        let (today_period, tomorrow_period) = (today_period.clone(), tomorrow_period.clone());

        let grid = self
            .grid_series(&location.grid_data_url, location.timezone)
            .await?;

        Ok(Forecast {
            location,
            today: today_period,
            tomorrow: tomorrow_period,
            grid,
        })
    }

    pub async fn resolve_location(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ResolvedLocation, StageError> {
        let url = format!("{}/points/{:.4},{:.4}", self.base_url, latitude, longitude);
        let body = self.get_body(&url, "point lookup").await?;
        parse_points(&body)
    }

    pub async fn narrative_periods(&self, url: &str) -> Result<Vec<ForecastPeriod>, StageError> {
        let body = self.get_body(url, "simple forecast").await?;
        parse_periods(&body)
    }

    pub async fn grid_series(&self, url: &str, tz: Tz) -> Result<GridSeries, StageError> {
        let body = self.get_body(url, "grid data").await?;
        parse_grid(&body, tz)
    }

    async fn get_body(&self, url: &str, what: &str) -> Result<String, StageError> {
        log::debug!("GET {url} ({what})");

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| StageError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| StageError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            log::debug!("{what} error body: {}", truncate_body(&body));
            return Err(StageError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        Ok(body)
    }
}

/// "Today" is the first period starting on the current local date,
/// "tomorrow" the first starting on the next date. Replaces the fragile
/// fixed-position assumption about the API's period ordering; a short
/// period list is a schema failure instead of an out-of-range index.
pub fn select_daily_periods(
    periods: &[ForecastPeriod],
    tz: Tz,
    today: NaiveDate,
) -> Result<(&ForecastPeriod, &ForecastPeriod), StageError> {
    let starting_on = |date: NaiveDate| {
        periods
            .iter()
            .find(move |p| p.start_time.with_timezone(&tz).date_naive() == date)
    };

    let today_period = starting_on(today).ok_or_else(|| {
        StageError::schema("simple forecast", format!("no narrative period starts on {today}"))
    })?;

    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| StageError::schema("simple forecast", "date overflow"))?;
    let tomorrow_period = starting_on(tomorrow).ok_or_else(|| {
        StageError::schema(
            "simple forecast",
            format!("no narrative period starts on {tomorrow}"),
        )
    })?;

    Ok((today_period, tomorrow_period))
}

/// Parse a `validTime` entry such as `2024-01-15T13:00:00+00:00/PT1H`:
/// the wall-clock part is kept, the offset and duration suffix are
/// discarded, and the result is localized to the resolved timezone.
///
/// DST transitions: an ambiguous wall clock (fall back) resolves to the
/// earlier instant; a non-existent one (spring forward) is shifted an hour
/// forward to the first valid instant past the gap.
pub(crate) fn parse_valid_time(raw: &str, tz: Tz) -> Result<DateTime<Tz>, StageError> {
    let wall = raw
        .get(..19)
        .ok_or_else(|| StageError::schema("grid data", format!("truncated validTime '{raw}'")))?;
    let naive = NaiveDateTime::parse_from_str(wall, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| StageError::schema("grid data", format!("bad validTime '{raw}': {e}")))?;

    for candidate in [naive, naive + chrono::Duration::hours(1)] {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Ok(dt),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => continue,
        }
    }
    Err(StageError::schema(
        "grid data",
        format!("validTime '{raw}' does not exist in {tz}"),
    ))
}

// --- payload shapes -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    forecast: String,
    forecast_grid_data: String,
    time_zone: String,
    relative_location: RelativeLocation,
}

#[derive(Debug, Deserialize)]
struct RelativeLocation {
    properties: RelativeLocationProperties,
}

#[derive(Debug, Deserialize)]
struct RelativeLocationProperties {
    city: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<PeriodPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodPayload {
    name: String,
    detailed_forecast: String,
    start_time: DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    properties: GridProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    temperature: GridLayer,
    apparent_temperature: GridLayer,
    wind_direction: GridLayer,
    wind_speed: GridLayer,
    wind_gust: GridLayer,
    probability_of_precipitation: GridLayer,
    snowfall_amount: GridLayer,
    quantitative_precipitation: GridLayer,
}

#[derive(Debug, Deserialize)]
struct GridLayer {
    uom: String,
    values: Vec<GridValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridValue {
    valid_time: String,
    value: Option<f64>,
}

// --- parsing --------------------------------------------------------------

pub(crate) fn parse_points(body: &str) -> Result<ResolvedLocation, StageError> {
    let parsed: PointsResponse = serde_json::from_str(body)
        .map_err(|e| StageError::schema("point lookup", e.to_string()))?;
    let props = parsed.properties;

    let timezone: Tz = props.time_zone.parse().map_err(|_| {
        StageError::schema(
            "point lookup",
            format!("unknown timezone '{}'", props.time_zone),
        )
    })?;

    let loc = props.relative_location.properties;
    Ok(ResolvedLocation {
        name: format!("{}, {}", loc.city, loc.state),
        timezone,
        forecast_url: props.forecast,
        grid_data_url: props.forecast_grid_data,
    })
}

pub(crate) fn parse_periods(body: &str) -> Result<Vec<ForecastPeriod>, StageError> {
    let parsed: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| StageError::schema("simple forecast", e.to_string()))?;

    Ok(parsed
        .properties
        .periods
        .into_iter()
        .map(|p| ForecastPeriod {
            name: p.name,
            detailed_forecast: p.detailed_forecast,
            start_time: p.start_time,
        })
        .collect())
}

pub(crate) fn parse_grid(body: &str, tz: Tz) -> Result<GridSeries, StageError> {
    let parsed: GridResponse =
        serde_json::from_str(body).map_err(|e| StageError::schema("grid data", e.to_string()))?;
    let p = parsed.properties;

    Ok(GridSeries {
        temperature: layer_series(p.temperature, "Temperature", tz)?,
        apparent_temperature: layer_series(p.apparent_temperature, "Feels-Like Temperature", tz)?,
        wind_direction: layer_series(p.wind_direction, "Wind Direction", tz)?,
        wind_speed: layer_series(p.wind_speed, "Wind Speed", tz)?,
        wind_gust: layer_series(p.wind_gust, "Wind Gust", tz)?,
        precip_probability: layer_series(
            p.probability_of_precipitation,
            "Precip Probability",
            tz,
        )?,
        snowfall_amount: layer_series(p.snowfall_amount, "Snowfall Amount", tz)?,
        precip_amount: layer_series(p.quantitative_precipitation, "Precipitation Amount", tz)?,
    })
}

fn layer_series(layer: GridLayer, label: &str, tz: Tz) -> Result<TimeSeries, StageError> {
    let unit = Unit::from_uom(&layer.uom).ok_or_else(|| {
        StageError::schema("grid data", format!("{label}: unrecognized unit '{}'", layer.uom))
    })?;

    let mut samples = Vec::with_capacity(layer.values.len());
    for entry in layer.values {
        // upstream emits null for slots it has no value for
        let Some(value) = entry.value else { continue };
        samples.push(Sample {
            time: parse_valid_time(&entry.valid_time, tz)?,
            value,
        });
    }

    if samples.is_empty() {
        return Err(StageError::schema(
            "grid data",
            format!("{label}: series is empty"),
        ));
    }

    Ok(TimeSeries {
        label: label.to_string(),
        unit,
        samples,
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}
