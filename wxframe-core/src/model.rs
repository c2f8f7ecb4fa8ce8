use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use crate::error::StageError;

/// Physical unit carried alongside every numeric series.
///
/// Values keep the unit the upstream payload declared; conversions happen
/// explicitly at rendering time via [`Unit::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Fahrenheit,
    KilometersPerHour,
    MetersPerSecond,
    Millimeters,
    Inches,
    Percent,
    Degrees,
}

impl Unit {
    /// Map a WMO `uom` string (e.g. `"wmoUnit:degC"`) to a unit tag.
    pub fn from_uom(uom: &str) -> Option<Unit> {
        let code = uom.rsplit(':').next().unwrap_or(uom);
        match code {
            "degC" => Some(Unit::Celsius),
            "degF" => Some(Unit::Fahrenheit),
            "km_h-1" => Some(Unit::KilometersPerHour),
            "m_s-1" => Some(Unit::MetersPerSecond),
            "mm" => Some(Unit::Millimeters),
            "in" => Some(Unit::Inches),
            "percent" => Some(Unit::Percent),
            "degree_(angle)" => Some(Unit::Degrees),
            _ => None,
        }
    }

    /// Convert `value` from `self` into `to`. Returns `None` for
    /// incompatible dimensions.
    pub fn convert(self, value: f64, to: Unit) -> Option<f64> {
        if self == to {
            return Some(value);
        }
        match (self, to) {
            (Unit::Fahrenheit, Unit::Celsius) => Some((value - 32.0) * 5.0 / 9.0),
            (Unit::Celsius, Unit::Fahrenheit) => Some(value * 9.0 / 5.0 + 32.0),
            (Unit::MetersPerSecond, Unit::KilometersPerHour) => Some(value * 3.6),
            (Unit::KilometersPerHour, Unit::MetersPerSecond) => Some(value / 3.6),
            (Unit::Inches, Unit::Millimeters) => Some(value * 25.4),
            (Unit::Millimeters, Unit::Inches) => Some(value / 25.4),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Celsius => "C",
            Unit::Fahrenheit => "F",
            Unit::KilometersPerHour => "km/h",
            Unit::MetersPerSecond => "m/s",
            Unit::Millimeters => "mm",
            Unit::Inches => "in",
            Unit::Percent => "%",
            Unit::Degrees => "deg",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One timestamped value, localized to the resolved timezone.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub time: DateTime<Tz>,
    pub value: f64,
}

/// An ordered, unit-tagged sequence of samples.
///
/// Timestamps are kept in the order the API returned them; different series
/// from the same response do not share a time grid.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub label: String,
    pub unit: Unit,
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Series as `(epoch seconds, value)` points with values converted into
    /// `unit`. Incompatible units are a schema failure.
    pub fn points_in(&self, unit: Unit) -> Result<Vec<(f64, f64)>, StageError> {
        self.samples
            .iter()
            .map(|sample| {
                let value = self.unit.convert(sample.value, unit).ok_or_else(|| {
                    StageError::schema(
                        "unit conversion",
                        format!("{}: cannot convert {} to {}", self.label, self.unit, unit),
                    )
                })?;
                Ok((sample.time.timestamp() as f64, value))
            })
            .collect()
    }
}

/// A narrative forecast period ("Tonight", "Friday", ...).
#[derive(Debug, Clone)]
pub struct ForecastPeriod {
    pub name: String,
    pub detailed_forecast: String,
    pub start_time: DateTime<FixedOffset>,
}

/// Result of the point lookup: display label, timezone and the two
/// follow-up URLs.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    /// "City, ST"
    pub name: String,
    pub timezone: Tz,
    pub forecast_url: String,
    pub grid_data_url: String,
}

/// The eight numeric series extracted from one grid-data response.
#[derive(Debug, Clone)]
pub struct GridSeries {
    pub temperature: TimeSeries,
    pub apparent_temperature: TimeSeries,
    pub wind_direction: TimeSeries,
    pub wind_speed: TimeSeries,
    pub wind_gust: TimeSeries,
    pub precip_probability: TimeSeries,
    pub snowfall_amount: TimeSeries,
    pub precip_amount: TimeSeries,
}

impl GridSeries {
    pub fn all(&self) -> [&TimeSeries; 8] {
        [
            &self.temperature,
            &self.apparent_temperature,
            &self.wind_direction,
            &self.wind_speed,
            &self.wind_gust,
            &self.precip_probability,
            &self.snowfall_amount,
            &self.precip_amount,
        ]
    }
}

/// Everything the chart renderer needs from the three forecast calls.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub location: ResolvedLocation,
    pub today: ForecastPeriod,
    pub tomorrow: ForecastPeriod,
    pub grid: GridSeries,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn uom_strings_map_to_units() {
        assert_eq!(Unit::from_uom("wmoUnit:degC"), Some(Unit::Celsius));
        assert_eq!(Unit::from_uom("wmoUnit:km_h-1"), Some(Unit::KilometersPerHour));
        assert_eq!(Unit::from_uom("wmoUnit:percent"), Some(Unit::Percent));
        assert_eq!(Unit::from_uom("wmoUnit:mm"), Some(Unit::Millimeters));
        assert_eq!(Unit::from_uom("wmoUnit:degree_(angle)"), Some(Unit::Degrees));
        assert_eq!(Unit::from_uom("wmoUnit:furlong"), None);
    }

    #[test]
    fn conversions_are_explicit_and_exact() {
        assert_eq!(Unit::Fahrenheit.convert(212.0, Unit::Celsius), Some(100.0));
        assert_eq!(Unit::Celsius.convert(100.0, Unit::Fahrenheit), Some(212.0));
        assert_eq!(
            Unit::MetersPerSecond.convert(10.0, Unit::KilometersPerHour),
            Some(36.0)
        );
        assert_eq!(Unit::Inches.convert(1.0, Unit::Millimeters), Some(25.4));
        assert_eq!(Unit::Celsius.convert(1.0, Unit::Millimeters), None);
    }

    #[test]
    fn points_in_converts_values() {
        let tz = chrono_tz::America::New_York;
        let series = TimeSeries {
            label: "Temperature".into(),
            unit: Unit::Fahrenheit,
            samples: vec![Sample {
                time: tz.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                value: 32.0,
            }],
        };
        let points = series.points_in(Unit::Celsius).unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].1).abs() < 1e-9);
    }

    #[test]
    fn points_in_rejects_incompatible_units() {
        let tz = chrono_tz::America::New_York;
        let series = TimeSeries {
            label: "Wind Speed".into(),
            unit: Unit::KilometersPerHour,
            samples: vec![Sample {
                time: tz.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                value: 5.0,
            }],
        };
        let err = series.points_in(Unit::Celsius).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
