//! Core library for the `wxframe` dashboard pipeline.
//!
//! This crate defines:
//! - Configuration for all three stages
//! - The forecast API client and domain model
//! - Time-series alignment, chart rendering, and image compositing
//!
//! It is used by `wxframe-cli`, but can also be reused by other binaries or
//! services.

pub mod chart;
pub mod compose;
pub mod config;
pub mod error;
pub mod model;
pub mod nws;
pub mod satellite;
pub mod series;

pub use config::Config;
pub use error::StageError;
pub use model::{Forecast, ForecastPeriod, GridSeries, ResolvedLocation, Sample, TimeSeries, Unit};
pub use nws::ForecastClient;
