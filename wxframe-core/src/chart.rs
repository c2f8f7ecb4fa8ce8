//! Four-panel forecast chart.
//!
//! Panel 0 is the narrative text, panels 1-3 share a time axis clipped to
//! the forward window: temperature, wind (with direction glyphs riding the
//! interpolated speed curve), and precipitation with a secondary
//! accumulation axis. Output is a PNG whose background is keyed to
//! transparent so the compositor can use it as a cut-out mask.

use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use image::RgbaImage;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::config::Config;
use crate::error::StageError;
use crate::model::{Forecast, Unit};
use crate::series::{CompassGlyph, clip_to_window, interp_points};

const CHART_BG: RGBColor = RGBColor(14, 14, 16);
const LIGHT_GREY: RGBColor = RGBColor(211, 211, 211);
const BAR_HALF_WIDTH_SECS: f64 = 1800.0;

fn render_err<E: std::fmt::Display>(err: E) -> StageError {
    StageError::Render(err.to_string())
}

/// Render the forecast chart for the window `now .. now + forecast_hours`
/// and write it to `out_path`. `now` is a parameter so reruns over the same
/// data are reproducible.
pub fn render_chart(
    forecast: &Forecast,
    config: &Config,
    now: DateTime<Tz>,
    out_path: &Path,
) -> Result<(), StageError> {
    ensure_font()?;

    let (width, height) = (config.chart_width, config.chart_height);
    let mut buf = vec![0u8; (width as usize) * (height as usize) * 3];
    draw_panels(forecast, config, now, &mut buf, (width, height))?;

    let chart = keyed_to_rgba(&buf, width, height);
    chart.save(out_path)?;
    log::info!("wrote forecast chart to {}", out_path.display());
    Ok(())
}

fn draw_panels(
    forecast: &Forecast,
    config: &Config,
    now: DateTime<Tz>,
    buf: &mut [u8],
    dimensions: (u32, u32),
) -> Result<(), StageError> {
    let tz = forecast.location.timezone;
    let start = now.timestamp() as f64;
    let end = start + config.forecast_hours as f64 * 3600.0;
    let x_range = start..end;
    let x_fmt = move |x: &f64| hour_weekday(*x, tz);

    let root = BitMapBackend::with_buffer(buf, dimensions).into_drawing_area();
    root.fill(&CHART_BG).map_err(render_err)?;
    let panels = root.split_evenly((4, 1));

    draw_text_panel(&panels[0], forecast, config.wrap_columns)?;
    draw_temperature_panel(&panels[1], forecast, &x_range, &x_fmt)?;
    draw_wind_panel(&panels[2], forecast, &x_range, &x_fmt)?;
    draw_precip_panel(&panels[3], forecast, &x_range, &x_fmt)?;

    root.present().map_err(render_err)?;
    Ok(())
}

/// Tick label: 12-hour clock plus weekday, in the resolved timezone.
fn hour_weekday(epoch: f64, tz: Tz) -> String {
    match Utc.timestamp_opt(epoch as i64, 0) {
        chrono::LocalResult::Single(dt) => dt
            .with_timezone(&tz)
            .format("%l%p %a")
            .to_string()
            .trim_start()
            .to_string(),
        _ => String::new(),
    }
}

fn draw_text_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    forecast: &Forecast,
    wrap_columns: usize,
) -> Result<(), StageError> {
    let (panel_width, _) = area.dim_in_pixel();
    let style = ("sans-serif", 15)
        .into_font()
        .color(&WHITE)
        .pos(Pos::new(HPos::Center, VPos::Top));

    let mut lines = vec![format!("Forecast for {}", forecast.location.name), String::new()];
    for period in [&forecast.today, &forecast.tomorrow] {
        lines.extend(wrap_text(
            &format!("{}: {}", period.name, period.detailed_forecast),
            wrap_columns,
        ));
        lines.push(String::new());
    }

    let line_height = 17;
    let mut y = 10i32;
    for line in &lines {
        if !line.is_empty() {
            area.draw(&Text::new(line.clone(), ((panel_width / 2) as i32, y), style.clone()))
                .map_err(render_err)?;
        }
        y += line_height;
    }
    Ok(())
}

fn draw_temperature_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    forecast: &Forecast,
    x_range: &Range<f64>,
    x_fmt: &dyn Fn(&f64) -> String,
) -> Result<(), StageError> {
    let temperature = forecast.grid.temperature.points_in(Unit::Celsius)?;
    let feels_like = forecast.grid.apparent_temperature.points_in(Unit::Celsius)?;
    let temperature = clip_to_window(&temperature, x_range.start, x_range.end);
    let feels_like = clip_to_window(&feels_like, x_range.start, x_range.end);

    let (y_lo, y_hi) = value_bounds(&[&temperature, &feels_like]);
    let mut chart = ChartBuilder::on(area)
        .margin(6)
        .x_label_area_size(34)
        .y_label_area_size(44)
        .build_cartesian_2d(x_range.clone(), y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .axis_style(WHITE.mix(0.8))
        .label_style(("sans-serif", 12).into_font().color(&WHITE))
        .x_label_formatter(x_fmt)
        .y_desc("Temperature [C]")
        .axis_desc_style(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(temperature.iter().copied(), &LIGHT_GREY))
        .map_err(render_err)?
        .label("True Temperature")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], LIGHT_GREY));

    chart
        .draw_series(DashedLineSeries::new(
            feels_like.iter().copied(),
            6,
            4,
            ShapeStyle::from(&WHITE),
        ))
        .map_err(render_err)?
        .label("Feels Like")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], WHITE));

    chart
        .configure_series_labels()
        .border_style(TRANSPARENT)
        .label_font(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    Ok(())
}

fn draw_wind_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    forecast: &Forecast,
    x_range: &Range<f64>,
    x_fmt: &dyn Fn(&f64) -> String,
) -> Result<(), StageError> {
    let speed_full = forecast.grid.wind_speed.points_in(Unit::KilometersPerHour)?;
    let gust_full = forecast.grid.wind_gust.points_in(Unit::KilometersPerHour)?;
    let directions = forecast.grid.wind_direction.points_in(Unit::Degrees)?;

    let speed = clip_to_window(&speed_full, x_range.start, x_range.end);
    let gust = clip_to_window(&gust_full, x_range.start, x_range.end);

    // glyphs ride the speed curve, interpolated against the full series so
    // samples near the window edge extrapolate instead of clamping
    let arrows: Vec<(f64, f64, f64)> = directions
        .iter()
        .filter(|(t, _)| *t >= x_range.start && *t <= x_range.end)
        .filter_map(|&(t, degrees)| interp_points(&speed_full, t).map(|y| (t, y, degrees)))
        .collect();

    let arrow_heights: Vec<(f64, f64)> = arrows.iter().map(|&(t, y, _)| (t, y)).collect();
    let (y_lo, y_hi) = value_bounds(&[&speed, &gust, &arrow_heights]);

    let mut chart = ChartBuilder::on(area)
        .margin(6)
        .x_label_area_size(34)
        .y_label_area_size(44)
        .build_cartesian_2d(x_range.clone(), y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .axis_style(WHITE.mix(0.8))
        .label_style(("sans-serif", 12).into_font().color(&WHITE))
        .x_label_formatter(x_fmt)
        .y_desc("Wind Speed [km/h]")
        .axis_desc_style(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(speed.iter().copied(), &LIGHT_GREY))
        .map_err(render_err)?
        .label("Wind Speed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], LIGHT_GREY));

    chart
        .draw_series(DashedLineSeries::new(
            gust.iter().copied(),
            6,
            4,
            ShapeStyle::from(&WHITE),
        ))
        .map_err(render_err)?
        .label("Gust Speed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], WHITE));

    let arrow_style = ShapeStyle::from(&WHITE).stroke_width(2);
    chart
        .draw_series(arrows.iter().map(|&(t, y, degrees)| {
            let glyph = CompassGlyph::from_degrees(degrees);
            EmptyElement::at((t, y)) + PathElement::new(glyph.outline(), arrow_style)
        }))
        .map_err(render_err)?;

    chart
        .configure_series_labels()
        .border_style(TRANSPARENT)
        .label_font(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    Ok(())
}

fn draw_precip_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    forecast: &Forecast,
    x_range: &Range<f64>,
    x_fmt: &dyn Fn(&f64) -> String,
) -> Result<(), StageError> {
    let probability = forecast.grid.precip_probability.points_in(Unit::Percent)?;
    let rain = forecast.grid.precip_amount.points_in(Unit::Millimeters)?;
    let snow = forecast.grid.snowfall_amount.points_in(Unit::Millimeters)?;

    let probability = clip_to_window(&probability, x_range.start, x_range.end);
    let in_window = |&&(t, _): &&(f64, f64)| t >= x_range.start && t <= x_range.end;
    let rain: Vec<(f64, f64)> = rain.iter().filter(in_window).copied().collect();
    let snow: Vec<(f64, f64)> = snow.iter().filter(in_window).copied().collect();

    let amount_hi = rain
        .iter()
        .chain(snow.iter())
        .map(|&(_, v)| v)
        .fold(1.0f64, f64::max)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .margin(6)
        .x_label_area_size(34)
        .y_label_area_size(44)
        .right_y_label_area_size(44)
        .build_cartesian_2d(x_range.clone(), 0.0..105.0)
        .map_err(render_err)?
        .set_secondary_coord(x_range.clone(), 0.0..amount_hi);

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .axis_style(WHITE.mix(0.8))
        .label_style(("sans-serif", 12).into_font().color(&WHITE))
        .x_label_formatter(x_fmt)
        .y_desc("Precip Probability [%]")
        .axis_desc_style(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    chart
        .configure_secondary_axes()
        .axis_style(WHITE.mix(0.8))
        .label_style(("sans-serif", 12).into_font().color(&WHITE))
        .y_desc("Precipitation Amount [mm]")
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(probability.iter().copied(), &WHITE))
        .map_err(render_err)?;

    chart
        .draw_secondary_series(rain.iter().map(|&(t, v)| {
            Rectangle::new(
                [(t - BAR_HALF_WIDTH_SECS, 0.0), (t + BAR_HALF_WIDTH_SECS, v)],
                LIGHT_GREY.mix(0.5).filled(),
            )
        }))
        .map_err(render_err)?
        .label("Rain")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], LIGHT_GREY));

    chart
        .draw_secondary_series(snow.iter().map(|&(t, v)| {
            Rectangle::new(
                [(t - BAR_HALF_WIDTH_SECS, 0.0), (t + BAR_HALF_WIDTH_SECS, v)],
                WHITE.mix(0.5).filled(),
            )
        }))
        .map_err(render_err)?
        .label("Snow")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], WHITE));

    chart
        .configure_series_labels()
        .border_style(TRANSPARENT)
        .label_font(("sans-serif", 12).into_font().color(&WHITE))
        .draw()
        .map_err(render_err)?;

    Ok(())
}

/// Shared y-bounds with a small pad; degenerate or empty input falls back
/// to a unit range.
fn value_bounds(series: &[&[(f64, f64)]]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for points in series {
        for &(_, v) in *points {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.08;
    (lo - pad, hi + pad)
}

/// Greedy word wrap at `columns` characters; words longer than a line get
/// their own line.
pub(crate) fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= columns {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// The bitmap backend has no alpha channel; pixels still carrying the fill
/// colour become fully transparent so the compositor's mask works.
fn keyed_to_rgba(buf: &[u8], width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let i = ((y * width + x) * 3) as usize;
        let (r, g, b) = (buf[i], buf[i + 1], buf[i + 2]);
        if (r, g, b) == (CHART_BG.0, CHART_BG.1, CHART_BG.2) {
            image::Rgba([0, 0, 0, 0])
        } else {
            image::Rgba([r, g, b, 255])
        }
    })
}

/// The ab_glyph text backend needs a registered font; pick up a common
/// system TTF once per process.
fn ensure_font() -> Result<(), StageError> {
    static FONT: OnceLock<Result<(), String>> = OnceLock::new();
    FONT.get_or_init(|| {
        const CANDIDATES: &[&str] = &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ];
        for path in CANDIDATES {
            if let Ok(bytes) = std::fs::read(path) {
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if plotters::style::register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                    log::debug!("registered chart font from {path}");
                    return Ok(());
                }
            }
        }
        Err("no usable TTF font found for chart text".to_string())
    })
    .clone()
    .map_err(StageError::Render)
}
