//! Final composite: satellite background, translucent backdrop, chart.

use image::{DynamicImage, Pixel, Rgba, RgbaImage, RgbImage, imageops};

use crate::config::Config;
use crate::error::StageError;

/// Read the two stage outputs, composite them, and write the opaque result.
pub fn compose(config: &Config) -> Result<(), StageError> {
    let background = image::open(&config.satellite_path)?.to_rgba8();
    let chart = image::open(&config.chart_path)?.to_rgba8();

    let composite = composite_images(&background, &chart, config);
    composite.save(&config.composite_path)?;

    log::info!("wrote composite to {}", config.composite_path.display());
    Ok(())
}

/// Crop the background, blend the backdrop rectangle, paste the chart with
/// its alpha as the mask, and flatten to an opaque image.
pub fn composite_images(background: &RgbaImage, chart: &RgbaImage, config: &Config) -> RgbImage {
    let (crop_x, crop_y, crop_w, crop_h) = crop_box(
        background.width(),
        background.height(),
        config.canvas_width,
        config.canvas_height,
    );
    let mut canvas = imageops::crop_imm(background, crop_x, crop_y, crop_w, crop_h).to_image();

    let (x0, y0, x1, y1) = backdrop_rect(
        crop_h,
        chart.width(),
        chart.height(),
        config.margin_px,
        config.backdrop_border_px,
    );
    let tint = Rgba(config.backdrop_rgba);
    for y in y0..y1.min(crop_h) {
        for x in x0..x1.min(crop_w) {
            canvas.get_pixel_mut(x, y).blend(&tint);
        }
    }

    let (chart_x, chart_y) = chart_origin(crop_h, chart.height(), config.margin_px);
    imageops::overlay(&mut canvas, chart, i64::from(chart_x), i64::from(chart_y));

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Horizontally centered crop anchored at the top, clamped to the source.
pub fn crop_box(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32, u32, u32) {
    let left = src_w.saturating_sub(target_w) / 2;
    (left, 0, target_w.min(src_w), target_h.min(src_h))
}

/// Chart top-left corner: fixed margin from the left edge, bottom of the
/// chart a fixed margin above the canvas bottom.
pub fn chart_origin(canvas_h: u32, chart_h: u32, margin: u32) -> (u32, u32) {
    (margin, canvas_h.saturating_sub(chart_h + margin))
}

/// Backdrop rectangle: the chart placement region expanded by the border
/// inset on every side. Returned as (x0, y0, x1, y1).
pub fn backdrop_rect(
    canvas_h: u32,
    chart_w: u32,
    chart_h: u32,
    margin: u32,
    border: u32,
) -> (u32, u32, u32, u32) {
    let x0 = margin.saturating_sub(border);
    let y0 = canvas_h.saturating_sub(chart_h + margin + border);
    let x1 = chart_w + margin + border;
    let y1 = canvas_h.saturating_sub(margin.saturating_sub(border));
    (x0, y0, x1, y1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_horizontally_centered_and_top_anchored() {
        let (x, y, w, h) = crop_box(5000, 3000, 3840, 2160);
        assert_eq!((x, y), (580, 0));
        assert_eq!((x + w, y + h), (4420, 2160));
    }

    #[test]
    fn crop_clamps_to_small_sources() {
        let (x, y, w, h) = crop_box(1920, 1080, 3840, 2160);
        assert_eq!((x, y, w, h), (0, 0, 1920, 1080));
    }

    #[test]
    fn chart_sits_a_fixed_margin_above_the_bottom() {
        assert_eq!(chart_origin(2160, 600, 64), (64, 1496));
    }

    #[test]
    fn backdrop_surrounds_the_chart_region() {
        let (x0, y0, x1, y1) = backdrop_rect(2160, 720, 600, 64, 10);
        assert_eq!((x0, y0), (54, 1486));
        assert_eq!((x1, y1), (794, 2106));
    }

    fn small_config() -> Config {
        Config {
            canvas_width: 100,
            canvas_height: 100,
            margin_px: 4,
            backdrop_border_px: 2,
            backdrop_rgba: [100, 100, 100, 100],
            ..Config::default()
        }
    }

    #[test]
    fn opaque_chart_pixels_replace_the_background() {
        let background = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        let chart = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));

        let out = composite_images(&background, &chart, &small_config());
        assert_eq!(out.dimensions(), (100, 100));

        // chart origin: (4, 100 - 10 - 4) = (4, 86)
        assert_eq!(out.get_pixel(5, 87).0, [255, 0, 0]);
        // far away from the chart region: untouched background
        assert_eq!(out.get_pixel(50, 10).0, [0, 0, 255]);
    }

    #[test]
    fn transparent_chart_pixels_show_the_tinted_backdrop() {
        let background = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 255, 255]));
        // fully transparent chart: only the backdrop affects the region
        let chart = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));

        let out = composite_images(&background, &chart, &small_config());
        let under_chart = out.get_pixel(5, 87).0;
        assert_ne!(under_chart, [0, 0, 255], "backdrop tint missing");
        // outside the backdrop rectangle the background is untouched
        assert_eq!(out.get_pixel(50, 10).0, [0, 0, 255]);
    }

    #[test]
    fn output_is_opaque() {
        let background = RgbaImage::from_pixel(100, 100, Rgba([10, 20, 30, 255]));
        let chart = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 128]));
        // RgbImage has no alpha channel at all; this is the flatten step
        let out = composite_images(&background, &chart, &small_config());
        assert_eq!(out.get_pixel(0, 0).channels().len(), 3);
    }
}
