//! Name placement on the template.
//!
//! Templates mark the name position with a solid dark underline. The resolver
//! scans a horizontal band of the image for the longest run of near-black
//! pixels and builds the name box on top of it.

use crate::domain::model::{BoundingBox, MarkerBar, TemplateLayout};
use crate::domain::ports::{LayoutResolver, TextMetrics};
use crate::utils::error::{CertError, Result};
use image::{Pixel, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerSettings {
    /// Luma strictly below this counts as part of the bar.
    pub darkness_threshold: u8,
    /// Shortest accepted bar, as a fraction of the image width.
    pub min_run_fraction: f32,
    /// Vertical search band as fractions of the image height.
    pub search_top: f32,
    pub search_bottom: f32,
    /// Extra width allowed on each side of the bar, as a fraction of its length.
    pub padding_fraction: f32,
    pub min_gap: u32,
    pub gap_fraction: f32,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            darkness_threshold: 100,
            min_run_fraction: 0.15,
            search_top: 1.0 / 3.0,
            search_bottom: 2.0 / 3.0,
            padding_fraction: 0.1,
            min_gap: 25,
            gap_fraction: 0.4,
        }
    }
}

pub struct MarkerBarResolver {
    settings: MarkerSettings,
    ascent: f32,
}

impl MarkerBarResolver {
    /// `ascent` is the name font's ascent at the largest size that will be tried.
    pub fn new(settings: MarkerSettings, ascent: f32) -> Self {
        Self { settings, ascent }
    }

    pub fn for_font(settings: MarkerSettings, metrics: &dyn TextMetrics, max_font_size: f32) -> Self {
        Self::new(settings, metrics.ascent(max_font_size))
    }

    pub fn find_marker(&self, template: &RgbImage) -> Option<MarkerBar> {
        let (width, height) = template.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let top = ((height as f32 * self.settings.search_top) as u32).min(height);
        let bottom = ((height as f32 * self.settings.search_bottom) as u32).min(height);

        let mut best: Option<MarkerBar> = None;
        for y in top..bottom {
            if let Some((start, len)) = longest_dark_run(template, y, self.settings.darkness_threshold) {
                if best.map_or(true, |b| len > b.len()) {
                    best = Some(MarkerBar {
                        y,
                        x_start: start,
                        x_end: start + len - 1,
                    });
                }
            }
        }

        let min_len = (width as f32 * self.settings.min_run_fraction).ceil().max(1.0) as u32;
        best.filter(|bar| bar.len() >= min_len)
    }
}

impl LayoutResolver for MarkerBarResolver {
    fn resolve(&self, template: &RgbImage) -> Result<TemplateLayout> {
        let (width, height) = template.dimensions();
        let marker = self.find_marker(template).ok_or_else(|| CertError::LayoutNotFound {
            message: format!(
                "no dark bar of at least {:.0}% width between {:.0}% and {:.0}% of a {}x{} image",
                self.settings.min_run_fraction * 100.0,
                self.settings.search_top * 100.0,
                self.settings.search_bottom * 100.0,
                width,
                height
            ),
        })?;

        tracing::debug!(
            "Marker bar at y={} spanning x={}..={}",
            marker.y,
            marker.x_start,
            marker.x_end
        );

        let padding = (marker.len() as f32 * self.settings.padding_fraction) as u32;
        let left = marker.x_start.saturating_sub(padding);
        let right = (marker.x_end + 1 + padding).min(width);

        let ascent = self.ascent.ceil().max(1.0) as u32;
        let gap = self.settings.min_gap.max((self.ascent * self.settings.gap_fraction) as u32);
        let baseline_y = marker.y.saturating_sub(gap);
        let box_top = baseline_y.saturating_sub(ascent);

        if baseline_y == 0 || baseline_y == box_top {
            return Err(CertError::LayoutNotFound {
                message: format!("marker at y={} leaves no room for text above it", marker.y),
            });
        }

        let layout = TemplateLayout {
            bounding_box: BoundingBox {
                x: left,
                y: box_top,
                width: right - left,
                height: baseline_y - box_top,
            },
            baseline_y,
            marker: Some(marker),
        };

        tracing::info!(
            "📐 Name box {}x{} at ({}, {}), baseline y={}",
            layout.bounding_box.width,
            layout.bounding_box.height,
            layout.bounding_box.x,
            layout.bounding_box.y,
            layout.baseline_y
        );
        Ok(layout)
    }
}

/// Explicit coordinates for templates that do not follow the underline convention.
pub struct FixedLayoutResolver {
    bounding_box: BoundingBox,
}

impl FixedLayoutResolver {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self { bounding_box }
    }
}

impl LayoutResolver for FixedLayoutResolver {
    fn resolve(&self, template: &RgbImage) -> Result<TemplateLayout> {
        let (width, height) = template.dimensions();
        let b = self.bounding_box;
        let does_not_fit = || CertError::LayoutNotFound {
            message: format!(
                "fixed box {}x{} at ({}, {}) does not fit a {}x{} template",
                b.width, b.height, b.x, b.y, width, height
            ),
        };

        let (right, bottom) = match (b.right(), b.bottom()) {
            (Some(right), Some(bottom)) => (right, bottom),
            _ => return Err(does_not_fit()),
        };
        if b.width == 0 || b.height == 0 || right > width || bottom > height {
            return Err(does_not_fit());
        }

        Ok(TemplateLayout {
            bounding_box: b,
            baseline_y: bottom,
            marker: None,
        })
    }
}

/// Start and length of the longest dark run in row `y`.
fn longest_dark_run(image: &RgbImage, y: u32, threshold: u8) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32)> = None;
    let mut run_start = 0;
    let mut run_len = 0;

    for x in 0..image.width() {
        let luma = image.get_pixel(x, y).to_luma().0[0];
        if luma < threshold {
            if run_len == 0 {
                run_start = x;
            }
            run_len += 1;
            if best.map_or(true, |(_, len)| run_len > len) {
                best = Some((run_start, run_len));
            }
        } else {
            run_len = 0;
        }
    }

    best
}
