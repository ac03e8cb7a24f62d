//! Raster drawing surface and plot geometry for the chart renderers.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};

use super::palette;
use super::ChartError;
use crate::config::ChartDimensions;

/// Angular resolution of pie wedges, in radians per polygon edge.
const ARC_STEP: f32 = 0.02;

/// Horizontal text anchoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

/// An RGB image plus the optional font used for labels.
///
/// Without a font every text call is a no-op and text measures as zero width, so charts still
/// render their geometry.
pub struct Canvas<'f> {
    image: RgbImage,
    font: Option<&'f Font<'static>>,
}

impl<'f> Canvas<'f> {
    /// Creates a white canvas.
    pub fn new(dimensions: ChartDimensions, font: Option<&'f Font<'static>>) -> Self {
        let image = RgbImage::from_pixel(dimensions.width, dimensions.height, palette::WHITE);
        Self { image, font }
    }

    pub fn width(&self) -> f32 {
        self.image.width() as f32
    }

    pub fn height(&self) -> f32 {
        self.image.height() as f32
    }

    /// Fills an axis-aligned rectangle; degenerate rectangles are ignored.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb<u8>) {
        let (w, h) = (width.round(), height.round());
        if w < 1.0 || h < 1.0 {
            return;
        }
        let rect = Rect::at(x.round() as i32, y.round() as i32).of_size(w as u32, h as u32);
        draw_filled_rect_mut(&mut self.image, rect, color);
    }

    /// Draws a line `thickness` pixels wide.
    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), thickness: u32, color: Rgb<u8>) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        let (nx, ny) = if length > f32::EPSILON {
            (-dy / length, dx / length)
        } else {
            (0.0, 0.0)
        };
        let thickness = thickness.max(1);
        for step in 0..thickness {
            let offset = step as f32 - (thickness - 1) as f32 / 2.0;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * offset, from.1 + ny * offset),
                (to.0 + nx * offset, to.1 + ny * offset),
                color,
            );
        }
    }

    /// Draws a filled circle.
    pub fn circle(&mut self, center: (f32, f32), radius: f32, color: Rgb<u8>) {
        draw_filled_circle_mut(
            &mut self.image,
            (center.0.round() as i32, center.1.round() as i32),
            radius.round().max(1.0) as i32,
            color,
        );
    }

    /// Fills a pie wedge. Angles are measured clockwise from twelve o'clock, in radians.
    pub fn wedge(&mut self, center: (f32, f32), radius: f32, start: f32, end: f32, color: Rgb<u8>) {
        if end - start >= TAU - f32::EPSILON {
            self.circle(center, radius, color);
            return;
        }
        let polygon = wedge_polygon(center, radius, start, end);
        if polygon.len() >= 3 && polygon.first() != polygon.last() {
            draw_polygon_mut(&mut self.image, &polygon, color);
        }
    }

    /// Width of `text` at `size` pixels.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.font
            .map(|font| measure_text(font, text, size))
            .unwrap_or(0.0)
    }

    /// Draws `text` with its top edge at `y`, anchored horizontally at `x`.
    pub fn text(&mut self, x: f32, y: f32, text: &str, size: f32, anchor: Anchor, color: Rgb<u8>) {
        let Some(font) = self.font else {
            return;
        };
        let width = measure_text(font, text, size);
        let left = match anchor {
            Anchor::Start => x,
            Anchor::Middle => x - width / 2.0,
            Anchor::End => x - width,
        };
        draw_text_mut(
            &mut self.image,
            color,
            left.max(0.0).round() as u32,
            y.max(0.0).round() as u32,
            Scale::uniform(size),
            font,
            text,
        );
    }

    /// Shortens `text` with a trailing ellipsis until it fits in `max_width` pixels.
    pub fn fit_label(&self, text: &str, size: f32, max_width: f32) -> String {
        fit_label(text, max_width, |candidate| self.text_width(candidate, size))
    }

    /// Writes the canvas as a PNG file, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), ChartError> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| ChartError::Save {
                path: path.to_path_buf(),
                source,
            })
    }

    #[cfg(test)]
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

fn measure_text(font: &Font<'static>, text: &str, size: f32) -> f32 {
    font.layout(text, Scale::uniform(size), point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

fn fit_label(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> String {
    if measure(text) <= max_width {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    for keep in (1..chars.len()).rev() {
        let candidate: String = chars[..keep]
            .iter()
            .chain(std::iter::once(&'\u{2026}'))
            .collect();
        if measure(&candidate) <= max_width {
            return candidate;
        }
    }
    "\u{2026}".to_string()
}

fn wedge_polygon(center: (f32, f32), radius: f32, start: f32, end: f32) -> Vec<Point<i32>> {
    let to_point = |angle: f32| {
        // Clockwise from twelve o'clock in image coordinates.
        let theta = angle - FRAC_PI_2;
        Point::new(
            (center.0 + radius * theta.cos()).round() as i32,
            (center.1 + radius * theta.sin()).round() as i32,
        )
    };

    let mut polygon = vec![Point::new(center.0.round() as i32, center.1.round() as i32)];
    let segments = ((end - start) / ARC_STEP).ceil().max(1.0) as usize;
    for index in 0..=segments {
        let angle = start + (end - start) * index as f32 / segments as f32;
        let vertex = to_point(angle);
        if polygon.last() != Some(&vertex) {
            polygon.push(vertex);
        }
    }
    polygon
}

/// Pixel rectangle holding the plotted data, inside the canvas margins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotArea {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PlotArea {
    /// Derives the plot area from the canvas size and its four margins.
    pub fn inset(
        canvas_width: f32,
        canvas_height: f32,
        top: f32,
        right: f32,
        bottom: f32,
        left: f32,
    ) -> Self {
        Self {
            left,
            top,
            width: (canvas_width - left - right).max(1.0),
            height: (canvas_height - top - bottom).max(1.0),
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Width of one category slot when `count` categories share the x axis.
    pub fn slot_width(&self, count: usize) -> f32 {
        self.width / count.max(1) as f32
    }

    /// Horizontal centre of category slot `index`.
    pub fn slot_center(&self, index: usize, count: usize) -> f32 {
        self.left + self.slot_width(count) * (index as f32 + 0.5)
    }

    /// Vertical pixel position of `value` on `axis`.
    pub fn y_for(&self, value: f64, axis: &ValueAxis) -> f32 {
        let ratio = (value / axis.max).clamp(0.0, 1.0) as f32;
        self.bottom() - ratio * self.height
    }
}

/// Linear value axis starting at zero with evenly spaced "nice" ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueAxis {
    pub max: f64,
    pub step: f64,
}

impl ValueAxis {
    /// Picks an axis covering `max_value` with roughly five ticks stepping by 1, 2 or 5 times a
    /// power of ten.
    pub fn covering(max_value: u64) -> Self {
        if max_value == 0 {
            return Self { max: 1.0, step: 1.0 };
        }
        let max_value = max_value as f64;
        let raw_step = max_value / 5.0;
        let magnitude = 10f64.powf(raw_step.log10().floor());
        let residual = raw_step / magnitude;
        let nice = if residual <= 1.0 {
            1.0
        } else if residual <= 2.0 {
            2.0
        } else if residual <= 5.0 {
            5.0
        } else {
            10.0
        };
        // Counts are integers; fractional ticks would only repeat labels.
        let step = (nice * magnitude).max(1.0);
        Self {
            max: (max_value / step).ceil() * step,
            step,
        }
    }

    /// Tick values from zero to the axis maximum inclusive.
    pub fn ticks(&self) -> Vec<f64> {
        let count = (self.max / self.step).round() as usize;
        (0..=count).map(|index| index as f64 * self.step).collect()
    }
}

/// Every how many labels one is drawn so that labels `label_width` wide do not overlap in slots
/// `slot_width` wide.
pub fn label_stride(label_width: f32, slot_width: f32) -> usize {
    if slot_width <= 0.0 || label_width <= slot_width {
        1
    } else {
        (label_width / slot_width).ceil() as usize
    }
}
