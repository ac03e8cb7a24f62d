//! Layout and rendering settings for generated reports.

use genpdf::{Margins, PaperSize, Size};

use crate::charts;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Millimetres per typographic point.
pub const MM_PER_POINT: f64 = MM_PER_INCH / 72.0;

/// Converts inches into millimetres.
pub fn inches(value: f64) -> f64 {
    value * MM_PER_INCH
}

/// Converts typographic points into millimetres.
pub fn points(value: f64) -> f64 {
    value * MM_PER_POINT
}

/// Width and height of a rendered box, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxSize {
    /// Box width in millimetres.
    pub width_mm: f64,
    /// Box height in millimetres.
    pub height_mm: f64,
}

impl BoxSize {
    /// Creates a box from dimensions in inches.
    pub fn inches(width: f64, height: f64) -> Self {
        Self {
            width_mm: inches(width),
            height_mm: inches(height),
        }
    }
}

/// Pixel dimensions of a rasterised chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ChartDimensions {
    /// Creates a new set of dimensions.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Settings for a single report run.
///
/// The defaults reproduce the standard report: A4 paper with one-inch margins, the top five
/// categories, and chart images boxed at 6x4, 5x5 and 6x4 inches.
#[derive(Clone, Debug)]
pub struct ReportConfig {
    title: String,
    paper_size: Size,
    margin_mm: f64,
    top_categories: usize,
    time_series_box: BoxSize,
    severity_box: BoxSize,
    mitre_box: BoxSize,
    time_series_pixels: ChartDimensions,
    severity_pixels: ChartDimensions,
    mitre_pixels: ChartDimensions,
    footer: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Security Analysis Report".to_string(),
            paper_size: PaperSize::A4.into(),
            margin_mm: points(72.0),
            top_categories: 5,
            time_series_box: BoxSize::inches(6.0, 4.0),
            severity_box: BoxSize::inches(5.0, 5.0),
            mitre_box: BoxSize::inches(6.0, 4.0),
            time_series_pixels: charts::DEFAULT_TIME_SERIES_PIXELS,
            severity_pixels: charts::DEFAULT_SEVERITY_PIXELS,
            mitre_pixels: charts::DEFAULT_MITRE_PIXELS,
            footer: true,
        }
    }
}

impl ReportConfig {
    /// Creates a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document title and returns the updated configuration.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the paper size and returns the updated configuration.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = paper_size.into();
        self
    }

    /// Sets the page margin (applied on every side) and returns the updated configuration.
    pub fn with_margin_mm(mut self, margin_mm: f64) -> Self {
        self.margin_mm = margin_mm;
        self
    }

    /// Sets how many categories the top-categories table lists.
    pub fn with_top_categories(mut self, count: usize) -> Self {
        self.top_categories = count;
        self
    }

    /// Sets the box the time-series chart is scaled into.
    pub fn with_time_series_box(mut self, size: BoxSize) -> Self {
        self.time_series_box = size;
        self
    }

    /// Sets the box the severity chart is scaled into.
    pub fn with_severity_box(mut self, size: BoxSize) -> Self {
        self.severity_box = size;
        self
    }

    /// Sets the box the MITRE chart is scaled into.
    pub fn with_mitre_box(mut self, size: BoxSize) -> Self {
        self.mitre_box = size;
        self
    }

    /// Sets the raster size of the time-series chart.
    pub fn with_time_series_pixels(mut self, dimensions: ChartDimensions) -> Self {
        self.time_series_pixels = dimensions;
        self
    }

    /// Sets the raster size of the severity chart.
    pub fn with_severity_pixels(mut self, dimensions: ChartDimensions) -> Self {
        self.severity_pixels = dimensions;
        self
    }

    /// Sets the raster size of the MITRE chart.
    pub fn with_mitre_pixels(mut self, dimensions: ChartDimensions) -> Self {
        self.mitre_pixels = dimensions;
        self
    }

    /// Enables or disables the per-page footer.
    pub fn with_footer(mut self, footer: bool) -> Self {
        self.footer = footer;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn paper_size(&self) -> Size {
        self.paper_size
    }

    pub fn margins(&self) -> Margins {
        Margins::all(self.margin_mm)
    }

    pub fn top_categories(&self) -> usize {
        self.top_categories
    }

    pub fn time_series_box(&self) -> BoxSize {
        self.time_series_box
    }

    pub fn severity_box(&self) -> BoxSize {
        self.severity_box
    }

    pub fn mitre_box(&self) -> BoxSize {
        self.mitre_box
    }

    pub fn time_series_pixels(&self) -> ChartDimensions {
        self.time_series_pixels
    }

    pub fn severity_pixels(&self) -> ChartDimensions {
        self.severity_pixels
    }

    pub fn mitre_pixels(&self) -> ChartDimensions {
        self.mitre_pixels
    }

    pub fn footer(&self) -> bool {
        self.footer
    }
}
