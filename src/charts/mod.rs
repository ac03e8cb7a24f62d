//! PNG chart renderers for the report.
//!
//! Every renderer takes the whole [`AlertSummary`] and a target path, draws into a fresh
//! [`Canvas`], and overwrites the file at that path. The canvas lives only for the duration of
//! the call. Text is drawn with the report's regular font, which is loaded once per process by
//! [`init`].

pub mod canvas;
pub mod palette;

use std::f32::consts::TAU;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, info, warn};
use rusttype::Font;

use crate::config::ChartDimensions;
use crate::fonts;
use crate::summary::AlertSummary;

use self::canvas::{label_stride, Anchor, Canvas, PlotArea, ValueAxis};

/// File name of the alerts-by-hour chart.
pub const TIME_SERIES_FILE: &str = "time_series.png";
/// File name of the severity distribution chart.
pub const SEVERITY_FILE: &str = "severity.png";
/// File name of the MITRE ATT&CK distribution chart.
pub const MITRE_FILE: &str = "mitre.png";

pub const DEFAULT_TIME_SERIES_PIXELS: ChartDimensions = ChartDimensions::new(1000, 600);
pub const DEFAULT_SEVERITY_PIXELS: ChartDimensions = ChartDimensions::new(800, 800);
pub const DEFAULT_MITRE_PIXELS: ChartDimensions = ChartDimensions::new(1200, 600);

const TITLE_SIZE: f32 = 30.0;
const LABEL_SIZE: f32 = 22.0;
const TICK_SIZE: f32 = 18.0;

/// Errors raised by the chart renderers.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// The data series the chart needs has nothing to draw.
    #[error("Cannot chart {0}: the series is empty or sums to zero")]
    EmptySeries(&'static str),
    /// Encoding or writing the PNG failed.
    #[error("Failed to write chart {}", path.display())]
    Save {
        /// Target file.
        path: PathBuf,
        /// Underlying encoder or I/O failure.
        source: image::ImageError,
    },
    /// A stale chart from an earlier run could not be removed.
    #[error("Failed to remove stale chart {}", path.display())]
    RemoveStale {
        /// The stale file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
}

/// Result of a chart renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartOutput {
    /// The chart was written to the given path.
    Written(PathBuf),
    /// The chart had no data and no file exists at the target path.
    Skipped,
}

impl ChartOutput {
    /// Returns the written path, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) => Some(path),
            Self::Skipped => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Shared drawing resources for the chart renderers.
pub struct ChartBackend {
    font: Option<Font<'static>>,
}

static BACKEND: OnceLock<ChartBackend> = OnceLock::new();

/// Returns the process-wide backend, loading the chart font on first use.
pub fn init() -> &'static ChartBackend {
    BACKEND.get_or_init(ChartBackend::load)
}

impl ChartBackend {
    fn load() -> Self {
        match fonts::regular_font_bytes() {
            Ok(bytes) => Self::with_font_bytes(bytes).unwrap_or_else(|| {
                warn!("Chart font could not be parsed; charts will be drawn without text");
                Self::without_text()
            }),
            Err(err) if fonts::fonts_missing(&err) => {
                warn!("No chart font found; charts will be drawn without text");
                Self::without_text()
            }
            Err(err) => {
                warn!("{}; charts will be drawn without text", err);
                Self::without_text()
            }
        }
    }

    /// A backend that draws chart geometry only.
    pub fn without_text() -> Self {
        Self { font: None }
    }

    /// A backend using the TrueType font in `bytes`, or `None` if the bytes are not a font.
    pub fn with_font_bytes(bytes: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(bytes).map(|font| Self { font: Some(font) })
    }

    fn canvas(&self, dimensions: ChartDimensions) -> Canvas<'_> {
        Canvas::new(dimensions, self.font.as_ref())
    }

    /// Draws alerts per hour as a line with markers, hours in document order.
    pub fn render_time_series(
        &self,
        summary: &AlertSummary,
        dimensions: ChartDimensions,
        path: &Path,
    ) -> Result<ChartOutput, ChartError> {
        let hours = &summary.time_analysis.alerts_by_hour;
        let mut canvas = self.canvas(dimensions);
        let area = PlotArea::inset(canvas.width(), canvas.height(), 80.0, 40.0, 90.0, 90.0);
        let axis = ValueAxis::covering(hours.max_count().unwrap_or(0));

        draw_title(&mut canvas, "Alerts by Hour");
        draw_value_axis(&mut canvas, &area, &axis, "Number of Alerts");

        let labels: Vec<&str> = hours.iter().map(|(label, _)| label).collect();
        draw_category_labels(&mut canvas, &area, &labels, false);
        canvas.text(
            area.left + area.width / 2.0,
            area.bottom() + 50.0,
            "Hour of Day",
            LABEL_SIZE,
            Anchor::Middle,
            palette::TEXT,
        );

        let points: Vec<(f32, f32)> = hours
            .iter()
            .enumerate()
            .map(|(index, (_, count))| {
                (
                    area.slot_center(index, hours.len()),
                    area.y_for(count as f64, &axis),
                )
            })
            .collect();
        for pair in points.windows(2) {
            canvas.line(pair[0], pair[1], 3, palette::LINE);
        }
        for point in &points {
            canvas.circle(*point, 6.0, palette::LINE);
        }

        canvas.save(path)?;
        debug!(
            "Wrote time series chart with {} hour buckets to {}",
            hours.len(),
            path.display()
        );
        Ok(ChartOutput::Written(path.to_path_buf()))
    }

    /// Draws the severity distribution as a pie chart with one wedge per level.
    pub fn render_severity(
        &self,
        summary: &AlertSummary,
        dimensions: ChartDimensions,
        path: &Path,
    ) -> Result<ChartOutput, ChartError> {
        let levels = &summary.alerts_by_level;
        let total = levels.total();
        if levels.is_empty() || total == 0 {
            return Err(ChartError::EmptySeries("alerts by level"));
        }

        let mut canvas = self.canvas(dimensions);
        draw_title(&mut canvas, "Alert Severity Distribution");

        let center = (canvas.width() / 2.0, canvas.height() / 2.0 + 20.0);
        let radius = (canvas.width().min(canvas.height()) / 2.0 - 120.0).max(10.0);

        let mut start = 0.0f32;
        for (level, count) in levels.iter() {
            let fraction = count as f64 / total as f64;
            let end = start + fraction as f32 * TAU;
            // Empty levels have no wedge but keep their labels.
            if count > 0 {
                canvas.wedge(center, radius, start, end, palette::severity_color(level));
            }

            let middle = (start + end) / 2.0;
            let (dx, dy) = direction(middle);
            let share = format!("{:.1}%", fraction * 100.0);
            canvas.text(
                center.0 + dx * radius * 0.6,
                center.1 + dy * radius * 0.6 - TICK_SIZE / 2.0,
                &share,
                TICK_SIZE,
                Anchor::Middle,
                palette::WHITE,
            );
            let anchor = if dx > 0.1 {
                Anchor::Start
            } else if dx < -0.1 {
                Anchor::End
            } else {
                Anchor::Middle
            };
            canvas.text(
                center.0 + dx * radius * 1.1,
                center.1 + dy * radius * 1.1 - LABEL_SIZE / 2.0,
                &format!("Level {}", level),
                LABEL_SIZE,
                anchor,
                palette::TEXT,
            );

            start = end;
        }

        canvas.save(path)?;
        debug!(
            "Wrote severity chart with {} levels to {}",
            levels.len(),
            path.display()
        );
        Ok(ChartOutput::Written(path.to_path_buf()))
    }

    /// Draws alerts per MITRE ATT&CK tactic as bars, or skips the chart when there are none.
    ///
    /// A skipped chart also removes a file left at `path` by an earlier run, so the file system
    /// agrees with the returned [`ChartOutput::Skipped`].
    pub fn render_mitre(
        &self,
        summary: &AlertSummary,
        dimensions: ChartDimensions,
        path: &Path,
    ) -> Result<ChartOutput, ChartError> {
        let tactics = &summary.alerts_by_mitre;
        if tactics.is_empty() {
            remove_stale(path)?;
            info!("No MITRE ATT&CK data; skipping {}", path.display());
            return Ok(ChartOutput::Skipped);
        }

        let mut canvas = self.canvas(dimensions);
        let area = PlotArea::inset(canvas.width(), canvas.height(), 80.0, 40.0, 90.0, 90.0);
        let axis = ValueAxis::covering(tactics.max_count().unwrap_or(0));

        draw_title(&mut canvas, "MITRE ATT&CK Distribution");
        draw_value_axis(&mut canvas, &area, &axis, "Number of Alerts");

        let slot = area.slot_width(tactics.len());
        let bar_width = slot * 0.8;
        for (index, (_, count)) in tactics.iter().enumerate() {
            let center = area.slot_center(index, tactics.len());
            let top = area.y_for(count as f64, &axis);
            canvas.fill_rect(
                center - bar_width / 2.0,
                top,
                bar_width,
                area.bottom() - top,
                palette::MITRE_BAR,
            );
            canvas.text(
                center,
                top - TICK_SIZE - 4.0,
                &count.to_string(),
                TICK_SIZE,
                Anchor::Middle,
                palette::TEXT,
            );
        }

        let labels: Vec<&str> = tactics.iter().map(|(label, _)| label).collect();
        draw_category_labels(&mut canvas, &area, &labels, true);

        canvas.save(path)?;
        debug!(
            "Wrote MITRE chart with {} tactics to {}",
            tactics.len(),
            path.display()
        );
        Ok(ChartOutput::Written(path.to_path_buf()))
    }
}

/// Renders the alerts-by-hour chart with the shared backend and default dimensions.
pub fn render_time_series(
    summary: &AlertSummary,
    path: impl AsRef<Path>,
) -> Result<ChartOutput, ChartError> {
    init().render_time_series(summary, DEFAULT_TIME_SERIES_PIXELS, path.as_ref())
}

/// Renders the severity pie chart with the shared backend and default dimensions.
pub fn render_severity(
    summary: &AlertSummary,
    path: impl AsRef<Path>,
) -> Result<ChartOutput, ChartError> {
    init().render_severity(summary, DEFAULT_SEVERITY_PIXELS, path.as_ref())
}

/// Renders the MITRE ATT&CK bar chart with the shared backend and default dimensions.
pub fn render_mitre(
    summary: &AlertSummary,
    path: impl AsRef<Path>,
) -> Result<ChartOutput, ChartError> {
    init().render_mitre(summary, DEFAULT_MITRE_PIXELS, path.as_ref())
}

fn remove_stale(path: &Path) -> Result<(), ChartError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale chart {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ChartError::RemoveStale {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Unit vector for an angle measured clockwise from twelve o'clock.
fn direction(angle: f32) -> (f32, f32) {
    (angle.sin(), -angle.cos())
}

fn draw_title(canvas: &mut Canvas<'_>, title: &str) {
    let x = canvas.width() / 2.0;
    canvas.text(x, 24.0, title, TITLE_SIZE, Anchor::Middle, palette::TEXT);
}

fn draw_value_axis(canvas: &mut Canvas<'_>, area: &PlotArea, axis: &ValueAxis, label: &str) {
    for tick in axis.ticks() {
        let y = area.y_for(tick, axis);
        canvas.line((area.left, y), (area.right(), y), 1, palette::GRID);
        canvas.text(
            area.left - 10.0,
            y - TICK_SIZE / 2.0,
            &format!("{}", tick),
            TICK_SIZE,
            Anchor::End,
            palette::TEXT,
        );
    }
    canvas.line(
        (area.left, area.top),
        (area.left, area.bottom()),
        2,
        palette::AXIS,
    );
    canvas.line(
        (area.left, area.bottom()),
        (area.right(), area.bottom()),
        2,
        palette::AXIS,
    );
    canvas.text(
        area.left,
        area.top - LABEL_SIZE - 12.0,
        label,
        LABEL_SIZE,
        Anchor::Start,
        palette::TEXT,
    );
}

/// Writes category labels under their slots, thinning them out when they would overlap.
/// With `truncate`, every label is shortened to its slot instead.
fn draw_category_labels(canvas: &mut Canvas<'_>, area: &PlotArea, labels: &[&str], truncate: bool) {
    let slot = area.slot_width(labels.len());
    let stride = if truncate {
        1
    } else {
        let widest = labels
            .iter()
            .map(|label| canvas.text_width(label, TICK_SIZE) + 8.0)
            .fold(0.0f32, f32::max);
        label_stride(widest, slot)
    };

    for (index, label) in labels.iter().enumerate().step_by(stride) {
        let text = if truncate {
            canvas.fit_label(label, TICK_SIZE, slot - 4.0)
        } else {
            label.to_string()
        };
        canvas.text(
            area.slot_center(index, labels.len()),
            area.bottom() + 8.0,
            &text,
            TICK_SIZE,
            Anchor::Middle,
            palette::TEXT,
        );
    }
}
