//! Colours used by the chart renderers.

use image::Rgb;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const TEXT: Rgb<u8> = Rgb([38, 38, 38]);
pub const AXIS: Rgb<u8> = Rgb([120, 120, 120]);
pub const GRID: Rgb<u8> = Rgb([225, 225, 225]);
pub const LINE: Rgb<u8> = Rgb([31, 119, 180]);
pub const MITRE_BAR: Rgb<u8> = Rgb([156, 39, 176]);

const LOW: Rgb<u8> = Rgb([22, 163, 74]);
const MEDIUM: Rgb<u8> = Rgb([217, 119, 6]);
const HIGH: Rgb<u8> = Rgb([220, 38, 38]);

/// Lightening applied to the lowest level of a band.
const MAX_SHADE: f32 = 0.5;

/// Coarse severity grouping of alert levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeverityBand {
    /// Levels 0 to 4.
    Low,
    /// Levels 5 to 7.
    Medium,
    /// Levels 8 and above.
    High,
}

impl SeverityBand {
    pub fn from_level(level: u32) -> Self {
        match level {
            0..=4 => Self::Low,
            5..=7 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Lowest and highest level of the band. Levels above 15 share the colour of 15.
    fn range(self) -> (u32, u32) {
        match self {
            Self::Low => (0, 4),
            Self::Medium => (5, 7),
            Self::High => (8, 15),
        }
    }

    fn base_color(self) -> Rgb<u8> {
        match self {
            Self::Low => LOW,
            Self::Medium => MEDIUM,
            Self::High => HIGH,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Colour of a severity level in charts.
///
/// The hue comes from the level's band; the highest level of each band is drawn in the band's
/// base colour and lower levels are progressively lighter, so any number of levels gets
/// distinct, stable colours.
pub fn severity_color(level: u32) -> Rgb<u8> {
    let band = SeverityBand::from_level(level);
    let (first, last) = band.range();
    let width = (last - first + 1) as f32;
    let steps_below_top = last.saturating_sub(level) as f32;
    lighten(band.base_color(), steps_below_top / width * MAX_SHADE)
}

/// Mixes `color` towards white by `amount` (0 keeps the colour, 1 yields white).
pub fn lighten(color: Rgb<u8>, amount: f32) -> Rgb<u8> {
    let amount = amount.clamp(0.0, 1.0);
    let Rgb(channels) = color;
    let mix = |channel: u8| {
        let channel = channel as f32;
        (channel + (255.0 - channel) * amount).round().clamp(0.0, 255.0) as u8
    };
    Rgb([mix(channels[0]), mix(channels[1]), mix(channels[2])])
}
