//! Element implementations built on top of `genpdf` primitives.
//!
//! This module adds an image element that stretches into a fixed box, a fixed-height vertical
//! gap, and an invisible marker that records which page a section starts on.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use image::GenericImageView;

use genpdf::elements::Image;
use genpdf::error::{Context as _, Error};
use genpdf::style::Style;
use genpdf::{render, Alignment, Element, Mm, RenderResult, Scale, Size};

use crate::config::BoxSize;

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const FIT_TOLERANCE_MM: f64 = 0.01;

fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// An image stretched to fill a fixed box, like a chart pasted into a report frame.
///
/// The horizontal and vertical scale factors are computed independently, so the aspect ratio of
/// the source raster is not preserved when it differs from the box.
///
/// An image that does not fit below the content already on a page is moved to the next page. If
/// it still does not fit there, it is shrunk to the available height.
pub struct BoxedImage {
    image: Image,
    natural_size: Size,
    size: BoxSize,
    deferred: bool,
}

impl BoxedImage {
    /// Creates a boxed image from an existing [`DynamicImage`][image::DynamicImage].
    pub fn from_dynamic_image(image: image::DynamicImage, size: BoxSize) -> Result<Self, Error> {
        let natural_size = estimated_image_size(&image, DEFAULT_IMAGE_DPI);
        let image = Image::from_dynamic_image(image)?;
        let mut element = Self {
            image,
            natural_size,
            size,
            deferred: false,
        };
        element.apply_scale();
        Ok(element)
    }

    /// Creates a boxed image from the file located at `path`.
    pub fn from_path(path: impl AsRef<Path>, size: BoxSize) -> Result<Self, Error> {
        Self::from_dynamic_image(decode_image_from_path(path)?, size)
    }

    /// Sets the horizontal alignment and returns the updated element.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.image.set_alignment(alignment);
        self
    }

    /// Limits the box to `height`, keeping its proportions.
    pub fn with_max_height(mut self, height: impl Into<Mm>) -> Self {
        self.size = fit_height(self.size, mm_to_f64(height.into()));
        self.apply_scale();
        self
    }

    /// The box the image is currently scaled into.
    pub fn size(&self) -> BoxSize {
        self.size
    }

    /// Scale factors mapping the natural size onto the box.
    pub fn scale_factors(&self) -> (f64, f64) {
        box_scale(self.natural_size, self.size)
    }

    fn apply_scale(&mut self) {
        let (x, y) = self.scale_factors();
        self.image.set_scale(Scale::new(x, y));
    }
}

fn box_scale(natural: Size, target: BoxSize) -> (f64, f64) {
    let factor = |natural: Mm, target: f64| {
        let natural = mm_to_f64(natural);
        if natural > f64::EPSILON {
            target / natural
        } else {
            1.0
        }
    };
    (
        factor(natural.width, target.width_mm),
        factor(natural.height, target.height_mm),
    )
}

/// Shrinks `size` proportionally so that its height is at most `max_height_mm`.
fn fit_height(size: BoxSize, max_height_mm: f64) -> BoxSize {
    if size.height_mm <= max_height_mm || size.height_mm <= f64::EPSILON {
        return size;
    }
    let max_height_mm = max_height_mm.max(0.0);
    let ratio = max_height_mm / size.height_mm;
    BoxSize {
        width_mm: size.width_mm * ratio,
        height_mm: max_height_mm,
    }
}

impl Element for BoxedImage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let available = mm_to_f64(area.size().height);
        if self.size.height_mm > available + FIT_TOLERANCE_MM {
            if !self.deferred {
                self.deferred = true;
                let mut result = RenderResult::default();
                result.has_more = true;
                return Ok(result);
            }
            self.size = fit_height(self.size, available);
            self.apply_scale();
        }
        self.image.render(context, area, style)
    }
}

/// A fixed-height gap that is clipped at the bottom of a page instead of spilling over.
pub struct VerticalSpace {
    height: Mm,
}

impl VerticalSpace {
    /// Creates a gap of `height_mm` millimetres.
    pub fn new(height_mm: f64) -> Self {
        Self {
            height: mm_from_f64(height_mm),
        }
    }
}

impl Element for VerticalSpace {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let available = area.size().height;
        let height = if self.height > available {
            available
        } else {
            self.height
        };
        let mut result = RenderResult::default();
        result.size = Size::new(Mm::default(), height);
        Ok(result)
    }
}

/// Shared page counter and per-section start pages.
///
/// The page decorator bumps the counter whenever a page is started; [`PageMarker`] elements read
/// it when they are laid out.
#[derive(Clone, Debug, Default)]
pub struct PageTracker {
    current: Rc<Cell<usize>>,
    starts: Rc<RefCell<Vec<Option<usize>>>>,
}

impl PageTracker {
    /// Creates a tracker with room for `sections` start pages.
    pub fn new(sections: usize) -> Self {
        Self {
            current: Rc::new(Cell::new(0)),
            starts: Rc::new(RefCell::new(vec![None; sections])),
        }
    }

    /// Records that a new page has been started.
    pub fn start_page(&self) -> usize {
        let page = self.current.get() + 1;
        self.current.set(page);
        page
    }

    /// Number of pages started so far.
    pub fn page_count(&self) -> usize {
        self.current.get()
    }

    /// Creates a marker for the section at `index`.
    pub fn marker(&self, index: usize) -> PageMarker {
        PageMarker {
            index,
            tracker: self.clone(),
        }
    }

    /// Returns the recorded start pages (1-indexed), one entry per section.
    pub fn section_starts(&self) -> Vec<Option<usize>> {
        self.starts.borrow().clone()
    }

    fn mark(&self, index: usize) {
        let mut starts = self.starts.borrow_mut();
        if index >= starts.len() {
            starts.resize(index + 1, None);
        }
        if starts[index].is_none() {
            starts[index] = Some(self.current.get());
        }
    }
}

/// Zero-size element that stamps the current page number for a section.
pub struct PageMarker {
    index: usize,
    tracker: PageTracker,
}

impl Element for PageMarker {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        _area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        self.tracker.mark(self.index);
        Ok(RenderResult::default())
    }
}
