//! Document construction: page setup and conversion of the content model into `genpdf` elements.

use genpdf::elements::{FrameCellDecorator, Paragraph, TableLayout, UnorderedList};
use genpdf::error::{Error, ErrorKind};
use genpdf::style::{self, Style};
use genpdf::{self, Alignment, Element, Margins, Mm, PageDecorator, PaperSize, Position, Size};
use log::debug;

#[cfg(feature = "bookmarks")]
use crate::bookmarks::{self, BookmarkError};
use crate::config;
use crate::elements::{BoxedImage, PageTracker, VerticalSpace};
use crate::fonts;
use crate::model::{Block, Cover, ImageBlock, RichParagraph, Section, TableBlock};

const TITLE_FONT_SIZE: u8 = 24;
const HEADING_FONT_SIZE: u8 = 16;
const BODY_FONT_SIZE: u8 = 11;

/// Errors raised while turning report content into PDF bytes.
#[derive(Debug, thiserror::Error)]
pub enum PdfBuildError {
    /// No usable font family could be loaded.
    #[error("Failed to load document fonts")]
    FontLoad(#[source] Error),
    /// An image block could not be decoded.
    #[error("Failed to load image {image}")]
    Image {
        /// Path or description of the image.
        image: String,
        /// Underlying decoding failure.
        source: Error,
    },
    /// A content block could not be converted into layout elements.
    #[error("Failed to lay out report content")]
    Layout(#[source] Error),
    /// The layout engine failed while producing the PDF.
    #[error("Failed to render PDF document")]
    Render(#[source] Error),
    /// Section bookmarks could not be embedded into the rendered PDF.
    #[cfg(feature = "bookmarks")]
    #[error("Failed to embed section bookmarks")]
    Bookmarks(#[from] BookmarkError),
}

/// Builder for `genpdf::Document` instances pre-configured with the crate defaults.
#[derive(Default)]
pub struct DocumentBuilder {
    paper_size: Option<Size>,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
    tracker: Option<PageTracker>,
}

type ElementFactory = dyn Fn(usize) -> Box<dyn Element>;

impl DocumentBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the paper size used for newly created documents.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Reports every started page to `tracker`.
    pub fn with_page_tracker(mut self, tracker: PageTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Height left for content on every page once margins and the footer are taken away.
    pub fn content_height(&self) -> Mm {
        let paper_size = self.paper_size.unwrap_or_else(|| PaperSize::A4.into());
        let mut height = paper_size.height;
        if let Some(margins) = self.margins {
            height = height - margins.top - margins.bottom;
        }
        if let Some(footer) = &self.footer {
            height = height - footer.height;
        }
        height
    }

    /// Builds a fully configured `genpdf::Document` instance.
    pub fn build(self) -> Result<genpdf::Document, Error> {
        let font_family = fonts::default_font_family()?;
        let mut document = genpdf::Document::new(font_family);

        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }

        let decorator = ConfiguredPageDecorator::new(self.margins, self.footer, self.tracker);
        document.set_page_decorator(decorator);

        Ok(document)
    }
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<ElementFactory>,
}

impl FooterSpec {
    /// Creates a footer drawn by `factory` for every page number.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    page: usize,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
    tracker: Option<PageTracker>,
}

impl ConfiguredPageDecorator {
    fn new(
        margins: Option<Margins>,
        footer: Option<FooterSpec>,
        tracker: Option<PageTracker>,
    ) -> Self {
        Self {
            page: 0,
            margins,
            footer,
            tracker,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        self.page += 1;
        if let Some(tracker) = &self.tracker {
            tracker.start_page();
        }

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

/// Rendered PDF bytes plus layout facts gathered while rendering.
#[derive(Clone, Debug)]
pub struct RenderedPdf {
    /// The encoded PDF document.
    pub bytes: Vec<u8>,
    /// Number of pages in the document.
    pub page_count: usize,
    /// First page (1-indexed) of each section, in section order.
    pub section_pages: Vec<Option<usize>>,
}

/// Lays out a cover and sections into a single PDF document.
pub struct PdfBuilder {
    document: DocumentBuilder,
    title: Option<String>,
    cover: Option<Cover>,
    sections: Vec<Section>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            document: DocumentBuilder::new(),
            title: None,
            cover: None,
            sections: Vec::new(),
        }
    }

    /// Sets the paper size of the document.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.document = self.document.with_paper_size(paper_size);
        self
    }

    /// Sets the page margins of the document.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.document = self.document.with_margins(margins);
        self
    }

    /// Adds a footer rendered at the bottom of every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.document = self.document.with_footer(height, footer);
        self
    }

    /// Sets the PDF metadata title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the cover rendered before the first section.
    pub fn with_cover(mut self, cover: Cover) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Appends several sections.
    pub fn add_sections<I>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = Section>,
    {
        self.sections.extend(sections);
        self
    }

    /// Renders the document into PDF bytes.
    pub fn render(self) -> Result<RenderedPdf, PdfBuildError> {
        let (rendered, _) = self.render_inner()?;
        Ok(rendered)
    }

    /// Renders the document and adds a PDF outline entry for every section.
    #[cfg(feature = "bookmarks")]
    pub fn render_with_bookmarks(self) -> Result<RenderedPdf, PdfBuildError> {
        let (mut rendered, sections) = self.render_inner()?;
        let entries: Vec<bookmarks::OutlineEntry> = sections
            .iter()
            .zip(rendered.section_pages.iter())
            .filter_map(|(section, page)| {
                page.map(|page| {
                    bookmarks::OutlineEntry::new(section.title(), page)
                        .with_name(section.identifier().map(str::to_string))
                })
            })
            .collect();
        rendered.bytes = bookmarks::apply_outline(&rendered.bytes, &entries)?;
        Ok(rendered)
    }

    fn render_inner(self) -> Result<(RenderedPdf, Vec<Section>), PdfBuildError> {
        let tracker = PageTracker::new(self.sections.len());
        let max_image_height = self.document.content_height();
        let mut document = self
            .document
            .with_page_tracker(tracker.clone())
            .build()
            .map_err(PdfBuildError::FontLoad)?;

        if let Some(title) = &self.title {
            document.set_title(title.as_str());
        }

        if let Some(cover) = &self.cover {
            push_cover(&mut document, cover, max_image_height)?;
        }

        for (index, section) in self.sections.iter().enumerate() {
            document.push(tracker.marker(index));
            push_heading(&mut document, section.title());
            for block in section.blocks() {
                push_block(&mut document, block, max_image_height)?;
            }
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes).map_err(PdfBuildError::Render)?;

        let rendered = RenderedPdf {
            bytes,
            page_count: tracker.page_count(),
            section_pages: tracker.section_starts(),
        };
        debug!(
            "Rendered {} sections on {} pages ({} bytes)",
            self.sections.len(),
            rendered.page_count,
            rendered.bytes.len()
        );
        Ok((rendered, self.sections))
    }
}

fn title_style() -> Style {
    Style::new().bold().with_font_size(TITLE_FONT_SIZE)
}

fn heading_style() -> Style {
    Style::new().bold().with_font_size(HEADING_FONT_SIZE)
}

fn body_style() -> Style {
    Style::new().with_font_size(BODY_FONT_SIZE)
}

fn push_cover(
    document: &mut genpdf::Document,
    cover: &Cover,
    max_image_height: Mm,
) -> Result<(), PdfBuildError> {
    document.push(Paragraph::new(cover.title()).styled(title_style()));
    document.push(VerticalSpace::new(config::points(30.0)));
    if let Some(subtitle) = cover.subtitle() {
        push_heading(document, subtitle);
    }
    for block in cover.blocks() {
        push_block(document, block, max_image_height)?;
    }
    Ok(())
}

fn push_heading(document: &mut genpdf::Document, text: &str) {
    document.push(Paragraph::new(text).styled(heading_style()));
    document.push(VerticalSpace::new(config::points(12.0)));
}

fn paragraph(content: &RichParagraph) -> Paragraph {
    let mut paragraph = Paragraph::default();
    for span in content.spans() {
        paragraph.push(span.to_styled_string());
    }
    paragraph
}

fn push_block(
    document: &mut genpdf::Document,
    block: &Block,
    max_image_height: Mm,
) -> Result<(), PdfBuildError> {
    match block {
        Block::Paragraph(content) => document.push(paragraph(content).styled(body_style())),
        Block::Heading(text) => push_heading(document, text),
        Block::Image(image) => document.push(boxed_image(image, max_image_height)?),
        Block::Table(table) => document.push(table_layout(table)?.styled(body_style())),
        Block::BulletList(items) => {
            let mut list = UnorderedList::with_bullet("\u{2022}");
            for item in items {
                list.push(Paragraph::new(item.as_str()));
            }
            document.push(list.styled(body_style()));
        }
        Block::Spacer(height_mm) => document.push(VerticalSpace::new(*height_mm)),
    }
    Ok(())
}

/// Images are centred and never taller than one page of content.
fn boxed_image(block: &ImageBlock, max_height: Mm) -> Result<BoxedImage, PdfBuildError> {
    let image = BoxedImage::from_path(block.path(), block.size()).map_err(|source| {
        PdfBuildError::Image {
            image: block.path().display().to_string(),
            source,
        }
    })?;
    Ok(image
        .with_alignment(Alignment::Center)
        .with_max_height(max_height))
}

fn table_cell(text: &str, style: Style) -> impl Element {
    Paragraph::new(text)
        .styled(style)
        .padded(Margins::trbl(1.5, 2.0, 1.5, 2.0))
}

fn table_layout(table: &TableBlock) -> Result<TableLayout, PdfBuildError> {
    let mut layout = TableLayout::new(table.column_weights().to_vec());
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    if let Some(header) = table.header() {
        let mut row = layout.row();
        for cell in header {
            row.push_element(table_cell(cell, Style::new().bold()));
        }
        row.push().map_err(PdfBuildError::Layout)?;
    }

    for cells in table.rows() {
        let mut row = layout.row();
        for cell in cells {
            row.push_element(table_cell(cell, Style::new()));
        }
        row.push().map_err(PdfBuildError::Layout)?;
    }

    Ok(layout)
}
