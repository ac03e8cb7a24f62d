//! Data structures describing the logical content of a report.
//!
//! The report assembler produces these values and the [`crate::builder`] module turns them into
//! `genpdf` elements. Keeping the two apart lets the structure of a report (which sections
//! exist, what the tables contain, in what order agents appear) be checked without fonts or a
//! rendered PDF.

use std::path::{Path, PathBuf};

use crate::config::BoxSize;
use crate::richtext::{self, Span};

/// A paragraph made of styled spans.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
}

impl RichParagraph {
    /// Left-aligned paragraph from `spans`.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns the paragraph text without styling.
    pub fn text(&self) -> String {
        richtext::plain_text(&self.spans)
    }
}

/// A raster image file stretched into a fixed box on the page.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    path: PathBuf,
    size: BoxSize,
}

impl ImageBlock {
    /// Centred image read from `path` that fills `size`.
    pub fn new(path: impl Into<PathBuf>, size: BoxSize) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the box the image is scaled into.
    pub fn size(&self) -> BoxSize {
        self.size
    }
}

/// A grid of text cells with relative column widths.
#[derive(Clone, Debug, PartialEq)]
pub struct TableBlock {
    column_weights: Vec<usize>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl TableBlock {
    /// Creates an empty table whose columns share the width in the given proportions.
    pub fn new(column_weights: impl Into<Vec<usize>>) -> Self {
        Self {
            column_weights: column_weights.into(),
            header: None,
            rows: Vec::new(),
        }
    }

    pub fn column_weights(&self) -> &[usize] {
        &self.column_weights
    }

    /// Returns the header row, if any.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Returns the body rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Sets a header row rendered in bold.
    pub fn with_header<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = Some(cells.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a body row and returns the updated table.
    pub fn with_row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }
}

/// One piece of content inside a section or on the cover.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(RichParagraph),
    /// Sub-heading inside a section.
    Heading(String),
    /// Boxed image content.
    Image(ImageBlock),
    /// Tabular content.
    Table(TableBlock),
    /// Bulleted list of plain text items.
    BulletList(Vec<String>),
    /// Vertical gap, in millimetres.
    Spacer(f64),
}

impl Block {
    /// Paragraph mixing plain and bold spans.
    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(RichParagraph::new(spans))
    }

    /// Convenience helper for building a sub-heading block.
    pub fn heading(text: impl Into<String>) -> Self {
        Self::Heading(text.into())
    }

    /// Convenience helper for building a bulleted list.
    pub fn bullets<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::BulletList(items.into_iter().map(Into::into).collect())
    }

    /// Convenience helper for a vertical gap of `mm` millimetres.
    pub fn spacer(mm: f64) -> Self {
        Self::Spacer(mm)
    }
}

/// Title block rendered at the top of the first page.
#[derive(Clone, Debug, PartialEq)]
pub struct Cover {
    title: String,
    subtitle: Option<String>,
    blocks: Vec<Block>,
}

impl Cover {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<Option<String>>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }
}

/// A titled part of the report. Its title is rendered as a heading and used for bookmarks.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    identifier: Option<String>,
    title: String,
    blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            identifier: None,
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    /// Returns the section identifier used for bookmarks.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Sets the stable identifier stored in the outline entry.
    pub fn with_identifier(mut self, identifier: impl Into<Option<String>>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_blocks<I>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        self.blocks.extend(blocks);
        self
    }
}

/// A complete report: a cover followed by sections.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDocument {
    cover: Cover,
    sections: Vec<Section>,
}

impl ReportDocument {
    pub fn new(cover: Cover) -> Self {
        Self {
            cover,
            sections: Vec::new(),
        }
    }

    pub fn cover(&self) -> &Cover {
        &self.cover
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Looks up a section by its title.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title() == title)
    }

    /// Appends a section and returns the updated document.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Splits the document into its cover and sections.
    pub fn into_parts(self) -> (Cover, Vec<Section>) {
        (self.cover, self.sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_collects_rows_in_order() {
        let table = TableBlock::new(vec![2, 1])
            .with_header(["Key", "Value"])
            .with_row(["a", "1"])
            .with_row(vec!["b".to_string(), "2".to_string()]);

        assert_eq!(table.header(), Some(&["Key".to_string(), "Value".to_string()][..]));
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[1][0], "b");
    }

    #[test]
    fn document_looks_up_sections_by_title() {
        let document = ReportDocument::new(Cover::new("Report"))
            .with_section(
                Section::new("Summary").with_block(Block::paragraph(vec![Span::new("hello")])),
            )
            .with_section(Section::new("Details"));

        let summary = document.section("Summary").expect("summary section");
        assert!(matches!(
            summary.blocks().first(),
            Some(Block::Paragraph(paragraph)) if paragraph.text() == "hello"
        ));
        assert!(document.section("Missing").is_none());
    }
}
