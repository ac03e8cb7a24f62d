//! Styled text fragments used by report paragraphs.
//!
//! A [`Span`] records whether a piece of text is bold without referencing a rendered document,
//! so report content can be assembled and inspected before any fonts are loaded.

use genpdf::style::{Style, StyledString};

/// A slice of text together with its weight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    bold: bool,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Converts the span into a [`StyledString`] for `genpdf` paragraphs.
    pub fn to_styled_string(&self) -> StyledString {
        let mut style = Style::new();
        if self.bold {
            style.set_bold();
        }
        StyledString::new(self.text.clone(), style)
    }
}

/// Concatenates the raw text of `spans`.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(Span::text).collect()
}
