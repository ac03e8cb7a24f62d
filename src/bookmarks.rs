//! PDF outline (bookmark) injection built on top of `lopdf`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Errors that can occur while embedding bookmarks into a rendered PDF document.
#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    /// The PDF bytes could not be parsed or re-encoded by `lopdf`.
    #[error("Failed to process PDF bytes: {0}")]
    Parse(#[from] lopdf::Error),
    /// The document trailer has no usable `/Root` catalog reference.
    #[error("PDF catalog entry is missing")]
    MissingCatalog,
    /// The catalog object was not a dictionary, preventing outline injection.
    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,
    /// An outline entry points at a page the document does not have.
    #[error("Bookmark '{title}' refers to missing page {page_number}")]
    MissingPage {
        /// Title of the offending entry.
        title: String,
        /// The requested (1-indexed) page number.
        page_number: usize,
    },
}

impl From<std::io::Error> for BookmarkError {
    fn from(err: std::io::Error) -> Self {
        Self::Parse(err.into())
    }
}

/// A top-level outline entry pointing at the first page of a report section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry {
    title: String,
    page_number: usize,
    name: Option<String>,
}

impl OutlineEntry {
    /// Creates an entry that opens `page_number` (1-indexed).
    pub fn new(title: impl Into<String>, page_number: usize) -> Self {
        Self {
            title: title.into(),
            page_number,
            name: None,
        }
    }

    /// Sets the optional `/NM` identifier and returns the updated entry.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

struct ResolvedEntry<'a> {
    object_id: ObjectId,
    page_ref: ObjectId,
    entry: &'a OutlineEntry,
}

/// Adds a flat `/Outlines` tree to `pdf_bytes`, one `/Dest [page /Fit]` item per entry.
///
/// Returns the input unchanged when `entries` is empty.
pub fn apply_outline(pdf_bytes: &[u8], entries: &[OutlineEntry]) -> Result<Vec<u8>, BookmarkError> {
    if entries.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();
    let resolved = resolve_entries(&mut document, entries, &pages)?;

    let outlines_id = document.new_object_id();
    for (index, item) in resolved.iter().enumerate() {
        let previous = index.checked_sub(1).map(|prev| resolved[prev].object_id);
        let next = resolved.get(index + 1).map(|next| next.object_id);
        let dictionary = outline_item(item, outlines_id, previous, next);
        document
            .objects
            .insert(item.object_id, Object::Dictionary(dictionary));
    }

    attach_outline_root(&mut document, outlines_id, &resolved)?;

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

fn resolve_entries<'a>(
    document: &mut Document,
    entries: &'a [OutlineEntry],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<Vec<ResolvedEntry<'a>>, BookmarkError> {
    entries
        .iter()
        .map(|entry| {
            let page_ref = u32::try_from(entry.page_number)
                .ok()
                .and_then(|page| pages.get(&page).copied())
                .ok_or_else(|| BookmarkError::MissingPage {
                    title: entry.title.clone(),
                    page_number: entry.page_number,
                })?;
            Ok(ResolvedEntry {
                object_id: document.new_object_id(),
                page_ref,
                entry,
            })
        })
        .collect()
}

fn outline_item(
    item: &ResolvedEntry<'_>,
    parent: ObjectId,
    previous: Option<ObjectId>,
    next: Option<ObjectId>,
) -> Dictionary {
    let mut dictionary = Dictionary::new();
    dictionary.set("Title", Object::string_literal(item.entry.title.as_str()));
    dictionary.set(
        "Dest",
        Object::Array(vec![
            Object::Reference(item.page_ref),
            Object::Name("Fit".into()),
        ]),
    );
    dictionary.set("Parent", Object::Reference(parent));
    if let Some(name) = &item.entry.name {
        dictionary.set("NM", Object::string_literal(name.as_str()));
    }
    if let Some(previous) = previous {
        dictionary.set("Prev", Object::Reference(previous));
    }
    if let Some(next) = next {
        dictionary.set("Next", Object::Reference(next));
    }
    dictionary
}

fn attach_outline_root(
    document: &mut Document,
    outlines_id: ObjectId,
    resolved: &[ResolvedEntry<'_>],
) -> Result<(), BookmarkError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::MissingCatalog)?;

    let mut root = Dictionary::new();
    root.set("Type", Object::Name("Outlines".into()));
    root.set("Count", Object::Integer(resolved.len() as i64));
    if let Some(first) = resolved.first() {
        root.set("First", Object::Reference(first.object_id));
    }
    if let Some(last) = resolved.last() {
        root.set("Last", Object::Reference(last.object_id));
    }
    document.objects.insert(outlines_id, Object::Dictionary(root));

    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .ok_or(BookmarkError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| BookmarkError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));

    Ok(())
}
