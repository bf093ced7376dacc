//! Open Graph extraction over the streaming tag tokenizer.

mod tokenizer;

pub use tokenizer::{Attribute, Tag, Token, Tokenizer};

use std::io::BufRead;

use crate::models::MetadataRecord;

/// The `og:*` properties that map onto a [`MetadataRecord`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OgField {
    Title,
    Description,
    Image,
    SiteName,
}

impl OgField {
    fn from_property(value: &str) -> Option<Self> {
        match value {
            "og:title" => Some(OgField::Title),
            "og:description" => Some(OgField::Description),
            "og:image" => Some(OgField::Image),
            "og:site_name" => Some(OgField::SiteName),
            _ => None,
        }
    }

    fn slot(self, record: &mut MetadataRecord) -> &mut String {
        match self {
            OgField::Title => &mut record.title,
            OgField::Description => &mut record.description,
            OgField::Image => &mut record.image,
            OgField::SiteName => &mut record.site_name,
        }
    }
}

const ICON_REL: &str = "shortcut icon";

/// Scan `reader` once and collect the Open Graph fields and the shortcut icon.
///
/// A later matching tag overwrites the value of an earlier one. Reading stops
/// at end of input or at the first I/O error; whatever was collected up to
/// that point is returned, so a page without any matching tag yields an empty
/// record rather than an error.
pub fn extract<R: BufRead>(reader: R) -> MetadataRecord {
    let mut record = MetadataRecord::default();

    for token in Tokenizer::new(reader) {
        match token {
            Ok(Token::StartTag(tag)) | Ok(Token::SelfClosingTag(tag)) => match tag.name.as_str() {
                "meta" => apply_meta(&mut record, &tag),
                "link" => apply_link(&mut record, &tag),
                _ => {}
            },
            Ok(Token::EndTag(_)) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading page body early");
                break;
            }
        }
    }

    record
}

/// `<meta property="og:..." content="...">`, attributes in any order.
fn apply_meta(record: &mut MetadataRecord, tag: &Tag) {
    let mut fields = Vec::new();
    let mut content = None;

    for attr in &tag.attrs {
        match attr.key.as_str() {
            "property" => fields.extend(OgField::from_property(&attr.value)),
            "content" => content = Some(attr.value.as_str()),
            _ => {}
        }
    }

    if let Some(content) = content {
        for field in fields {
            *field.slot(record) = content.to_string();
        }
    }
}

/// `<link rel="shortcut icon" href="...">`, attributes in any order.
fn apply_link(record: &mut MetadataRecord, tag: &Tag) {
    let mut is_icon = false;
    let mut href = None;

    for attr in &tag.attrs {
        match attr.key.as_str() {
            "rel" if attr.value == ICON_REL => is_icon = true,
            "href" => href = Some(attr.value.as_str()),
            _ => {}
        }
    }

    if let (true, Some(href)) = (is_icon, href) {
        record.icon = href.to_string();
    }
}
