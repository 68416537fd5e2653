//! CSV rows in the column layout each agency's bulk upload expects.

use crate::ExportRecord;
use std::borrow::Cow;
use stocktag_model::{Categories, Platform};

/// Quote a field when it contains a comma, a quote or a line break, doubling
/// any quotes inside it.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    match field.contains([',', '"', '\n', '\r']) {
        true => Cow::Owned(format!("\"{}\"", field.replace('"', "\"\""))),
        false => Cow::Borrowed(field),
    }
}

fn line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = fields.into_iter().map(escape_field).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

pub fn headers(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::AdobeStock => &["Filename", "Title", "Description", "Keywords", "Category"],
        Platform::Shutterstock => &["Filename", "Title", "Description", "Keywords", "Category 1", "Category 2"],
    }
}

/// One row for `record`. Category slots the image leaves unset are taken from
/// `fallback`.
pub fn row(record: &ExportRecord, fallback: &Categories, platform: Platform) -> String {
    let categories = record.categories.or(fallback);
    let keywords = record.metadata.keywords_joined();
    let mut fields = vec![
        record.file_name.as_str(),
        record.metadata.title.as_str(),
        record.metadata.description.as_str(),
        keywords.as_str(),
    ];
    match platform {
        Platform::AdobeStock => fields.push(categories.adobe.as_deref().unwrap_or_default()),
        Platform::Shutterstock => {
            fields.push(categories.shutterstock_primary.as_deref().unwrap_or_default());
            fields.push(categories.shutterstock_secondary.as_deref().unwrap_or_default());
        },
    }
    line(fields)
}

/// The whole file: header line, then one line per record.
pub fn document(records: &[ExportRecord], fallback: &Categories, platform: Platform) -> String {
    let mut out = line(headers(platform).iter().copied());
    for record in records {
        out.push_str(&row(record, fallback, platform));
    }
    out
}
