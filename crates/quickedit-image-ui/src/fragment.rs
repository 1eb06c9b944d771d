//! Extraction of a field container's inner markup from rendered field HTML.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

/// Attribute carried by the element that wraps one rendered field.
pub const FIELD_ID_ATTRIBUTE: &str = "data-quickedit-field-id";

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Returns the inner markup of the first element carrying
/// [`FIELD_ID_ATTRIBUTE`], trimmed.
///
/// Markup without such an element is returned whole (trimmed), so a backend
/// that already sends the bare field content is spliced unchanged.
///
/// # Errors
/// Returns [`FragmentError::Malformed`] when the markup cannot be tokenized and
/// [`FragmentError::Unterminated`] when the container is never closed.
pub fn extract_field_fragment(html: &str) -> Result<String, FragmentError> {
    let mut reader = Reader::from_str(html);
    reader.check_end_names(false);

    // Open element names; end tags pop back to their matching name so
    // omitted end tags (`</p>`, `</li>`) close implicitly.
    let mut open: Vec<String> = Vec::new();
    let mut container: Option<(usize, usize)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|error| FragmentError::Malformed(error.to_string()))?;
        let position = reader.buffer_position();

        match event {
            Event::Start(start) => {
                let name = element_name(start.local_name().as_ref());
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                if container.is_none() && carries_field_id(&start) {
                    container = Some((open.len(), content_start(html, position)));
                }
                open.push(name);
            }
            Event::Empty(start) => {
                if container.is_none() && carries_field_id(&start) {
                    return Ok(String::new());
                }
            }
            Event::End(end) => {
                let name = element_name(end.local_name().as_ref());
                let Some(index) = open.iter().rposition(|candidate| *candidate == name) else {
                    continue;
                };
                if let Some((container_index, start)) = container
                    && index <= container_index
                {
                    let end = html[..position].rfind("</").unwrap_or(position);
                    return Ok(html[start..end.max(start)].trim().to_string());
                }
                open.truncate(index);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match container {
        Some(_) => Err(FragmentError::Unterminated),
        None => Ok(html.trim().to_string()),
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn carries_field_id(start: &BytesStart<'_>) -> bool {
    start
        .html_attributes()
        .flatten()
        .any(|attribute| attribute.key.as_ref() == FIELD_ID_ATTRIBUTE.as_bytes())
}

fn content_start(html: &str, position: usize) -> usize {
    if html[..position].ends_with('>') {
        position
    } else {
        html[position..]
            .find('>')
            .map_or(position, |offset| position + offset + 1)
    }
}

/// Fragment extraction errors.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Markup could not be tokenized.
    #[error("malformed field markup: {0}")]
    Malformed(String),
    /// The field container was opened but never closed.
    #[error("field container is not closed")]
    Unterminated,
}
