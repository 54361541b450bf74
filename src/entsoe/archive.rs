//! Unwrapping of raw API responses into XML payload strings.
//!
//! The platform answers either with a plain XML document or with a ZIP
//! archive whose entries are XML documents or, for bulk exports, further ZIP
//! archives. Nesting stops at two levels; that is observed server behavior,
//! not a guess about arbitrary depth.

use std::io::{Cursor, Read};

use tracing::warn;
use zip::ZipArchive;

/// ZIP local-file-header magic, used when the content-type header lies.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Maximum archive nesting depth the unwrapper will descend.
const MAX_ARCHIVE_DEPTH: usize = 2;

/// Decode raw payload bytes: strict UTF-8 first, then Latin-1.
///
/// The Latin-1 path maps every byte to its code point, so a non-conformant
/// server can degrade a few characters but never the whole payload.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Whether a decoded payload is the platform's "valid but empty" answer.
///
/// These are well-formed documents carrying a reason marker instead of time
/// series; they must not reach the parser.
pub fn is_empty_marker(text: &str) -> bool {
    text.contains("NoMatchingData") || text.contains("Error_Reason")
}

/// Unwrap a response into the XML payloads it carries.
///
/// Archive responses (declared or detected by signature) are opened and
/// every `.xml` entry extracted, descending one level into nested `.zip`
/// entries. Plain XML responses decode to a single payload. Anything else,
/// including a malformed archive, yields no payloads and a warning.
pub fn unwrap_payloads(bytes: &[u8], content_type: &str) -> Vec<String> {
    if content_type.contains("application/zip") || bytes.starts_with(ZIP_MAGIC) {
        return unwrap_archive(bytes, 1);
    }
    if content_type.contains("xml") {
        return vec![decode_text(bytes)];
    }
    warn!(
        "unexpected content type {content_type:?} ({} bytes), treating as no data",
        bytes.len()
    );
    Vec::new()
}

fn unwrap_archive(bytes: &[u8], depth: usize) -> Vec<String> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(err) => {
            warn!("response looked like a ZIP archive but is not valid: {err}");
            return Vec::new();
        }
    };

    let mut payloads = Vec::new();
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("unreadable archive entry at index {index}: {err}");
                continue;
            }
        };
        let name = entry.name().to_lowercase();
        let mut content = Vec::new();
        if let Err(err) = entry.read_to_end(&mut content) {
            warn!("failed to extract archive entry {name}: {err}");
            continue;
        }

        if name.ends_with(".zip") && depth < MAX_ARCHIVE_DEPTH {
            payloads.extend(unwrap_archive(&content, depth + 1));
        } else if name.ends_with(".xml") {
            payloads.push(decode_text(&content));
        }
    }
    payloads
}
