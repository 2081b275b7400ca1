//! Legacy processor option blobs.
//!
//! Older settings kept every processor option in a single free-text value,
//! written the way the options would appear on a compiler command line:
//!
//! ```text
//! -Adebug -Aout="/tmp/gen dir" -Alevel=3
//! ```
//!
//! The parser is deliberately forgiving. It looks for `-A` markers anywhere in
//! the text, skips whatever it cannot understand, and returns the pairs it
//! found. It never fails.

use super::OptionMap;

const MARKER: &str = "-A";

/// Parse a legacy options blob.
///
/// - A marker directly followed by a space or `=` is not an option.
/// - The key runs to the next `=`, space or end of input.
/// - `=` before the next space starts a value; otherwise the key is a flag.
/// - The value runs to the next space outside double quotes. Quote characters
///   are kept, and an unterminated quote runs to the end of input.
/// - Later duplicates overwrite earlier ones.
pub fn parse_legacy_options(blob: &str) -> OptionMap {
    let mut options = OptionMap::new();
    let bytes = blob.as_bytes();
    let len = bytes.len();
    let mut start = 0;

    while let Some(found) = blob[start..].find(MARKER) {
        let marker = start + found;
        let key_start = marker + MARKER.len();
        if key_start >= len {
            break;
        }

        // "-A " and "-A=" are false positives
        if matches!(bytes[key_start], b' ' | b'=') {
            start = marker + 1;
            continue;
        }

        let key_end = blob[key_start..]
            .find(['=', ' '])
            .map_or(len, |i| key_start + i);
        let key = &blob[key_start..key_end];

        if key_end >= len || bytes[key_end] == b' ' {
            options.insert(key.to_string(), None);
            start = key_end;
            continue;
        }

        let value_start = key_end + 1;
        let value_end = find_value_end(bytes, value_start);
        options.insert(
            key.to_string(),
            Some(blob[value_start..value_end].to_string()),
        );
        start = value_end;
    }

    options
}

/// Index of the first space outside double quotes at or after `from`.
fn find_value_end(bytes: &[u8], from: usize) -> usize {
    let mut in_quotes = false;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'"' => in_quotes = !in_quotes,
            b' ' if !in_quotes => return i,
            _ => {}
        }
    }
    bytes.len()
}

/// Render options as a legacy blob.
///
/// Values are written verbatim, so a value containing an unquoted space does
/// not survive a parse.
pub fn serialize_legacy_options(options: &OptionMap) -> String {
    options
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}{}={}", MARKER, key, value),
            None => format!("{}{}", MARKER, key),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
