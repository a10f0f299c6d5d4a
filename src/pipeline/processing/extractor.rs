//! Isolates the leaderboard `<tbody>` from a raw page and rewrites it into
//! markup the row parser can consume.
//!
//! Normalization is a fixed, ordered list of byte substitutions:
//! 1. `"` becomes `'`
//! 2. `\n` is removed
//! 3. non-breaking spaces become ASCII spaces
//! 4. `,` is removed (thousands separators in numeric cells)

use crate::constants::{TBODY_CLOSE, TBODY_OPEN};
use crate::error::ExtractError;
use crate::types::RawPage;
use std::borrow::Cow;
use tracing::debug;

/// The isolated, normalized `<tbody>...</tbody>` region of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFragment(Vec<u8>);

impl TableFragment {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn extract(raw: &RawPage) -> Result<TableFragment, ExtractError> {
    extract_bytes(raw.as_bytes())
}

pub fn extract_bytes(html: &[u8]) -> Result<TableFragment, ExtractError> {
    let start = find(html, TBODY_OPEN, 0).ok_or(ExtractError::NoTableBody)?;
    let close = find(html, TBODY_CLOSE, start + TBODY_OPEN.len()).ok_or(ExtractError::NoTableBody)?;
    let end = close + TBODY_CLOSE.len();
    debug!("Found tbody at bytes {}..{} of {}", start, end, html.len());
    Ok(TableFragment(normalize(&html[start..end])))
}

/// Apply the substitutions in their fixed order.
pub fn normalize(fragment: &[u8]) -> Vec<u8> {
    let out = replace_all(fragment, b"\"", b"'");
    let out = replace_all(&out, b"\n", b"");
    let out = replace_nbsp(&out);
    replace_all(&out, b",", b"")
}

// UTF-8 input only has U+00A0 replaced, so multi-byte characters whose
// continuation byte happens to be 0xA0 survive. Anything else is treated
// as a single-byte encoding.
fn replace_nbsp(bytes: &[u8]) -> Vec<u8> {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.replace('\u{a0}', " ").into_bytes(),
        Err(_) => bytes.iter().map(|&b| if b == 0xa0 { b' ' } else { b }).collect(),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn replace_all(bytes: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_has_no_table_body() {
        assert_eq!(extract_bytes(b""), Err(ExtractError::NoTableBody));
    }

    #[test]
    fn test_markup_without_tbody() {
        assert_eq!(extract_bytes(b"<h1></h1>"), Err(ExtractError::NoTableBody));
        assert_eq!(
            extract_bytes(b"<tr><td>test</td></tr>"),
            Err(ExtractError::NoTableBody)
        );
    }

    #[test]
    fn test_open_without_close() {
        assert_eq!(
            extract_bytes(b"<tbody><tr><td>1</td></tr>"),
            Err(ExtractError::NoTableBody)
        );
    }

    #[test]
    fn test_close_before_open_is_rejected() {
        assert_eq!(
            extract_bytes(b"</tbody><p>x</p><tbody><tr>"),
            Err(ExtractError::NoTableBody)
        );
    }

    #[test]
    fn test_clean_fragment_is_unchanged() {
        let input = b"<tbody><tr><td>test</td></tr></tbody>";
        let fragment = extract_bytes(input).unwrap();
        assert_eq!(fragment.as_bytes(), input);
    }

    #[test]
    fn test_dirty_fragment_is_cleaned() {
        let fragment = extract_bytes(b"<tbody>\n<tr><td>test,</td></tr></tbody>").unwrap();
        assert_eq!(fragment.as_bytes(), b"<tbody><tr><td>test</td></tr></tbody>");
    }

    #[test]
    fn test_slice_spans_only_first_tbody_inclusive() {
        let page = b"<html><table><thead><tr><th>Rank</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table><tbody>x</tbody></html>";
        let fragment = extract_bytes(page).unwrap();
        assert_eq!(fragment.as_bytes(), b"<tbody><tr><td>1</td></tr></tbody>");
        assert!(fragment.as_bytes().starts_with(TBODY_OPEN));
        assert!(fragment.as_bytes().ends_with(TBODY_CLOSE));
    }

    #[test]
    fn test_all_substitutions() {
        let page = "<tbody><tr class=\"personal-hiscores__row\">\n<td class=\"right\">1,234</td><td><a href=\"x\">Iron\u{a0}Man</a></td><td>2,277</td><td>4,600,000,000</td></tr></tbody>";
        let fragment = extract_bytes(page.as_bytes()).unwrap();
        assert_eq!(
            fragment.as_str_lossy(),
            "<tbody><tr class='personal-hiscores__row'><td class='right'>1234</td><td><a href='x'>Iron Man</a></td><td>2277</td><td>4600000000</td></tr></tbody>"
        );
    }

    #[test]
    fn test_single_byte_nbsp() {
        let page = b"<tbody><td>a\xa0b</td></tbody>";
        let fragment = extract_bytes(page).unwrap();
        assert_eq!(fragment.as_bytes(), b"<tbody><td>a b</td></tbody>");
    }

    #[test]
    fn test_utf8_continuation_bytes_survive() {
        // 'à' is C3 A0 in UTF-8
        let page = "<tbody><td>voilà</td></tbody>";
        let fragment = extract_bytes(page.as_bytes()).unwrap();
        assert_eq!(fragment.as_str_lossy(), page);
    }

    #[test]
    fn test_extraction_is_idempotent_on_its_output() {
        let pages: [&[u8]; 3] = [
            b"<div>\"hi\"</div><tbody>\n<tr><td>1,000</td><td>\"q\"</td></tr>\n</tbody>",
            b"<tbody></tbody>",
            "<tbody><td>\u{a0},\n\"</td></tbody>".as_bytes(),
        ];
        for page in pages {
            let once = extract_bytes(page).unwrap();
            let twice = extract_bytes(once.as_bytes()).unwrap();
            assert_eq!(once, twice);
        }
    }
}
