use crate::error::ParseError;
use crate::pipeline::processing::extractor::TableFragment;
use crate::types::Record;
use scraper::{ElementRef, Html};
use tracing::debug;

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

const SECTIONS: &[&str] = &["tbody", "thead", "tfoot"];

/// Records decoded from one page, plus the rows that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub records: Vec<Record>,
    pub skipped: Vec<ParseError>,
}

/// Parse a normalized fragment into records.
///
/// The first `header_rows_to_skip` rows are dropped unconditionally. Rows
/// that are too short or whose fields do not parse are reported in
/// [`ParsedPage::skipped`] and never produce a record. Bad nesting fails the
/// whole page with [`ParseError::Malformed`].
pub fn parse(
    fragment: &TableFragment,
    header_rows_to_skip: usize,
) -> Result<ParsedPage, ParseError> {
    check_nesting(fragment.as_bytes())?;

    // html5ever drops table-section tags outside a table, so give it one
    let markup = format!("<table>{}</table>", fragment.as_str_lossy());
    let document = Html::parse_fragment(&markup);
    for diagnostic in &document.errors {
        debug!("Tolerated markup issue: {}", diagnostic);
    }

    let bodies: Vec<ElementRef> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tbody")
        .collect();
    let tbody = match bodies.as_slice() {
        [only] => *only,
        other => {
            return Err(ParseError::Malformed(format!(
                "expected one tbody, found {}",
                other.len()
            )))
        }
    };

    let mut page = ParsedPage::default();
    let rows = child_elements(tbody, "tr").into_iter().enumerate();
    for (index, row) in rows.skip(header_rows_to_skip) {
        match parse_row(index, row) {
            Ok(record) => page.records.push(record),
            Err(e) => {
                debug!("Skipping row: {}", e);
                page.skipped.push(e);
            }
        }
    }
    Ok(page)
}

/// Require every opened tag to be closed in order, rows to sit directly in a
/// table section and cells to sit directly in a row. Self-closing tags count
/// as empty elements.
fn check_nesting(markup: &[u8]) -> Result<(), ParseError> {
    let mut open: Vec<String> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = markup[pos..].iter().position(|&b| b == b'<') {
        let start = pos + offset;
        let rest = &markup[start..];

        if rest.starts_with(b"<!--") {
            pos = match find(rest, b"-->") {
                Some(end) => start + end + 3,
                None => return Err(ParseError::Malformed("unterminated comment".into())),
            };
            continue;
        }
        let closing = rest.get(1) == Some(&b'/');
        let name_start = if closing { 2 } else { 1 };
        match rest.get(name_start) {
            Some(b) if b.is_ascii_alphabetic() || *b == b'!' || *b == b'?' => {}
            // a literal '<' in text
            _ => {
                pos = start + 1;
                continue;
            }
        }
        let Some(end) = tag_end(rest) else {
            return Err(ParseError::Malformed(format!(
                "unterminated tag at byte {start}"
            )));
        };
        pos = start + end + 1;

        let tag = &rest[1..end];
        if matches!(tag.first(), Some(b'!') | Some(b'?')) {
            continue;
        }
        let name: String = tag[name_start - 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric())
            .map(|b| b.to_ascii_lowercase() as char)
            .collect();
        let is_void = VOID_ELEMENTS.contains(&name.as_str());

        if closing {
            if is_void {
                continue;
            }
            match open.pop() {
                Some(top) if top == name => {}
                Some(top) => {
                    return Err(ParseError::Malformed(format!("</{name}> closes <{top}>")))
                }
                None => return Err(ParseError::Malformed(format!("stray </{name}>"))),
            }
            continue;
        }

        let parent = open.last().map(String::as_str);
        let in_section = parent.is_some_and(|p| SECTIONS.contains(&p));
        let allowed = match name.as_str() {
            "tr" => in_section,
            "td" | "th" => parent == Some("tr"),
            _ => !in_section && parent != Some("tr"),
        };
        if !allowed {
            return Err(ParseError::Malformed(format!(
                "<{name}> inside <{}>",
                parent.unwrap_or("fragment")
            )));
        }

        let self_closing = tag.iter().rev().find(|b| !b.is_ascii_whitespace()) == Some(&b'/');
        if !is_void && !self_closing {
            open.push(name);
        }
    }

    match open.last() {
        Some(unclosed) => Err(ParseError::Malformed(format!("unclosed <{unclosed}>"))),
        None => Ok(()),
    }
}

/// Index of the `>` ending the tag at the start of `tag`, skipping quoted
/// attribute values.
fn tag_end(tag: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (i, &b) in tag.iter().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_row(index: usize, row: ElementRef) -> Result<Record, ParseError> {
    let cells = child_elements(row, "td");
    if cells.len() < 4 {
        return Err(ParseError::ShortRow {
            row: index,
            cells: cells.len(),
        });
    }

    Ok(Record {
        rank: parse_number(index, "rank", &own_text(cells[0]))?,
        name: anchor_text(index, cells[1])?,
        level: parse_number(index, "level", &own_text(cells[2]))?,
        xp: parse_number(index, "xp", &own_text(cells[3]))?,
    })
}

fn child_elements<'a>(parent: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == name)
        .collect()
}

/// Text directly inside the cell, ignoring nested elements.
fn own_text(cell: ElementRef) -> String {
    cell.children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

fn anchor_text(index: usize, cell: ElementRef) -> Result<String, ParseError> {
    let name = cell
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .map(|a| a.text().collect::<String>().replace('\u{a0}', " ").trim().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ParseError::FieldParse {
            row: index,
            field: "name",
            value: cell.text().collect::<String>(),
        });
    }
    Ok(name)
}

/// Unsigned decimal digits only; signs and whitespace inside the value are rejected.
fn parse_number<T: std::str::FromStr>(
    index: usize,
    field: &'static str,
    text: &str,
) -> Result<T, ParseError> {
    let invalid = || ParseError::FieldParse {
        row: index,
        field,
        value: text.to_string(),
    };
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse().map_err(|_| invalid())
}
