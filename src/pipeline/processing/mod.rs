pub mod extractor;
pub mod row_parser;

pub use extractor::{extract, TableFragment};
pub use row_parser::{parse, ParsedPage};
