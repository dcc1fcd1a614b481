pub mod csv_parser;

pub use csv_parser::{ColumnIndex, CsvSource, HeaderedRow, RecordParser, RowSource};
