//! Offline holder sources

pub mod csv;

pub use self::csv::{import_holders, validate_csv_format, CsvValidation, ImportedHolders};
