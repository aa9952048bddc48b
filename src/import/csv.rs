//! Holder lists from explorer CSV exports (Solscan and similar)
//!
//! Column names are matched case-insensitively against a small alias table,
//! so "Address", "owner" and "Wallet" all work. The delimiter is sniffed from
//! the header line.

use chrono::{DateTime, Local};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::holders::types::{total_balance, Holder};

const ADDRESS_COLUMNS: &[&str] = &["address", "owner", "wallet", "account"];
const BALANCE_COLUMNS: &[&str] = &["quantity", "balance", "amount", "tokens"];
const PERCENT_COLUMNS: &[&str] = &["percentage", "percent", "%", "share"];
const RANK_COLUMNS: &[&str] = &["rank", "#", "no", "number"];

const MIN_ADDRESS_LEN: usize = 32;

/// Holders parsed from one export
#[derive(Debug, Clone)]
pub struct ImportedHolders {
    pub holders: Vec<Holder>,
    pub total_balance: f64,
    pub token_mint: Option<String>,
    pub imported_at: DateTime<Local>,
}

impl ImportedHolders {
    pub fn total_holders(&self) -> usize {
        self.holders.len()
    }
}

/// Result of a header-only check of a CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct CsvValidation {
    pub valid: bool,
    pub row_count: usize,
    pub headers: Vec<String>,
    pub has_address: bool,
    pub has_balance: bool,
    pub delimiter: char,
}

/// Pick the most frequent of `,` `;` and tab in the header line
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn normalize_headers(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect()
}

/// Column indices for `aliases`, in alias priority order
fn columns_for(headers: &[String], aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| headers.iter().position(|h| h == alias))
        .collect()
}

/// First non-empty value among `columns` that `parse` accepts
fn first_parsed<T>(record: &StringRecord, columns: &[usize], parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    columns
        .iter()
        .filter_map(|&i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .find_map(parse)
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '%'))
        .collect();
    cleaned.parse().ok()
}

struct ColumnMap {
    address: Vec<usize>,
    balance: Vec<usize>,
    percent: Vec<usize>,
    rank: Vec<usize>,
}

impl ColumnMap {
    fn new(headers: &[String]) -> Self {
        Self {
            address: columns_for(headers, ADDRESS_COLUMNS),
            balance: columns_for(headers, BALANCE_COLUMNS),
            percent: columns_for(headers, PERCENT_COLUMNS),
            rank: columns_for(headers, RANK_COLUMNS),
        }
    }

    fn parse_row(&self, record: &StringRecord) -> Option<Holder> {
        let address = first_parsed(record, &self.address, |v| Some(v.to_string()))?;
        if address.len() < MIN_ADDRESS_LEN {
            return None;
        }

        let balance = first_parsed(record, &self.balance, parse_number)?;
        if balance <= 0.0 {
            return None;
        }

        let mut holder = Holder::new(address, balance);
        holder.percentage = first_parsed(record, &self.percent, parse_number).filter(|p| *p != 0.0);
        holder.rank = first_parsed(record, &self.rank, |v| v.parse::<u32>().ok());
        Some(holder)
    }
}

/// Parse a holder export. Rows without a usable address or a positive
/// balance are skipped; a file with no usable rows is an error.
pub fn import_holders(path: impl AsRef<Path>, token_mint: Option<&str>) -> Result<ImportedHolders> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("CSV file {}: {}", path.display(), e)))?;

    let delimiter = sniff_delimiter(&content);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = normalize_headers(reader.headers()?);
    let columns = ColumnMap::new(&headers);
    debug!(?headers, delimiter = %(delimiter as char), "CSV header");

    let mut holders = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        match columns.parse_row(&record?) {
            Some(holder) => holders.push(holder),
            None => skipped += 1,
        }
    }

    if holders.is_empty() {
        return Err(Error::NotFound(format!(
            "no valid holder data found in {}",
            path.display()
        )));
    }

    let total = total_balance(&holders);
    for holder in holders.iter_mut().filter(|h| h.percentage.is_none()) {
        holder.percentage = Some(if total > 0.0 {
            holder.balance / total * 100.0
        } else {
            0.0
        });
    }

    info!(
        "Imported {} holders from {} ({} rows skipped)",
        holders.len(),
        path.display(),
        skipped
    );

    Ok(ImportedHolders {
        holders,
        total_balance: total,
        token_mint: token_mint.map(str::to_string),
        imported_at: Local::now(),
    })
}

/// Check that a file has address and balance columns, and count its rows
pub fn validate_csv_format(path: impl AsRef<Path>) -> Result<CsvValidation> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let delimiter = sniff_delimiter(&content);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = normalize_headers(reader.headers()?);
    let row_count = reader.records().filter(|r| r.is_ok()).count();

    let has_address = !columns_for(&headers, ADDRESS_COLUMNS).is_empty();
    let has_balance = !columns_for(&headers, BALANCE_COLUMNS).is_empty();

    Ok(CsvValidation {
        valid: has_address && has_balance,
        row_count,
        headers,
        has_address,
        has_balance,
        delimiter: delimiter as char,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ADDR_A: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    const ADDR_B: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_solscan_export() {
        let file = csv_file(&format!(
            "Rank,Address,Quantity,Percentage,Value\n\
             1,{},\"1,500,000.5\",15.5%,$100\n\
             2,{},500000,5%,$30\n\
             3,short,100,1%,$1\n\
             4,{},0,0%,$0\n",
            ADDR_A, ADDR_B, ADDR_A
        ));

        let imported = import_holders(file.path(), Some("Mint")).unwrap();
        assert_eq!(imported.total_holders(), 2);
        assert_eq!(imported.holders[0].owner, ADDR_A);
        assert_eq!(imported.holders[0].balance, 1_500_000.5);
        assert_eq!(imported.holders[0].percentage, Some(15.5));
        assert_eq!(imported.holders[0].rank, Some(1));
        assert!(imported.holders[0].token_account.is_none());
        assert_eq!(imported.total_balance, 2_000_000.5);
        assert_eq!(imported.token_mint.as_deref(), Some("Mint"));
    }

    #[test]
    fn test_semicolon_with_aliases_fills_percentages() {
        let file = csv_file(&format!(
            "Wallet;Tokens\n{};300\n{};100\n",
            ADDR_A, ADDR_B
        ));

        let imported = import_holders(file.path(), None).unwrap();
        assert_eq!(imported.total_holders(), 2);
        assert_eq!(imported.holders[0].percentage, Some(75.0));
        assert_eq!(imported.holders[1].percentage, Some(25.0));
        assert_eq!(imported.holders[1].rank, None);
    }

    #[test]
    fn test_no_valid_rows_is_error() {
        let file = csv_file("address,balance\nshort,100\n");
        let err = import_holders(file.path(), None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = import_holders("/nonexistent/holders.csv", None).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validate_csv_format() {
        let file = csv_file(&format!("Owner\tAmount\tShare\n{}\t10\t1\n{}\t20\t2\n", ADDR_A, ADDR_B));
        let check = validate_csv_format(file.path()).unwrap();
        assert!(check.valid);
        assert_eq!(check.row_count, 2);
        assert_eq!(check.delimiter, '\t');
        assert_eq!(check.headers, vec!["owner", "amount", "share"]);

        let bad = csv_file("name,value\nfoo,1\n");
        let check = validate_csv_format(bad.path()).unwrap();
        assert!(!check.valid);
        assert!(!check.has_address);
    }

    #[test]
    fn test_sniff_delimiter_defaults_to_comma() {
        assert_eq!(sniff_delimiter("address"), b',');
        assert_eq!(sniff_delimiter("a;b;c,d"), b';');
    }
}
