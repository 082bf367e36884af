//! CSV transaction loading.
//!
//! Expected header: `country,type,title[,comment]` (any column order).
//! Bad rows are skipped with a warning rather than failing the whole file.

use crate::error::InputError;
use crate::types::{Transaction, TransactionType};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    country: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    comment: Option<String>,
}

/// A row that could not be turned into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number in the file (the header is line 1)
    pub row: usize,
    pub reason: String,
}

/// Transactions loaded from one file, plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedTransactions {
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<RejectedRow>,
}

/// Load transactions from a CSV file.
pub fn load_csv(path: &Path) -> Result<LoadedTransactions, InputError> {
    if !path.exists() {
        return Err(InputError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|e| InputError::Csv(e.into()))?;
    let loaded = read_csv(file)?;
    tracing::debug!(
        "Loaded {} transactions from {:?} ({} rejected)",
        loaded.transactions.len(),
        path,
        loaded.rejected.len()
    );
    Ok(loaded)
}

/// Parse transactions from any CSV reader.
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<LoadedTransactions, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut loaded = LoadedTransactions::default();

    for (line, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row_num = line + 2;
        let parsed = match record {
            Ok(row) => parse_row(row, row_num),
            Err(e) if e.is_io_error() => return Err(InputError::Csv(e)),
            Err(e) => Err(format!("unreadable row: {e}")),
        };

        match parsed {
            Ok(tx) => loaded.transactions.push(tx),
            Err(reason) => {
                tracing::warn!("Row {row_num}: {reason}, skipping");
                loaded.rejected.push(RejectedRow {
                    row: row_num,
                    reason,
                });
            }
        }
    }

    Ok(loaded)
}

fn parse_row(row: CsvRow, row_num: usize) -> Result<Transaction, String> {
    let title = row.title.ok_or("missing title")?;
    let country = row.country.ok_or("missing country")?;

    let kind = match row.kind.as_deref() {
        None => TransactionType::Expense,
        Some(raw) => TransactionType::parse(raw).unwrap_or_else(|| {
            tracing::warn!("Row {row_num}: Invalid type '{raw}', defaulting to 'expense'");
            TransactionType::Expense
        }),
    };

    let tx = Transaction::new(title, country, kind).map_err(|e| e.to_string())?;
    Ok(match row.comment {
        Some(comment) => tx.with_comment(comment),
        None => tx,
    })
}
