use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::{DateRange, ImportReport, Money, StoreError, Transaction, TransactionListing, UserId};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::categorize::Categorizer;
use crate::entry::manual_account;
use crate::store::{AccountStore, CategoryStore, TransactionStore};

pub const CSV_IMPORT_ACCOUNT: &str = "Manual (CSV import)";

const EXPORT_HEADERS: [&str; 7] = ["Date", "Name", "Merchant", "Account", "Category", "Amount", "Currency"];
const ROW_PREVIEW_CHARS: usize = 50;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV must have header row and at least one data row")]
    NoDataRows,
    #[error("CSV must have date, name/description, and amount columns")]
    MissingColumns,
    #[error("Export is not valid UTF-8: {0}")]
    Encoding(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementRow {
    pub date: NaiveDate,
    pub name: String,
    pub amount: Money,
}

/// Rows that parsed, plus one message per row that did not.
#[derive(Debug, Default)]
pub struct Statement {
    pub rows: Vec<StatementRow>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    name: usize,
    amount: usize,
}

impl Columns {
    fn detect(headers: &csv::StringRecord) -> Result<Self, CsvError> {
        let lowered: Vec<String> = headers.iter().map(str::to_lowercase).collect();
        let find = |needles: &[&str]| {
            lowered
                .iter()
                .position(|h| needles.iter().any(|n| h.contains(n)))
        };
        match (
            find(&["date"]),
            find(&["name", "description", "memo"]),
            find(&["amount", "debit", "credit"]),
        ) {
            (Some(date), Some(name), Some(amount)) => Ok(Columns { date, name, amount }),
            _ => Err(CsvError::MissingColumns),
        }
    }
}

/// Parses a bank statement export. Columns are found by header name; a bad
/// row is reported and skipped rather than failing the whole file.
pub fn parse_statement(data: &str) -> Result<Statement, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers = reader.headers()?.clone();
    let records: Vec<Result<csv::StringRecord, csv::Error>> = reader.records().collect();
    if headers.is_empty() || records.is_empty() {
        return Err(CsvError::NoDataRows);
    }
    let columns = Columns::detect(&headers)?;

    let mut statement = Statement::default();
    for (index, record) in records.into_iter().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                statement.errors.push(format!("Row {}: {e}", index + 1));
                continue;
            }
        };
        match parse_row(&record, columns) {
            Some(row) => statement.rows.push(row),
            None => statement.errors.push(format!("Row: {}...", preview(&record))),
        }
    }
    Ok(statement)
}

fn parse_row(record: &csv::StringRecord, columns: Columns) -> Option<StatementRow> {
    let date = parse_date(record.get(columns.date)?)?;
    let name = record.get(columns.name).filter(|s| !s.is_empty())?;
    let amount = parse_amount(record.get(columns.amount)?)?;
    Some(StatementRow {
        date,
        name: name.to_string(),
        amount,
    })
}

fn preview(record: &csv::StringRecord) -> String {
    record
        .iter()
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .take(ROW_PREVIEW_CHARS)
        .collect()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_amount(s: &str) -> Option<Money> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned = s.replace([',', '$', ' '], "");
    let value = Decimal::from_str(&cleaned).ok()?;
    Some(Money::from_decimal(if negative { -value } else { value }))
}

/// Imports a statement into the user's manual account. Every row is
/// categorized like a manual entry; nothing is marked as an override.
pub async fn import_csv<S>(
    store: &S,
    user: &UserId,
    data: &str,
    currency: &str,
) -> Result<ImportReport, CsvError>
where
    S: AccountStore + CategoryStore + TransactionStore + ?Sized,
{
    let statement = parse_statement(data)?;
    let account = manual_account(store, user, CSV_IMPORT_ACCOUNT).await?;
    let categorizer = Categorizer::new(store);

    let mut report = ImportReport {
        imported: 0,
        errors: statement.errors,
    };
    for row in statement.rows {
        let category_id = categorizer
            .categorize(user, None, &row.name, row.amount)
            .await?;
        let tx = Transaction {
            id: None,
            linked_account_id: account.id,
            provider_tx_id: format!("csv-{}", Uuid::new_v4()),
            date: row.date,
            name: row.name,
            merchant_name: None,
            amount: row.amount,
            currency: currency.to_string(),
            category_id,
            category_override: false,
            pending: false,
        };
        match store.upsert(&tx).await {
            Ok(_) => report.imported += 1,
            Err(e) => {
                warn!(user = %user, error = %e, "csv row not stored");
                report.errors.push(format!("Row {}: {e}", report.imported + 1));
            }
        }
    }

    info!(
        user = %user,
        imported = report.imported,
        errors = report.errors.len(),
        "csv import finished"
    );
    Ok(report)
}

/// First of the month containing `today`, through `today`.
pub fn default_export_range(today: NaiveDate) -> DateRange {
    DateRange::new(DateRange::month_of(today).start, today)
}

pub fn export_csv(listings: &[TransactionListing]) -> Result<String, CsvError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for listing in listings {
        let tx = &listing.transaction;
        writer.write_record([
            tx.date.format("%Y-%m-%d").to_string(),
            tx.name.clone(),
            tx.merchant_name.clone().unwrap_or_default(),
            listing.account_label.clone(),
            listing.category_name.clone().unwrap_or_default(),
            format!("{:.2}", tx.amount.amount()),
            tx.currency.clone(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| CsvError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Encoding(e.to_string()))
}

pub async fn export_transactions<S>(
    store: &S,
    user: &UserId,
    range: DateRange,
) -> Result<String, CsvError>
where
    S: TransactionStore + ?Sized,
{
    let listings = store.list_for_user(user, range).await?;
    export_csv(&listings)
}
