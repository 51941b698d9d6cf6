//! Bank statement rows: CSV reading and value normalisation.
//!
//! Reading is lenient per row. A CSV whose header cannot be read is an error, but a
//! row with a bad date or amount, invalid UTF-8 or a broken record is returned as a
//! [`RawStatementRow`] whose [`RawStatementRow::normalize`] fails, so the importer
//! can record it as failed and carry on with the rest of the file.

use crate::{
    entities::TransactionDirection,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// One statement line with typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRow {
    /// Date on the bank statement
    pub date: NaiveDate,
    /// Narrative text, searched for a tenant reference
    pub description: String,
    /// As printed; may be negative when no direction is given
    pub amount: Decimal,
    /// Credit or debit, when the statement says so
    pub direction: Option<TransactionDirection>,
    /// Payment reference column
    pub reference: Option<String>,
    /// Account the money came from
    pub account: Option<String>,
}

impl StatementRow {
    /// Non-negative amount and the direction of the money, falling back to the
    /// amount's sign when no direction was given.
    #[must_use]
    pub fn resolved(&self) -> (Decimal, TransactionDirection) {
        let direction = self.direction.unwrap_or(if self.amount < Decimal::ZERO {
            TransactionDirection::Debit
        } else {
            TransactionDirection::Credit
        });
        (self.amount.abs(), direction)
    }
}

/// A CSV line before normalisation. Missing columns are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatementRow {
    /// 1-based, header excluded
    pub row_number: usize,
    /// Raw date text
    pub date: String,
    /// Raw narrative
    pub description: String,
    /// Raw amount text
    pub amount: String,
    /// Raw direction token
    pub direction: String,
    /// Raw reference
    pub reference: String,
    /// Raw account
    pub account: String,
    /// Why the record itself could not be read
    pub read_error: Option<String>,
}

impl RawStatementRow {
    /// Turns the raw text into a typed row, or a malformed-row error.
    pub fn normalize(&self) -> Result<StatementRow> {
        let malformed = |message: String| Error::MalformedRow {
            row: self.row_number,
            message,
        };

        if let Some(error) = &self.read_error {
            return Err(malformed(error.clone()));
        }
        let date = parse_date(&self.date)
            .ok_or_else(|| malformed(format!("invalid date '{}'", self.date)))?;
        let amount = parse_amount(&self.amount)
            .ok_or_else(|| malformed(format!("invalid amount '{}'", self.amount)))?;
        let direction = parse_direction(&self.direction)
            .map_err(|_| malformed(format!("unknown direction '{}'", self.direction)))?;
        let description = self.description.trim();
        if description.is_empty() {
            return Err(malformed("missing description".to_string()));
        }

        Ok(StatementRow {
            date,
            description: description.to_string(),
            amount,
            direction,
            reference: non_empty(&self.reference),
            account: non_empty(&self.account),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads statement rows from CSV with a header line.
///
/// Columns are located by header name (case-insensitive): `date`, `description`,
/// `amount`, `direction`, `reference`, `account`. The first three are required.
pub fn read_csv(reader: impl std::io::Read) -> Result<Vec<RawStatementRow>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv.headers()?.iter().map(str::to_lowercase).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| Error::Validation {
            message: format!("Statement is missing the '{name}' column"),
        })
    };
    let date_col = required("date")?;
    let description_col = required("description")?;
    let amount_col = required("amount")?;
    let direction_col = column("direction");
    let reference_col = column("reference");
    let account_col = column("account");

    let mut rows = Vec::new();
    for (i, record) in csv.byte_records().enumerate() {
        let row_number = i + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let stop = e.is_io_error();
                rows.push(RawStatementRow {
                    row_number,
                    read_error: Some(e.to_string()),
                    ..RawStatementRow::default()
                });
                if stop {
                    break;
                }
                continue;
            }
        };
        let invalid_utf8 = std::str::from_utf8(record.as_slice()).is_err();
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default()
        };
        rows.push(RawStatementRow {
            row_number,
            date: field(Some(date_col)),
            description: field(Some(description_col)),
            amount: field(Some(amount_col)),
            direction: field(direction_col),
            reference: field(reference_col),
            account: field(account_col),
            read_error: invalid_utf8.then(|| "invalid UTF-8".to_string()),
        });
    }
    Ok(rows)
}

const CURRENCY_SYMBOLS: [char; 5] = ['$', '€', '£', '¥', '₹'];

/// Parses an amount such as `R 1,300.00`, `-700`, `(700.00)` or `1 250.50 ZAR`.
///
/// Besides the number, only a sign or parentheses, one currency symbol or code of
/// up to three capitals at either end, and whitespace are accepted. Thousands may
/// be grouped by commas or spaces, and `.` is the only decimal separator. Anything
/// else, such as `12abc34` or `1.300,50`, is rejected.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }
    text = take_sign(text, &mut negative)?;
    text = strip_currency(text)?;
    text = take_sign(text, &mut negative)?;

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    let mut digits = ungroup(whole)?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.push('.');
        digits.push_str(fraction);
    }

    let value = Decimal::from_str(&digits).ok()?;
    Some(if negative { -value } else { value })
}

/// Strips one leading or trailing `-`, flipping `negative`. Two signs are rejected.
fn take_sign<'a>(text: &'a str, negative: &mut bool) -> Option<&'a str> {
    let stripped = text
        .strip_prefix('-')
        .or_else(|| text.strip_suffix('-'))
        .map(str::trim);
    match stripped {
        Some(_) if *negative => None,
        Some(rest) => {
            *negative = true;
            Some(rest)
        }
        None => Some(text),
    }
}

/// Removes a currency marker at either end of the amount.
fn strip_currency(text: &str) -> Option<&str> {
    let is_marker = |c: char| CURRENCY_SYMBOLS.contains(&c) || c.is_ascii_uppercase();
    let start = text.find(|c: char| !is_marker(c)).unwrap_or(text.len());
    let end = text
        .char_indices()
        .rev()
        .find(|(_, c)| !is_marker(*c))
        .map_or(start, |(i, c)| i + c.len_utf8());
    if end <= start {
        return None;
    }
    let (prefix, suffix) = (&text[..start], &text[end..]);
    if prefix.chars().count() > 3 || suffix.chars().count() > 3 || (!prefix.is_empty() && !suffix.is_empty()) {
        return None;
    }
    Some(text[start..end].trim())
}

/// The digits of an integer part, with optional comma or space grouping of three.
fn ungroup(whole: &str) -> Option<String> {
    if whole.is_empty() {
        return None;
    }
    let Some(separator) = whole.chars().find(|c| !c.is_ascii_digit()) else {
        return Some(whole.to_string());
    };
    if separator != ',' && separator != ' ' {
        return None;
    }

    let groups: Vec<&str> = whole.split(separator).collect();
    let leading_ok = (1..=3).contains(&groups[0].len());
    let rest_ok = groups[1..].iter().all(|g| g.len() == 3);
    let all_digits = groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()));
    (leading_ok && rest_ok && all_digits).then(|| groups.concat())
}

/// Parses `YYYY-MM-DD`, `DD/MM/YYYY` or `YYYY/MM/DD`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Parses a direction token. An empty token means "use the amount's sign".
pub fn parse_direction(raw: &str) -> Result<Option<TransactionDirection>> {
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(None),
        "credit" | "cr" | "in" => Ok(Some(TransactionDirection::Credit)),
        "debit" | "dr" | "out" => Ok(Some(TransactionDirection::Debit)),
        other => Err(Error::Validation {
            message: format!("unknown direction '{other}'"),
        }),
    }
}
