use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::dedupe::movement_hash;
use crate::models::{AmountSource, Cell, ColumnMapping, ColumnRole, ParsedMovement, RawRow};
use crate::profiles::{BankProfile, DateFormat, DecimalSeparator};
use crate::reader::excel_serial_to_date;

const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '¥'];

static EMPTY_CELL: Cell = Cell::Empty;

/// Why a row did not produce a movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingDate,
    InvalidDate(String),
    NoAmountColumn,
    MissingAmount,
    InvalidAmount(String),
}

impl Rejection {
    pub fn is_date_failure(&self) -> bool {
        matches!(self, Self::MissingDate | Self::InvalidDate(_))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDate => write!(f, "missing date"),
            Self::InvalidDate(raw) => write!(f, "unparsable date '{raw}'"),
            Self::NoAmountColumn => write!(f, "no amount column mapped"),
            Self::MissingAmount => write!(f, "missing amount"),
            Self::InvalidAmount(raw) => write!(f, "unparsable amount '{raw}'"),
        }
    }
}

/// Years accepted for a posting date; anything else is a stray number or a typo.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1970..=2999;

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    YEAR_RANGE.contains(&date.year()).then_some(date)
}

pub fn parse_date(raw: &str, format: DateFormat) -> Option<NaiveDate> {
    let raw = raw.trim();
    // "01/01/2024 10:32" and "2024-01-01T00:00:00" parse by their date part
    let date_part = raw
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or("");
    if date_part.is_empty() {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(date_part, format.pattern())
        .or_else(|_| NaiveDate::parse_from_str(date_part, DateFormat::Iso.pattern()))
        .ok()?;
    plausible(parsed)
}

/// Numeric cells in a date column are Excel serial dates.
pub fn parse_date_cell(cell: &Cell, format: DateFormat) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => parse_date(s, format),
        Cell::Number(s) => s
            .parse::<f64>()
            .ok()
            .and_then(excel_serial_to_date)
            .and_then(plausible),
    }
}

/// Locale-aware amount parsing; the result carries exactly two decimals.
pub fn parse_amount(raw: &str, separator: DecimalSeparator) -> Option<Decimal> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c) && *c != '\'')
        .collect();

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.to_string();
    }
    if let Some(inner) = s.strip_suffix('-') {
        negative = !negative;
        s = inner.to_string();
    }
    strip_sign(&mut s, &mut negative);
    // "EUR -5,00"
    if strip_currency_code(&mut s) {
        strip_sign(&mut s, &mut negative);
    }
    if s.is_empty() || s.starts_with(['-', '+']) {
        return None;
    }

    let canonical = match separator {
        DecimalSeparator::Comma => s.replace('.', "").replace(',', "."),
        DecimalSeparator::Point => s.replace(',', ""),
    };
    let value = Decimal::from_str(&canonical).ok()?;
    Some(normalize_amount(if negative { -value } else { value }))
}

/// Numeric spreadsheet cells are already point-decimal.
pub fn parse_amount_cell(cell: &Cell, separator: DecimalSeparator) -> Option<Decimal> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => parse_amount(s, separator),
        Cell::Number(s) => parse_amount(s, DecimalSeparator::Point),
    }
}

pub fn normalize_amount(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded = Decimal::ZERO;
    }
    rounded.rescale(2);
    rounded
}

fn strip_sign(s: &mut String, negative: &mut bool) {
    if let Some(inner) = s.strip_prefix('-') {
        *negative = !*negative;
        *s = inner.to_string();
    } else if let Some(inner) = s.strip_prefix('+') {
        *s = inner.to_string();
    }
}

/// Drops a leading or trailing ISO code such as `EUR`. True when one was removed.
fn strip_currency_code(s: &mut String) -> bool {
    let is_code = |part: Option<&str>| {
        part.is_some_and(|p| p.len() == 3 && p.chars().all(|c| c.is_ascii_alphabetic()))
    };
    if s.len() <= 3 {
        return false;
    }
    if is_code(s.get(s.len() - 3..)) {
        s.truncate(s.len() - 3);
        true
    } else if is_code(s.get(..3)) {
        s.replace_range(..3, "");
        true
    } else {
        false
    }
}

/// Signed amount for the row: the single amount column, or abono minus cargo
/// with blank cells counting as zero. A negative cargo is an export that
/// already signs its debits and counts by magnitude; abono keeps its sign.
fn resolve_amount(
    row: &RawRow,
    mapping: &ColumnMapping,
    separator: DecimalSeparator,
) -> Result<Decimal, Rejection> {
    match mapping.amount_source() {
        None => Err(Rejection::NoAmountColumn),
        Some(AmountSource::Single(index)) => {
            let cell = row.cell(index).unwrap_or(&EMPTY_CELL);
            if cell.is_blank() {
                return Err(Rejection::MissingAmount);
            }
            parse_amount_cell(cell, separator)
                .ok_or_else(|| Rejection::InvalidAmount(cell.as_str().to_string()))
        }
        Some(AmountSource::Split { cargo, abono }) => {
            let side = |index: usize| -> Result<Decimal, Rejection> {
                let cell = row.cell(index).unwrap_or(&EMPTY_CELL);
                if cell.is_blank() {
                    return Ok(Decimal::ZERO);
                }
                parse_amount_cell(cell, separator)
                    .ok_or_else(|| Rejection::InvalidAmount(cell.as_str().to_string()))
            };
            let credit = side(abono)?;
            let debit = side(cargo)?.abs();
            Ok(normalize_amount(credit - debit))
        }
    }
}

fn optional_text(row: &RawRow, mapping: &ColumnMapping, role: ColumnRole) -> Option<String> {
    let text = row.text(mapping.get(role)?);
    (!text.is_empty()).then(|| text.to_string())
}

/// Turn one data row into a movement. An empty description is allowed here;
/// the caller decides what to do with it.
pub fn parse_row(
    row: &RawRow,
    mapping: &ColumnMapping,
    profile: &BankProfile,
    source_row: usize,
) -> Result<ParsedMovement, Rejection> {
    let date_cell = mapping
        .get(ColumnRole::Date)
        .and_then(|i| row.cell(i))
        .unwrap_or(&EMPTY_CELL);
    if date_cell.is_blank() {
        return Err(Rejection::MissingDate);
    }
    let date = parse_date_cell(date_cell, profile.date_format)
        .ok_or_else(|| Rejection::InvalidDate(date_cell.as_str().to_string()))?;

    let amount = resolve_amount(row, mapping, profile.decimal_separator)?;

    let description = mapping
        .get(ColumnRole::Description)
        .map(|i| row.text(i).to_string())
        .unwrap_or_default();

    let value_date = mapping
        .get(ColumnRole::ValueDate)
        .and_then(|i| row.cell(i))
        .and_then(|c| parse_date_cell(c, profile.date_format));
    let balance = mapping
        .get(ColumnRole::Balance)
        .and_then(|i| row.cell(i))
        .and_then(|c| parse_amount_cell(c, profile.decimal_separator));

    Ok(ParsedMovement {
        date,
        value_date,
        amount,
        duplicate_hash: movement_hash(date, amount, &description),
        description,
        counterparty: optional_text(row, mapping, ColumnRole::Counterparty),
        reference: optional_text(row, mapping, ColumnRole::Reference),
        balance,
        currency: optional_text(row, mapping, ColumnRole::Currency),
        is_duplicate: false,
        source_row,
        raw: row.clone(),
    })
}
