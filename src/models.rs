use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// One source cell, normalized to text at ingestion.
///
/// `Number` carries canonical point-decimal text (`"1234.56"`) produced from a
/// numeric spreadsheet cell, so it is parsed without the profile's locale rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(String),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Cell::Empty => "",
            Cell::Text(s) | Cell::Number(s) => s,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// One source row; meaning is assigned only after header detection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RawRow {
    pub cells: Vec<Cell>,
    /// 1-based line (or sheet row) in the source file; 0 when not read from a file.
    #[serde(skip)]
    pub line: usize,
}

impl RawRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells, line: 0 }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Line in the source file, or `index + 1` for rows built in memory.
    pub fn source_line(&self, index: usize) -> usize {
        if self.line > 0 {
            self.line
        } else {
            index + 1
        }
    }

    pub fn from_texts<S: AsRef<str>>(values: &[S]) -> Self {
        Self::new(values.iter().map(|v| Cell::text(v.as_ref())).collect())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Text of the cell at `index`, or `""` when missing or empty.
    pub fn text(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.as_str().trim()).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    pub fn first_non_empty(&self) -> Option<&str> {
        self.cells
            .iter()
            .map(|c| c.as_str().trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    ValueDate,
    Amount,
    Cargo,
    Abono,
    Description,
    Counterparty,
    Reference,
    Balance,
    Currency,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 10] = [
        ColumnRole::Date,
        ColumnRole::ValueDate,
        ColumnRole::Amount,
        ColumnRole::Cargo,
        ColumnRole::Abono,
        ColumnRole::Description,
        ColumnRole::Counterparty,
        ColumnRole::Reference,
        ColumnRole::Balance,
        ColumnRole::Currency,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::ValueDate => "value_date",
            Self::Amount => "amount",
            Self::Cargo => "cargo",
            Self::Abono => "abono",
            Self::Description => "description",
            Self::Counterparty => "counterparty",
            Self::Reference => "reference",
            Self::Balance => "balance",
            Self::Currency => "currency",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().find(|r| r.key() == key).copied()
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a movement's signed amount comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSource {
    Single(usize),
    Split { cargo: usize, abono: usize },
}

/// Resolved role → column index table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    roles: BTreeMap<ColumnRole, usize>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: ColumnRole, index: usize) -> Self {
        self.insert(role, index);
        self
    }

    pub fn insert(&mut self, role: ColumnRole, index: usize) {
        self.roles.insert(role, index);
    }

    pub fn remove(&mut self, role: ColumnRole) -> Option<usize> {
        self.roles.remove(&role)
    }

    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        self.roles.get(&role).copied()
    }

    pub fn contains(&self, role: ColumnRole) -> bool {
        self.roles.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnRole, usize)> + '_ {
        self.roles.iter().map(|(r, i)| (*r, *i))
    }

    /// Split cargo/abono columns win over a combined amount column.
    pub fn amount_source(&self) -> Option<AmountSource> {
        match (self.get(ColumnRole::Cargo), self.get(ColumnRole::Abono)) {
            (Some(cargo), Some(abono)) => Some(AmountSource::Split { cargo, abono }),
            _ => self.get(ColumnRole::Amount).map(AmountSource::Single),
        }
    }

    /// Drop the combined amount column when a full cargo/abono pair is mapped.
    pub fn prefer_split_amount(&mut self) {
        if self.contains(ColumnRole::Cargo) && self.contains(ColumnRole::Abono) {
            self.remove(ColumnRole::Amount);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.contains(ColumnRole::Date)
            && self.contains(ColumnRole::Description)
            && self.amount_source().is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.contains(ColumnRole::Date) {
            return Err(IngestError::InvalidMapping("no date column".to_string()));
        }
        if !self.contains(ColumnRole::Description) {
            return Err(IngestError::InvalidMapping("no description column".to_string()));
        }
        if self.amount_source().is_none() {
            return Err(IngestError::InvalidMapping(
                "needs an amount column or both cargo and abono".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for ColumnMapping {
    type Err = IngestError;

    /// Parses `date=0,description=1,amount=2`.
    fn from_str(s: &str) -> Result<Self> {
        let mut mapping = ColumnMapping::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, index) = pair
                .split_once('=')
                .ok_or_else(|| IngestError::InvalidMapping(format!("expected role=index, got '{pair}'")))?;
            let role = ColumnRole::from_key(key.trim())
                .ok_or_else(|| IngestError::InvalidMapping(format!("unknown role '{}'", key.trim())))?;
            let index: usize = index
                .trim()
                .parse()
                .map_err(|_| IngestError::InvalidMapping(format!("bad column index in '{pair}'")))?;
            mapping.insert(role, index);
        }
        mapping.prefer_split_amount();
        Ok(mapping)
    }
}

/// One normalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMovement {
    pub date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub description: String,
    pub counterparty: Option<String>,
    pub reference: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
    pub duplicate_hash: String,
    pub is_duplicate: bool,
    /// 1-based row number in the source file.
    pub source_row: usize,
    pub raw: RawRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DuplicateStats {
    pub total: usize,
    pub duplicates: usize,
    pub unique: usize,
    pub duplicate_groups: usize,
    pub distinct: usize,
}
