use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::models::{DuplicateStats, ParsedMovement};
use crate::parser::normalize_amount;
use crate::text::fold_words;

/// Bytes of the SHA-256 digest kept in the hex token.
const HASH_BYTES: usize = 16;

/// Lowercase, no diacritics, punctuation as single spaces, trimmed.
pub fn normalize_description(description: &str) -> String {
    fold_words(description)
}

/// Stable content identity of a movement: posting date, two-decimal amount
/// and normalized description.
pub fn movement_hash(date: NaiveDate, amount: Decimal, description: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        date.format("%Y-%m-%d"),
        normalize_amount(amount),
        normalize_description(description)
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..HASH_BYTES])
}

/// Anything that can be compared against a parsed movement by content.
pub trait Fingerprint {
    fn posting_date(&self) -> NaiveDate;
    fn signed_amount(&self) -> Decimal;
    fn description_text(&self) -> &str;

    fn fingerprint(&self) -> String {
        movement_hash(self.posting_date(), self.signed_amount(), self.description_text())
    }
}

impl Fingerprint for ParsedMovement {
    fn posting_date(&self) -> NaiveDate {
        self.date
    }

    fn signed_amount(&self) -> Decimal {
        self.amount
    }

    fn description_text(&self) -> &str {
        &self.description
    }

    fn fingerprint(&self) -> String {
        self.duplicate_hash.clone()
    }
}

/// A movement already held by the persistence layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMovement {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

impl Fingerprint for StoredMovement {
    fn posting_date(&self) -> NaiveDate {
        self.date
    }

    fn signed_amount(&self) -> Decimal {
        self.amount
    }

    fn description_text(&self) -> &str {
        &self.description
    }
}

fn group_sizes(movements: &[ParsedMovement]) -> HashMap<&str, usize> {
    let mut sizes: HashMap<&str, usize> = HashMap::new();
    for m in movements {
        *sizes.entry(m.duplicate_hash.as_str()).or_default() += 1;
    }
    sizes
}

/// Flag every member of a hash group with more than one movement.
pub fn flag_duplicates(movements: &mut [ParsedMovement]) {
    let repeated: HashSet<String> = group_sizes(movements)
        .into_iter()
        .filter(|(_, size)| *size > 1)
        .map(|(hash, _)| hash.to_string())
        .collect();
    for m in movements.iter_mut() {
        m.is_duplicate = repeated.contains(&m.duplicate_hash);
    }
}

/// Keep the first movement per hash, in original order.
pub fn dedupe(movements: Vec<ParsedMovement>) -> Vec<ParsedMovement> {
    let mut seen: HashSet<String> = HashSet::new();
    movements
        .into_iter()
        .filter(|m| seen.insert(m.duplicate_hash.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CrossBatchResult {
    pub kept: Vec<ParsedMovement>,
    pub excluded: Vec<ParsedMovement>,
}

impl CrossBatchResult {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}

/// Drop movements whose content already exists in `existing`.
pub fn exclude_existing<F: Fingerprint>(
    movements: Vec<ParsedMovement>,
    existing: &[F],
) -> CrossBatchResult {
    let stored: HashSet<String> = existing.iter().map(Fingerprint::fingerprint).collect();
    let (excluded, kept) = movements
        .into_iter()
        .partition(|m| stored.contains(&m.duplicate_hash));
    CrossBatchResult { kept, excluded }
}

pub fn duplicate_stats(movements: &[ParsedMovement]) -> DuplicateStats {
    let sizes = group_sizes(movements);
    let total = movements.len();
    let duplicates: usize = sizes.values().filter(|s| **s > 1).sum();
    DuplicateStats {
        total,
        duplicates,
        unique: total - duplicates,
        duplicate_groups: sizes.values().filter(|s| **s > 1).count(),
        distinct: sizes.len(),
    }
}
