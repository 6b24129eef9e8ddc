//! Header row search and column role resolution.
//!
//! Every row inside the search window is scored against every profile's
//! vocabulary; the row/profile pair that recognizes the most distinct roles
//! wins. A winner that still lacks a date, a description or a resolvable
//! amount is reported with `fallback_required` so the caller can collect a
//! manual mapping instead of guessing.

use serde::Serialize;
use tracing::debug;

use crate::models::{ColumnMapping, ColumnRole, RawRow};
use crate::profiles::{header_key, BankProfile, ProfileRegistry};

/// Header cells longer than this are titles or notes, not column labels.
const MAX_HEADER_CELL_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderDetection {
    pub header_row: usize,
    pub data_start_row: usize,
    pub mapping: ColumnMapping,
    pub confidence: f64,
    pub fallback_required: bool,
    pub profile_id: String,
}

impl HeaderDetection {
    fn fallback(best: Option<Candidate>, generic_id: &str) -> Self {
        let (header_row, mapping, profile_id) = match best {
            Some(c) => (c.row, c.mapping, c.profile_id),
            None => (0, ColumnMapping::new(), generic_id.to_string()),
        };
        Self {
            header_row,
            data_start_row: header_row + 1,
            mapping,
            confidence: 0.0,
            fallback_required: true,
            profile_id,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    row: usize,
    profile_id: String,
    mapping: ColumnMapping,
    score: usize,
    confidence: f64,
}

impl Candidate {
    /// Strictly better than `other`; ties keep the earlier candidate.
    fn beats(&self, other: &Candidate) -> bool {
        let key = |c: &Candidate| (c.score, c.mapping.is_complete());
        match key(self).cmp(&key(other)) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.confidence > other.confidence,
        }
    }
}

/// Locate the header row within the first `window` rows (after each
/// profile's `skip_rows`). With `only` set, just that profile is scored.
pub fn detect_header(
    rows: &[RawRow],
    registry: &ProfileRegistry,
    window: usize,
    only: Option<&BankProfile>,
) -> HeaderDetection {
    let profiles: Vec<&BankProfile> = match only {
        Some(profile) => vec![profile],
        None => registry.candidates().collect(),
    };

    let mut best: Option<Candidate> = None;
    for profile in profiles {
        let start = profile.skip_rows.min(rows.len());
        let end = start.saturating_add(window).min(rows.len());
        for (offset, row) in rows[start..end].iter().enumerate() {
            let Some(candidate) = score_row(start + offset, row, profile) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }
    }

    match best {
        Some(c) if c.mapping.is_complete() => {
            debug!(
                row = c.row,
                profile = %c.profile_id,
                score = c.score,
                confidence = c.confidence,
                "header detected"
            );
            HeaderDetection {
                header_row: c.row,
                data_start_row: c.row + 1,
                mapping: c.mapping,
                confidence: c.confidence,
                fallback_required: false,
                profile_id: c.profile_id,
            }
        }
        other => {
            debug!(
                best_score = other.as_ref().map_or(0, |c| c.score),
                "no confident header, manual mapping required"
            );
            HeaderDetection::fallback(other, &registry.generic().id)
        }
    }
}

fn score_row(index: usize, row: &RawRow, profile: &BankProfile) -> Option<Candidate> {
    // (strength, column) of the best cell per role
    let mut claims: Vec<(ColumnRole, usize, usize)> = Vec::new();
    for (column, cell) in row.cells.iter().enumerate() {
        let key = header_key(cell.as_str());
        if key.is_empty() || key.len() > MAX_HEADER_CELL_LEN {
            continue;
        }
        let Some((role, strength)) = best_role(&key, profile) else {
            continue;
        };
        match claims.iter_mut().find(|(r, _, _)| *r == role) {
            Some(claim) if strength > claim.1 => *claim = (role, strength, column),
            Some(_) => {}
            None => claims.push((role, strength, column)),
        }
    }
    if claims.is_empty() {
        return None;
    }

    let score = claims.len();
    let mut mapping = ColumnMapping::new();
    for (role, _, column) in &claims {
        mapping.insert(*role, *column);
    }
    mapping.prefer_split_amount();
    let expected = profile.expected_roles().max(1);
    let confidence = (score as f64 / expected as f64).clamp(0.0, 1.0);
    Some(Candidate {
        row: index,
        profile_id: profile.id.clone(),
        mapping,
        score,
        confidence,
    })
}

/// Exact matches outrank word matches; longer terms outrank shorter ones.
fn best_role(key: &str, profile: &BankProfile) -> Option<(ColumnRole, usize)> {
    let mut best: Option<(ColumnRole, usize)> = None;
    for (role, terms) in &profile.vocabulary {
        for term in terms {
            let strength = if key == term {
                1000 + term.len()
            } else if contains_words(key, term) {
                term.len()
            } else {
                continue;
            };
            if best.map_or(true, |(_, s)| strength > s) {
                best = Some((*role, strength));
            }
        }
    }
    best
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    haystack
        .match_indices(needle)
        .any(|(start, _)| {
            let end = start + needle.len();
            let before_ok = start == 0 || haystack.as_bytes()[start - 1] == b' ';
            let after_ok = end == haystack.len() || haystack.as_bytes()[end] == b' ';
            before_ok && after_ok
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<RawRow> {
        data.iter().map(|r| RawRow::from_texts(r)).collect()
    }

    #[test]
    fn test_detects_header_after_letterhead() {
        let registry = ProfileRegistry::builtin();
        let data = rows(&[
            &["Banco Santander S.A."],
            &["Extracto de movimientos", ""],
            &[""],
            &["Fecha Operación", "Fecha Valor", "Concepto", "Importe", "Saldo", "Divisa"],
            &["01/01/2024", "01/01/2024", "Nómina", "1.500,00", "2.000,00", "EUR"],
        ]);
        let detection = detect_header(&data, &registry, 20, None);
        assert!(!detection.fallback_required);
        assert_eq!(detection.header_row, 3);
        assert_eq!(detection.data_start_row, 4);
        assert_eq!(detection.profile_id, "santander");
        assert_eq!(detection.mapping.get(ColumnRole::Date), Some(0));
        assert_eq!(detection.mapping.get(ColumnRole::ValueDate), Some(1));
        assert_eq!(detection.mapping.get(ColumnRole::Description), Some(2));
        assert_eq!(detection.mapping.get(ColumnRole::Amount), Some(3));
        assert_eq!(detection.mapping.get(ColumnRole::Balance), Some(4));
        assert!((detection.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prefers_cargo_abono_over_amount() {
        let registry = ProfileRegistry::builtin();
        let data = rows(&[&["Fecha", "Concepto", "Importe", "Cargo", "Abono", "Saldo"]]);
        let detection = detect_header(&data, &registry, 20, None);
        assert!(!detection.fallback_required);
        assert_eq!(detection.mapping.get(ColumnRole::Amount), None);
        assert_eq!(detection.mapping.get(ColumnRole::Cargo), Some(3));
        assert_eq!(detection.mapping.get(ColumnRole::Abono), Some(4));
    }

    #[test]
    fn test_no_vocabulary_requires_fallback() {
        let registry = ProfileRegistry::builtin();
        let data = rows(&[&["foo", "bar", "baz"], &["1", "2", "3"]]);
        let detection = detect_header(&data, &registry, 20, None);
        assert!(detection.fallback_required);
        assert_eq!(detection.confidence, 0.0);
        assert!(detection.mapping.is_empty());
    }

    #[test]
    fn test_partial_header_requires_fallback() {
        let registry = ProfileRegistry::builtin();
        let data = rows(&[&["Fecha", "Concepto", "Notas"]]);
        let detection = detect_header(&data, &registry, 20, None);
        assert!(detection.fallback_required);
        assert_eq!(detection.confidence, 0.0);
        assert_eq!(detection.mapping.get(ColumnRole::Date), Some(0));
    }

    #[test]
    fn test_header_within_and_beyond_window() {
        let registry = ProfileRegistry::builtin();
        let window = 5;
        for k in 0..8 {
            let mut data: Vec<RawRow> = (0..k)
                .map(|i| RawRow::from_texts(&[format!("Página {i} de la cartilla")]))
                .collect();
            data.push(RawRow::from_texts(&["Fecha", "Concepto", "Importe"]));
            data.push(RawRow::from_texts(&["02/01/2024", "Recibo luz", "-45,10"]));
            let detection = detect_header(&data, &registry, window, None);
            if k < window {
                assert!(!detection.fallback_required, "k = {k}");
                assert_eq!(detection.header_row, k);
            } else {
                assert!(detection.fallback_required, "k = {k}");
            }
        }
    }

    #[test]
    fn test_value_date_not_mistaken_for_date() {
        let registry = ProfileRegistry::builtin();
        let data = rows(&[&["Fecha valor", "Fecha", "Descripción", "Importe"]]);
        let detection = detect_header(&data, &registry, 20, None);
        assert_eq!(detection.mapping.get(ColumnRole::Date), Some(1));
        assert_eq!(detection.mapping.get(ColumnRole::ValueDate), Some(0));
    }

    #[test]
    fn test_forced_profile_honors_skip_rows() {
        let registry = ProfileRegistry::builtin();
        let mut profile = registry.get("caixabank").unwrap().clone();
        profile.skip_rows = 2;
        let data = rows(&[
            &["Fecha", "Movimiento", "Importe"],
            &["portada"],
            &["Fecha", "Fecha valor", "Movimiento", "Más datos", "Importe", "Saldo"],
        ]);
        let detection = detect_header(&data, &registry, 20, Some(&profile));
        assert_eq!(detection.header_row, 2);
        assert_eq!(detection.profile_id, "caixabank");
        assert_eq!(detection.mapping.get(ColumnRole::Reference), Some(3));
    }

    #[test]
    fn test_empty_rows_fallback() {
        let registry = ProfileRegistry::builtin();
        let detection = detect_header(&[], &registry, 20, None);
        assert!(detection.fallback_required);
        assert_eq!(detection.profile_id, "generic");
    }

    #[test]
    fn test_contains_words() {
        assert!(contains_words("fecha de emision", "fecha"));
        assert!(contains_words("importe eur", "importe"));
        assert!(!contains_words("extracto de movimientos", "movimiento"));
        assert!(!contains_words("refrigerador", "ref"));
    }
}
