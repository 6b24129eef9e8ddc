use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace};

use crate::dedupe::{dedupe, duplicate_stats, flag_duplicates};
use crate::error::{IngestError, Result};
use crate::filetype::{detect_file_kind, FileKind};
use crate::header::{detect_header, HeaderDetection};
use crate::junk::is_junk;
use crate::models::{ColumnMapping, DuplicateStats, ParsedMovement, RawRow};
use crate::parser::{parse_row, Rejection};
use crate::profiles::{BankProfile, ProfileRegistry};
use crate::reader::read_rows;

pub const DEFAULT_HEADER_SEARCH_ROWS: usize = 20;
pub const DEFAULT_PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub header_search_rows: usize,
    pub preview_limit: usize,
    pub strict_dates: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            header_search_rows: DEFAULT_HEADER_SEARCH_ROWS,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            strict_dates: false,
        }
    }
}

/// Column mapping collected from the user after `fallback_required`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualMapping {
    pub mapping: ColumnMapping,
    /// 1-based source row (file line) of the first data row.
    pub data_start_row: usize,
    /// Profile whose date format and decimal separator apply. Generic when unset.
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub file_name: &'a str,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
    pub profile_id: Option<&'a str>,
    pub manual: Option<ManualMapping>,
}

impl<'a> ImportRequest<'a> {
    pub fn new(file_name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            file_name,
            content_type: None,
            bytes,
            profile_id: None,
            manual: None,
        }
    }

    pub fn content_type(mut self, content_type: Option<&'a str>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn profile(mut self, profile_id: Option<&'a str>) -> Self {
        self.profile_id = profile_id;
        self
    }

    pub fn manual(mut self, manual: Option<ManualMapping>) -> Self {
        self.manual = manual;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub movements: Vec<ParsedMovement>,
    pub total_rows: usize,
    pub errors: Vec<String>,
    pub bank_id: String,
    pub bank_name: String,
    pub file_kind: FileKind,
    pub file_checksum: String,
    pub header: Option<HeaderDetection>,
    pub fallback_required: bool,
    pub confidence: f64,
    /// Junk rows and rows silently dropped for date reasons.
    pub skipped_rows: usize,
    pub preview: Vec<ParsedMovement>,
    pub duplicate_stats: DuplicateStats,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl ImportResult {
    fn empty(kind: FileKind, checksum: String, bank: &BankProfile) -> Self {
        Self {
            movements: Vec::new(),
            total_rows: 0,
            errors: Vec::new(),
            bank_id: bank.id.clone(),
            bank_name: bank.name.clone(),
            file_kind: kind,
            file_checksum: checksum,
            header: None,
            fallback_required: false,
            confidence: 0.0,
            skipped_rows: 0,
            preview: Vec::new(),
            duplicate_stats: DuplicateStats::default(),
            date_range: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && !self.fallback_required
    }

    /// Keep the first movement of each duplicate group and recompute the
    /// flags, stats, preview and date range. Returns how many were removed.
    pub fn dedupe(&mut self, preview_limit: usize) -> usize {
        let before = self.movements.len();
        self.movements = dedupe(std::mem::take(&mut self.movements));
        self.summarize(preview_limit);
        before - self.movements.len()
    }

    fn summarize(&mut self, preview_limit: usize) {
        flag_duplicates(&mut self.movements);
        self.duplicate_stats = duplicate_stats(&self.movements);
        self.preview = self.movements.iter().take(preview_limit).cloned().collect();
        self.date_range = date_range(&self.movements);
    }
}

/// SHA-256 hex digest of the raw file bytes.
pub fn file_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Run the whole pipeline over one file. Never fails: unreadable or empty
/// input comes back as a result with no movements and a single error.
pub fn import_statement(
    registry: &ProfileRegistry,
    options: &ImportOptions,
    request: &ImportRequest<'_>,
) -> ImportResult {
    let kind = detect_file_kind(request.file_name, request.content_type);
    let checksum = file_checksum(request.bytes);
    debug!(file = request.file_name, kind = kind.key(), "importing statement");

    match run(registry, options, request, kind, checksum.clone()) {
        Ok(result) => result,
        Err(e) => {
            info!(file = request.file_name, error = %e, "import failed");
            let mut result = ImportResult::empty(kind, checksum, registry.generic());
            result.errors.push(e.to_string());
            result
        }
    }
}

fn run(
    registry: &ProfileRegistry,
    options: &ImportOptions,
    request: &ImportRequest<'_>,
    kind: FileKind,
    checksum: String,
) -> Result<ImportResult> {
    let hint = request
        .profile_id
        .map(|id| registry.get(id).ok_or_else(|| IngestError::UnknownProfile(id.to_string())))
        .transpose()?;
    let rows = read_rows(kind, request.bytes)?;

    let detection = match &request.manual {
        Some(manual) => manual_detection(registry, manual, hint, &rows)?,
        None => detect_header(&rows, registry, options.header_search_rows, hint),
    };

    if detection.fallback_required {
        let mut result = ImportResult::empty(kind, checksum, registry.generic());
        result.total_rows = rows.len();
        result.fallback_required = true;
        result.header = Some(detection);
        info!(file = request.file_name, rows = rows.len(), "header not recognized");
        return Ok(result);
    }

    let profile = registry
        .get(&detection.profile_id)
        .unwrap_or_else(|| registry.generic());
    let mut result = ImportResult::empty(kind, checksum, profile);
    result.total_rows = rows.len();
    result.confidence = detection.confidence;

    parse_rows(&rows, &detection, profile, options, &mut result);

    result.summarize(options.preview_limit);
    result.header = Some(detection);

    info!(
        file = request.file_name,
        bank = %result.bank_id,
        rows = result.total_rows,
        accepted = result.movements.len(),
        skipped = result.skipped_rows,
        errors = result.errors.len(),
        duplicates = result.duplicate_stats.duplicates,
        "import finished"
    );
    Ok(result)
}

fn manual_detection(
    registry: &ProfileRegistry,
    manual: &ManualMapping,
    hint: Option<&BankProfile>,
    rows: &[RawRow],
) -> Result<HeaderDetection> {
    manual.mapping.validate()?;
    let profile = match &manual.profile_id {
        Some(id) => registry
            .get(id)
            .ok_or_else(|| IngestError::UnknownProfile(id.clone()))?,
        None => hint.unwrap_or_else(|| registry.generic()),
    };
    let data_start = rows
        .iter()
        .enumerate()
        .position(|(index, row)| row.source_line(index) >= manual.data_start_row)
        .unwrap_or(rows.len());
    Ok(HeaderDetection {
        header_row: data_start.saturating_sub(1),
        data_start_row: data_start,
        mapping: manual.mapping.clone(),
        confidence: 1.0,
        fallback_required: false,
        profile_id: profile.id.clone(),
    })
}

fn parse_rows(
    rows: &[RawRow],
    detection: &HeaderDetection,
    profile: &BankProfile,
    options: &ImportOptions,
    result: &mut ImportResult,
) {
    let mapping = &detection.mapping;
    for (index, row) in rows.iter().enumerate().skip(detection.data_start_row) {
        let source_row = row.source_line(index);
        if is_junk(row, mapping) {
            trace!(row = source_row, "junk row skipped");
            result.skipped_rows += 1;
            continue;
        }
        match parse_row(row, mapping, profile, source_row) {
            Ok(movement) if movement.description.is_empty() => {
                trace!(row = source_row, "missing description");
                result.errors.push(row_error(source_row, "missing description"));
            }
            Ok(movement) => result.movements.push(movement),
            Err(rejection @ Rejection::InvalidDate(_)) if options.strict_dates => {
                result.errors.push(row_error(source_row, &rejection.to_string()));
            }
            Err(rejection) if rejection.is_date_failure() => {
                trace!(row = source_row, reason = %rejection, "row without a usable date skipped");
                result.skipped_rows += 1;
            }
            Err(rejection) => {
                trace!(row = source_row, reason = %rejection, "row rejected");
                result.errors.push(row_error(source_row, &rejection.to_string()));
            }
        }
    }
}

fn row_error(source_row: usize, reason: &str) -> String {
    format!("Row {source_row}: {reason}")
}

fn date_range(movements: &[ParsedMovement]) -> Option<(NaiveDate, NaiveDate)> {
    let min = movements.iter().map(|m| m.date).min()?;
    let max = movements.iter().map(|m| m.date).max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnRole;
    use rust_decimal_macros::dec;

    fn import(csv: &str) -> ImportResult {
        import_with(csv, &ImportOptions::default(), None)
    }

    fn import_with(csv: &str, options: &ImportOptions, manual: Option<ManualMapping>) -> ImportResult {
        let registry = ProfileRegistry::builtin();
        let request = ImportRequest::new("extracto.csv", csv.as_bytes()).manual(manual);
        import_statement(&registry, options, &request)
    }

    const SANTANDER: &str = "\
Banco Santander;;;;
Cuenta ES12 0049 0000 0000 0000;;;;
Fecha Operación;Fecha Valor;Concepto;Importe;Saldo
02/01/2024;02/01/2024;Recibo Iberdrola;-45,10;1.454,90
05/01/2024;05/01/2024;Transferencia recibida;1.200,00;2.654,90
;;;;
Saldo final;;;;2.654,90
";

    #[test]
    fn test_import_santander_statement() {
        let result = import(SANTANDER);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.bank_id, "santander");
        assert_eq!(result.file_kind, FileKind::Csv);
        assert_eq!(result.total_rows, 7);
        assert_eq!(result.movements.len(), 2);
        assert_eq!(result.skipped_rows, 2);
        let first = &result.movements[0];
        assert_eq!(first.amount, dec!(-45.10));
        assert_eq!(first.balance, Some(dec!(1454.90)));
        assert_eq!(first.source_row, 4);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(
            result.date_range,
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
            ))
        );
        assert_eq!(result.header.as_ref().unwrap().header_row, 2);
    }

    #[test]
    fn test_row_errors_carry_row_numbers() {
        let csv = "\
Fecha;Concepto;Importe;Saldo
01/02/2024;Compra;abc;10,00
02/02/2024;;-3,00;7,00
03/02/2024;Café;-2,50;4,50
";
        let result = import(csv);
        assert_eq!(result.bank_id, "generic");
        assert_eq!(result.movements.len(), 1);
        assert_eq!(
            result.errors,
            vec![
                "Row 2: unparsable amount 'abc'".to_string(),
                "Row 3: missing description".to_string(),
            ]
        );
    }

    #[test]
    fn test_row_numbers_follow_file_lines() {
        let csv = "Banco X;;\n\n\nFecha;Concepto;Importe\n01/01/2024;Compra;abc\n";
        let result = import(csv);
        assert_eq!(result.errors, vec!["Row 5: unparsable amount 'abc'".to_string()]);
        assert_eq!(result.header.as_ref().unwrap().header_row, 1);
    }

    #[test]
    fn test_manual_data_start_counts_file_lines() {
        let csv = "a;b;c\n\n01/01/2024;Compra;-5,00\n02/01/2024;Cafe;-1,00\n";
        let manual = ManualMapping {
            mapping: ColumnMapping::new()
                .with(ColumnRole::Date, 0)
                .with(ColumnRole::Description, 1)
                .with(ColumnRole::Amount, 2),
            data_start_row: 4,
            profile_id: None,
        };
        let result = import_with(csv, &ImportOptions::default(), Some(manual));
        assert_eq!(result.movements.len(), 1);
        assert_eq!(result.movements[0].source_row, 4);
        assert_eq!(result.movements[0].description, "Cafe");
    }

    #[test]
    fn test_date_failures_are_silent_unless_strict() {
        let csv = "\
Fecha;Concepto;Importe
31/02/2024;Fecha imposible;-1,00
Nota: movimientos sujetos a revisión;;
01/03/2024;Bizum;5,00
";
        let lenient = import(csv);
        assert!(lenient.errors.is_empty());
        assert_eq!(lenient.movements.len(), 1);
        assert_eq!(lenient.skipped_rows, 2);

        let options = ImportOptions {
            strict_dates: true,
            ..ImportOptions::default()
        };
        let strict = import_with(csv, &options, None);
        assert_eq!(strict.errors.len(), 2);
        assert!(strict.errors[0].starts_with("Row 2: unparsable date"));
    }

    #[test]
    fn test_unrecognized_header_requires_mapping() {
        let csv = "a;b;c\n01/01/2024;Compra;-5,00\n";
        let result = import(csv);
        assert!(result.fallback_required);
        assert_eq!(result.confidence, 0.0);
        assert!(result.movements.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(result.bank_id, "generic");

        let manual = ManualMapping {
            mapping: ColumnMapping::new()
                .with(ColumnRole::Date, 0)
                .with(ColumnRole::Description, 1)
                .with(ColumnRole::Amount, 2),
            data_start_row: 2,
            profile_id: None,
        };
        let result = import_with(csv, &ImportOptions::default(), Some(manual));
        assert!(result.is_ok());
        assert_eq!(result.movements.len(), 1);
        assert_eq!(result.movements[0].amount, dec!(-5.00));
    }

    #[test]
    fn test_empty_file_is_batch_fatal() {
        let result = import("  \n\n");
        assert!(result.movements.is_empty());
        assert_eq!(result.errors, vec!["The file is empty".to_string()]);
    }

    #[test]
    fn test_unknown_profile_hint() {
        let registry = ProfileRegistry::builtin();
        let request = ImportRequest::new("x.csv", SANTANDER.as_bytes()).profile(Some("nope"));
        let result = import_statement(&registry, &ImportOptions::default(), &request);
        assert_eq!(result.errors, vec!["Unknown bank profile: nope".to_string()]);
    }

    #[test]
    fn test_duplicates_flagged_and_counted() {
        let csv = "\
Fecha;Concepto;Importe
01/01/2024;Bizum Ana;10,00
01/01/2024;BIZUM ANA;10,00
02/01/2024;Recibo;-3,00
";
        let result = import(csv);
        assert_eq!(result.duplicate_stats.total, 3);
        assert_eq!(result.duplicate_stats.duplicates, 2);
        assert_eq!(result.duplicate_stats.duplicate_groups, 1);
        assert!(result.movements[0].is_duplicate && result.movements[1].is_duplicate);
        assert!(!result.movements[2].is_duplicate);
    }

    #[test]
    fn test_dedupe_recomputes_stats() {
        let csv = "\
Fecha;Concepto;Importe
01/01/2024;Bizum Ana;10,00
01/01/2024;BIZUM ANA;10,00
02/01/2024;Recibo;-3,00
";
        let mut result = import(csv);
        assert_eq!(result.dedupe(1), 1);
        assert_eq!(result.movements.len(), 2);
        assert!(result.movements.iter().all(|m| !m.is_duplicate));
        assert_eq!(result.duplicate_stats.total, 2);
        assert_eq!(result.duplicate_stats.duplicates, 0);
        assert_eq!(result.duplicate_stats.duplicate_groups, 0);
        assert_eq!(result.preview.len(), 1);
        assert!(!result.preview[0].is_duplicate);
        assert_eq!(result.dedupe(1), 0);
    }

    #[test]
    fn test_preview_is_bounded() {
        let mut csv = String::from("Fecha;Concepto;Importe\n");
        for day in 1..=25 {
            csv.push_str(&format!("{day:02}/01/2024;Pago {day};-1,00\n"));
        }
        let options = ImportOptions {
            preview_limit: 5,
            ..ImportOptions::default()
        };
        let result = import_with(&csv, &options, None);
        assert_eq!(result.movements.len(), 25);
        assert_eq!(result.preview.len(), 5);
        assert_eq!(result.preview[4].description, "Pago 5");
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(file_checksum(b"abc"), file_checksum(b"abc"));
        assert_eq!(file_checksum(b"abc").len(), 64);
        assert_ne!(file_checksum(b"abc"), file_checksum(b"abd"));
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_import_xlsx_statement() {
        let bytes = include_bytes!("../tests/fixtures/santander.xlsx");
        let registry = ProfileRegistry::builtin();
        let request = ImportRequest::new("movimientos.xlsx", bytes);
        let result = import_statement(&registry, &ImportOptions::default(), &request);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.file_kind, FileKind::Xlsx);
        assert_eq!(result.bank_id, "santander");
        assert_eq!(result.movements.len(), 2);
        assert_eq!(result.skipped_rows, 2);
        let first = &result.movements[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.amount, dec!(-45.10));
        assert_eq!(first.balance, Some(dec!(1454.90)));
        assert_eq!(first.source_row, 3);
        let second = &result.movements[1];
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(second.amount, dec!(1200.00));
        assert_eq!(second.source_row, 4);
    }
}
