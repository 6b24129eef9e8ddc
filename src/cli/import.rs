use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use extracto::error::{IngestError, Result};
use extracto::fmt::money;
use extracto::importer::{import_statement, ImportRequest, ImportResult, ManualMapping};
use extracto::models::ColumnMapping;
use extracto::profiles::DecimalSeparator;

use super::{Context, SourceArgs};

pub struct ImportArgs<'a> {
    pub file: &'a Path,
    pub json: bool,
    pub dedupe: bool,
    pub map: Option<&'a str>,
    pub data_start: usize,
    pub preview: Option<usize>,
    pub strict_dates: bool,
    pub profiles: Option<&'a Path>,
    pub source: &'a SourceArgs,
}

pub fn run(args: ImportArgs<'_>) -> Result<()> {
    let mut ctx = Context::load(args.profiles, args.source.window)?;
    if let Some(limit) = args.preview {
        ctx.options.preview_limit = limit;
    }
    ctx.options.strict_dates |= args.strict_dates;

    let manual = args
        .map
        .map(|m| -> Result<ManualMapping> {
            Ok(ManualMapping {
                mapping: m.parse::<ColumnMapping>()?,
                data_start_row: args.data_start,
                profile_id: args.source.bank.clone(),
            })
        })
        .transpose()?;

    let bytes = std::fs::read(args.file)?;
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let request = ImportRequest::new(file_name, &bytes)
        .content_type(args.source.content_type.as_deref())
        .profile(args.source.bank.as_deref())
        .manual(manual);
    let mut result = import_statement(&ctx.registry, &ctx.options, &request);

    if result.total_rows == 0 && !result.errors.is_empty() {
        return Err(IngestError::Import(result.errors.join("; ")));
    }

    let removed = args.dedupe.then(|| result.dedupe(ctx.options.preview_limit));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let separator = ctx
        .registry
        .get(&result.bank_id)
        .map_or(DecimalSeparator::Comma, |p| p.decimal_separator);
    print_result(&result, separator);
    if let Some(removed) = removed {
        println!("{removed} duplicates removed");
    }
    Ok(())
}

fn print_result(result: &ImportResult, separator: DecimalSeparator) {
    if result.fallback_required {
        println!(
            "{} No header row recognized in {} rows.",
            "!".yellow().bold(),
            result.total_rows
        );
        println!("Re-run with --map date=N,description=N,amount=N and --data-start ROW.");
        return;
    }

    println!(
        "Bank: {} ({}), confidence {:.0}%",
        result.bank_name.bold(),
        result.bank_id,
        result.confidence * 100.0
    );

    if !result.preview.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Row", "Date", "Description", "Amount", "Balance", ""]);
        for m in &result.preview {
            let amount = money(m.amount, separator);
            let amount = if m.amount.is_sign_negative() {
                amount.red().to_string()
            } else {
                amount.green().to_string()
            };
            table.add_row(vec![
                Cell::new(m.source_row),
                Cell::new(m.date.format("%Y-%m-%d")),
                Cell::new(&m.description),
                Cell::new(amount),
                Cell::new(m.balance.map(|b| money(b, separator)).unwrap_or_default()),
                Cell::new(if m.is_duplicate { "dup" } else { "" }),
            ]);
        }
        println!("{table}");
        if result.movements.len() > result.preview.len() {
            println!(
                "{}",
                format!("... {} more", result.movements.len() - result.preview.len()).dimmed()
            );
        }
    }

    let stats = &result.duplicate_stats;
    println!(
        "{} movements from {} rows, {} skipped, {} errors, {} duplicates in {} groups",
        result.movements.len(),
        result.total_rows,
        result.skipped_rows,
        result.errors.len(),
        stats.duplicates,
        stats.duplicate_groups
    );
    if let Some((from, to)) = result.date_range {
        println!("Period: {from} to {to}");
    }
    for error in &result.errors {
        println!("  {}", error.yellow());
    }
}
