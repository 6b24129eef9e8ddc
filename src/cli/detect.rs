use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use extracto::error::{IngestError, Result};
use extracto::filetype::detect_file_kind;
use extracto::header::detect_header;
use extracto::reader::read_rows;

use super::{Context, SourceArgs};

pub fn run(file: &Path, json: bool, profiles: Option<&Path>, source: &SourceArgs) -> Result<()> {
    let ctx = Context::load(profiles, source.window)?;
    let only = source
        .bank
        .as_deref()
        .map(|id| {
            ctx.registry
                .get(id)
                .ok_or_else(|| IngestError::UnknownProfile(id.to_string()))
        })
        .transpose()?;

    let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let kind = detect_file_kind(file_name, source.content_type.as_deref());
    let rows = read_rows(kind, &std::fs::read(file)?)?;
    let detection = detect_header(&rows, &ctx.registry, ctx.options.header_search_rows, only);

    if json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
        return Ok(());
    }

    if detection.fallback_required {
        println!(
            "{} No complete header in the first {} rows ({} rows read).",
            "!".yellow().bold(),
            ctx.options.header_search_rows,
            rows.len()
        );
    } else {
        println!(
            "Header at row {} ({}), profile {}, confidence {:.0}%",
            rows.get(detection.header_row)
                .map_or(detection.header_row + 1, |r| r.source_line(detection.header_row)),
            kind.key(),
            detection.profile_id.bold(),
            detection.confidence * 100.0
        );
    }

    if detection.mapping.is_empty() {
        return Ok(());
    }
    let header = rows.get(detection.header_row);
    let mut table = Table::new();
    table.set_header(vec!["Role", "Column", "Label"]);
    for (role, column) in detection.mapping.iter() {
        table.add_row(vec![
            Cell::new(role),
            Cell::new(column),
            Cell::new(header.map(|r| r.text(column)).unwrap_or_default()),
        ]);
    }
    println!("{table}");
    Ok(())
}
