use std::path::Path;

use comfy_table::{Cell, Table};

use extracto::error::Result;

use super::Context;

pub fn list(json: bool, profiles: Option<&Path>) -> Result<()> {
    let ctx = Context::load(profiles, None)?;
    let all: Vec<_> = ctx.registry.candidates().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Dates", "Decimal", "Skip", "Roles"]);
    for p in all {
        let roles: Vec<&str> = p.vocabulary.keys().map(|r| r.key()).collect();
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(p.date_format.token()),
            Cell::new(p.decimal_separator.symbol()),
            Cell::new(p.skip_rows),
            Cell::new(roles.join(", ")),
        ]);
    }
    println!("Bank profiles\n{table}");
    Ok(())
}
