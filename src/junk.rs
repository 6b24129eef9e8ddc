//! Administrative rows (totals, running balances, blank separators) that
//! statements interleave with real movements.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ColumnMapping, ColumnRole, RawRow};
use crate::text::fold_words;

/// Matched against `fold_words` output, so labels are lowercase, unaccented
/// and punctuation-free. A label may be followed only by numbers and a
/// currency code ("Total 5.000,00 EUR", "Saldo final 31/12/2024").
static STOPLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?:
            (?:sub)?totale?s?
          | total\ (?:general|cargos|abonos|debe|haber|movimientos|periodo|mes|ingresos|gastos)
          | suma(?:\ y\ sigue|\ total)?
          | saldo(?:\ (?:inicial|final|anterior|actual|disponible|contable|al|a\ fecha))?
          | saldo\ (?:inicial|final|anterior)\ del\ periodo
          | suma\ anterior
          | (?:opening|closing|running|available|ending|starting)\ balance
          | balance(?:\ brought|\ carried)?(?:\ forward)?
          | grand\ total
        )
        (?:\ (?:\d+|eur|usd|gbp|mxn|de|del))*$",
    )
    .expect("Invalid junk stoplist regex")
});

/// Folded `text` is an administrative label rather than a movement.
pub fn is_admin_label(text: &str) -> bool {
    let folded = fold_words(text);
    !folded.is_empty() && STOPLIST.is_match(&folded)
}

/// Blank rows and rows labelled as totals or balances. The leading cell and
/// the mapped description are both checked.
pub fn is_junk(row: &RawRow, mapping: &ColumnMapping) -> bool {
    let Some(first) = row.first_non_empty() else {
        return true;
    };
    if is_admin_label(first) {
        return true;
    }
    mapping
        .get(ColumnRole::Description)
        .is_some_and(|i| is_admin_label(row.text(i)))
}
