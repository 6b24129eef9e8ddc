use rust_decimal::Decimal;

use crate::parser::normalize_amount;
use crate::profiles::DecimalSeparator;

/// Format an amount with thousands grouping in the profile's locale:
/// `-1.234,56` for comma profiles, `-1,234.56` for point profiles.
pub fn money(value: Decimal, separator: DecimalSeparator) -> String {
    let value = normalize_amount(value);
    let (group, decimal) = match separator {
        DecimalSeparator::Comma => ('.', ','),
        DecimalSeparator::Point => (',', '.'),
    };
    let text = value.abs().to_string();
    let (int_part, dec_part) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(group);
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    let sign = if value.is_sign_negative() { "-" } else { "" };
    format!("{sign}{grouped}{decimal}{dec_part}")
}
