//! Utility functions for formatting and common operations
//!
//! Centralized formatting utilities for consistent display of currency
//! and decimal values throughout the application.

use rust_decimal::Decimal;

/// Format a Decimal money amount with a thousands separator and two
/// decimal places: `1,234.56`.
///
/// # Arguments
/// * `value` - The decimal value to format
/// * `width` - Minimum width for padding (0 for no padding, right-aligned)
///
/// # Examples
/// ```
/// use folio::utils::format_amount_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount_with_width(dec!(1234.56), 0), "1,234.56");
/// assert_eq!(format_amount_with_width(dec!(1234), 12), "    1,234.00");
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs();

    let formatted = format!("{:.2}", abs_value);
    let parts: Vec<&str> = formatted.split('.').collect();

    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let result = format!("{}{}.{}", sign, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format a money amount with its currency code: `EUR 1,234.56`.
///
/// # Examples
/// ```
/// use folio::utils::format_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_money(dec!(1234.56), "EUR"), "EUR 1,234.56");
/// assert_eq!(format_money(dec!(-500), "USD"), "USD -500.00");
/// ```
pub fn format_money(value: Decimal, currency: &str) -> String {
    format!("{} {}", currency, format_amount_with_width(value, 0))
}

/// Format a plain amount (no currency): `1,234.56`.
pub fn format_amount(value: Decimal) -> String {
    format_amount_with_width(value, 0)
}

/// Format a quantity with up to four decimal places, trailing zeros trimmed.
///
/// # Examples
/// ```
/// use folio::utils::format_quantity;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_quantity(dec!(10.5000)), "10.5");
/// assert_eq!(format_quantity(dec!(3)), "3");
/// ```
pub fn format_quantity(value: Decimal) -> String {
    value.round_dp(4).normalize().to_string()
}
