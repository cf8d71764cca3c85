// Utility functions and validation
// Precision policy shared by the read and write paths of the rate store.

pub mod validation {
    use rust_decimal::Decimal;

    /// Validate that a rate is positive
    pub fn is_valid_rate(rate: Decimal) -> bool {
        rate > Decimal::ZERO
    }

    /// Validate that a currency code is exactly three ASCII letters
    pub fn is_valid_currency_code(code: &str) -> bool {
        code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
    }
}

pub mod precision {
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::str::FromStr;

    /// Decimal places kept for every persisted rate, and the minimum number
    /// of significant digits kept for rates below one
    pub const RATE_SCALE: u32 = 5;

    const MAX_DECIMAL_SCALE: u32 = 28;

    /// Scale a rate is stored at: `RATE_SCALE` places, widened by the leading
    /// fractional zeros of rates below one so they keep `RATE_SCALE` significant digits
    pub fn rate_scale(rate: Decimal) -> u32 {
        let tenth = Decimal::new(1, 1);
        let mut probe = rate.abs();
        let mut zeros = 0;
        while !probe.is_zero() && probe < tenth && RATE_SCALE + zeros < MAX_DECIMAL_SCALE {
            probe *= Decimal::TEN;
            zeros += 1;
        }
        RATE_SCALE + zeros
    }

    /// Round a rate half away from zero to its `rate_scale` and pin that scale,
    /// so `1.1` becomes `1.10000`, `1.234567` becomes `1.23457` and
    /// `0.0000041234567` becomes `0.0000041235`. A positive rate never rounds to zero.
    pub fn normalize_rate(rate: Decimal) -> Decimal {
        let scale = rate_scale(rate);
        let mut rounded = rate.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(scale);
        rounded
    }

    /// Fixed-point text bound into SQL statements
    pub fn format_rate(rate: Decimal) -> String {
        normalize_rate(rate).to_string()
    }

    /// SQL expression rendering a numeric column as text without losing digits
    pub fn sql_rate_column(column: &str) -> String {
        format!("printf('%.15g', {})", column)
    }

    /// Parse a rate rendered by `sql_rate_column` (plain or exponent notation)
    pub fn parse_rate(text: &str) -> Result<Decimal, rust_decimal::Error> {
        let rate = if text.contains(['e', 'E']) {
            Decimal::from_scientific(text)?
        } else {
            Decimal::from_str(text)?
        };
        Ok(normalize_rate(rate))
    }
}
