//! Free-text numeric input parsing.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::config::Limits;
use crate::error::ValidationError;

/// Parse a decimal accepting either `.` or `,` as the separator.
pub fn parse_decimal(text: &str) -> Result<Decimal, ValidationError> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(ValidationError::NotANumber {
            input: text.to_string(),
        });
    }
    Decimal::from_str(&normalized).map_err(|_| ValidationError::NotANumber {
        input: text.to_string(),
    })
}

/// Parse a width or height in meters within the configured bounds.
pub fn parse_size(text: &str, limits: &Limits) -> Result<Decimal, ValidationError> {
    let value = parse_decimal(text)?;
    check_range(value, limits.min_size, limits.max_size)?;
    Ok(value)
}

/// Parse an item count within the configured bounds.
pub fn parse_quantity(text: &str, limits: &Limits) -> Result<u32, ValidationError> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotAnInteger {
            input: text.to_string(),
        })?;

    check_range(
        Decimal::from(value),
        Decimal::from(limits.min_quantity),
        Decimal::from(limits.max_quantity),
    )?;

    u32::try_from(value).map_err(|_| ValidationError::NotAnInteger {
        input: text.to_string(),
    })
}

fn check_range(value: Decimal, min: Decimal, max: Decimal) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum { value, min });
    }
    if value > max {
        return Err(ValidationError::AboveMaximum { value, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn dot_and_comma_parse_the_same() {
        assert_eq!(parse_decimal("12.5"), Ok(dec!(12.5)));
        assert_eq!(parse_decimal("12,5"), Ok(dec!(12.5)));
        assert_eq!(parse_decimal(" 3 "), Ok(dec!(3)));
    }

    #[test]
    fn garbage_is_not_a_number() {
        for input in ["", "   ", "abc", "1,2,3", "1.2.3", "два"] {
            assert!(
                matches!(parse_decimal(input), Err(ValidationError::NotANumber { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn size_bounds() {
        let limits = Limits::default();
        assert_eq!(
            parse_size("0.05", &limits),
            Err(ValidationError::BelowMinimum {
                value: dec!(0.05),
                min: dec!(0.1)
            })
        );
        assert_eq!(parse_size("0.1", &limits), Ok(dec!(0.1)));
        assert_eq!(parse_size("50.0", &limits), Ok(dec!(50.0)));
        assert!(matches!(
            parse_size("50.1", &limits),
            Err(ValidationError::AboveMaximum { .. })
        ));
        assert!(matches!(
            parse_size("-2", &limits),
            Err(ValidationError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn size_upper_bound_is_configurable() {
        let limits = Limits {
            max_size: dec!(999999),
            ..Limits::default()
        };
        assert_eq!(parse_size("50.1", &limits), Ok(dec!(50.1)));
    }

    #[test]
    fn quantity_bounds() {
        let limits = Limits::default();
        assert!(matches!(
            parse_quantity("0", &limits),
            Err(ValidationError::BelowMinimum { .. })
        ));
        assert!(matches!(
            parse_quantity("1001", &limits),
            Err(ValidationError::AboveMaximum { .. })
        ));
        assert_eq!(parse_quantity("1", &limits), Ok(1));
        assert_eq!(parse_quantity("1000", &limits), Ok(1000));
        assert_eq!(parse_quantity(" 7 ", &limits), Ok(7));
    }

    #[test]
    fn quantity_must_be_integer() {
        let limits = Limits::default();
        for input in ["2.5", "2,0", "", "много", "99999999999999999999"] {
            assert!(
                matches!(
                    parse_quantity(input, &limits),
                    Err(ValidationError::NotAnInteger { .. })
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn negative_quantity_is_below_minimum() {
        let limits = Limits::default();
        assert!(matches!(
            parse_quantity("-3", &limits),
            Err(ValidationError::BelowMinimum { .. })
        ));
    }
}
