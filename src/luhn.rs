//! Luhn checksum for order numbers.
//!
//! Order numbers are decimal strings carrying a trailing check digit.
//! Submissions that are not purely numeric are a format error rather than
//! a checksum failure, so the two cases are distinguishable at the API.

/// Errors from [`validate`].
#[derive(Debug, PartialEq, Eq)]
pub enum LuhnError {
    /// Input was empty or contained a non-decimal character.
    BadFormat,
}

/// Runs the Luhn check over a decimal string.
///
/// Returns `Ok(true)` when the checksum holds, `Ok(false)` when the number
/// is well-formed but fails the check, and `Err` for non-numeric input.
pub fn validate(number: &str) -> Result<bool, LuhnError> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LuhnError::BadFormat);
    }

    let mut digits = number.bytes().rev().map(|b| u32::from(b - b'0'));
    // The rightmost digit is the check digit and is never doubled.
    let check_digit = match digits.next() {
        Some(d) => d,
        None => return Err(LuhnError::BadFormat),
    };

    let mut sum = 0u32;
    for (i, mut digit) in digits.enumerate() {
        if i % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        sum += digit;
    }

    Ok((check_digit + sum) % 10 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_numbers() {
        assert_eq!(validate("79927398713"), Ok(true));
        assert_eq!(validate("12345678903"), Ok(true));
        assert_eq!(validate("2377225624"), Ok(true));
        // Single zero: check digit 0, empty payload.
        assert_eq!(validate("0"), Ok(true));
    }

    #[test]
    fn rejects_checksum_failures() {
        assert_eq!(validate("79927398714"), Ok(false));
        assert_eq!(validate("12345678901"), Ok(false));
        assert_eq!(validate("1"), Ok(false));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(validate(""), Err(LuhnError::BadFormat));
        assert_eq!(validate("12345a"), Err(LuhnError::BadFormat));
        assert_eq!(validate("-12345"), Err(LuhnError::BadFormat));
        assert_eq!(validate("12 345"), Err(LuhnError::BadFormat));
    }

    #[test]
    fn handles_numbers_longer_than_machine_integers() {
        // 30 digits; must not overflow any fixed-width parse.
        let number = "123456789012345678901234567897";
        assert!(validate(number).is_ok());
    }
}
