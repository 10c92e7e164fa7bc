//! Numeric argument parsing
//!
//! Addresses and sizes are accepted as `0x` hex or plain decimal, with
//! optional `_` separators.

fn parse_u64(value: &str) -> Result<u64, String> {
    let cleaned = value.trim().replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid number {:?}: {}", value, e))
}

/// clap value parser for addresses
pub fn parse_address(value: &str) -> Result<u64, String> {
    parse_u64(value)
}

/// clap value parser for signed sizes (chunk sizes may be rejected later)
pub fn parse_count(value: &str) -> Result<i64, String> {
    let trimmed = value.trim();
    match trimmed.strip_prefix('-') {
        Some(rest) => {
            let magnitude = parse_u64(rest)?;
            i64::try_from(magnitude)
                .map(|m| -m)
                .map_err(|_| format!("number {:?} out of range", value))
        }
        None => {
            let magnitude = parse_u64(trimmed)?;
            i64::try_from(magnitude).map_err(|_| format!("number {:?} out of range", value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_hex_and_decimal() {
        assert_eq!(parse_address("0x1000"), Ok(0x1000));
        assert_eq!(parse_address("0X7fff_0000"), Ok(0x7fff_0000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_count_signed() {
        assert_eq!(parse_count("0x10"), Ok(16));
        assert_eq!(parse_count("-5"), Ok(-5));
        assert_eq!(parse_count("0"), Ok(0));
        assert!(parse_count("0xffffffffffffffff").is_err());
    }
}
