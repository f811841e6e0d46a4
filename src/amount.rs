//! Exact decimal handling for displayed prices and on-chain token amounts.
//!
//! Prices scraped from product pages arrive as text ("₹29,990", "$12.50",
//! "Rs. 499"). They are parsed into an integer mantissa and a decimal scale,
//! converted to USD with a fixed rate, and scaled to the token's smallest
//! unit. No step goes through floating point.

use alloy_primitives::U256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("no price available")]
    Missing,
    #[error("could not read a number from '{0}'")]
    Malformed(String),
    #[error("amount must be greater than zero")]
    Zero,
    #[error("amount is too large")]
    Overflow,
}

/// Currencies we know how to convert into USD-pegged stablecoins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Usd,
    Inr,
}

impl Currency {
    /// Reads an explicit currency code such as "INR" or "usd".
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" | "$" | "US$" => Some(Currency::Usd),
            "INR" | "₹" | "RS" | "RS." => Some(Currency::Inr),
            _ => None,
        }
    }

    /// Finds a currency marker in a displayed price. Anything without a
    /// recognized foreign marker is treated as USD.
    pub fn detect(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        let marked = upper
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|word| word == "INR" || word == "RS");
        if text.contains('₹') || marked {
            Currency::Inr
        } else {
            Currency::Usd
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Inr => "INR",
        }
    }

    /// USD value of one unit, as (mantissa, scale).
    fn usd_rate(&self) -> (u64, u32) {
        match self {
            Currency::Usd => (1, 0),
            // 1 INR = 0.012 USD
            Currency::Inr => (12, 3),
        }
    }
}

/// A non-negative decimal number `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub mantissa: U256,
    pub scale: u32,
}

impl Decimal {
    /// Parses plain decimal text. Thousands separators are accepted.
    pub fn parse(text: &str) -> Result<Self, AmountError> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Err(AmountError::Missing);
        }

        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        let valid = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !valid(whole) || !valid(frac) {
            return Err(AmountError::Malformed(text.to_string()));
        }

        // Trailing fractional zeros carry no value
        let frac = frac.trim_end_matches('0');
        let digits = format!("{}{}", whole, frac);
        let digits = digits.trim_start_matches('0');
        let mantissa = if digits.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow)?
        };

        Ok(Self {
            mantissa,
            scale: frac.len() as u32,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    fn mul(&self, mantissa: u64, scale: u32) -> Result<Self, AmountError> {
        Ok(Self {
            mantissa: self
                .mantissa
                .checked_mul(U256::from(mantissa))
                .ok_or(AmountError::Overflow)?,
            scale: self.scale + scale,
        })
    }

    /// Scales to an integer count of `10^-decimals` units, truncating any
    /// finer digits.
    pub fn to_units(&self, decimals: u8) -> Result<U256, AmountError> {
        let decimals = decimals as u32;
        if decimals >= self.scale {
            self.mantissa
                .checked_mul(pow10(decimals - self.scale)?)
                .ok_or(AmountError::Overflow)
        } else if self.scale - decimals > MAX_POW10 {
            // Every mantissa is below 10^78
            Ok(U256::ZERO)
        } else {
            Ok(self.mantissa / pow10(self.scale - decimals)?)
        }
    }
}

/// A price read from a product page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub value: Decimal,
    pub currency: Currency,
}

impl Price {
    pub fn to_usd(&self) -> Result<Decimal, AmountError> {
        let (rate, scale) = self.currency.usd_rate();
        self.value.mul(rate, scale)
    }
}

/// Extracts the first number from a displayed price and detects its currency.
pub fn parse_price(text: &str) -> Result<Price, AmountError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Missing);
    }

    let start = trimmed
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| AmountError::Malformed(text.to_string()))?;
    let number: String = trimmed[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    Ok(Price {
        value: Decimal::parse(number.trim_end_matches('.'))?,
        currency: Currency::detect(trimmed),
    })
}

/// Converts a displayed price into the smallest unit of a USD-pegged token.
///
/// `currency` overrides whatever marker the price text carries. Zero is
/// rejected.
pub fn to_smallest_unit(
    price: &str,
    currency: Option<&str>,
    decimals: u8,
) -> Result<U256, AmountError> {
    let mut parsed = parse_price(price)?;
    if let Some(currency) = currency.and_then(Currency::from_code) {
        parsed.currency = currency;
    }

    let units = parsed.to_usd()?.to_units(decimals)?;
    if units.is_zero() {
        return Err(AmountError::Zero);
    }
    Ok(units)
}

/// Parses a human amount ("1.5") into smallest units.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, AmountError> {
    Decimal::parse(value)?.to_units(decimals)
}

/// Formats smallest units as a decimal string with trailing zeros trimmed,
/// keeping at least two fractional digits.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return format!("{}.00", digits);
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, frac) = padded.split_at(padded.len() - decimals);
    let mut frac = frac.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }
    format!("{}.{}", whole, frac)
}

/// Largest power of ten that fits in a `U256`.
const MAX_POW10: u32 = 77;

fn pow10(exp: u32) -> Result<U256, AmountError> {
    let ten = U256::from(10u64);
    (0..exp).try_fold(U256::from(1u64), |acc, _| {
        acc.checked_mul(ten).ok_or(AmountError::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inr_price_converts_exactly() {
        let units = to_smallest_unit("29990", Some("INR"), 6).unwrap();
        assert_eq!(units, U256::from(359_880_000u64));

        // Same result when the marker is in the text
        let units = to_smallest_unit("₹29,990", None, 6).unwrap();
        assert_eq!(units, U256::from(359_880_000u64));
    }

    #[test]
    fn test_deep_fraction_truncates_to_zero() {
        let tiny = format!("0.{}1", "0".repeat(1000));
        assert_eq!(parse_units(&tiny, 6).unwrap(), U256::ZERO);
        assert_eq!(to_smallest_unit(&tiny, None, 6), Err(AmountError::Zero));

        let padded = format!("12.5{}", "0".repeat(1000));
        assert_eq!(parse_units(&padded, 6).unwrap(), U256::from(12_500_000u64));
    }

    #[test]
    fn test_usd_price_with_symbol() {
        let units = to_smallest_unit("$12.50", None, 6).unwrap();
        assert_eq!(units, U256::from(12_500_000u64));
    }

    #[test]
    fn test_rs_marker_detected() {
        let price = parse_price("Rs. 499").unwrap();
        assert_eq!(price.currency, Currency::Inr);
        assert_eq!(price.value, Decimal { mantissa: U256::from(499u64), scale: 0 });
    }

    #[test]
    fn test_finer_digits_truncate() {
        // 0.0000019 USD at 6 decimals is 1 unit, not 2
        let units = parse_units("0.0000019", 6).unwrap();
        assert_eq!(units, U256::from(1u64));
    }

    #[test]
    fn test_zero_and_garbage_rejected() {
        assert_eq!(to_smallest_unit("$0.00", None, 6), Err(AmountError::Zero));
        assert_eq!(to_smallest_unit("", None, 6), Err(AmountError::Missing));
        assert!(matches!(
            to_smallest_unit("call for price", None, 6),
            Err(AmountError::Malformed(_))
        ));
    }

    #[test]
    fn test_explicit_currency_overrides_marker() {
        let units = to_smallest_unit("$100", Some("INR"), 6).unwrap();
        assert_eq!(units, U256::from(1_200_000u64));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(10_000_000u64), 6), "10.00");
        assert_eq!(format_units(U256::from(123_456u64), 6), "0.123456");
        assert_eq!(
            format_units(U256::from(1_500_000_000_000_000_000u64), 18),
            "1.50"
        );
        assert_eq!(format_units(U256::ZERO, 6), "0.00");
        assert_eq!(format_units(U256::from(7u64), 0), "7.00");
    }

    #[test]
    fn test_parse_units_large_decimals() {
        let wei = parse_units("0.001", 18).unwrap();
        assert_eq!(wei, U256::from(1_000_000_000_000_000u64));
    }
}
