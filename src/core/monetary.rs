use crate::core::types::U256;
use crate::error::{DashboardError, Result};

/// Monetary units and display conversions
///
/// On-chain balances are tracked in wei, the smallest currency unit, as
/// arbitrary-precision integers. They only become floating point at the final
/// display step.
///
/// ## Units
/// - **Wei**: the integer base unit (18 fractional digits relative to ETH)
/// - **ETH**: the display unit
/// - **Oracle price**: fixed-point integer with 8 fractional digits
///
/// All conversion functions are total. Malformed input yields zero or the
/// input unchanged because they back live form fields.
///
/// Fractional digits of the wei unit relative to ETH
pub const WEI_DECIMALS: u32 = 18;

/// Fractional digits of the oracle's fixed-point price
pub const PRICE_FEED_DECIMALS: u32 = 8;

/// Default decimal places when rendering ETH amounts
pub const DEFAULT_DISPLAY_DECIMALS: usize = 4;

/// Identifiers shorter than this are displayed as-is
pub const TRUNCATE_MIN_LEN: usize = 10;

/// Reference amount (in ETH) for the personal funding milestone
pub const PERSONAL_MILESTONE_ETH: f64 = 1.0;

/// 10^exp in 256 bits, saturating past 10^77
pub fn pow10(exp: u32) -> U256 {
    U256::from(10u8)
        .checked_pow(U256::from(exp))
        .unwrap_or(U256::MAX)
}

/// Utility functions for monetary conversions
pub mod conversions {
    use super::*;

    /// Render a wei amount as ETH with a fixed number of decimal places.
    ///
    /// The division by 10^18 is done in integer arithmetic with half-up
    /// rounding, so no precision is lost before the string is produced.
    ///
    /// # Examples
    /// ```
    /// use fundme_dashboard::core::monetary::conversions::amount_to_display_unit;
    /// use fundme_dashboard::core::types::U256;
    /// let wei = U256::from(1_500_000_000_000_000_000u64);
    /// assert_eq!(amount_to_display_unit(&wei, 4), "1.5000");
    /// ```
    pub fn amount_to_display_unit(amount: &U256, decimals: usize) -> String {
        let wei_decimals = WEI_DECIMALS as usize;
        if decimals >= wei_decimals {
            // every wei digit is shown, the rest is zero padding
            let unit = pow10(WEI_DECIMALS);
            return format!(
                "{}.{:0>width$}{}",
                *amount / unit,
                (*amount % unit).to_string(),
                "0".repeat(decimals - wei_decimals),
                width = wei_decimals
            );
        }

        let divisor = pow10((wei_decimals - decimals) as u32);
        let half = divisor / U256::from(2u8);
        let scaled = amount.saturating_add(half) / divisor;
        if decimals == 0 {
            return scaled.to_string();
        }

        let unit = pow10(decimals as u32);
        format!(
            "{}.{:0>width$}",
            scaled / unit,
            (scaled % unit).to_string(),
            width = decimals
        )
    }

    /// The explicit float boundary: wei -> ETH as `f64` for price math
    pub fn display_units(amount: &U256) -> f64 {
        amount_to_display_unit(amount, WEI_DECIMALS as usize)
            .parse::<f64>()
            .unwrap_or(0.0)
    }

    /// Multiply ETH by a price and format as USD currency
    ///
    /// # Examples
    /// ```
    /// use fundme_dashboard::core::monetary::conversions::apply_price;
    /// assert_eq!(apply_price(1.5, 2500.0), "$3,750.00");
    /// ```
    pub fn apply_price(display_units: f64, price: f64) -> String {
        format_usd(display_units * price)
    }

    /// Format a USD value with exactly 2 fractional digits and en-US grouping
    pub fn format_usd(amount: f64) -> String {
        if !amount.is_finite() {
            return "$0.00".to_string();
        }
        let rendered = format!("{:.2}", amount.abs());
        let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));
        let sign = if amount < 0.0 && rendered != "0.00" {
            "-"
        } else {
            ""
        };
        format!("{sign}${}.{frac_part}", group_thousands(int_part))
    }

    /// Format an integer count with en-US grouping
    pub fn format_number(value: u64) -> String {
        group_thousands(&value.to_string())
    }

    fn group_thousands(digits: &str) -> String {
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    /// Shorten an identifier to `first6…last4` for display.
    ///
    /// Identifiers shorter than 10 characters are returned unchanged.
    pub fn truncate_identifier(id: &str) -> String {
        let chars: Vec<char> = id.chars().collect();
        if chars.len() < TRUNCATE_MIN_LEN {
            return id.to_string();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}\u{2026}{tail}")
    }

    /// Parse a user-typed ETH amount into wei.
    ///
    /// Empty, negative or malformed input yields zero. More than 18 fractional
    /// digits are rounded half-up to the nearest wei. Amounts too large for
    /// 256 bits also yield zero.
    pub fn parse_user_amount(text: &str) -> U256 {
        parse_decimal(text.trim(), WEI_DECIMALS as usize).unwrap_or_default()
    }

    /// An amount to send: zero and malformed input are rejected instead of
    /// being read as zero
    pub fn parse_contribution(text: &str) -> Result<U256> {
        let value = parse_user_amount(text);
        if value.is_zero() {
            return Err(DashboardError::InvalidAmount(text.trim().to_string()));
        }
        Ok(value)
    }

    /// Same as [`parse_user_amount`] for a field that may be absent
    pub fn parse_optional_amount(text: Option<&str>) -> U256 {
        text.map(parse_user_amount).unwrap_or_default()
    }

    fn parse_decimal(text: &str, decimals: usize) -> Option<U256> {
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return None;
        }

        let mut frac = frac_part.to_string();
        let mut round_up = false;
        if frac.len() > decimals {
            round_up = frac.as_bytes()[decimals] >= b'5';
            frac.truncate(decimals);
        }
        let padded = format!("{int_part}{frac:0<decimals$}");
        let value = U256::from_dec_str(&padded).ok()?;
        if round_up {
            value.checked_add(U256::one())
        } else {
            Some(value)
        }
    }

    /// True iff `display_units * price >= minimum_usd`
    pub fn meets_minimum(display_units: f64, price: f64, minimum_usd: f64) -> bool {
        display_units * price >= minimum_usd
    }

    /// Convert the contract's minimum-USD integer into a float using its decimals
    pub fn minimum_usd_value(raw: &U256, decimals: u32) -> f64 {
        let unit = pow10(decimals);
        let whole = *raw / unit;
        let frac = *raw % unit;
        format!("{whole}.{:0>width$}", frac.to_string(), width = decimals as usize)
            .parse::<f64>()
            .unwrap_or(0.0)
    }

    /// Progress toward the personal milestone, clamped to 100
    pub fn milestone_progress(display_units: f64) -> f64 {
        (display_units / PERSONAL_MILESTONE_ETH * 100.0).clamp(0.0, 100.0)
    }
}
