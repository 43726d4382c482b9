//! Value and time formatting helpers
//!
//! Amounts are carried in wei (18 decimals). These helpers convert to and
//! from human-readable ether strings and render remaining proposal time.

use thiserror::Error;

/// Decimal places of the native unit
pub const ETHER_DECIMALS: u32 = 18;

/// One ether in wei
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Unit conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Too many decimal places: at most {max}")]
    TooPrecise { max: u32 },
    #[error("Amount overflows: {0}")]
    Overflow(String),
}

/// Parse an ether amount such as `"1.5"` into wei
pub fn parse_ether(input: &str) -> Result<u128, UnitsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UnitsError::InvalidAmount(input.to_string()));
    }

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(UnitsError::InvalidAmount(input.to_string()));
    }

    if frac.len() > ETHER_DECIMALS as usize {
        return Err(UnitsError::TooPrecise {
            max: ETHER_DECIMALS,
        });
    }

    let overflow = || UnitsError::Overflow(input.to_string());

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| overflow())?
            .checked_mul(WEI_PER_ETHER)
            .ok_or_else(overflow)?
    };

    let frac_wei = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(ETHER_DECIMALS - frac.len() as u32);
        frac.parse::<u128>().map_err(|_| overflow())? * scale
    };

    whole_wei.checked_add(frac_wei).ok_or_else(overflow)
}

/// Format a wei amount as ether, trimming trailing zeros
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Render a duration in seconds as `"1d 2h 3m 4s"`, omitting zero parts
pub fn format_time_interval(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs / 3_600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }

    parts.join(" ")
}
