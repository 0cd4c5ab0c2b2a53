//! Major -> minor currency unit conversion.
//!
//! One policy for every call site: `round(amount_major * 10^exponent)` where the
//! exponent is the ISO 4217 minor-unit count. Unknown currencies use 2 (x100).

use crate::error::{AppError, Result, msg};

const ZERO_DECIMAL: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

const THREE_DECIMAL: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// Number of minor-unit digits for an ISO 4217 code (case-insensitive).
pub fn minor_unit_exponent(currency: &str) -> u32 {
    let code = currency.trim().to_ascii_uppercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        3
    } else {
        2
    }
}

/// Convert a major-unit amount (e.g. 300.50 GHS) to integer minor units (30050 pesewas).
pub fn to_minor_units(amount_major: f64, currency: &str) -> Result<i64> {
    if !amount_major.is_finite() || amount_major < 0.0 {
        return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
    }

    let factor = 10f64.powi(minor_unit_exponent(currency) as i32);
    let minor = (amount_major * factor).round();

    if minor > i64::MAX as f64 {
        return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
    }

    Ok(minor as i64)
}

/// Normalize a currency code for storage and gateway calls.
pub fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(format!("Invalid currency code: {}", currency)));
    }
    Ok(code)
}
