//! Security identifier normalisation
//!
//! Identifiers use the Tushare `ts_code` form: six digits plus an exchange
//! suffix (`600519.SH`). Bare codes get their suffix from the leading digit.

use crate::error::{EquityError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Compiled once on first use
type Pattern = LazyLock<std::result::Result<Regex, regex::Error>>;

static CODE_RE: Pattern = LazyLock::new(|| Regex::new(r"^(\d{6})(?:\.(SH|SZ|BJ))?$"));
static HK_RE: Pattern = LazyLock::new(|| Regex::new(r"^(\d{4,5})\.HK$"));

fn compiled<'a>(re: &'a Pattern, input: &str) -> Result<&'a Regex> {
    re.as_ref()
        .map_err(|e| EquityError::InvalidSymbol(format!("{input}: {e}")))
}

/// Normalise a user-supplied identifier into `ts_code` form
pub fn normalize_symbol(input: &str) -> Result<String> {
    let raw = input.trim().to_ascii_uppercase();

    if let Some(caps) = compiled(&CODE_RE, input)?.captures(&raw) {
        let code = &caps[1];
        let exchange = match caps.get(2) {
            Some(suffix) => suffix.as_str(),
            None => {
                infer_exchange(code).ok_or_else(|| EquityError::InvalidSymbol(input.to_string()))?
            }
        };
        return Ok(format!("{code}.{exchange}"));
    }

    if compiled(&HK_RE, input)?.is_match(&raw) {
        return Ok(raw);
    }

    Err(EquityError::InvalidSymbol(input.to_string()))
}

fn infer_exchange(code: &str) -> Option<&'static str> {
    match code.chars().next()? {
        '6' => Some("SH"),
        '0' | '3' => Some("SZ"),
        '4' | '8' | '9' => Some("BJ"),
        _ => None,
    }
}

/// The identifier without its exchange suffix, used for report folders
pub fn bare_code(symbol: &str) -> &str {
    symbol.split_once('.').map_or(symbol, |(code, _)| code)
}
