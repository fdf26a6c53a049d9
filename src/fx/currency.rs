//! Currency registry, code normalization, and money formatting.

use std::collections::HashMap;
use std::sync::OnceLock;

use rust_decimal::Decimal;

use super::fx_model::Money;

/// Static metadata for a currency supported by the platform.
#[derive(Debug, Clone)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    /// Minor-unit decimals used when rounding converted amounts.
    pub decimals: u32,
}

static CURRENCIES: OnceLock<HashMap<&'static str, CurrencyInfo>> = OnceLock::new();

fn registry() -> &'static HashMap<&'static str, CurrencyInfo> {
    CURRENCIES.get_or_init(|| {
        let mut map = HashMap::new();

        map.insert(
            "USD",
            CurrencyInfo {
                code: "USD",
                name: "US Dollar",
                symbol: "$",
                decimals: 2,
            },
        );
        map.insert(
            "RWF",
            CurrencyInfo {
                code: "RWF",
                name: "Rwandan Franc",
                symbol: "FRW",
                decimals: 0,
            },
        );
        map.insert(
            "EUR",
            CurrencyInfo {
                code: "EUR",
                name: "Euro",
                symbol: "\u{20ac}",
                decimals: 2,
            },
        );
        map.insert(
            "GBP",
            CurrencyInfo {
                code: "GBP",
                name: "British Pound",
                symbol: "\u{a3}",
                decimals: 2,
            },
        );
        map.insert(
            "KES",
            CurrencyInfo {
                code: "KES",
                name: "Kenyan Shilling",
                symbol: "KSh",
                decimals: 2,
            },
        );
        map.insert(
            "JPY",
            CurrencyInfo {
                code: "JPY",
                name: "Japanese Yen",
                symbol: "\u{a5}",
                decimals: 0,
            },
        );

        map
    })
}

/// Returns metadata for a normalized currency code, if the platform knows it.
pub fn currency_info(code: &str) -> Option<&'static CurrencyInfo> {
    registry().get(code)
}

/// Uppercases a currency code and resolves platform aliases.
///
/// `FRW` is the legacy code the platform used for the Rwandan franc and is
/// folded into ISO `RWF`.
pub fn normalize_currency_code(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    match upper.as_str() {
        "FRW" => "RWF".to_string(),
        _ => upper,
    }
}

/// Returns true if the normalized code is present in the registry.
pub fn is_supported(code: &str) -> bool {
    registry().contains_key(code)
}

/// Minor-unit decimals for a normalized code. Unknown codes format with 2.
pub fn minor_unit_decimals(code: &str) -> u32 {
    currency_info(code).map(|c| c.decimals).unwrap_or(2)
}

/// Renders a monetary value with its currency symbol and grouped thousands.
///
/// Zero-decimal currencies always render whole units; others drop the
/// fractional part when it is zero, matching how prices are shown across the
/// admin panel.
pub fn format_money(money: &Money) -> String {
    let code = money.currency();
    let info = currency_info(code);
    let symbol = info.map(|c| c.symbol).unwrap_or(code);
    let decimals = info.map(|c| c.decimals).unwrap_or(2);

    let amount = money.amount();
    let display_decimals = if decimals == 0 || amount.fract().is_zero() {
        0
    } else {
        decimals
    };

    format!("{}{}", symbol, group_thousands(amount, display_decimals))
}

/// Formats a decimal with `decimals` fraction digits and comma separators.
fn group_thousands(amount: Decimal, decimals: u32) -> String {
    let rounded = amount.round_dp(decimals);
    let raw = format!("{:.*}", decimals as usize, rounded);

    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_folds_legacy_frw() {
        assert_eq!(normalize_currency_code("FRW"), "RWF");
        assert_eq!(normalize_currency_code("frw"), "RWF");
        assert_eq!(normalize_currency_code(" usd "), "USD");
        assert_eq!(normalize_currency_code("RWF"), "RWF");
    }

    #[test]
    fn test_registry_lookup() {
        assert!(is_supported("USD"));
        assert!(is_supported("RWF"));
        assert!(!is_supported("XXX"));
        assert_eq!(currency_info("RWF").unwrap().symbol, "FRW");
    }

    #[test]
    fn test_format_usd_with_cents() {
        let money = Money::new(dec!(1234.50), "USD");
        assert_eq!(format_money(&money), "$1,234.50");
    }

    #[test]
    fn test_format_usd_whole_amount_drops_cents() {
        let money = Money::new(dec!(1234.00), "USD");
        assert_eq!(format_money(&money), "$1,234");
    }

    #[test]
    fn test_format_rwf_always_whole_units() {
        let money = Money::new(dec!(13000), "RWF");
        assert_eq!(format_money(&money), "FRW13,000");
    }

    #[test]
    fn test_format_negative_amount() {
        let money = Money::new(dec!(-1234.56), "USD");
        assert_eq!(format_money(&money), "$-1,234.56");
    }

    #[test]
    fn test_format_unknown_code_falls_back_to_code() {
        let money = Money::new(dec!(5.25), "XXX");
        assert_eq!(format_money(&money), "XXX5.25");
    }
}
