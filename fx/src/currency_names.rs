//! Mapping of feed display names to currency codes.

use std::collections::HashMap;

use pivotfx_common::Currency;

/// Display names used by the IMF tables, as published.
const IMF_NAMES: &[(&str, &str)] = &[
    ("Algerian Dinar", "DZD"),
    ("Australian Dollar", "AUD"),
    ("Bahrain Dinar", "BHD"),
    ("Bolivar Fuerte", "VEF"),
    ("Botswana Pula", "BWP"),
    ("Brazilian Real", "BRL"),
    ("Brunei Dollar", "BND"),
    ("Canadian Dollar", "CAD"),
    ("Chilean Peso", "CLP"),
    ("Chinese Yuan", "CNY"),
    ("Colombian Peso", "COP"),
    ("Czech Koruna", "CZK"),
    ("Danish Krone", "DKK"),
    ("Euro", "EUR"),
    ("Hungarian Forint", "HUF"),
    ("Icelandic Krona", "ISK"),
    ("Indian Rupee", "INR"),
    ("Indonesian Rupiah", "IDR"),
    ("Iranian Rial", "IRR"),
    ("Israeli New Sheqel", "ILS"),
    ("Japanese Yen", "JPY"),
    ("Kazakhstani Tenge", "KZT"),
    ("Korean Won", "KRW"),
    ("Kuwaiti Dinar", "KWD"),
    ("Libyan Dinar", "LYD"),
    ("Malaysian Ringgit", "MYR"),
    ("Mauritian Rupee", "MUR"),
    ("Mexican Peso", "MXN"),
    ("Nepalese Rupee", "NPR"),
    ("New Zealand Dollar", "NZD"),
    ("Norwegian Krone", "NOK"),
    ("Nuevo Sol", "PEN"),
    ("Pakistani Rupee", "PKR"),
    ("Peso Uruguayo", "UYU"),
    ("Philippine Peso", "PHP"),
    ("Polish Zloty", "PLN"),
    ("Qatar Riyal", "QAR"),
    ("Rial Omani", "OMR"),
    ("Russian Ruble", "RUB"),
    ("Saudi Arabian Riyal", "SAR"),
    ("Singapore Dollar", "SGD"),
    ("South African Rand", "ZAR"),
    ("Sri Lanka Rupee", "LKR"),
    ("Swedish Krona", "SEK"),
    ("Swiss Franc", "CHF"),
    ("Thai Baht", "THB"),
    ("Trinidad And Tobago Dollar", "TTD"),
    ("Tunisian Dinar", "TND"),
    ("U.A.E. Dirham", "AED"),
    ("U.K. Pound Sterling", "GBP"),
    ("U.S. Dollar", "USD"),
];

/// Case-insensitive registry of currency display names.
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct CurrencyNames {
    by_name: HashMap<String, Currency>,
}

impl CurrencyNames {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the names used by the IMF feed.
    pub fn with_defaults() -> Self {
        let mut names = Self::new();
        for (name, code) in IMF_NAMES {
            names.insert(*name, Currency::new(*code));
        }
        names
    }

    pub fn insert(&mut self, name: impl AsRef<str>, currency: Currency) {
        self.by_name.insert(Self::key(name.as_ref()), currency);
    }

    pub fn lookup(&self, name: &str) -> Option<&Currency> {
        self.by_name.get(&Self::key(name))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn key(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}
