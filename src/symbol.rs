//! Turning user input into a ticker.
//!
//! Input is either a ticker already (`TSLA`, `RELIANCE.NS`, `NSE:ZOMATO`)
//! or a company name (`Zomato`, `jsw steel`). Names go through a
//! [`SymbolResolver`]; the result is normalized to the `.NS` / `.BO`
//! suffix convention the fundamentals adapters expect.

use std::collections::HashMap;

/// Name-to-ticker lookup.
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Read-only lookup over a fixed map. Keys are matched case-insensitively
/// after trimming.
#[derive(Debug, Clone)]
pub struct StaticSymbolResolver {
    map: HashMap<String, String>,
}

impl StaticSymbolResolver {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            map: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Resolver pre-loaded with the common Indian listings.
    pub fn seeded() -> Self {
        Self::new([
            ("oyo", "OYO.NS"),
            ("lic", "LICI.NS"),
            ("zomato", "ZOMATO.NS"),
            ("jsw steel", "JSWSTEEL.NS"),
            ("jswsteel", "JSWSTEEL.NS"),
        ])
    }
}

impl Default for StaticSymbolResolver {
    fn default() -> Self {
        Self::seeded()
    }
}

impl SymbolResolver for StaticSymbolResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        self.map.get(&name.trim().to_lowercase()).cloned()
    }
}

/// Already qualified (`X.NS`, `NSE:X`) or an upper-case token of 1-6
/// alphanumerics and dashes.
pub fn looks_like_ticker(raw: &str) -> bool {
    if raw.contains('.') || raw.contains(':') {
        return true;
    }
    let len = raw.chars().count();
    (1..=6).contains(&len)
        && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && raw.chars().any(|c| c.is_ascii_alphabetic())
        && raw == raw.to_ascii_uppercase()
}

/// `NSE:X` -> `X.NS`, `BSE:X` -> `X.BO` (prefix matched case-insensitively,
/// ticker upper-cased). Everything else passes through trimmed but
/// otherwise unchanged. Returns `None` for blank input.
pub fn normalize_symbol(sym: &str) -> Option<String> {
    let s = sym.trim();
    if s.is_empty() {
        return None;
    }
    for (prefix, suffix) in [("NSE:", ".NS"), ("BSE:", ".BO")] {
        let matched = s
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matched {
            let base = s[prefix.len()..].trim();
            if !base.is_empty() {
                return Some(format!("{}{suffix}", base.to_uppercase()));
            }
        }
    }
    Some(s.to_string())
}
