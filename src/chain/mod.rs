pub mod client;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

pub use client::{ChainClient, ChainInfo, PaymentResult, ResolveRequest, Route, SendPaymentRequest};

/// Currencies with a payment-channel network this node can swap on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Ltc,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Ltc => "LTC",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BTC" => Ok(Currency::Btc),
            "LTC" => Ok(Currency::Ltc),
            other => anyhow::bail!("unsupported currency: {other}"),
        }
    }
}

/// Splits a `"BASE/QUOTE"` pair id into its two currencies.
pub fn split_pair_id(pair_id: &str) -> Result<(Currency, Currency)> {
    let (base, quote) = pair_id
        .split_once('/')
        .with_context(|| format!("malformed pair id: {pair_id}"))?;
    let base = base.parse().with_context(|| format!("pair {pair_id}"))?;
    let quote = quote.parse().with_context(|| format!("pair {pair_id}"))?;
    Ok((base, quote))
}

/// Per-currency parameters that are configuration, not chain state.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyConfig {
    /// Subunits (satoshis) per whole currency unit.
    pub subunits_per_unit: f64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            subunits_per_unit: 100_000_000.0,
        }
    }
}

struct ChainEntry {
    client: Arc<dyn ChainClient>,
    config: CurrencyConfig,
}

/// The node's chain clients keyed by currency. Currency support is membership
/// in this map; a trading pair is supported when both of its currencies are
/// present and connected.
#[derive(Default)]
pub struct ChainClientMap {
    entries: HashMap<Currency, ChainEntry>,
}

impl ChainClientMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: Arc<dyn ChainClient>) {
        self.insert_with_config(client, CurrencyConfig::default());
    }

    pub fn insert_with_config(&mut self, client: Arc<dyn ChainClient>, config: CurrencyConfig) {
        self.entries
            .insert(client.currency(), ChainEntry { client, config });
    }

    pub fn get(&self, currency: Currency) -> Option<Arc<dyn ChainClient>> {
        self.entries.get(&currency).map(|e| e.client.clone())
    }

    /// The client for `currency`, or an error naming the unsupported currency.
    pub fn require(&self, currency: Currency) -> Result<Arc<dyn ChainClient>> {
        self.get(currency)
            .with_context(|| format!("no chain client for currency {currency}"))
    }

    pub fn config(&self, currency: Currency) -> Result<CurrencyConfig> {
        self.entries
            .get(&currency)
            .map(|e| e.config)
            .with_context(|| format!("no chain client for currency {currency}"))
    }

    pub fn is_connected(&self, currency: Currency) -> bool {
        self.entries
            .get(&currency)
            .is_some_and(|e| e.client.is_connected())
    }

    /// Whether a trading pair can be swapped right now: both currencies are
    /// distinct, have a registered chain client, and that client is connected.
    pub fn is_pair_supported(&self, pair_id: &str) -> bool {
        match split_pair_id(pair_id) {
            Ok((base, quote)) => {
                base != quote && self.is_connected(base) && self.is_connected(quote)
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_round_trip() {
        assert_eq!("BTC".parse::<Currency>().unwrap(), Currency::Btc);
        assert_eq!(Currency::Ltc.to_string(), "LTC");
        assert!("DOGE".parse::<Currency>().is_err());
    }

    #[test]
    fn pair_id_splits() {
        let (base, quote) = split_pair_id("LTC/BTC").unwrap();
        assert_eq!(base, Currency::Ltc);
        assert_eq!(quote, Currency::Btc);
        assert!(split_pair_id("LTCBTC").is_err());
        assert!(split_pair_id("LTC/XMR").is_err());
    }

    #[test]
    fn empty_map_supports_nothing() {
        let map = ChainClientMap::new();
        assert!(!map.is_pair_supported("LTC/BTC"));
    }
}
