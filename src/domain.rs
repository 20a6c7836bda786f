// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, ValidationError};

/// Quote currency yang dibuang dari akhir symbol (BTCINR -> BTC).
pub const QUOTE_SUFFIX: &str = "INR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Validated order. Fields are private so an intent can only exist after
/// [`OrderIntent::new`] has accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    market: String,
    side: Side,
    order_type: String,
    quantity: serde_json::Number,
}

impl OrderIntent {
    pub fn new(
        market: impl Into<String>,
        side: Side,
        order_type: impl Into<String>,
        quantity: serde_json::Number,
    ) -> Result<Self, ValidationError> {
        let market = non_empty("market", market.into())?;
        let order_type = non_empty("order_type", order_type.into())?;
        match quantity.as_f64() {
            Some(q) if q.is_finite() && q > 0.0 => {}
            _ => {
                return Err(ValidationError::Invalid {
                    field: "quantity",
                    reason: format!("must be a positive number, got {quantity}"),
                })
            }
        }
        Ok(Self { market, side, order_type, quantity })
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Body yang ditandatangani dan dikirim: hanya empat field ini, urutan tetap.
    pub fn canonical(&self) -> CanonicalOrder<'_> {
        CanonicalOrder {
            market: &self.market,
            side: self.side,
            order_type: &self.order_type,
            quantity: &self.quantity,
        }
    }
}

/// Field order here is the wire order: market, side, order_type, quantity.
#[derive(Debug, Serialize)]
pub struct CanonicalOrder<'a> {
    pub market: &'a str,
    pub side: Side,
    pub order_type: &'a str,
    pub quantity: &'a serde_json::Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceQuery {
    symbol: String,
}

impl BalanceQuery {
    pub fn new(symbol: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self { symbol: non_empty("symbol", symbol.into())? })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Symbol tanpa suffix INR. Symbol yang tidak berakhiran INR dipakai apa adanya.
    pub fn asset_code(&self) -> &str {
        self.symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(&self.symbol)
    }
}

/// API key + secret, dibawa per request. Debug sengaja menyembunyikan isinya.
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, ValidationError> {
        let api_key = non_empty("apiKey", api_key.into())?;
        let api_secret = non_empty("apiSecret", api_secret.into())?;
        Ok(Self { api_key, api_secret: SecretString::from(api_secret) })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.api_secret.expose_secret().as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// One entry of GET /exchange/v1/users/balances. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRecord {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub available_balance: serde_json::Value,
}

impl BalanceRecord {
    /// `available_balance` datang sebagai string ("0.25") atau number.
    pub fn available(&self) -> Result<f64, ProxyError> {
        let parsed = match &self.available_balance {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            serde_json::Value::Null => Some(0.0),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).ok_or_else(|| {
            ProxyError::Balance(format!(
                "available_balance for {} is not numeric: {}",
                self.currency.as_deref().unwrap_or("?"),
                self.available_balance
            ))
        })
    }
}

/// First record whose currency equals `asset` exactly; none means zero holdings.
pub fn find_available(records: &[BalanceRecord], asset: &str) -> Result<f64, ProxyError> {
    match records.iter().find(|r| r.currency.as_deref() == Some(asset)) {
        Some(r) => r.available(),
        None => Ok(0.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Balance {
    pub qty: f64,
}

/// Respons exchange yang diteruskan verbatim ke caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn non_empty(field: &'static str, v: String) -> Result<String, ValidationError> {
    if v.trim().is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(v)
    }
}
