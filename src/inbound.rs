// ===============================
// src/inbound.rs
// ===============================
//
// Normalisasi body inbound -> intent internal.
// Deployment berbeda mengirim credential dengan bentuk berbeda:
//   { ..., "apiKey": "...", "apiSecret": "..." }
//   { ..., "headers": { "apiKey": "...", "apiSecret": "..." } }
// Field flat menang kalau dua-duanya ada.
//
use serde::Deserialize;

use crate::domain::{BalanceQuery, Credentials, OrderIntent, Side};
use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedCredentials {
    api_key: Option<String>,
    api_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredentials {
    api_key: Option<String>,
    api_secret: Option<String>,
    #[serde(default)]
    headers: Option<NestedCredentials>,
}

impl RawCredentials {
    fn normalize(self) -> Result<Credentials, ValidationError> {
        let nested = self.headers.unwrap_or_default();
        let key = pick(self.api_key, nested.api_key).ok_or(ValidationError::Missing("apiKey"))?;
        let secret =
            pick(self.api_secret, nested.api_secret).ok_or(ValidationError::Missing("apiSecret"))?;
        Credentials::new(key, secret)
    }
}

fn pick(flat: Option<String>, nested: Option<String>) -> Option<String> {
    flat.filter(|s| !s.trim().is_empty())
        .or(nested.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    market: Option<String>,
    side: Option<String>,
    order_type: Option<String>,
    #[serde(default)]
    quantity: serde_json::Value,
    #[serde(flatten)]
    creds: RawCredentials,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    symbol: Option<String>,
    #[serde(flatten)]
    creds: RawCredentials,
}

/// POST /place-order body -> (intent, credentials). Field lain diabaikan.
pub fn order_request(body: &[u8]) -> Result<(OrderIntent, Credentials), ValidationError> {
    let raw: RawOrder = parse(body)?;

    let market = raw.market.ok_or(ValidationError::Missing("market"))?;
    let side = raw.side.ok_or(ValidationError::Missing("side"))?;
    if side.trim().is_empty() {
        return Err(ValidationError::Missing("side"));
    }
    let side = Side::parse(&side).ok_or_else(|| ValidationError::Invalid {
        field: "side",
        reason: format!("expected buy or sell, got {side:?}"),
    })?;
    let order_type = raw.order_type.ok_or(ValidationError::Missing("order_type"))?;
    let quantity = quantity(raw.quantity)?;

    let intent = OrderIntent::new(market, side, order_type, quantity)?;
    let creds = raw.creds.normalize()?;
    Ok((intent, creds))
}

/// POST /get-balance body -> (query, credentials).
pub fn balance_request(body: &[u8]) -> Result<(BalanceQuery, Credentials), ValidationError> {
    let raw: RawBalance = parse(body)?;
    let query = BalanceQuery::new(raw.symbol.ok_or(ValidationError::Missing("symbol"))?)?;
    let creds = raw.creds.normalize()?;
    Ok((query, creds))
}

fn parse<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::Body(e.to_string()))
}

fn quantity(v: serde_json::Value) -> Result<serde_json::Number, ValidationError> {
    match v {
        serde_json::Value::Null => Err(ValidationError::Missing("quantity")),
        serde_json::Value::Number(n) => Ok(n),
        serde_json::Value::String(s) if s.trim().is_empty() => Err(ValidationError::Missing("quantity")),
        serde_json::Value::String(s) => {
            s.trim()
                .parse::<serde_json::Number>()
                .map_err(|_| ValidationError::Invalid {
                    field: "quantity",
                    reason: format!("not a number: {s:?}"),
                })
        }
        other => Err(ValidationError::Invalid {
            field: "quantity",
            reason: format!("expected number, got {other}"),
        }),
    }
}
