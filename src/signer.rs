// ===============================
// src/signer.rs
// ===============================
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ValidationError;

type HmacSha256 = Hmac<Sha256>;

/// HTTP method yang ikut masuk ke payload tanda tangan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Epoch milliseconds as decimal text. Ambil tepat sebelum sign, lalu pakai
/// string yang sama untuk header X-AUTH-TIMESTAMP.
pub fn timestamp_ms() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Everything one signature covers.
#[derive(Clone, Copy)]
pub struct SigningContext<'a> {
    pub timestamp: &'a str,
    pub method: Method,
    pub endpoint: &'a str,
    /// Empty for GET.
    pub canonical_body: &'a str,
    pub secret: &'a [u8],
}

impl SigningContext<'_> {
    /// `timestamp || method || endpoint || body`, no separators.
    pub fn payload(&self) -> String {
        let mut p = String::with_capacity(
            self.timestamp.len() + 4 + self.endpoint.len() + self.canonical_body.len(),
        );
        p.push_str(self.timestamp);
        p.push_str(self.method.as_str());
        p.push_str(self.endpoint);
        p.push_str(self.canonical_body);
        p
    }

    pub fn sign(&self) -> Result<String, ValidationError> {
        if self.secret.is_empty() {
            return Err(ValidationError::Missing("apiSecret"));
        }
        // HMAC menerima key dengan panjang berapa pun; error di sini hanya
        // terjadi untuk key kosong yang sudah ditolak di atas.
        let mut mac = HmacSha256::new_from_slice(self.secret)
            .map_err(|_| ValidationError::Missing("apiSecret"))?;
        mac.update(self.payload().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

pub fn sign(
    timestamp: &str,
    method: Method,
    endpoint: &str,
    canonical_body: &str,
    secret: &[u8],
) -> Result<String, ValidationError> {
    SigningContext {
        timestamp,
        method,
        endpoint,
        canonical_body,
        secret,
    }
    .sign()
}
