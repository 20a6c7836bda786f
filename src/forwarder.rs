// ===============================
// src/forwarder.rs
// ===============================
use std::time::Instant;

use url::Url;

use crate::domain::{find_available, Balance, BalanceQuery, BalanceRecord, Credentials, OrderIntent, UpstreamReply};
use crate::error::{ForwardError, ProxyError};
use crate::metrics::{UPSTREAM_LATENCY, UPSTREAM_RESPONSES};
use crate::signer::{self, Method};

pub const DEFAULT_BASE_URL: &str = "https://api.coindcx.com";
pub const ORDER_CREATE: &str = "/exchange/v1/orders/create";
pub const USER_BALANCES: &str = "/exchange/v1/users/balances";

pub const HDR_APIKEY: &str = "X-AUTH-APIKEY";
pub const HDR_SIGNATURE: &str = "X-AUTH-SIGNATURE";
pub const HDR_TIMESTAMP: &str = "X-AUTH-TIMESTAMP";

/// Request yang sudah ditandatangani, siap dikirim. `body` adalah string yang
/// sama persis dengan yang masuk ke signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    pub endpoint: &'static str,
    pub api_key: String,
    pub timestamp: String,
    pub signature: String,
    pub body: Option<String>,
}

/// Satu serialisasi dipakai untuk sign dan untuk wire.
pub fn signed_order(
    intent: &OrderIntent,
    creds: &Credentials,
    timestamp: String,
) -> Result<SignedRequest, ForwardError> {
    let body = serde_json::to_string(&intent.canonical()).map_err(ProxyError::from)?;
    let signature = signer::sign(&timestamp, Method::Post, ORDER_CREATE, &body, creds.secret_bytes())?;
    Ok(SignedRequest {
        method: Method::Post,
        endpoint: ORDER_CREATE,
        api_key: creds.api_key().to_string(),
        timestamp,
        signature,
        body: Some(body),
    })
}

/// GET tanpa body: signature hanya bergantung pada timestamp, method, endpoint, secret.
pub fn signed_balances(creds: &Credentials, timestamp: String) -> Result<SignedRequest, ForwardError> {
    let signature = signer::sign(&timestamp, Method::Get, USER_BALANCES, "", creds.secret_bytes())?;
    Ok(SignedRequest {
        method: Method::Get,
        endpoint: USER_BALANCES,
        api_key: creds.api_key().to_string(),
        timestamp,
        signature,
        body: None,
    })
}

/// Stateless relay ke CoinDCX. Clone murah (reqwest::Client berbagi pool).
#[derive(Debug, Clone)]
pub struct Forwarder {
    http: reqwest::Client,
    base: String,
}

impl Forwarder {
    pub fn new(base_url: &str, user_agent: Option<&str>) -> Result<Self, ProxyError> {
        let parsed = Url::parse(base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }
        Ok(Self {
            http: builder.build()?,
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Place order. Setiap respons HTTP (2xx maupun error bisnis) diteruskan apa adanya.
    pub async fn place_order(
        &self,
        intent: &OrderIntent,
        creds: &Credentials,
    ) -> Result<UpstreamReply, ForwardError> {
        let req = signed_order(intent, creds, signer::timestamp_ms())?;
        tracing::info!(market = %intent.market(), side = ?intent.side(), "forwarding order");
        let reply = self.send(&req).await?;
        // Body harus JSON; kalau tidak, anggap transport rusak.
        serde_json::from_str::<serde_json::Value>(&reply.body).map_err(ProxyError::from)?;
        Ok(reply)
    }

    /// Balance satu asset. Tidak ada record yang cocok -> qty 0.
    pub async fn get_balance(
        &self,
        query: &BalanceQuery,
        creds: &Credentials,
    ) -> Result<Balance, ForwardError> {
        let req = signed_balances(creds, signer::timestamp_ms())?;
        let reply = self.send(&req).await?;
        if !reply.is_success() {
            serde_json::from_str::<serde_json::Value>(&reply.body).map_err(ProxyError::from)?;
            return Err(ForwardError::Rejected(reply));
        }

        let records: Vec<BalanceRecord> = serde_json::from_str(&reply.body).map_err(ProxyError::from)?;
        let asset = query.asset_code();
        let qty = find_available(&records, asset)?;
        tracing::debug!(symbol = %query.symbol(), %asset, records = records.len(), qty, "balance resolved");
        Ok(Balance { qty })
    }

    async fn send(&self, req: &SignedRequest) -> Result<UpstreamReply, ProxyError> {
        let url = format!("{}{}", self.base, req.endpoint);
        let mut builder = match req.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        }
        .header(HDR_APIKEY, &req.api_key)
        .header(HDR_SIGNATURE, &req.signature)
        .header(HDR_TIMESTAMP, &req.timestamp);
        if let Some(body) = &req.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let started = Instant::now();
        let rsp = builder.send().await.map_err(|e| {
            tracing::error!(?e, endpoint = %req.endpoint, "exchange unreachable");
            e
        })?;
        let status = rsp.status();
        let body = rsp.text().await?;
        UPSTREAM_LATENCY.observe(started.elapsed().as_secs_f64() * 1000.0);
        UPSTREAM_RESPONSES
            .with_label_values(&[req.endpoint, status.as_str()])
            .inc();

        if status.is_success() {
            tracing::info!(endpoint = %req.endpoint, %status, "exchange replied");
        } else {
            tracing::warn!(endpoint = %req.endpoint, %status, "exchange returned error status");
        }
        tracing::debug!(endpoint = %req.endpoint, %body, "exchange response body");

        Ok(UpstreamReply { status: status.as_u16(), body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::error::ValidationError;
    use crate::signer::Method;
    use httpmock::prelude::{MockServer, GET, POST};

    const TS: &str = "1700000000000";

    fn intent() -> OrderIntent {
        OrderIntent::new("BTCINR", Side::Buy, "market_order", "0.001".parse().unwrap()).unwrap()
    }

    fn creds() -> Credentials {
        Credentials::new("key-123", "secret-xyz").unwrap()
    }

    #[test]
    fn order_body_and_signature_come_from_one_serialization() {
        let req = signed_order(&intent(), &creds(), TS.to_string()).unwrap();
        let body = req.body.as_deref().unwrap();
        assert_eq!(
            body,
            r#"{"market":"BTCINR","side":"buy","order_type":"market_order","quantity":0.001}"#
        );
        let expected = signer::sign(TS, Method::Post, ORDER_CREATE, body, b"secret-xyz").unwrap();
        assert_eq!(req.signature, expected);
        assert_eq!(req.timestamp, TS);
    }

    #[test]
    fn balance_request_is_signed_over_empty_body() {
        // symbol never enters the GET signature, so there is nothing per-query to sign
        let req = signed_balances(&creds(), TS.to_string()).unwrap();
        assert_eq!(req.body, None);
        assert_eq!(req.method, Method::Get);
        assert_eq!(
            req.signature,
            signer::sign(TS, Method::Get, USER_BALANCES, "", b"secret-xyz").unwrap()
        );
        let other = signed_balances(&creds(), "1700000000001".to_string()).unwrap();
        assert_ne!(req.signature, other.signature);
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(Forwarder::new("not a url", None), Err(ProxyError::Url(_))));
    }

    #[tokio::test]
    async fn order_is_posted_with_auth_headers_and_relayed_verbatim() {
        let server = MockServer::start_async().await;
        let wire_body = r#"{"market":"BTCINR","side":"buy","order_type":"market_order","quantity":0.001}"#;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(ORDER_CREATE)
                    .header("content-type", "application/json")
                    .header("x-auth-apikey", "key-123")
                    .header_exists("x-auth-signature")
                    .header_exists("x-auth-timestamp")
                    .body(wire_body);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"orders":[{"id":"abc","status":"open"}]}"#);
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let reply = fwd.place_order(&intent(), &creds()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, r#"{"orders":[{"id":"abc","status":"open"}]}"#);
    }

    /// What the exchange side actually received: (timestamp, signature, body).
    type Captured = std::sync::Arc<tokio::sync::Mutex<Option<(String, String, String)>>>;

    async fn capturing_exchange(reply: &'static str) -> (String, Captured) {
        use hyper::service::{make_service_fn, service_fn};
        use hyper::{Body, Request, Response, Server};
        use std::convert::Infallible;

        let seen: Captured = Default::default();
        let sink = seen.clone();
        let make_svc = make_service_fn(move |_conn| {
            let sink = sink.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let sink = sink.clone();
                    async move {
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string()
                        };
                        let ts = header("x-auth-timestamp");
                        let sig = header("x-auth-signature");
                        let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
                        let body = String::from_utf8(bytes.to_vec()).unwrap();
                        *sink.lock().await = Some((ts, sig, body));
                        Ok::<_, Infallible>(Response::new(Body::from(reply)))
                    }
                }))
            }
        });

        let server = Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(make_svc);
        let base = format!("http://{}", server.local_addr());
        tokio::spawn(server);
        (base, seen)
    }

    #[tokio::test]
    async fn wire_signature_matches_wire_timestamp_and_body() {
        let (base, seen) = capturing_exchange(r#"{"orders":[]}"#).await;
        let fwd = Forwarder::new(&base, None).unwrap();
        fwd.place_order(&intent(), &creds()).await.unwrap();

        let (ts, sig, body) = seen.lock().await.clone().expect("exchange saw no request");
        assert_eq!(
            body,
            r#"{"market":"BTCINR","side":"buy","order_type":"market_order","quantity":0.001}"#
        );
        assert_eq!(sig, signer::sign(&ts, Method::Post, ORDER_CREATE, &body, b"secret-xyz").unwrap());
    }

    #[tokio::test]
    async fn balance_wire_signature_covers_empty_body() {
        let (base, seen) = capturing_exchange("[]").await;
        let fwd = Forwarder::new(&base, None).unwrap();
        let q = BalanceQuery::new("BTCINR").unwrap();
        assert_eq!(fwd.get_balance(&q, &creds()).await.unwrap().qty, 0.0);

        let (ts, sig, body) = seen.lock().await.clone().expect("exchange saw no request");
        assert!(body.is_empty());
        assert_eq!(sig, signer::sign(&ts, Method::Get, USER_BALANCES, "", b"secret-xyz").unwrap());
    }

    #[tokio::test]
    async fn business_error_keeps_exchange_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ORDER_CREATE);
                then.status(422)
                    .body(r#"{"code":422,"message":"Insufficient funds","status":"error"}"#);
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let reply = fwd.place_order(&intent(), &creds()).await.unwrap();
        assert_eq!(reply.status, 422);
        assert!(reply.body.contains("Insufficient funds"));
    }

    #[tokio::test]
    async fn non_json_order_reply_is_a_proxy_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ORDER_CREATE);
                then.status(502).body("<html>bad gateway</html>");
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let err = fwd.place_order(&intent(), &creds()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Proxy(ProxyError::Malformed(_))));
    }

    #[tokio::test]
    async fn balance_is_looked_up_by_asset_code() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(USER_BALANCES)
                    .header("x-auth-apikey", "key-123")
                    .header_exists("x-auth-signature")
                    .header_exists("x-auth-timestamp");
                then.status(200).body(
                    r#"[{"currency":"INR","available_balance":"1000.0","locked_balance":"0"},
                        {"currency":"BTC","available_balance":"0.25","locked_balance":"0.0"}]"#,
                );
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let q = BalanceQuery::new("BTCINR").unwrap();
        let bal = fwd.get_balance(&q, &creds()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(bal, Balance { qty: 0.25 });
    }

    #[tokio::test]
    async fn balance_without_match_is_zero() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(USER_BALANCES);
                then.status(200).body(r#"[{"currency":"ETH","available_balance":"1.5"}]"#);
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let q = BalanceQuery::new("BTCINR").unwrap();
        assert_eq!(fwd.get_balance(&q, &creds()).await.unwrap().qty, 0.0);
    }

    #[tokio::test]
    async fn balance_error_status_is_relayed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(USER_BALANCES);
                then.status(401).body(r#"{"code":401,"message":"Invalid credentials"}"#);
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let q = BalanceQuery::new("BTCINR").unwrap();
        match fwd.get_balance(&q, &creds()).await {
            Err(ForwardError::Rejected(reply)) => {
                assert_eq!(reply.status, 401);
                assert!(reply.body.contains("Invalid credentials"));
            }
            other => panic!("expected rejected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn balance_non_json_is_a_proxy_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(USER_BALANCES);
                then.status(200).body("maintenance");
            })
            .await;

        let fwd = Forwarder::new(&server.base_url(), None).unwrap();
        let q = BalanceQuery::new("BTCINR").unwrap();
        let err = fwd.get_balance(&q, &creds()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Proxy(ProxyError::Malformed(_))));
    }

    #[tokio::test]
    async fn connection_refused_is_a_proxy_error() {
        // port 1 on loopback: nothing listens there
        let fwd = Forwarder::new("http://127.0.0.1:1", None).unwrap();
        let err = fwd.place_order(&intent(), &creds()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Proxy(ProxyError::Transport(_))));

        let q = BalanceQuery::new("BTCINR").unwrap();
        let err = fwd.get_balance(&q, &creds()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Proxy(ProxyError::Transport(_))));
    }

    #[test]
    fn validation_error_converts_into_forward_error() {
        let err: ForwardError = ValidationError::Missing("quantity").into();
        assert!(matches!(err, ForwardError::Validation(ValidationError::Missing("quantity"))));
    }
}
