// ===============================
// src/server.rs
// ===============================
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use hyper::{
    body::to_bytes,
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::{ForwardError, ValidationError};
use crate::forwarder::Forwarder;
use crate::inbound;
use crate::metrics::{encode_metrics, PROXY_ERRORS, PROXY_REQUESTS};

pub const LIVENESS_TEXT: &str = "CoinDCX proxy is running";

/// Serve sampai `shutdown` selesai; request yang sedang jalan dituntaskan dulu.
pub async fn serve(
    addr: SocketAddr,
    fwd: Forwarder,
    shutdown: impl Future<Output = ()>,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let fwd = fwd.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let fwd = fwd.clone();
                async move { Ok::<_, Infallible>(route(req, &fwd).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "proxy listening (POST /place-order, POST /get-balance, GET /metrics)");
    server.with_graceful_shutdown(shutdown).await
}

pub async fn route(req: Request<Body>, fwd: &Forwarder) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => text(StatusCode::OK, LIVENESS_TEXT),
        (&Method::GET, "/metrics") => {
            let mut rsp = Response::new(Body::from(encode_metrics()));
            rsp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            rsp
        }
        (&Method::POST, "/place-order") => place_order(req, fwd).await,
        (&Method::POST, "/get-balance") => get_balance(req, fwd).await,
        (_, "/" | "/metrics" | "/place-order" | "/get-balance") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed" }),
        ),
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found" })),
    }
}

async fn place_order(req: Request<Body>, fwd: &Forwarder) -> Response<Body> {
    const ROUTE: &str = "/place-order";
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(rsp) => return rsp,
    };
    let (intent, creds) = match inbound::order_request(&body) {
        Ok(v) => v,
        Err(e) => return failure(ROUTE, e.into()),
    };

    match fwd.place_order(&intent, &creds).await {
        Ok(reply) => {
            let outcome = if reply.is_success() { "ok" } else { "upstream_error" };
            PROXY_REQUESTS.with_label_values(&[ROUTE, outcome]).inc();
            relay(reply.status, reply.body)
        }
        Err(e) => failure(ROUTE, e),
    }
}

async fn get_balance(req: Request<Body>, fwd: &Forwarder) -> Response<Body> {
    const ROUTE: &str = "/get-balance";
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(rsp) => return rsp,
    };
    let (query, creds) = match inbound::balance_request(&body) {
        Ok(v) => v,
        Err(e) => return failure(ROUTE, e.into()),
    };

    match fwd.get_balance(&query, &creds).await {
        Ok(balance) => {
            PROXY_REQUESTS.with_label_values(&[ROUTE, "ok"]).inc();
            json_response(StatusCode::OK, &json!({ "qty": balance.qty }))
        }
        Err(e) => failure(ROUTE, e),
    }
}

async fn read_body(req: Request<Body>) -> Result<hyper::body::Bytes, Response<Body>> {
    to_bytes(req.into_body()).await.map_err(|e| {
        warn!(?e, "failed reading request body");
        failure_envelope(ValidationError::Body(e.to_string()))
    })
}

/// Map error ke envelope: 400 validation, 500 proxy, status exchange untuk rejected.
fn failure(route: &str, err: ForwardError) -> Response<Body> {
    match err {
        ForwardError::Validation(e) => {
            PROXY_REQUESTS.with_label_values(&[route, "validation"]).inc();
            warn!(%route, error = %e, "rejected request");
            failure_envelope(e)
        }
        ForwardError::Proxy(e) => {
            PROXY_REQUESTS.with_label_values(&[route, "proxy_error"]).inc();
            PROXY_ERRORS.with_label_values(&[e.kind()]).inc();
            error!(%route, error = %e, "proxy error");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Proxy error", "details": e.to_string() }),
            )
        }
        ForwardError::Rejected(reply) => {
            PROXY_REQUESTS.with_label_values(&[route, "upstream_error"]).inc();
            relay(reply.status, reply.body)
        }
    }
}

fn failure_envelope(e: ValidationError) -> Response<Body> {
    let mut payload = json!({ "error": "Validation error", "details": e.to_string() });
    if let Some(field) = e.field() {
        payload["field"] = json!(field);
    }
    json_response(StatusCode::BAD_REQUEST, &payload)
}

fn relay(status: u16, body: String) -> Response<Body> {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut rsp = Response::new(Body::from(body));
    *rsp.status_mut() = status;
    rsp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    rsp
}

fn json_response(status: StatusCode, v: &serde_json::Value) -> Response<Body> {
    relay(status.as_u16(), v.to_string())
}

fn text(status: StatusCode, s: &'static str) -> Response<Body> {
    let mut rsp = Response::new(Body::from(s));
    *rsp.status_mut() = status;
    rsp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    rsp
}
