// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/dcx_proxy

 # liveness
curl -s localhost:3000/

 # saldo BTC (symbol BTCINR -> currency BTC)
curl -s -XPOST localhost:3000/get-balance -H 'content-type: application/json' \
  -d '{"symbol":"BTCINR","headers":{"apiKey":"...","apiSecret":"..."}}'

 # metrics proxy
curl -s localhost:3000/metrics | grep '^proxy_requests_total'

*/
/*
=============================================================================
Project : dcx_proxy — signing relay for the CoinDCX private REST API
Module  : main.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Holds the HMAC signing step server-side so browser code never sees
          the API secret. Accepts place-order / get-balance intents, signs
          them, forwards to CoinDCX, relays the answer, exposes Prometheus
          metrics.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod config;
mod domain;
mod error;
mod forwarder;   // canonical body -> sign -> CoinDCX REST
mod inbound;     // body shape adapter (flat / nested credentials)
mod metrics;
mod server;
mod signer;      // HMAC-SHA256 over timestamp+method+endpoint+body

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ---- Load config ----
    let args = config::load();

    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Metrics ----
    metrics::init();

    // ---- Forwarder ----
    let fwd = match forwarder::Forwarder::new(&args.coindcx_base_url, args.user_agent.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "cannot build exchange client");
            std::process::exit(1);
        }
    };

    info!(
        listen = %args.listen_addr(),
        exchange = %fwd.base_url(),
        "startup config"
    );

    // ---- Serve until Ctrl-C ----
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "ctrl_c handler failed");
        }
        info!("shutdown requested");
    };
    if let Err(e) = server::serve(args.listen_addr(), fwd, shutdown).await {
        error!(?e, "server stopped with error");
        std::process::exit(1);
    }
    info!("server stopped");
}
