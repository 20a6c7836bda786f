// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : dcx_proxy — signing relay for the CoinDCX private REST API
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Runtime settings for the proxy. Reads .env first, then ENV
          and command-line flags (PORT, BIND_HOST, COINDCX_BASE_URL,
          LOG_LEVEL, USER_AGENT) into one Args struct.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use dotenvy::dotenv;

use crate::forwarder::DEFAULT_BASE_URL;

#[derive(Clone, Debug, Parser)]
#[command(name = "dcx_proxy", version, about = "Signing proxy for CoinDCX order & balance calls")]
pub struct Args {
    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listening address
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    /// CoinDCX REST base (override untuk testing / staging)
    #[arg(long, env = "COINDCX_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub coindcx_base_url: String,

    /// Fallback log filter kalau RUST_LOG tidak di-set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Optional User-Agent for outbound calls
    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }
}

pub fn load() -> Args {
    // Pastikan .env dibaca sebelum clap membaca ENV
    let _ = dotenv();
    Args::parse()
}
