//! load-gen - Fires a continuous stream of HTTP requests at a host
//!
//! Usage:
//!     HOST=127.0.0.1:3030 load-gen
//!
//! Every request uses a fresh connection so each one goes through backend
//! selection again.

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Uri;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

use tcplb::config::LogFormat;
use tcplb::util::init_logging;

/// Upper bound (exclusive) of the pause between two requests, in milliseconds.
const MAX_WAIT_MS: u64 = 10;

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info", &LogFormat::Pretty);

    let host = std::env::var("HOST").context("HOST env not set")?;
    let uri: Uri = format!("http://{}/", host)
        .parse()
        .with_context(|| format!("invalid HOST '{}'", host))?;

    info!(uri = %uri, "starting load testing");

    // No idle pooling: one connection per request
    let client: HttpClient = Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build_http();

    loop {
        tokio::spawn(send_request(client.clone(), uri.clone()));

        let wait = rand::thread_rng().gen_range(0..MAX_WAIT_MS);
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }
}

async fn send_request(client: HttpClient, uri: Uri) {
    let response = match client.get(uri.clone()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(uri = %uri, error = %e, "error while GET");
            return;
        }
    };

    let status = response.status();
    match response.into_body().collect().await {
        Ok(body) => {
            let body = body.to_bytes();
            info!(
                uri = %uri,
                status = %status,
                body = %String::from_utf8_lossy(&body),
                "GET"
            );
        }
        Err(e) => warn!(uri = %uri, status = %status, error = %e, "failed to read body"),
    }
}
