//! demo-backend - A tiny HTTP server to put behind tcplb
//!
//! Usage:
//!     PORT=8081 demo-backend
//!
//! Answers `GET /health` with `{"message":"ok"}` and everything else with
//! `{"message":"running"}`.

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use tcplb::config::LogFormat;
use tcplb::util::init_logging;

#[derive(Serialize)]
struct ApiResponse {
    message: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info", &LogFormat::Pretty);

    let port: u16 = std::env::var("PORT")
        .context("PORT env not set")?
        .parse()
        .context("PORT is not a valid port number")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(listen = %addr, "HTTP server listening");

    loop {
        let (stream, client_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, client_addr));

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(error = %e, "connection error");
            }
        });
    }
}

async fn handle_request<B>(
    req: Request<B>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    info!(
        client = %client_addr,
        method = %req.method(),
        uri = %req.uri(),
        version = ?req.version(),
        "request"
    );

    let message = if req.uri().path() == "/health" {
        "ok"
    } else {
        "running"
    };

    let body = serde_json::to_vec(&ApiResponse { message }).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
