//! HTTP transport: turns wire requests into [`Request`] values and writes
//! [`MatchResult`]s back. Connection lifecycle and framing live here; the
//! matching decision is entirely the service's.

use crate::mapping::Request;
use crate::service::{MatchResult, Service};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::http::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};
use uuid::Uuid;

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, service: Arc<Service>) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let handler = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { handle_request(req, service).await }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                        debug!("connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("accept error: {}", e);
            }
        }
    }
}

async fn handle_request(
    req: hyper::Request<Incoming>,
    service: Arc<Service>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    let method = req.method().as_str().to_uppercase();
    let path = req.uri().path().to_string();
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_lowercase(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let body = match req.into_body().collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).to_string(),
        Err(_) => String::new(),
    };

    let request = Request {
        id: Uuid::new_v4().to_string(),
        method,
        path,
        headers,
        body,
    };

    let result = service.match_request(&request).await;
    Ok(build_response(&result))
}

fn build_response(result: &MatchResult) -> hyper::Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = hyper::Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(result.body.clone())))
        .unwrap();

    for (name, value) in &result.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
