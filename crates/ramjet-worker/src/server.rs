//! HTTP server exposing the request handler.
//!
//! Incoming requests are turned into [`ProxyRequest`]s (destination from
//! `sec-fetch-dest`, mode from `sec-fetch-mode`, cache from
//! `cache-control`), run through the handler and written back. Requests
//! outside the proxy prefix get `404`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use ramjet_core::{RamjetConfig, RawHeaders};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkerError};
use crate::handler::{HandlerConfig, RequestHandler};
use crate::request::{CacheMode, Destination, ProxyRequest, ProxyResponse, RedirectMode, RequestMode};
use crate::transport::HttpTransport;

/// Response headers describing the upstream body framing, which no longer
/// matches once the body is rewritten.
const FRAMING_HEADERS: &[&str] = &["content-length", "content-encoding", "transfer-encoding", "connection"];

/// HTTP front end for a [`RequestHandler`].
#[derive(Debug)]
pub struct ProxyServer {
    addr: SocketAddr,
    handler: Arc<RequestHandler>,
}

impl ProxyServer {
    /// Creates a server for `handler` listening on the configured bind
    /// address and port.
    pub fn new(handler: RequestHandler) -> Self {
        let config = handler.config();
        let addr = SocketAddr::new(config.bind_addr, config.port);
        Self {
            addr,
            handler: Arc::new(handler),
        }
    }

    /// Creates a server backed by the `reqwest` transport.
    pub fn from_config(config: RamjetConfig) -> Result<Self> {
        let transport = HttpTransport::new()?.with_max_body_size(config.max_body_size);
        let handler = RequestHandler::new(HandlerConfig::new(config, Arc::new(transport)));
        Ok(Self::new(handler))
    }

    /// Sets the listen address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Returns the address the server is configured to listen on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the listener and serves in the background.
    ///
    /// Returns a handle that can be used to stop the server. The handle
    /// reports the bound address, so port `0` may be used.
    pub async fn start(self) -> Result<ProxyHandle> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| WorkerError::Server(format!("failed to bind {}: {}", self.addr, e)))?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let handler = self.handler;

        info!("Starting proxy server on {}", addr);
        info!("Serving {}", handler.config().proxy_base());

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let (stream, peer) = match accepted {
                            Ok(conn) => conn,
                            Err(e) => {
                                warn!("Failed to accept connection: {}", e);
                                continue;
                            }
                        };
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let handler = handler.clone();
                                async move { Ok::<_, Infallible>(serve(&handler, req).await) }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service)
                                .await
                            {
                                debug!("Connection from {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Proxy shutdown signal received");
                        break;
                    }
                }
            }
            info!("Proxy server stopped");
        });

        Ok(ProxyHandle {
            shutdown_tx,
            addr,
            handle,
        })
    }
}

/// Handle for controlling a running proxy server.
pub struct ProxyHandle {
    shutdown_tx: broadcast::Sender<()>,
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl ProxyHandle {
    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waits for the server to finish.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Shuts down the server and waits for it to finish.
    pub async fn stop(self) {
        self.shutdown();
        self.wait().await;
    }
}

async fn serve(handler: &RequestHandler, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let request = match proxy_request(handler.config(), req).await {
        Ok(request) => request,
        Err(e @ WorkerError::PayloadTooLarge { .. }) => {
            warn!("Rejecting request: {}", e);
            return into_response(ProxyResponse::empty(413));
        }
        Err(e) => {
            warn!("Failed to read request: {}", e);
            return into_response(ProxyResponse::empty(400));
        }
    };
    match handler.handle(request).await {
        Some(response) => into_response(response),
        None => into_response(ProxyResponse::empty(404)),
    }
}

/// Converts an incoming request. The URL is rebuilt on the configured origin
/// so routing matches what pages see.
async fn proxy_request(config: &RamjetConfig, req: Request<Incoming>) -> Result<ProxyRequest> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", config.origin.trim_end_matches('/'), path);

    let mut headers = RawHeaders::new();
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => headers.append(name.as_str(), value),
            Err(_) => debug!("Dropping non-text request header {}", name),
        }
    }

    let destination: Destination = headers
        .get("sec-fetch-dest")
        .unwrap_or_default()
        .parse()
        .unwrap_or_default();
    let mode = headers
        .get("sec-fetch-mode")
        .and_then(|m| m.parse().ok())
        .unwrap_or_default();
    let cache = headers
        .get("cache-control")
        .map(CacheMode::from_cache_control)
        .unwrap_or_default();
    let redirect = if mode == RequestMode::Navigate {
        RedirectMode::Manual
    } else {
        RedirectMode::Follow
    };

    let limit = config.max_body_size;
    let body = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                WorkerError::PayloadTooLarge { limit }
            } else {
                WorkerError::Http(e.to_string())
            }
        })?
        .to_bytes();

    Ok(ProxyRequest {
        url,
        method: parts.method.to_string(),
        headers,
        body: (!body.is_empty()).then_some(body),
        mode,
        credentials: Default::default(),
        cache,
        redirect,
        destination,
    })
}

fn into_response(response: ProxyResponse) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(response.body));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in response.headers.iter() {
        if FRAMING_HEADERS.contains(&name) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => debug!("Dropping invalid response header {}", name),
        }
    }
    out
}
