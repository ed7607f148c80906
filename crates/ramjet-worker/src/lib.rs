//! Ramjet Worker - network request handler for the Ramjet web proxy.
//!
//! Every request a proxied page makes lands here. The handler decides
//! whether the request belongs to the proxy, decodes the real target, fetches
//! it through a [`Transport`], and rewrites the response according to the
//! request's destination.
//!
//! ## Architecture
//!
//! ```text
//! Request → route? ──No──→ None (404 at the HTTP boundary)
//!             │
//!            Yes
//!             │
//!        url= param? ──Yes──→ 302 to encoded URL
//!             │
//!             No
//!             ▼
//!       decode target → Transport::fetch
//!             │
//!   ┌─────────┴──────────┐
//!   │ Ok                 │ Err
//!   ▼                    ▼
//! rewrite headers     document/iframe → error page (500)
//! rewrite body by     anything else   → empty 500
//! destination
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use ramjet_core::RamjetConfig;
//! use ramjet_worker::ProxyServer;
//!
//! # async fn run() -> ramjet_worker::Result<()> {
//! let config = RamjetConfig::new("http://127.0.0.1:8770").validate()?;
//! let handle = ProxyServer::from_config(config)?.start().await?;
//! println!("listening on {}", handle.addr());
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

mod disposition;
mod error;
mod error_page;
mod handler;
mod request;
mod server;
mod transport;

pub use disposition::normalize as normalize_disposition;
pub use error::{Result, TransportError, WorkerError};
pub use error_page::render as render_error_page;
pub use handler::{HandlerConfig, RequestHandler, URL_PARAM};
pub use request::{
    CacheMode, Credentials, Destination, ProxyRequest, ProxyResponse, RedirectMode, RequestMode,
};
pub use server::{ProxyHandle, ProxyServer};
pub use transport::{FetchInit, HttpTransport, Transport, TransportResponse};
