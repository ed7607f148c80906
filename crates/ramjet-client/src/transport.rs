//! WebSocket transport boundary.
//!
//! Cross-origin sockets cannot use the page's native `WebSocket` path, so
//! construction is handed to a transport client that tunnels the connection.

use ramjet_core::RawHeaders;

use crate::error::HostResult;
use crate::host::{ObjectRef, Value};

/// Creates tunneled WebSocket objects on behalf of page code.
pub trait SocketTransport {
    /// Creates a socket to `url`.
    ///
    /// `native` is the original `WebSocket` constructor, `headers` carries the
    /// synthesized `User-Agent` and `Origin`, and `buffer_proto` is the
    /// prototype binary frame payloads must use.
    fn create_websocket(
        &self,
        url: &str,
        protocols: &Value,
        native: &ObjectRef,
        headers: &RawHeaders,
        buffer_proto: Option<&ObjectRef>,
    ) -> HostResult<Value>;
}
