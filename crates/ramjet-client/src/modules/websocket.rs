//! `WebSocket` construction through the socket transport.

use ramjet_core::RawHeaders;
use tracing::debug;

use crate::client::{Client, ExecutionContext};
use crate::host::Value;
use crate::interception::{CallHooks, HookOutcome};

/// Sockets are tunneled only from documents, and only when a transport was
/// supplied.
pub fn enabled(client: &Client) -> bool {
    client.context() == ExecutionContext::Document && client.env().socket().is_some()
}

pub fn disabled(client: &Client) {
    debug!(
        "WebSocket interception disabled in {:?} context",
        client.context()
    );
}

pub fn install(client: &Client) -> usize {
    let env = client.env().clone();
    client.interceptor().register_call(
        "WebSocket",
        CallHooks::new().on_construct(move |ctx| {
            let Some(socket) = env.socket() else {
                return Ok(HookOutcome::Continue);
            };
            let global = env.global()?;
            let url = ctx.arg(0).to_display_string()?;

            let mut headers = RawHeaders::new();
            if let Value::Object(navigator) = global.get("navigator")? {
                headers.insert("User-Agent", navigator.get("userAgent")?.to_display_string()?);
            }
            headers.insert("Origin", env.url()?.origin().ascii_serialization());

            let buffer_proto = match global.get("ArrayBuffer")? {
                Value::Object(ctor) => ctor.get("prototype")?.as_object().cloned(),
                _ => None,
            };

            let created = socket.create_websocket(
                &url,
                &ctx.arg(1),
                &ctx.callee,
                &headers,
                buffer_proto.as_ref(),
            )?;
            Ok(HookOutcome::Return(created))
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::HostResult;
    use crate::host::ObjectRef;
    use crate::test_support::BrowserFixture;
    use crate::transport::SocketTransport;

    #[derive(Default)]
    struct RecordingTransport {
        seen: RefCell<Vec<(String, RawHeaders, bool, bool)>>,
    }

    impl SocketTransport for RecordingTransport {
        fn create_websocket(
            &self,
            url: &str,
            _protocols: &Value,
            native: &ObjectRef,
            headers: &RawHeaders,
            buffer_proto: Option<&ObjectRef>,
        ) -> HostResult<Value> {
            self.seen.borrow_mut().push((
                url.to_string(),
                headers.clone(),
                native.is_constructor(),
                buffer_proto.is_some(),
            ));
            Ok(ObjectRef::new("BareWebSocket").into())
        }
    }

    #[test]
    fn construction_is_delegated_to_transport() {
        let fixture = BrowserFixture::window();
        let transport = Rc::new(RecordingTransport::default());
        let client = fixture.client_with_socket(transport.clone());
        client.hook();

        let socket = fixture
            .global
            .get("WebSocket")
            .unwrap()
            .as_object()
            .unwrap()
            .construct(vec![Value::from("wss://b.test/chat")], None)
            .unwrap();

        assert!(socket.is_instance_of("BareWebSocket"));
        assert!(fixture.calls("WebSocket").is_empty());
        let seen = transport.seen.borrow();
        let (url, headers, native_is_ctor, has_buffer_proto) = &seen[0];
        assert_eq!(url, "wss://b.test/chat");
        assert_eq!(headers.get("origin"), Some("https://example.com"));
        assert_eq!(headers.get("user-agent"), Some("FixtureBrowser/1.0"));
        assert!(*native_is_ctor);
        assert!(*has_buffer_proto);
    }

    #[test]
    fn without_transport_native_socket_is_kept() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        assert!(!client.interceptor().is_registered("WebSocket"));
    }

    #[test]
    fn workers_never_tunnel() {
        let fixture = BrowserFixture::worker();
        let client = fixture.client_with_socket(Rc::new(RecordingTransport::default()));
        assert!(!enabled(&client));
    }
}
