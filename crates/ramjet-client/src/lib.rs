//! Ramjet Client - runtime API interception for proxied pages.
//!
//! A [`Client`] is created once per browsing context. It wraps the context's
//! global object, and [`Client::hook`] installs every interception module
//! that applies to the context (document or worker). From then on, URLs that
//! page code hands to built-in APIs are encoded for the proxy, and URLs the
//! APIs hand back are decoded to the real site.
//!
//! The browsing context is described by the [`host`] object model; embedders
//! bind it to their script engine.
//!
//! ## Usage
//!
//! ```
//! use ramjet_client::host::{ObjectRef, Property, Value};
//! use ramjet_client::{Client, ClientOptions};
//! use ramjet_core::{PrefixCodec, RamjetConfig, UrlCodec};
//!
//! let config = RamjetConfig::new("https://proxy.test");
//! let codec = PrefixCodec::from_config(&config);
//!
//! let global = ObjectRef::new("Window");
//! let location = ObjectRef::new("Location");
//! location.define_property("href", Property::data(codec.encode("https://example.com/")));
//! global.define_property("location", Property::readonly(location));
//!
//! let client = Client::new(global, ClientOptions::new(config));
//! client.hook();
//! assert_eq!(client.url().unwrap().as_str(), "https://example.com/");
//! ```

pub mod client;
pub mod cookie;
pub mod error;
pub mod host;
pub mod identity;
pub mod interception;
pub mod modules;
pub mod path;
pub mod stack;
pub mod transport;
pub mod wrappers;

#[cfg(test)]
mod test_support;

pub use client::{Client, ClientEnv, ClientOptions, ExecutionContext, ListenerRegistry};
pub use cookie::CookieStore;
pub use error::{ErrorKind, HostError, HostResult};
pub use host::{ObjectRef, Property, ProxyTraps, Value};
pub use identity::WeakIdentitySet;
pub use interception::{
    AccessorContext, AccessorHooks, CallContext, CallHooks, HookOutcome, Interceptor, Targets,
};
pub use path::MemberPath;
pub use stack::{FailureOrigin, StackFilter, StackFrame, StackTrace};
pub use transport::SocketTransport;
