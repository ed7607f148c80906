//! Ramjet Core - contracts shared by the interception layer and the network layer.
//!
//! Both halves of the proxy must agree on three things:
//!
//! - where proxied URLs live ([`RamjetConfig::origin`] + [`RamjetConfig::prefix`]),
//! - how a real URL maps to its proxied form and back ([`UrlCodec`]),
//! - how HTML, CSS, script and headers are rewritten ([`ContentRewriter`]).
//!
//! This crate defines those contracts together with default implementations
//! ([`PrefixCodec`], [`StandardRewriter`]) so the workspace runs end to end.
//!
//! ## Usage
//!
//! ```
//! use ramjet_core::{PrefixCodec, UrlCodec};
//!
//! let codec = PrefixCodec::new("https://proxy.test", "/ramjet/");
//! let encoded = codec.encode("https://example.com/");
//! assert!(encoded.starts_with("https://proxy.test/ramjet/"));
//! assert_eq!(codec.decode(&encoded), "https://example.com/");
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod headers;
pub mod rewrite;

pub use codec::{encode_relative, is_passthrough_url, PrefixCodec, UrlCodec};
pub use config::{
    RamjetConfig, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT, DEFAULT_PREFIX, MESSAGE_TYPE_KEY, WRAP_FN,
};
pub use error::{CoreError, Result};
pub use headers::RawHeaders;
pub use rewrite::{ContentRewriter, StandardRewriter};
