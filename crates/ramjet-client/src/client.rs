//! Client façade.
//!
//! One [`Client`] exists per browsing context (main document or worker). It
//! owns the context's interception registry, the document/location/global
//! wrappers, the cookie store and the listener substitutions, and activates
//! every applicable interception module exactly once.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ramjet_core::{encode_relative, ContentRewriter, PrefixCodec, RamjetConfig, RawHeaders, StandardRewriter, UrlCodec};
use tracing::{debug, info};
use url::Url;

use crate::cookie::CookieStore;
use crate::error::{HostError, HostResult};
use crate::host::{ObjectRef, Property, Value, WeakObject};
use crate::identity::WeakIdentitySet;
use crate::interception::Interceptor;
use crate::modules;
use crate::stack::StackFilter;
use crate::transport::SocketTransport;
use crate::wrappers;

/// Kind of browsing context a client runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A window with a document.
    Document,
    /// A dedicated, shared or service worker.
    Worker,
}

impl ExecutionContext {
    /// Detects the context from its global object.
    pub fn detect(global: &ObjectRef) -> Self {
        if global.has("WorkerGlobalScope") && !global.has("document") {
            Self::Worker
        } else {
            Self::Document
        }
    }
}

/// Construction options for a [`Client`].
#[derive(Clone)]
pub struct ClientOptions {
    config: RamjetConfig,
    codec: Option<Arc<dyn UrlCodec>>,
    rewriter: Option<Arc<dyn ContentRewriter>>,
    socket: Option<Rc<dyn SocketTransport>>,
}

impl ClientOptions {
    /// Creates options for the given deployment.
    pub fn new(config: RamjetConfig) -> Self {
        Self {
            config,
            codec: None,
            rewriter: None,
            socket: None,
        }
    }

    /// Replaces the default [`PrefixCodec`].
    pub fn with_codec(mut self, codec: Arc<dyn UrlCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replaces the default [`StandardRewriter`].
    pub fn with_rewriter(mut self, rewriter: Arc<dyn ContentRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Sets the transport used to tunnel WebSockets.
    pub fn with_socket_transport(mut self, socket: Rc<dyn SocketTransport>) -> Self {
        self.socket = Some(socket);
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("config", &self.config)
            .field("custom_codec", &self.codec.is_some())
            .field("custom_rewriter", &self.rewriter.is_some())
            .field("socket_transport", &self.socket.is_some())
            .finish()
    }
}

/// One event listener substitution.
#[derive(Debug, Clone)]
pub struct ListenerEntry {
    pub event: String,
    pub original: ObjectRef,
    pub wrapped: ObjectRef,
}

#[derive(Debug)]
struct ReceiverListeners {
    receiver: WeakObject,
    entries: Vec<ListenerEntry>,
}

impl ReceiverListeners {
    fn is(&self, receiver: &ObjectRef) -> bool {
        self.receiver
            .upgrade()
            .is_some_and(|live| live.ptr_eq(receiver))
    }
}

/// Maps original listener callbacks to the wrapped callbacks actually
/// registered, per receiver.
///
/// Receivers are held weakly; entries for dropped receivers are pruned on
/// record and never matched.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    receivers: RefCell<Vec<ReceiverListeners>>,
}

impl ListenerRegistry {
    /// Records that `original` was registered as `wrapped` on `receiver`.
    pub fn record(&self, receiver: &ObjectRef, event: &str, original: &ObjectRef, wrapped: &ObjectRef) {
        let mut receivers = self.receivers.borrow_mut();
        receivers.retain(|r| r.receiver.upgrade().is_some());
        let entry = ListenerEntry {
            event: event.to_string(),
            original: original.clone(),
            wrapped: wrapped.clone(),
        };
        match receivers.iter_mut().find(|r| r.is(receiver)) {
            Some(listeners) => listeners.entries.push(entry),
            None => receivers.push(ReceiverListeners {
                receiver: receiver.downgrade(),
                entries: vec![entry],
            }),
        }
    }

    /// Returns the wrapped callback for `original`, if any.
    pub fn find(&self, receiver: &ObjectRef, event: &str, original: &ObjectRef) -> Option<ObjectRef> {
        self.receivers
            .borrow()
            .iter()
            .find(|r| r.is(receiver))
            .and_then(|r| {
                r.entries
                    .iter()
                    .find(|e| e.event == event && e.original.ptr_eq(original))
                    .map(|e| e.wrapped.clone())
            })
    }

    /// Removes and returns the wrapped callback for `original`.
    pub fn take(&self, receiver: &ObjectRef, event: &str, original: &ObjectRef) -> Option<ObjectRef> {
        let mut receivers = self.receivers.borrow_mut();
        let slot = receivers.iter().position(|r| r.is(receiver))?;
        let list = &mut receivers[slot].entries;
        let index = list
            .iter()
            .position(|e| e.event == event && e.original.ptr_eq(original))?;
        let entry = list.remove(index);
        if list.is_empty() {
            receivers.remove(slot);
        }
        Some(entry.wrapped)
    }

    /// Total number of substitutions on live receivers.
    pub fn len(&self) -> usize {
        self.receivers
            .borrow()
            .iter()
            .filter(|r| r.receiver.upgrade().is_some())
            .map(|r| r.entries.len())
            .sum()
    }

    /// Returns true if there are no substitutions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct WrapperSlots {
    document: Option<WeakObject>,
    location: Option<WeakObject>,
    global: Option<WeakObject>,
}

/// State shared between the façade and the hooks it installs.
///
/// Hooks hold this through an `Rc`; it only refers back to the global and
/// the wrappers weakly.
pub struct ClientEnv {
    global: WeakObject,
    config: RamjetConfig,
    codec: Arc<dyn UrlCodec>,
    rewriter: Arc<dyn ContentRewriter>,
    filter: StackFilter,
    context: ExecutionContext,
    socket: Option<Rc<dyn SocketTransport>>,
    cookies: RefCell<CookieStore>,
    synthetic: WeakIdentitySet,
    listeners: ListenerRegistry,
    wrappers: RefCell<WrapperSlots>,
}

impl ClientEnv {
    /// Returns the context's global object.
    pub fn global(&self) -> HostResult<ObjectRef> {
        self.global
            .upgrade()
            .ok_or_else(|| self.internal_error("global", "global object is gone"))
    }

    pub fn config(&self) -> &RamjetConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn UrlCodec {
        self.codec.as_ref()
    }

    pub fn rewriter(&self) -> &dyn ContentRewriter {
        self.rewriter.as_ref()
    }

    pub fn filter(&self) -> &StackFilter {
        &self.filter
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn socket(&self) -> Option<&Rc<dyn SocketTransport>> {
        self.socket.as_ref()
    }

    pub fn cookies(&self) -> &RefCell<CookieStore> {
        &self.cookies
    }

    /// Synthetic objects whose listener calls are suppressed.
    pub fn synthetic(&self) -> &WeakIdentitySet {
        &self.synthetic
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Builds an error attributed to the interception layer's own script.
    pub fn internal_error(&self, function: &str, message: impl Into<String>) -> HostError {
        HostError::error(message).with_frame(self.filter.internal_frame(function))
    }

    /// Returns the native `location` object of the global.
    pub fn native_location(&self) -> HostResult<ObjectRef> {
        match self.global()?.get("location")? {
            Value::Object(location) => Ok(location),
            _ => Err(self.internal_error("location", "global has no location")),
        }
    }

    /// Returns the real URL of the current page.
    pub fn url(&self) -> HostResult<Url> {
        let href = self.native_location()?.get("href")?.to_display_string()?;
        let decoded = self.codec.decode(&href);
        Url::parse(&decoded)
            .map_err(|e| self.internal_error("url", format!("cannot parse page URL '{}': {}", decoded, e)))
    }

    /// Encodes `raw`, resolving it against the current real URL.
    pub fn encode_url(&self, raw: &str) -> String {
        let base = self.url().ok();
        encode_relative(self.codec(), raw, base.as_ref())
    }

    /// Decodes a proxied URL.
    pub fn decode_url(&self, raw: &str) -> String {
        self.codec.decode(raw)
    }

    /// Navigates the context to `raw` through the proxy.
    pub fn navigate(&self, raw: &str) -> HostResult<()> {
        let encoded = self.encode_url(raw);
        debug!("Navigating to {}", encoded);
        self.native_location()?.set("href", encoded.into())
    }

    /// Rewrites CSS text against the current real URL.
    pub fn rewrite_css(&self, css: &str) -> HostResult<String> {
        Ok(self.rewriter.rewrite_css(css, &self.url()?))
    }

    /// Rewrites a `Headers` init value (a record or a list of pairs).
    ///
    /// Values of any other shape are returned unchanged.
    pub fn rewrite_header_init(&self, init: &Value) -> HostResult<Value> {
        let Some(object) = init.as_object() else {
            return Ok(init.clone());
        };
        let mut headers = RawHeaders::new();
        match object.class().as_str() {
            "Array" => {
                for pair in object.array_items()? {
                    let Some(pair) = pair.as_object() else {
                        return Err(HostError::type_error("Headers init pair must be a sequence"));
                    };
                    let items = pair.array_items()?;
                    let [name, value] = items.as_slice() else {
                        return Err(HostError::type_error("Headers init pair must have two items"));
                    };
                    headers.append(&name.to_display_string()?, &value.to_display_string()?);
                }
            }
            "Object" => {
                for key in object.own_keys() {
                    let enumerable = object.get_own_property(&key).is_some_and(|p| p.enumerable);
                    if enumerable {
                        headers.append(&key, &object.get(&key)?.to_display_string()?);
                    }
                }
            }
            _ => return Ok(init.clone()),
        }

        let rewritten = self.rewriter.rewrite_headers(&headers, &self.url()?);
        let record = ObjectRef::plain();
        for (name, value) in rewritten.iter() {
            record.define_property(name, Property::data(value));
        }
        Ok(record.into())
    }

    pub fn document_wrapper(&self) -> Option<ObjectRef> {
        self.wrappers.borrow().document.as_ref().and_then(WeakObject::upgrade)
    }

    pub fn location_wrapper(&self) -> Option<ObjectRef> {
        self.wrappers.borrow().location.as_ref().and_then(WeakObject::upgrade)
    }

    pub fn global_wrapper(&self) -> Option<ObjectRef> {
        self.wrappers.borrow().global.as_ref().and_then(WeakObject::upgrade)
    }

    /// Exchanges native document/location/global references for wrappers.
    pub fn wrap(&self, value: Value) -> Value {
        let Some(object) = value.as_object() else {
            return value;
        };
        let Ok(global) = self.global() else {
            return value;
        };
        let wrapper = if object.ptr_eq(&global) {
            self.global_wrapper()
        } else if is_member(&global, "document", object) {
            self.document_wrapper()
        } else if is_member(&global, "location", object) {
            self.location_wrapper()
        } else {
            None
        };
        wrapper.map(Value::from).unwrap_or(value)
    }
}

fn is_member(global: &ObjectRef, key: &str, object: &ObjectRef) -> bool {
    matches!(global.get(key), Ok(Value::Object(member)) if member.ptr_eq(object))
}

impl fmt::Debug for ClientEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEnv")
            .field("global", &self.global)
            .field("config", &self.config)
            .field("context", &self.context)
            .field("socket_transport", &self.socket.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The per-context interception façade.
pub struct Client {
    env: Rc<ClientEnv>,
    interceptor: Interceptor,
    document_wrapper: Option<ObjectRef>,
    location_wrapper: Option<ObjectRef>,
    global_wrapper: ObjectRef,
    hooked: Cell<bool>,
}

impl Client {
    /// Creates the façade for `global` and builds its wrappers.
    ///
    /// Nothing is intercepted until [`Client::hook`] runs.
    pub fn new(global: ObjectRef, options: ClientOptions) -> Self {
        let ClientOptions {
            config,
            codec,
            rewriter,
            socket,
        } = options;
        let codec = codec.unwrap_or_else(|| Arc::new(PrefixCodec::from_config(&config)));
        let rewriter = rewriter.unwrap_or_else(|| Arc::new(StandardRewriter::new(codec.clone())));
        let filter = StackFilter::new(config.internal_base());
        let context = ExecutionContext::detect(&global);

        let env = Rc::new(ClientEnv {
            global: global.downgrade(),
            config,
            codec,
            rewriter,
            filter: filter.clone(),
            context,
            socket,
            cookies: RefCell::new(CookieStore::new()),
            synthetic: WeakIdentitySet::new(),
            listeners: ListenerRegistry::default(),
            wrappers: RefCell::new(WrapperSlots::default()),
        });

        let document_wrapper = match (context, global.get("document")) {
            (ExecutionContext::Document, Ok(Value::Object(document))) => {
                Some(wrappers::document_wrapper(&env, document))
            }
            _ => None,
        };
        let location_wrapper = match global.get("location") {
            Ok(Value::Object(location)) => Some(wrappers::location_wrapper(&env, location)),
            _ => None,
        };
        let global_wrapper = wrappers::global_wrapper(&env, global.clone());

        *env.wrappers.borrow_mut() = WrapperSlots {
            document: document_wrapper.as_ref().map(ObjectRef::downgrade),
            location: location_wrapper.as_ref().map(ObjectRef::downgrade),
            global: Some(global_wrapper.downgrade()),
        };

        debug!("Created client for {:?} context", context);
        Self {
            env,
            interceptor: Interceptor::new(global, filter),
            document_wrapper,
            location_wrapper,
            global_wrapper,
            hooked: Cell::new(false),
        }
    }

    /// Shared state handed to hooks.
    pub fn env(&self) -> &Rc<ClientEnv> {
        &self.env
    }

    /// The context's interception registry.
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// The context's global object.
    pub fn global(&self) -> &ObjectRef {
        self.interceptor.root()
    }

    /// The detected execution context.
    pub fn context(&self) -> ExecutionContext {
        self.env.context
    }

    /// Installs every module that applies to this context, in order.
    ///
    /// Returns how many modules were installed. Subsequent calls do nothing.
    pub fn hook(&self) -> usize {
        if self.hooked.replace(true) {
            debug!("Client already hooked");
            return 0;
        }
        let mut installed = 0;
        for module in modules::modules_for(self.context()) {
            let enabled = module.enabled.map_or(true, |enabled| enabled(self));
            if enabled {
                let registrations = (module.install)(self);
                debug!(module = module.name, registrations, "Installed interception module");
                installed += 1;
            } else if let Some(disabled) = module.disabled {
                disabled(self);
            }
        }
        info!(
            "Interception active: {} modules in {:?} context",
            installed,
            self.context()
        );
        installed
    }

    /// Returns true once [`Client::hook`] has run.
    pub fn is_hooked(&self) -> bool {
        self.hooked.get()
    }

    /// The real URL of the current page.
    pub fn url(&self) -> HostResult<Url> {
        self.env.url()
    }

    /// Navigates to `raw` through the proxy.
    pub fn set_url(&self, raw: &str) -> HostResult<()> {
        self.env.navigate(raw)
    }

    pub fn encode_url(&self, raw: &str) -> String {
        self.env.encode_url(raw)
    }

    pub fn decode_url(&self, raw: &str) -> String {
        self.env.decode_url(raw)
    }

    /// Exchanges native document/location/global references for wrappers.
    pub fn wrap(&self, value: Value) -> Value {
        self.env.wrap(value)
    }

    pub fn document_wrapper(&self) -> Option<&ObjectRef> {
        self.document_wrapper.as_ref()
    }

    pub fn location_wrapper(&self) -> Option<&ObjectRef> {
        self.location_wrapper.as_ref()
    }

    pub fn global_wrapper(&self) -> &ObjectRef {
        &self.global_wrapper
    }

    /// Loads a serialized cookie list for the current page.
    pub fn load_cookies(&self, serialized: &str) -> HostResult<()> {
        let url = self.url()?;
        self.env.cookies.borrow_mut().load(serialized, &url);
        Ok(())
    }

    pub fn cookies(&self) -> Ref<'_, CookieStore> {
        self.env.cookies.borrow()
    }

    /// Returns true if `object` is a synthetic registration.
    pub fn is_synthetic(&self, object: &ObjectRef) -> bool {
        self.env.synthetic.contains(object)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("env", &self.env)
            .field("interceptor", &self.interceptor)
            .field("hooked", &self.hooked.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BrowserFixture, PAGE_URL};

    #[test]
    fn detects_execution_context() {
        let window = BrowserFixture::window();
        assert_eq!(ExecutionContext::detect(&window.global), ExecutionContext::Document);
        let worker = BrowserFixture::worker();
        assert_eq!(ExecutionContext::detect(&worker.global), ExecutionContext::Worker);
    }

    #[test]
    fn url_decodes_native_location() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        assert_eq!(client.url().unwrap().as_str(), PAGE_URL);
    }

    #[test]
    fn set_url_navigates_to_encoded_target() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.set_url("/other?x=1").unwrap();
        let href = fixture.location_href();
        assert_eq!(client.decode_url(&href), "https://example.com/other?x=1");
    }

    #[test]
    fn encode_resolves_relative_against_real_url() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        let encoded = client.encode_url("img/logo.png");
        assert!(encoded.starts_with("https://proxy.test/ramjet/"));
        assert_eq!(client.decode_url(&encoded), "https://example.com/app/img/logo.png");
    }

    #[test]
    fn hook_runs_once() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        assert!(client.hook() > 0);
        assert!(client.is_hooked());
        assert_eq!(client.hook(), 0);
    }

    #[test]
    fn worker_context_skips_document_modules() {
        let fixture = BrowserFixture::worker();
        let client = fixture.client();
        client.hook();
        assert!(client.document_wrapper().is_none());
        assert!(client.interceptor().is_registered("fetch"));
        assert!(!client.interceptor().is_registered("FontFace"));
        assert!(!client.interceptor().is_registered("navigator.serviceWorker.register"));
    }

    #[test]
    fn wrap_exchanges_native_references() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        let wrapped_doc = client.wrap(fixture.document.clone().into());
        assert_eq!(wrapped_doc, Value::from(client.document_wrapper().cloned().unwrap()));
        let wrapped_global = client.wrap(fixture.global.clone().into());
        assert_eq!(wrapped_global, Value::from(client.global_wrapper().clone()));
        let wrapped_location = client.wrap(fixture.location.clone().into());
        assert_eq!(wrapped_location, Value::from(client.location_wrapper().cloned().unwrap()));
        assert_eq!(client.wrap(Value::from("x")), Value::from("x"));
    }

    #[test]
    fn load_cookies_scopes_to_real_site() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.load_cookies("session=1; theme=dark").unwrap();
        let url = Url::parse(PAGE_URL).unwrap();
        assert_eq!(client.cookies().document_cookie(&url), "session=1; theme=dark");
    }

    #[test]
    fn header_init_record_is_rewritten() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        let init = ObjectRef::plain();
        init.define_property("Location", Property::data("/next"));
        init.define_property("X-Custom", Property::data("kept"));
        let rewritten = client.env().rewrite_header_init(&init.into()).unwrap();
        let rewritten = rewritten.as_object().unwrap();
        let location = rewritten.get("location").unwrap().to_display_string().unwrap();
        assert_eq!(client.decode_url(&location), "https://example.com/next");
        assert_eq!(rewritten.get("x-custom").unwrap(), Value::from("kept"));
    }

    #[test]
    fn header_init_pairs_are_folded() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        let pairs = ObjectRef::array(vec![
            ObjectRef::array(vec![Value::from("Accept"), Value::from("a")]).into(),
            ObjectRef::array(vec![Value::from("accept"), Value::from("b")]).into(),
        ]);
        let rewritten = client.env().rewrite_header_init(&pairs.into()).unwrap();
        assert_eq!(
            rewritten.as_object().unwrap().get("accept").unwrap(),
            Value::from("a, b")
        );
    }

    #[test]
    fn listener_registry_round_trip() {
        let registry = ListenerRegistry::default();
        let receiver = ObjectRef::plain();
        let original = ObjectRef::function("cb", |_, _| Ok(Value::Undefined));
        let wrapped = ObjectRef::function("wrapped", |_, _| Ok(Value::Undefined));
        registry.record(&receiver, "message", &original, &wrapped);
        assert_eq!(registry.find(&receiver, "message", &original), Some(wrapped.clone()));
        assert_eq!(registry.find(&receiver, "error", &original), None);
        assert_eq!(registry.take(&receiver, "message", &original), Some(wrapped));
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_registry_forgets_dropped_receivers() {
        let registry = ListenerRegistry::default();
        let original = ObjectRef::function("cb", |_, _| Ok(Value::Undefined));
        let wrapped = ObjectRef::function("wrapped", |_, _| Ok(Value::Undefined));
        let receiver = ObjectRef::plain();
        registry.record(&receiver, "message", &original, &wrapped);
        drop(receiver);
        assert!(registry.is_empty());

        let next = ObjectRef::plain();
        assert_eq!(registry.find(&next, "message", &original), None);
        registry.record(&next, "error", &original, &wrapped);
        assert_eq!(registry.receivers.borrow().len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
