//! Emulated browser globals for tests.
//!
//! Every native function records its arguments in a shared call log so tests
//! can check what the real API would have received after interception.

use std::cell::RefCell;
use std::rc::Rc;

use ramjet_core::{PrefixCodec, RamjetConfig, UrlCodec};

use crate::client::{Client, ClientOptions};
use crate::host::{ObjectRef, Property, Value, WeakObject};
use crate::transport::SocketTransport;

pub const PROXY_ORIGIN: &str = "https://proxy.test";
pub const PAGE_URL: &str = "https://example.com/app/index.html?tab=1";

type CallLog = Rc<RefCell<Vec<(String, Vec<Value>)>>>;
type ListenerList = Rc<RefCell<Vec<(String, ObjectRef)>>>;

pub struct BrowserFixture {
    pub global: ObjectRef,
    pub document: ObjectRef,
    pub location: ObjectRef,
    log: CallLog,
    listeners: ListenerList,
    ports: Rc<RefCell<Vec<ObjectRef>>>,
    service_worker: Option<ObjectRef>,
    event_target_proto: ObjectRef,
    worklet_proto: Option<ObjectRef>,
}

pub fn config() -> RamjetConfig {
    RamjetConfig::new(PROXY_ORIGIN)
}

fn record(log: &CallLog, name: &str, args: &[Value]) {
    log.borrow_mut().push((name.to_string(), args.to_vec()));
}

fn recording_fn(log: &CallLog, name: &'static str, result: Value) -> ObjectRef {
    let log = log.clone();
    ObjectRef::function(name, move |_, args| {
        record(&log, name, &args);
        Ok(result.clone())
    })
}

fn recording_ctor<F>(log: &CallLog, name: &'static str, init: F) -> ObjectRef
where
    F: Fn(&ObjectRef, &[Value]) + 'static,
{
    let log = log.clone();
    ObjectRef::constructor(name, move |args, new_target| {
        record(&log, name, &args);
        let instance = ObjectRef::instance_for(new_target, name)?;
        init(&instance, &args);
        Ok(instance.into())
    })
}

fn proto_of(ctor: &ObjectRef) -> ObjectRef {
    ctor.get("prototype").unwrap().as_object().cloned().unwrap()
}

fn define(obj: &ObjectRef, key: &str, value: impl Into<Value>) {
    obj.define_property(key, Property::hidden(value));
}

fn this_object(this: &Value) -> ObjectRef {
    this.as_object().cloned().unwrap_or_else(ObjectRef::plain)
}

/// Getter returning the receiver's `_url`.
fn url_getter() -> ObjectRef {
    ObjectRef::function("get url", |this, _| this_object(this).get("_url"))
}

fn store_url(instance: &ObjectRef, args: &[Value]) {
    instance.define_property("_url", Property::data(args.first().cloned().unwrap_or_default()));
}

impl BrowserFixture {
    /// A window global with a document.
    pub fn window() -> Self {
        let mut fixture = Self::base("Window");
        let global = fixture.global.clone();
        let log = fixture.log.clone();

        // Window.prototype -> EventTarget.prototype
        let window_ctor = ObjectRef::constructor("Window", |_, _| Ok(Value::Undefined));
        let window_proto = proto_of(&window_ctor);
        window_proto.set_proto(Some(fixture.event_target_proto.clone()));
        global.set_proto(Some(window_proto));
        define(&global, "Window", window_ctor);

        // document
        let document_ctor = ObjectRef::constructor("Document", |_, _| Ok(Value::Undefined));
        let document_proto = proto_of(&document_ctor);
        let location = fixture.location.downgrade();
        let href_getter = move |name: &str| {
            let location = location.clone();
            ObjectRef::function(name, move |_, _| match location.upgrade() {
                Some(location) => location.get("href"),
                None => Ok(Value::Undefined),
            })
        };
        document_proto.define_property("URL", Property::accessor(Some(href_getter("get URL")), None));
        document_proto.define_property(
            "documentURI",
            Property::accessor(Some(href_getter("get documentURI")), None),
        );
        document_proto.define_property(
            "domain",
            Property::accessor(
                Some(ObjectRef::function("get domain", |_, _| Ok(Value::from("proxy.test")))),
                None,
            ),
        );
        document_proto.define_property(
            "cookie",
            Property::accessor(
                Some(ObjectRef::function("get cookie", |_, _| Ok(Value::from("")))),
                Some(recording_fn(&log, "document.cookie", Value::Undefined)),
            ),
        );
        define(&global, "Document", document_ctor);
        let document = ObjectRef::with_proto("HTMLDocument", Some(document_proto));
        document.define_property("title", Property::data("Fixture"));
        global.define_property("document", Property::readonly(document.clone()));
        fixture.document = document;

        // navigator.serviceWorker
        let navigator = global.get("navigator").unwrap().as_object().cloned().unwrap();
        let container_proto = ObjectRef::plain();
        define(
            &container_proto,
            "register",
            recording_fn(&log, "serviceWorker.register", Value::from("native-registration")),
        );
        let container = ObjectRef::with_proto("ServiceWorkerContainer", Some(container_proto));
        let controller = ObjectRef::new("ServiceWorker");
        define(
            &controller,
            "postMessage",
            recording_fn(&log, "controller.postMessage", Value::Undefined),
        );
        container.define_property("controller", Property::data(controller));
        navigator.define_property("serviceWorker", Property::readonly(container.clone()));
        fixture.service_worker = Some(container);

        // SharedWorker
        let ports = fixture.ports.clone();
        define(
            &global,
            "SharedWorker",
            recording_ctor(&log, "SharedWorker", move |instance, _| {
                let port = ObjectRef::new("MessagePort");
                ports.borrow_mut().push(port.clone());
                instance.define_property("port", Property::readonly(port));
            }),
        );

        // ServiceWorkerRegistration
        let registration_ctor = ObjectRef::constructor("ServiceWorkerRegistration", |_, _| {
            Err(crate::error::HostError::type_error("Illegal constructor"))
        });
        let registration_proto = proto_of(&registration_ctor);
        registration_proto.set_proto(Some(fixture.event_target_proto.clone()));
        define(
            &registration_proto,
            "update",
            recording_fn(&log, "registration.update", Value::Undefined),
        );
        define(&global, "ServiceWorkerRegistration", registration_ctor);

        // Promise.resolve
        let promise = ObjectRef::new("Function");
        define(
            &promise,
            "resolve",
            ObjectRef::function("resolve", |_, args| {
                let promise = ObjectRef::new("Promise");
                promise.define_property("value", Property::data(args.into_iter().next().unwrap_or_default()));
                Ok(promise.into())
            }),
        );
        define(&global, "Promise", promise);

        // Worklet
        let worklet_ctor = ObjectRef::constructor("Worklet", |_, _| Ok(Value::Undefined));
        let worklet_proto = proto_of(&worklet_ctor);
        define(
            &worklet_proto,
            "addModule",
            recording_fn(&log, "Worklet.addModule", Value::Undefined),
        );
        define(&global, "Worklet", worklet_ctor);
        fixture.worklet_proto = Some(worklet_proto);

        // FontFace
        define(&global, "FontFace", recording_ctor(&log, "FontFace", |_, _| {}));

        fixture
    }

    /// A dedicated worker global.
    pub fn worker() -> Self {
        let fixture = Self::base("DedicatedWorkerGlobalScope");
        let scope_ctor = ObjectRef::constructor("WorkerGlobalScope", |_, _| Ok(Value::Undefined));
        let scope_proto = proto_of(&scope_ctor);
        scope_proto.set_proto(Some(fixture.event_target_proto.clone()));
        fixture.global.set_proto(Some(scope_proto));
        define(&fixture.global, "WorkerGlobalScope", scope_ctor);
        fixture
    }

    /// Members shared by windows and workers.
    fn base(class: &str) -> Self {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let listeners: ListenerList = Rc::new(RefCell::new(Vec::new()));
        let global = ObjectRef::new(class);
        let codec = PrefixCodec::from_config(&config());

        for key in ["window", "self", "globalThis"] {
            global.define_property(key, Property::readonly(global.clone()));
        }

        // location
        let location = ObjectRef::new("Location");
        location.define_property("href", Property::data(codec.encode(PAGE_URL)));
        for (key, name) in [("assign", "location.assign"), ("replace", "location.replace")] {
            let log = log.clone();
            define(
                &location,
                key,
                ObjectRef::function(name, move |this, args| {
                    record(&log, name, &args);
                    this_object(this).set("href", args.into_iter().next().unwrap_or_default())?;
                    Ok(Value::Undefined)
                }),
            );
        }
        global.define_property("location", Property::readonly(location.clone()));

        // navigator
        let navigator = ObjectRef::new("Navigator");
        navigator.define_property("userAgent", Property::readonly("FixtureBrowser/1.0"));
        global.define_property("navigator", Property::readonly(navigator));

        // EventTarget
        let event_target = ObjectRef::constructor("EventTarget", |_, new_target| {
            Ok(ObjectRef::instance_for(new_target, "EventTarget")?.into())
        });
        let event_target_proto = proto_of(&event_target);
        let weak_global = global.downgrade();
        define(
            &event_target_proto,
            "addEventListener",
            listener_fn(&log, &listeners, &weak_global, true),
        );
        define(
            &event_target_proto,
            "removeEventListener",
            listener_fn(&log, &listeners, &weak_global, false),
        );
        define(&global, "EventTarget", event_target);

        // fetch and friends
        define(&global, "fetch", recording_fn(&log, "fetch", Value::from("response")));
        define(
            &global,
            "Headers",
            recording_ctor(&log, "Headers", |instance, args| {
                if let Some(init) = args.first() {
                    instance.define_property("init", Property::data(init.clone()));
                }
            }),
        );
        let request = recording_ctor(&log, "Request", store_url);
        proto_of(&request).define_property("url", Property::accessor(Some(url_getter()), None));
        define(&global, "Request", request);

        let response = recording_ctor(&log, "Response", store_url);
        let response_proto = proto_of(&response);
        response_proto.define_property("url", Property::accessor(Some(url_getter()), None));
        let redirect_log = log.clone();
        define(
            &response,
            "redirect",
            ObjectRef::function("redirect", move |_, args| {
                record(&redirect_log, "Response.redirect", &args);
                let instance = ObjectRef::with_proto("Response", Some(response_proto.clone()));
                store_url(&instance, &args);
                Ok(instance.into())
            }),
        );
        define(&global, "Response", response);

        define(&global, "WebSocket", recording_ctor(&log, "WebSocket", |_, _| {}));
        define(&global, "ArrayBuffer", recording_ctor(&log, "ArrayBuffer", |_, _| {}));

        Self {
            global,
            document: ObjectRef::new("Detached"),
            location,
            log,
            listeners,
            ports: Rc::new(RefCell::new(Vec::new())),
            service_worker: None,
            event_target_proto,
            worklet_proto: None,
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.global.clone(), ClientOptions::new(config()))
    }

    pub fn client_with_socket(&self, socket: Rc<dyn SocketTransport>) -> Client {
        Client::new(
            self.global.clone(),
            ClientOptions::new(config()).with_socket_transport(socket),
        )
    }

    /// Arguments of every recorded call to `name`, in order.
    pub fn calls(&self, name: &str) -> Vec<Vec<Value>> {
        self.log
            .borrow()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// The native (proxied) `location.href`.
    pub fn location_href(&self) -> String {
        self.location.get("href").unwrap().to_display_string().unwrap()
    }

    /// Invokes every global listener for `event`.
    pub fn dispatch(&self, event: &str, payload: Value) {
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in listeners {
            callback
                .call(&self.global.clone().into(), vec![payload.clone()])
                .unwrap();
        }
    }

    /// Number of global listeners for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    pub fn event_target(&self) -> ObjectRef {
        ObjectRef::with_proto("EventTarget", Some(self.event_target_proto.clone()))
    }

    pub fn worklet(&self) -> ObjectRef {
        ObjectRef::with_proto("Worklet", self.worklet_proto.clone())
    }

    pub fn last_port(&self) -> Option<ObjectRef> {
        self.ports.borrow().last().cloned()
    }

    pub fn remove_controller(&self) {
        if let Some(container) = &self.service_worker {
            container.set("controller", Value::Null).unwrap();
        }
    }

    /// A `URL` instance whose `toString` yields `href`.
    pub fn url_object(&self, href: &str) -> ObjectRef {
        let url = ObjectRef::new("URL");
        url.define_property("href", Property::data(href));
        define(
            &url,
            "toString",
            ObjectRef::function("toString", |this, _| this_object(this).get("href")),
        );
        url
    }
}

fn listener_fn(log: &CallLog, listeners: &ListenerList, global: &WeakObject, add: bool) -> ObjectRef {
    let log = log.clone();
    let listeners = listeners.clone();
    let global = global.clone();
    let name = if add { "addEventListener" } else { "removeEventListener" };
    ObjectRef::function(name, move |this, args| {
        record(&log, name, &args);
        let on_global = match (this.as_object(), global.upgrade()) {
            (Some(receiver), Some(global)) => receiver.ptr_eq(&global),
            _ => false,
        };
        if !on_global {
            return Ok(Value::Undefined);
        }
        let event = args.first().cloned().unwrap_or_default().to_display_string()?;
        let Some(Value::Object(callback)) = args.get(1).cloned() else {
            return Ok(Value::Undefined);
        };
        let mut listeners = listeners.borrow_mut();
        if add {
            listeners.push((event, callback));
        } else {
            listeners.retain(|(e, cb)| !(e == &event && cb.ptr_eq(&callback)));
        }
        Ok(Value::Undefined)
    })
}
