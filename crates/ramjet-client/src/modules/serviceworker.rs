//! Service worker registration emulation.
//!
//! Real service workers cannot be registered for proxied origins. A
//! `SharedWorker` running the encoded script stands in for one: its port is
//! handed to the controlling worker and a synthetic registration is returned
//! to the page.

use std::rc::Rc;

use ramjet_core::config::REGISTER_SERVICE_WORKER;
use ramjet_core::MESSAGE_TYPE_KEY;
use tracing::debug;

use crate::client::{Client, ClientEnv};
use crate::error::HostResult;
use crate::host::{ObjectRef, Property, ProxyTraps, Value};
use crate::interception::{CallHooks, HookOutcome};

pub fn install(client: &Client) -> usize {
    let env = client.env().clone();
    client.interceptor().register_call(
        "navigator.serviceWorker.register",
        CallHooks::new().on_invoke(move |ctx| {
            let scope = ctx.arg(0).to_display_string()?;
            let registration = register(&env, &scope, &ctx.arg(1))?;
            Ok(HookOutcome::Return(registration))
        }),
    )
}

fn register(env: &Rc<ClientEnv>, scope: &str, options: &Value) -> HostResult<Value> {
    let global = env.global()?;

    let mut url = format!("{}?dest=serviceworker", env.encode_url(scope));
    if let Some(options) = options.as_object() {
        if options.get("type")?.as_str() == Some("module") {
            url.push_str("&type=module");
        }
    }

    let controller = controller(&global)?
        .ok_or_else(|| env.internal_error("register", "no controlling service worker"))?;
    let Value::Object(shared_worker) = global.get("SharedWorker")? else {
        return Err(env.internal_error("register", "SharedWorker is unavailable"));
    };
    let worker = shared_worker.construct(vec![url.clone().into()], None)?;
    let port = match worker.as_object() {
        Some(worker) => worker.get("port")?,
        None => Value::Undefined,
    };

    let message = ObjectRef::plain();
    message.define_property(MESSAGE_TYPE_KEY, Property::data(REGISTER_SERVICE_WORKER));
    message.define_property("port", Property::data(port.clone()));
    controller.invoke(
        "postMessage",
        vec![message.into(), ObjectRef::array(vec![port.clone()]).into()],
    )?;

    let registration = synthetic_registration(&global, port, scope.into())?;
    env.synthetic().insert(&registration);
    debug!("Emulated service worker registration for {}", url);

    resolved(&global, registration.into())
}

fn controller(global: &ObjectRef) -> HostResult<Option<ObjectRef>> {
    let Value::Object(navigator) = global.get("navigator")? else {
        return Ok(None);
    };
    let Value::Object(container) = navigator.get("serviceWorker")? else {
        return Ok(None);
    };
    Ok(container.get("controller")?.as_object().cloned())
}

/// Builds the object handed to the page in place of a registration.
pub fn synthetic_registration(global: &ObjectRef, port: Value, scope: Value) -> HostResult<ObjectRef> {
    let proto = match global.get("ServiceWorkerRegistration")? {
        Value::Object(ctor) => ctor.get("prototype")?.as_object().cloned(),
        _ => None,
    };
    let backing = ObjectRef::with_proto("ServiceWorkerRegistration", proto);
    let traps = RegistrationTraps {
        port,
        scope,
        add_event_listener: ObjectRef::function("addEventListener", |_, _| Ok(Value::Undefined)),
    };
    Ok(ObjectRef::proxy(backing, Rc::new(traps)))
}

/// Wraps `value` in a resolved promise when the host has one.
fn resolved(global: &ObjectRef, value: Value) -> HostResult<Value> {
    match global.get("Promise")? {
        Value::Object(promise) if promise.get("resolve")?.as_object().is_some_and(ObjectRef::is_callable) => {
            promise.invoke("resolve", vec![value])
        }
        _ => Ok(value),
    }
}

struct RegistrationTraps {
    port: Value,
    scope: Value,
    add_event_listener: ObjectRef,
}

impl ProxyTraps for RegistrationTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        match key {
            "installing" | "waiting" => Ok(Value::Null),
            "active" => Ok(self.port.clone()),
            "scope" => Ok(self.scope.clone()),
            "addEventListener" => Ok(self.add_event_listener.clone().into()),
            _ => target.get(key),
        }
    }
}
