//! Event listener registration.
//!
//! Listener calls on synthetic registrations are swallowed. `message`
//! listeners on the global see the real page origin instead of the proxy
//! origin.

use std::rc::{Rc, Weak};

use crate::client::{Client, ClientEnv};
use crate::error::HostResult;
use crate::host::{ObjectRef, ProxyTraps, Value};
use crate::interception::{CallContext, CallHooks, HookOutcome};

pub fn install(client: &Client) -> usize {
    let interceptor = client.interceptor();

    let env = client.env().clone();
    let add = interceptor.register_call(
        "EventTarget.prototype.addEventListener",
        CallHooks::new().on_invoke(move |ctx| {
            let Some((receiver, event, callback)) = listener_call(&env, ctx)? else {
                return Ok(HookOutcome::Continue);
            };
            if env.synthetic().contains(&receiver) {
                return Ok(HookOutcome::Return(Value::Undefined));
            }
            if event == "message" && is_global(&env, &receiver) {
                let wrapped = match env.listeners().find(&receiver, &event, &callback) {
                    Some(wrapped) => wrapped,
                    None => {
                        let wrapped = message_listener(Rc::downgrade(&env), callback.clone());
                        env.listeners().record(&receiver, &event, &callback, &wrapped);
                        wrapped
                    }
                };
                ctx.set_arg(1, wrapped.into());
            }
            Ok(HookOutcome::Continue)
        }),
    );

    let env = client.env().clone();
    let remove = interceptor.register_call(
        "EventTarget.prototype.removeEventListener",
        CallHooks::new().on_invoke(move |ctx| {
            let Some((receiver, event, callback)) = listener_call(&env, ctx)? else {
                return Ok(HookOutcome::Continue);
            };
            if env.synthetic().contains(&receiver) {
                return Ok(HookOutcome::Return(Value::Undefined));
            }
            if let Some(wrapped) = env.listeners().take(&receiver, &event, &callback) {
                ctx.set_arg(1, wrapped.into());
            }
            Ok(HookOutcome::Continue)
        }),
    );

    add + remove
}

/// Extracts `(receiver, event, callback)` from a listener call. Synthetic
/// receivers match regardless of arguments.
fn listener_call(
    env: &ClientEnv,
    ctx: &CallContext,
) -> HostResult<Option<(ObjectRef, String, ObjectRef)>> {
    let Some(receiver) = ctx.this.as_object().cloned() else {
        return Ok(None);
    };
    let callback = match ctx.arg(1) {
        Value::Object(callback) => callback,
        _ if env.synthetic().contains(&receiver) => ObjectRef::plain(),
        _ => return Ok(None),
    };
    let event = ctx.arg(0).to_display_string()?;
    Ok(Some((receiver, event, callback)))
}

fn is_global(env: &ClientEnv, receiver: &ObjectRef) -> bool {
    env.global().is_ok_and(|global| global.ptr_eq(receiver))
        || env.global_wrapper().is_some_and(|wrapper| wrapper.ptr_eq(receiver))
}

fn message_listener(env: Weak<ClientEnv>, callback: ObjectRef) -> ObjectRef {
    ObjectRef::function("listener", move |this, args| {
        let mut args = args;
        if let (Some(env), Some(Value::Object(event))) = (env.upgrade(), args.first().cloned()) {
            args[0] = ObjectRef::proxy(event, Rc::new(MessageEventTraps { env })).into();
        }
        if callback.is_callable() {
            callback.call(this, args)
        } else {
            callback.invoke("handleEvent", args)
        }
    })
}

struct MessageEventTraps {
    env: Rc<ClientEnv>,
}

impl ProxyTraps for MessageEventTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        let value = target.get(key)?;
        if key != "origin" {
            return Ok(value);
        }
        match value.as_str() {
            Some(origin) if origin == self.env.config().origin.trim_end_matches('/') => {
                Ok(self.env.url()?.origin().ascii_serialization().into())
            }
            _ => Ok(value),
        }
    }
}
