//! Document, location and global wrappers.
//!
//! Rewritten scripts never touch the native `document`, `location` or global
//! objects directly; they receive these wrappers instead (see the `wrap`
//! module). Each wrapper forwards to its native object except for the
//! members that would reveal or change the proxy URL.

use std::rc::Rc;

use tracing::debug;
use url::Url;

use crate::client::ClientEnv;
use crate::error::HostResult;
use crate::host::{ObjectRef, ProxyTraps, Value};

/// URL components a location exposes.
const LOCATION_COMPONENTS: &[&str] = &[
    "href", "origin", "protocol", "host", "hostname", "port", "pathname", "search", "hash",
];

/// Creates the wrapper handed out in place of the native `document`.
pub fn document_wrapper(env: &Rc<ClientEnv>, document: ObjectRef) -> ObjectRef {
    ObjectRef::proxy(document, Rc::new(DocumentTraps { env: env.clone() }))
}

/// Creates the wrapper handed out in place of the native `location`.
pub fn location_wrapper(env: &Rc<ClientEnv>, location: ObjectRef) -> ObjectRef {
    let traps = LocationTraps {
        env: env.clone(),
        assign: navigation_function(env, &location, "assign"),
        replace: navigation_function(env, &location, "replace"),
        to_string: href_function(env),
    };
    ObjectRef::proxy(location, Rc::new(traps))
}

/// Creates the wrapper handed out in place of the global object.
pub fn global_wrapper(env: &Rc<ClientEnv>, global: ObjectRef) -> ObjectRef {
    ObjectRef::proxy(global, Rc::new(GlobalTraps { env: env.clone() }))
}

struct DocumentTraps {
    env: Rc<ClientEnv>,
}

impl ProxyTraps for DocumentTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        let wrapper = match key {
            "location" => self.env.location_wrapper(),
            "defaultView" => self.env.global_wrapper(),
            _ => None,
        };
        match wrapper {
            Some(wrapper) => Ok(wrapper.into()),
            None => target.get(key),
        }
    }

    fn set(&self, target: &ObjectRef, key: &str, value: Value) -> HostResult<()> {
        if key == "location" {
            return self.env.navigate(&value.to_display_string()?);
        }
        target.set(key, value)
    }
}

struct LocationTraps {
    env: Rc<ClientEnv>,
    assign: ObjectRef,
    replace: ObjectRef,
    to_string: ObjectRef,
}

impl ProxyTraps for LocationTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        match key {
            "assign" => return Ok(self.assign.clone().into()),
            "replace" => return Ok(self.replace.clone().into()),
            "toString" | "valueOf" => return Ok(self.to_string.clone().into()),
            _ => {}
        }
        if !LOCATION_COMPONENTS.contains(&key) {
            return target.get(key);
        }
        let url = self.env.url()?;
        Ok(location_component(&url, key).into())
    }

    fn set(&self, target: &ObjectRef, key: &str, value: Value) -> HostResult<()> {
        if !LOCATION_COMPONENTS.contains(&key) {
            return target.set(key, value);
        }
        let raw = value.to_display_string()?;
        if key == "href" {
            return self.env.navigate(&raw);
        }
        let mut url = self.env.url()?;
        if set_location_component(&mut url, key, &raw) {
            self.env.navigate(url.as_str())
        } else {
            debug!("Ignoring invalid location.{} = '{}'", key, raw);
            Ok(())
        }
    }
}

struct GlobalTraps {
    env: Rc<ClientEnv>,
}

impl ProxyTraps for GlobalTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        let wrapper = match key {
            "location" => self.env.location_wrapper(),
            "document" => self.env.document_wrapper(),
            "window" | "self" | "globalThis" | "top" | "parent" if target.has(key) => {
                self.env.global_wrapper()
            }
            _ => None,
        };
        match wrapper {
            Some(wrapper) => Ok(wrapper.into()),
            None => target.get(key),
        }
    }

    fn set(&self, target: &ObjectRef, key: &str, value: Value) -> HostResult<()> {
        if key == "location" {
            return self.env.navigate(&value.to_display_string()?);
        }
        target.set(key, value)
    }
}

/// Returns a location component the way `Location` formats it.
pub fn location_component(url: &Url, key: &str) -> String {
    match key {
        "href" => url.to_string(),
        "origin" => url.origin().ascii_serialization(),
        "protocol" => format!("{}:", url.scheme()),
        "host" => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        },
        "hostname" => url.host_str().unwrap_or_default().to_string(),
        "port" => url.port().map(|p| p.to_string()).unwrap_or_default(),
        "pathname" => url.path().to_string(),
        "search" => match url.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        },
        "hash" => match url.fragment() {
            Some(f) if !f.is_empty() => format!("#{}", f),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn set_location_component(url: &mut Url, key: &str, raw: &str) -> bool {
    match key {
        "protocol" => url.set_scheme(raw.trim_end_matches(':')).is_ok(),
        "host" => {
            let (host, port) = match raw.rsplit_once(':') {
                Some((h, p)) if p.parse::<u16>().is_ok() => (h, p.parse::<u16>().ok()),
                _ => (raw, None),
            };
            url.set_host(Some(host)).is_ok() && url.set_port(port).is_ok()
        }
        "hostname" => url.set_host(Some(raw)).is_ok(),
        "port" => {
            let port = if raw.is_empty() { None } else { raw.parse().ok() };
            url.set_port(port).is_ok()
        }
        "pathname" => {
            url.set_path(raw);
            true
        }
        "search" => {
            let query = raw.trim_start_matches('?');
            url.set_query((!query.is_empty()).then_some(query));
            true
        }
        "hash" => {
            let fragment = raw.trim_start_matches('#');
            url.set_fragment((!fragment.is_empty()).then_some(fragment));
            true
        }
        _ => false,
    }
}

/// `location.assign` / `location.replace`: encode, then call the native
/// method (or fall back to a plain navigation).
fn navigation_function(env: &Rc<ClientEnv>, location: &ObjectRef, name: &str) -> ObjectRef {
    let env = env.clone();
    let location = location.downgrade();
    let method = name.to_string();
    ObjectRef::function(name, move |_, args| {
        let raw = args.first().cloned().unwrap_or_default().to_display_string()?;
        let native = location.upgrade();
        match native {
            Some(native) if native.get(&method)?.as_object().is_some_and(ObjectRef::is_callable) => {
                native.invoke(&method, vec![env.encode_url(&raw).into()])
            }
            _ => env.navigate(&raw).map(|_| Value::Undefined),
        }
    })
}

fn href_function(env: &Rc<ClientEnv>) -> ObjectRef {
    let env = env.clone();
    ObjectRef::function("toString", move |_, _| Ok(env.url()?.to_string().into()))
}
