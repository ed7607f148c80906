//! Interception framework.
//!
//! Replaces members of the host object graph with hook-wrapped versions that
//! still delegate to the original behavior.
//!
//! ## Call interception
//!
//! [`Interceptor::register_call`] swaps a function or constructor for a proxy
//! object. Each call or construction builds a [`CallContext`], runs the hook
//! and either returns the hook's [`HookOutcome::Return`] value or forwards to
//! the (possibly replaced) callee with the mutated receiver and arguments.
//! Property reflection on the proxy reports the original's shape.
//!
//! ## Accessor interception
//!
//! [`Interceptor::register_accessor`] swaps a property for a getter/setter
//! pair that builds a fresh [`AccessorContext`] for every access, bound to
//! the receiver of that access.
//!
//! ## Usage
//!
//! ```
//! use ramjet_client::host::{ObjectRef, Property, Value};
//! use ramjet_client::interception::{CallHooks, HookOutcome, Interceptor};
//! use ramjet_client::stack::StackFilter;
//!
//! let global = ObjectRef::new("Window");
//! let echo = ObjectRef::function("echo", |_, args| Ok(args.into_iter().next().unwrap_or_default()));
//! global.define_property("echo", Property::hidden(echo));
//!
//! let interceptor = Interceptor::new(global.clone(), StackFilter::new("https://proxy.test/ramjet.internal/"));
//! let installed = interceptor.register_call(
//!     "echo",
//!     CallHooks::new().on_invoke(|ctx| {
//!         ctx.set_arg(0, Value::from("hooked"));
//!         Ok(HookOutcome::Continue)
//!     }),
//! );
//! assert_eq!(installed, 1);
//!
//! let result = global.invoke("echo", vec![Value::from("page")]).unwrap();
//! assert_eq!(result, Value::from("hooked"));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use crate::error::{HostError, HostResult};
use crate::host::{ObjectRef, Property, ProxyTraps, Slot, Value, WeakObject};
use crate::path::MemberPath;
use crate::stack::{FailureOrigin, StackFilter};

/// Per-call record handed to a call hook.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The callable that runs when the hook continues. Starts as the original.
    pub callee: ObjectRef,
    /// Receiver of the call; `undefined` for constructions.
    pub this: Value,
    /// Arguments, mutable in place.
    pub args: Vec<Value>,
    /// Construction target whose `prototype` the instance receives.
    pub new_target: Option<ObjectRef>,
}

impl CallContext {
    /// Returns argument `index`, or `undefined` when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Replaces argument `index`, padding with `undefined` as needed.
    pub fn set_arg(&mut self, index: usize, value: Value) {
        if self.args.len() <= index {
            self.args.resize(index + 1, Value::Undefined);
        }
        self.args[index] = value;
    }
}

/// What a call hook decided.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Forward to the callee with the context's receiver and arguments.
    Continue,
    /// Skip the callee and produce this value instead.
    Return(Value),
}

/// A call or construction hook.
pub type CallHook = Rc<dyn Fn(&mut CallContext) -> HostResult<HookOutcome>>;

/// Hooks for a call registration.
#[derive(Clone, Default)]
pub struct CallHooks {
    on_invoke: Option<CallHook>,
    on_construct: Option<CallHook>,
}

impl CallHooks {
    /// Creates an empty hook set; calls pass straight through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the invocation hook.
    pub fn on_invoke<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CallContext) -> HostResult<HookOutcome> + 'static,
    {
        self.on_invoke = Some(Rc::new(hook));
        self
    }

    /// Sets the construction hook.
    pub fn on_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CallContext) -> HostResult<HookOutcome> + 'static,
    {
        self.on_construct = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for CallHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHooks")
            .field("on_invoke", &self.on_invoke.is_some())
            .field("on_construct", &self.on_construct.is_some())
            .finish()
    }
}

/// The archived side of an accessor trap.
#[derive(Debug, Clone)]
enum Previous {
    Accessor {
        get: Option<ObjectRef>,
        set: Option<ObjectRef>,
    },
    /// A data property turned into an accessor keeps its value here.
    Data {
        value: Rc<RefCell<Value>>,
        writable: bool,
    },
}

impl Previous {
    fn from_property(property: &Property) -> Self {
        match &property.slot {
            Slot::Accessor { get, set } => Self::Accessor {
                get: get.clone(),
                set: set.clone(),
            },
            Slot::Data { value, writable } => Self::Data {
                value: Rc::new(RefCell::new(value.clone())),
                writable: *writable,
            },
        }
    }
}

/// Per-access record handed to an accessor hook.
#[derive(Debug, Clone)]
pub struct AccessorContext {
    this: Value,
    previous: Previous,
}

impl AccessorContext {
    /// Receiver of this access.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// Reads through the archived getter (or value).
    pub fn get(&self) -> HostResult<Value> {
        match &self.previous {
            Previous::Accessor { get: Some(getter), .. } => getter.call(&self.this, Vec::new()),
            Previous::Accessor { get: None, .. } => Ok(Value::Undefined),
            Previous::Data { value, .. } => Ok(value.borrow().clone()),
        }
    }

    /// Writes through the archived setter (or value).
    pub fn set(&self, value: Value) -> HostResult<()> {
        match &self.previous {
            Previous::Accessor { set: Some(setter), .. } => {
                setter.call(&self.this, vec![value]).map(|_| ())
            }
            Previous::Accessor { set: None, .. } => Ok(()),
            Previous::Data {
                value: slot,
                writable,
            } => {
                if *writable {
                    *slot.borrow_mut() = value;
                }
                Ok(())
            }
        }
    }
}

/// A getter hook.
pub type GetHook = Rc<dyn Fn(&AccessorContext) -> HostResult<Value>>;

/// A setter hook.
pub type SetHook = Rc<dyn Fn(&AccessorContext, Value) -> HostResult<()>>;

/// Hooks for an accessor registration.
#[derive(Clone, Default)]
pub struct AccessorHooks {
    on_get: Option<GetHook>,
    on_set: Option<SetHook>,
}

impl AccessorHooks {
    /// Creates an empty hook set; both directions delegate to the original.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the getter hook.
    pub fn on_get<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AccessorContext) -> HostResult<Value> + 'static,
    {
        self.on_get = Some(Rc::new(hook));
        self
    }

    /// Sets the setter hook.
    pub fn on_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AccessorContext, Value) -> HostResult<()> + 'static,
    {
        self.on_set = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for AccessorHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorHooks")
            .field("on_get", &self.on_get.is_some())
            .field("on_set", &self.on_set.is_some())
            .finish()
    }
}

/// One path or a batch of paths sharing a hook set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets(Vec<String>);

impl Targets {
    /// Returns the raw paths.
    pub fn paths(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Targets {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<&[&str]> for Targets {
    fn from(paths: &[&str]) -> Self {
        Self(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(paths: [&str; N]) -> Self {
        Self(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl From<Vec<String>> for Targets {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}

/// Registration key for a member reached through an explicit object.
pub fn member_key(parent: &ObjectRef, member: &str) -> String {
    format!("{}#{:x}.{}", parent.class(), parent.id(), member)
}

/// Where a registration was installed.
///
/// `inherited` registrations shadow a member found on the prototype chain
/// with an own property on `parent`.
#[derive(Debug, Clone)]
struct Site {
    parent: WeakObject,
    member: String,
    inherited: bool,
}

/// Per-context interception registry.
///
/// Owns the archive of originals. A key is registered at most once.
pub struct Interceptor {
    root: ObjectRef,
    filter: StackFilter,
    natives: RefCell<BTreeMap<String, Value>>,
    descriptors: RefCell<BTreeMap<String, Property>>,
    sites: RefCell<BTreeMap<String, Site>>,
}

impl Interceptor {
    /// Creates a registry rooted at `root` (the context's global object).
    pub fn new(root: ObjectRef, filter: StackFilter) -> Self {
        Self {
            root,
            filter,
            natives: RefCell::new(BTreeMap::new()),
            descriptors: RefCell::new(BTreeMap::new()),
            sites: RefCell::new(BTreeMap::new()),
        }
    }

    /// Returns the root object paths are resolved against.
    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    /// Returns the stack-trace origin filter.
    pub fn filter(&self) -> &StackFilter {
        &self.filter
    }

    /// Installs `hooks` on every function or constructor named by `targets`.
    ///
    /// Missing parents and members are skipped. Returns how many members
    /// were installed.
    pub fn register_call(&self, targets: impl Into<Targets>, hooks: CallHooks) -> usize {
        targets
            .into()
            .paths()
            .iter()
            .filter(|path| {
                self.resolve(path).is_some_and(|(parent, member)| {
                    self.install_call(path.to_string(), &parent, &member, hooks.clone())
                })
            })
            .count()
    }

    /// Installs `hooks` on every property named by `targets`.
    pub fn register_accessor(&self, targets: impl Into<Targets>, hooks: AccessorHooks) -> usize {
        targets
            .into()
            .paths()
            .iter()
            .filter(|path| {
                self.resolve(path).is_some_and(|(parent, member)| {
                    self.install_accessor(path.to_string(), &parent, &member, hooks.clone())
                })
            })
            .count()
    }

    /// Installs call hooks on `parent[member]` directly.
    pub fn intercept_member(&self, parent: &ObjectRef, member: &str, hooks: CallHooks) -> bool {
        self.install_call(member_key(parent, member), parent, member, hooks)
    }

    /// Installs accessor hooks on `parent[member]` directly.
    pub fn trap_member(&self, parent: &ObjectRef, member: &str, hooks: AccessorHooks) -> bool {
        self.install_accessor(member_key(parent, member), parent, member, hooks)
    }

    /// Returns the archived original value of a call registration.
    pub fn original(&self, key: &str) -> Option<Value> {
        self.natives.borrow().get(key).cloned()
    }

    /// Returns the archived original property of an accessor registration.
    pub fn original_property(&self, key: &str) -> Option<Property> {
        self.descriptors.borrow().get(key).cloned()
    }

    /// Puts the archived original of `key` back in place and forgets the
    /// registration. Returns false if `key` is unknown or its parent object
    /// is gone.
    ///
    /// Accessor registrations get their original property back as it was
    /// archived. Members that were inherited lose their own wrapper so the
    /// prototype's member shows through again.
    pub fn restore(&self, key: &str) -> bool {
        let Some(Site {
            parent,
            member,
            inherited,
        }) = self.sites.borrow_mut().remove(key)
        else {
            return false;
        };
        let native = self.natives.borrow_mut().remove(key);
        let descriptor = self.descriptors.borrow_mut().remove(key);
        let Some(parent) = parent.upgrade() else {
            debug!("Cannot restore '{}': parent dropped", key);
            return false;
        };

        if inherited {
            parent.delete(&member);
        } else if let Some(original) = native {
            let mut property = parent
                .get_own_property(&member)
                .unwrap_or_else(|| Property::hidden(Value::Undefined));
            let writable = match property.slot {
                Slot::Data { writable, .. } => writable,
                Slot::Accessor { .. } => true,
            };
            property.slot = Slot::Data {
                value: original,
                writable,
            };
            parent.define_property(&member, property);
        } else if let Some(property) = descriptor {
            parent.define_property(&member, property);
        }
        debug!("Restored '{}'", key);
        true
    }

    /// Returns true if `key` has been registered.
    pub fn is_registered(&self, key: &str) -> bool {
        self.natives.borrow().contains_key(key) || self.descriptors.borrow().contains_key(key)
    }

    /// Number of registrations made so far.
    pub fn len(&self) -> usize {
        self.natives.borrow().len() + self.descriptors.borrow().len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, path: &str) -> Option<(ObjectRef, String)> {
        let parsed = match MemberPath::parse(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping interception of '{}': {}", path, e);
                return None;
            }
        };
        let resolved = parsed.resolve(&self.root);
        if resolved.is_none() {
            debug!("Skipping interception of '{}': parent not found", path);
        }
        resolved
    }

    fn install_call(&self, key: String, parent: &ObjectRef, member: &str, hooks: CallHooks) -> bool {
        if self.is_registered(&key) {
            debug!("'{}' is already intercepted", key);
            return false;
        }
        let Some((property, inherited)) = lookup(parent, member) else {
            debug!("Skipping interception of '{}': member not found", key);
            return false;
        };
        let (original, writable) = match &property.slot {
            Slot::Data {
                value: Value::Object(original),
                writable,
            } => (original.clone(), *writable),
            _ => {
                debug!("Skipping interception of '{}': not an object", key);
                return false;
            }
        };
        if !inherited && !parent.delete(member) {
            debug!("Skipping interception of '{}': not configurable", key);
            return false;
        }

        let traps = InterceptTraps {
            key: key.clone(),
            hooks,
            filter: self.filter.clone(),
        };
        let wrapped = ObjectRef::proxy(original.clone(), Rc::new(traps));
        parent.define_property(
            member,
            Property {
                slot: Slot::Data {
                    value: wrapped.into(),
                    writable,
                },
                ..property
            },
        );
        self.sites
            .borrow_mut()
            .insert(
                key.clone(),
                Site {
                    parent: parent.downgrade(),
                    member: member.to_string(),
                    inherited,
                },
            );
        self.natives.borrow_mut().insert(key, original.into());
        true
    }

    fn install_accessor(
        &self,
        key: String,
        parent: &ObjectRef,
        member: &str,
        hooks: AccessorHooks,
    ) -> bool {
        if self.is_registered(&key) {
            debug!("'{}' is already trapped", key);
            return false;
        }
        let Some((property, inherited)) = lookup(parent, member) else {
            debug!("Skipping trap of '{}': member not found", key);
            return false;
        };
        if !inherited && !parent.delete(member) {
            debug!("Skipping trap of '{}': not configurable", key);
            return false;
        }

        let previous = Previous::from_property(&property);
        let getter = match (hooks.on_get, &previous) {
            (Some(hook), _) => Some(self.trap_getter(&key, member, hook, previous.clone())),
            (None, Previous::Accessor { get, .. }) => get.clone(),
            (None, Previous::Data { .. }) => Some(passthrough_getter(member, previous.clone())),
        };
        let setter = match (hooks.on_set, &previous) {
            (Some(hook), _) => Some(self.trap_setter(&key, member, hook, previous.clone())),
            (None, Previous::Accessor { set, .. }) => set.clone(),
            (None, Previous::Data { .. }) => Some(passthrough_setter(member, previous.clone())),
        };

        parent.define_property(
            member,
            Property {
                slot: Slot::Accessor {
                    get: getter,
                    set: setter,
                },
                enumerable: property.enumerable,
                configurable: property.configurable,
            },
        );
        self.sites
            .borrow_mut()
            .insert(
                key.clone(),
                Site {
                    parent: parent.downgrade(),
                    member: member.to_string(),
                    inherited,
                },
            );
        self.descriptors.borrow_mut().insert(key, property);
        true
    }

    fn trap_getter(&self, key: &str, member: &str, hook: GetHook, previous: Previous) -> ObjectRef {
        let filter = self.filter.clone();
        let key = key.to_string();
        ObjectRef::function(&format!("get {}", member), move |this, _| {
            let ctx = AccessorContext {
                this: this.clone(),
                previous: previous.clone(),
            };
            match hook(&ctx) {
                Ok(value) => Ok(value),
                Err(err) => {
                    recover(&filter, &key, "Getter", err)?;
                    ctx.get()
                }
            }
        })
    }

    fn trap_setter(&self, key: &str, member: &str, hook: SetHook, previous: Previous) -> ObjectRef {
        let filter = self.filter.clone();
        let key = key.to_string();
        ObjectRef::function(&format!("set {}", member), move |this, args| {
            let ctx = AccessorContext {
                this: this.clone(),
                previous: previous.clone(),
            };
            let value = args.into_iter().next().unwrap_or_default();
            match hook(&ctx, value.clone()) {
                Ok(()) => Ok(Value::Undefined),
                Err(err) => {
                    recover(&filter, &key, "Setter", err)?;
                    ctx.set(value)?;
                    Ok(Value::Undefined)
                }
            }
        })
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("root", &self.root)
            .field("natives", &self.natives.borrow().keys().collect::<Vec<_>>())
            .field("descriptors", &self.descriptors.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Finds `member` as an own property of `parent`, or failing that on its
/// prototype chain. The flag is true for inherited members.
fn lookup(parent: &ObjectRef, member: &str) -> Option<(Property, bool)> {
    match parent.get_own_property(member) {
        Some(property) => Some((property, false)),
        None => parent.find_property(member).map(|property| (property, true)),
    }
}

fn passthrough_getter(member: &str, previous: Previous) -> ObjectRef {
    ObjectRef::function(&format!("get {}", member), move |this, _| {
        AccessorContext {
            this: this.clone(),
            previous: previous.clone(),
        }
        .get()
    })
}

fn passthrough_setter(member: &str, previous: Previous) -> ObjectRef {
    ObjectRef::function(&format!("set {}", member), move |this, args| {
        AccessorContext {
            this: this.clone(),
            previous: previous.clone(),
        }
        .set(args.into_iter().next().unwrap_or_default())?;
        Ok(Value::Undefined)
    })
}

/// Decides what happens to a hook error.
///
/// Internal failures are logged and swallowed (`Ok`); the caller then runs
/// the unhooked behavior. Everything else comes back scrubbed of internal
/// frames.
fn recover(filter: &StackFilter, key: &str, kind: &str, err: HostError) -> HostResult<()> {
    match filter.origin_of(&err.trace) {
        FailureOrigin::Internal => {
            error!("{} hook for '{}' failed internally: {}", kind, key, err);
            Ok(())
        }
        FailureOrigin::Caller => Err(scrub(filter, err)),
    }
}

fn scrub(filter: &StackFilter, err: HostError) -> HostError {
    let trace = filter.scrub(&err.trace);
    err.with_trace(trace)
}

/// Traps of an installed call wrapper.
struct InterceptTraps {
    key: String,
    hooks: CallHooks,
    filter: StackFilter,
}

impl ProxyTraps for InterceptTraps {
    fn call(&self, target: &ObjectRef, this: &Value, args: Vec<Value>) -> HostResult<Value> {
        let Some(hook) = &self.hooks.on_invoke else {
            return target.call(this, args);
        };
        let mut ctx = CallContext {
            callee: target.clone(),
            this: this.clone(),
            args: args.clone(),
            new_target: None,
        };
        match hook(&mut ctx) {
            Ok(HookOutcome::Return(value)) => Ok(value),
            Ok(HookOutcome::Continue) => ctx.callee.call(&ctx.this, ctx.args),
            Err(err) => {
                recover(&self.filter, &self.key, "Invocation", err)?;
                target.call(this, args)
            }
        }
    }

    fn construct(
        &self,
        target: &ObjectRef,
        args: Vec<Value>,
        new_target: &ObjectRef,
    ) -> HostResult<Value> {
        let Some(hook) = &self.hooks.on_construct else {
            return target.construct(args, Some(new_target));
        };
        let mut ctx = CallContext {
            callee: target.clone(),
            this: Value::Undefined,
            args,
            new_target: Some(new_target.clone()),
        };
        match hook(&mut ctx) {
            Ok(HookOutcome::Return(value)) => Ok(value),
            Ok(HookOutcome::Continue) => ctx.callee.construct(ctx.args, ctx.new_target.as_ref()),
            Err(err) => Err(scrub(&self.filter, err)),
        }
    }
}
