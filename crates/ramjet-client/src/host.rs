//! Host object model.
//!
//! A minimal model of the browsing context's object graph: values, objects
//! with own property slots and a prototype link, native functions and
//! constructors, and proxy objects whose operations are routed through
//! [`ProxyTraps`]. Embedders bind this model to their script engine; the
//! interception layer only ever talks to it.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`): one model instance
//! belongs to exactly one browsing context.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{HostError, HostResult};

/// Upper bound on items read from an array-like object.
pub const MAX_ARRAY_ITEMS: usize = 1 << 16;

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
}

impl Value {
    /// Returns true for `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns true for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns the object, if this is one.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is an object of the given class.
    pub fn is_instance_of(&self, class: &str) -> bool {
        self.as_object().is_some_and(|obj| obj.class() == class)
    }

    /// Script truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Converts the value to a string the way `String(value)` would.
    ///
    /// Objects use their `toString` method when they have one.
    pub fn to_display_string(&self) -> HostResult<String> {
        Ok(match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Object(obj) => {
                let method = obj.get("toString")?;
                match method.as_object() {
                    Some(f) if f.is_callable() => match f.call(self, Vec::new())? {
                        Self::Object(inner) => format!("[object {}]", inner.class()),
                        other => other.to_display_string()?,
                    },
                    _ => format!("[object {}]", obj.class()),
                }
            }
        })
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Object(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

/// What a property slot holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A plain value.
    Data { value: Value, writable: bool },
    /// A getter/setter pair of function objects.
    Accessor {
        get: Option<ObjectRef>,
        set: Option<ObjectRef>,
    },
}

/// An own property: a slot plus its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

/// The attribute shape of a property, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyShape {
    pub accessor: bool,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    pub has_get: bool,
    pub has_set: bool,
}

impl Property {
    /// Writable, enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data {
                value: value.into(),
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable, configurable, non-enumerable data property (methods).
    pub fn hidden(value: impl Into<Value>) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    /// Read-only, enumerable, configurable data property.
    pub fn readonly(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data {
                value: value.into(),
                writable: false,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Enumerable, configurable accessor property.
    pub fn accessor(get: Option<ObjectRef>, set: Option<ObjectRef>) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    /// Returns the stored value of a data property.
    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data { value, .. } => Some(value),
            Slot::Accessor { .. } => None,
        }
    }

    /// Returns the getter of an accessor property.
    pub fn getter(&self) -> Option<&ObjectRef> {
        match &self.slot {
            Slot::Accessor { get, .. } => get.as_ref(),
            Slot::Data { .. } => None,
        }
    }

    /// Returns the setter of an accessor property.
    pub fn setter(&self) -> Option<&ObjectRef> {
        match &self.slot {
            Slot::Accessor { set, .. } => set.as_ref(),
            Slot::Data { .. } => None,
        }
    }

    /// Returns the attribute shape.
    pub fn shape(&self) -> PropertyShape {
        let (accessor, writable, has_get, has_set) = match &self.slot {
            Slot::Data { writable, .. } => (false, *writable, false, false),
            Slot::Accessor { get, set } => (true, false, get.is_some(), set.is_some()),
        };
        PropertyShape {
            accessor,
            writable,
            enumerable: self.enumerable,
            configurable: self.configurable,
            has_get,
            has_set,
        }
    }

    /// Reads the property on behalf of `receiver`.
    pub fn read(&self, receiver: &Value) -> HostResult<Value> {
        match &self.slot {
            Slot::Data { value, .. } => Ok(value.clone()),
            Slot::Accessor { get: Some(getter), .. } => getter.call(receiver, Vec::new()),
            Slot::Accessor { get: None, .. } => Ok(Value::Undefined),
        }
    }
}

/// Native call behavior: `(this, args) -> result`.
pub type CallFn = dyn Fn(&Value, Vec<Value>) -> HostResult<Value>;

/// Native construct behavior: `(args, new_target) -> instance`.
pub type ConstructFn = dyn Fn(Vec<Value>, &ObjectRef) -> HostResult<Value>;

/// Operations routed through a proxy object. Every trap defaults to
/// forwarding the operation to the target unchanged.
pub trait ProxyTraps {
    fn get(&self, target: &ObjectRef, key: &str) -> HostResult<Value> {
        target.get(key)
    }

    fn set(&self, target: &ObjectRef, key: &str, value: Value) -> HostResult<()> {
        target.set(key, value)
    }

    fn has(&self, target: &ObjectRef, key: &str) -> bool {
        target.has(key)
    }

    fn get_own_property(&self, target: &ObjectRef, key: &str) -> Option<Property> {
        target.get_own_property(key)
    }

    fn call(&self, target: &ObjectRef, this: &Value, args: Vec<Value>) -> HostResult<Value> {
        target.call(this, args)
    }

    fn construct(
        &self,
        target: &ObjectRef,
        args: Vec<Value>,
        new_target: &ObjectRef,
    ) -> HostResult<Value> {
        target.construct(args, Some(new_target))
    }
}

enum Kind {
    Ordinary,
    Native {
        call: Option<Rc<CallFn>>,
        construct: Option<Rc<ConstructFn>>,
    },
    Proxy {
        target: ObjectRef,
        traps: Rc<dyn ProxyTraps>,
    },
}

struct ObjectData {
    class: String,
    proto: RefCell<Option<ObjectRef>>,
    props: RefCell<BTreeMap<String, Property>>,
    kind: Kind,
}

/// A shared reference to a host object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectData>);

/// A non-owning reference to a host object.
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectData>);

impl WeakObject {
    /// Returns the object if it is still alive.
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(obj) => write!(f, "Weak({:?})", obj),
            None => f.write_str("Weak(<dropped>)"),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} #{:x}]", self.0.class, self.id())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl ObjectRef {
    fn from_parts(class: &str, proto: Option<ObjectRef>, kind: Kind) -> Self {
        Self(Rc::new(ObjectData {
            class: class.to_string(),
            proto: RefCell::new(proto),
            props: RefCell::new(BTreeMap::new()),
            kind,
        }))
    }

    /// Creates an ordinary object of `class` without a prototype.
    pub fn new(class: &str) -> Self {
        Self::from_parts(class, None, Kind::Ordinary)
    }

    /// Creates an ordinary object of `class` with the given prototype.
    pub fn with_proto(class: &str, proto: Option<ObjectRef>) -> Self {
        Self::from_parts(class, proto, Kind::Ordinary)
    }

    /// Creates an empty `Object`.
    pub fn plain() -> Self {
        Self::new("Object")
    }

    /// Creates an `Array` holding `items`.
    pub fn array(items: Vec<Value>) -> Self {
        let array = Self::new("Array");
        let len = items.len();
        for (i, item) in items.into_iter().enumerate() {
            array.define_property(&i.to_string(), Property::data(item));
        }
        array.define_property("length", Property::hidden(len as f64));
        array
    }

    /// Creates a callable native function.
    pub fn function<F>(name: &str, call: F) -> Self
    where
        F: Fn(&Value, Vec<Value>) -> HostResult<Value> + 'static,
    {
        Self::native(name, Some(Rc::new(call)), None)
    }

    /// Creates a native constructor that can only be invoked with `new`.
    ///
    /// The constructor gets a fresh `prototype` object.
    pub fn constructor<F>(name: &str, construct: F) -> Self
    where
        F: Fn(Vec<Value>, &ObjectRef) -> HostResult<Value> + 'static,
    {
        Self::native(name, None, Some(Rc::new(construct)))
    }

    /// Creates a native function with optional call and construct behavior.
    pub fn native(
        name: &str,
        call: Option<Rc<CallFn>>,
        construct: Option<Rc<ConstructFn>>,
    ) -> Self {
        let is_constructor = construct.is_some();
        let function = Self::from_parts("Function", None, Kind::Native { call, construct });
        function.define_property(
            "name",
            Property {
                slot: Slot::Data {
                    value: name.into(),
                    writable: false,
                },
                enumerable: false,
                configurable: true,
            },
        );
        if is_constructor {
            let prototype = Self::plain();
            function.define_property(
                "prototype",
                Property {
                    slot: Slot::Data {
                        value: prototype.into(),
                        writable: false,
                    },
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        function
    }

    /// Creates a proxy object that routes its operations through `traps`.
    pub fn proxy(target: ObjectRef, traps: Rc<dyn ProxyTraps>) -> Self {
        let class = target.class();
        Self::from_parts(&class, None, Kind::Proxy { target, traps })
    }

    /// Creates the instance a native constructor should initialize: an
    /// object of `class` whose prototype is `new_target.prototype`.
    pub fn instance_for(new_target: &ObjectRef, class: &str) -> HostResult<ObjectRef> {
        let proto = new_target.get("prototype")?.as_object().cloned();
        Ok(Self::with_proto(class, proto))
    }

    /// Identity of the object, stable for its lifetime.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Returns true if both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a non-owning reference.
    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// Returns the object's class name. Proxies report their target's.
    pub fn class(&self) -> String {
        self.0.class.clone()
    }

    /// Returns the proxy target, if this is a proxy.
    pub fn proxy_target(&self) -> Option<&ObjectRef> {
        match &self.0.kind {
            Kind::Proxy { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Returns the prototype.
    pub fn proto(&self) -> Option<ObjectRef> {
        match &self.0.kind {
            Kind::Proxy { target, .. } => target.proto(),
            _ => self.0.proto.borrow().clone(),
        }
    }

    /// Replaces the prototype.
    pub fn set_proto(&self, proto: Option<ObjectRef>) {
        match &self.0.kind {
            Kind::Proxy { target, .. } => target.set_proto(proto),
            _ => *self.0.proto.borrow_mut() = proto,
        }
    }

    /// Returns the own property `key`.
    pub fn get_own_property(&self, key: &str) -> Option<Property> {
        match &self.0.kind {
            Kind::Proxy { target, traps } => traps.get_own_property(target, key),
            _ => self.0.props.borrow().get(key).cloned(),
        }
    }

    /// Defines or replaces the own property `key`.
    pub fn define_property(&self, key: &str, property: Property) {
        match &self.0.kind {
            Kind::Proxy { target, .. } => target.define_property(key, property),
            _ => {
                self.0.props.borrow_mut().insert(key.to_string(), property);
            }
        }
    }

    /// Deletes the own property `key`. Returns false if it is not configurable.
    pub fn delete(&self, key: &str) -> bool {
        match &self.0.kind {
            Kind::Proxy { target, .. } => target.delete(key),
            _ => {
                let mut props = self.0.props.borrow_mut();
                match props.get(key) {
                    Some(prop) if !prop.configurable => false,
                    Some(_) => {
                        props.remove(key);
                        true
                    }
                    None => true,
                }
            }
        }
    }

    /// Returns the property `key` from the object or the nearest prototype
    /// that defines it.
    pub fn find_property(&self, key: &str) -> Option<Property> {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(property) = obj.get_own_property(key) {
                return Some(property);
            }
            current = obj.proto();
        }
        None
    }

    /// Returns true if `key` is an own property.
    pub fn has_own(&self, key: &str) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Returns true if `key` is found on the object or its prototype chain.
    pub fn has(&self, key: &str) -> bool {
        match &self.0.kind {
            Kind::Proxy { target, traps } => traps.has(target, key),
            _ => {
                self.0.props.borrow().contains_key(key)
                    || self.proto().is_some_and(|proto| proto.has(key))
            }
        }
    }

    /// Returns the own property names.
    pub fn own_keys(&self) -> Vec<String> {
        match &self.0.kind {
            Kind::Proxy { target, .. } => target.own_keys(),
            _ => self.0.props.borrow().keys().cloned().collect(),
        }
    }

    /// Reads `key`, walking the prototype chain.
    pub fn get(&self, key: &str) -> HostResult<Value> {
        if let Kind::Proxy { target, traps } = &self.0.kind {
            return traps.get(target, key);
        }
        let receiver = Value::Object(self.clone());
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Kind::Proxy { target, traps } = &obj.0.kind {
                return traps.get(target, key);
            }
            let prop = obj.0.props.borrow().get(key).cloned();
            if let Some(prop) = prop {
                return prop.read(&receiver);
            }
            current = obj.proto();
        }
        Ok(Value::Undefined)
    }

    /// Writes `key` with sloppy-mode semantics: setters run, read-only
    /// properties are silently left alone, anything else lands as an own
    /// data property.
    pub fn set(&self, key: &str, value: Value) -> HostResult<()> {
        if let Kind::Proxy { target, traps } = &self.0.kind {
            return traps.set(target, key, value);
        }
        let receiver = Value::Object(self.clone());
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if matches!(obj.0.kind, Kind::Proxy { .. }) {
                break;
            }
            let prop = obj.0.props.borrow().get(key).cloned();
            if let Some(prop) = prop {
                match prop.slot {
                    Slot::Accessor { set: Some(setter), .. } => {
                        setter.call(&receiver, vec![value])?;
                        return Ok(());
                    }
                    Slot::Accessor { set: None, .. } | Slot::Data { writable: false, .. } => {
                        return Ok(());
                    }
                    Slot::Data { writable: true, .. } => {
                        if obj.ptr_eq(self) {
                            if let Some(Property {
                                slot: Slot::Data { value: stored, .. },
                                ..
                            }) = self.0.props.borrow_mut().get_mut(key)
                            {
                                *stored = value;
                            }
                            return Ok(());
                        }
                        break;
                    }
                }
            }
            current = obj.proto();
        }
        self.define_property(key, Property::data(value));
        Ok(())
    }

    /// Returns true if the object can be called.
    pub fn is_callable(&self) -> bool {
        match &self.0.kind {
            Kind::Ordinary => false,
            Kind::Native { .. } => true,
            Kind::Proxy { target, .. } => target.is_callable(),
        }
    }

    /// Returns true if the object can be constructed with `new`.
    pub fn is_constructor(&self) -> bool {
        match &self.0.kind {
            Kind::Ordinary => false,
            Kind::Native { construct, .. } => construct.is_some(),
            Kind::Proxy { target, .. } => target.is_constructor(),
        }
    }

    /// Calls the object as a function.
    pub fn call(&self, this: &Value, args: Vec<Value>) -> HostResult<Value> {
        match &self.0.kind {
            Kind::Native { call: Some(call), .. } => call(this, args),
            Kind::Native { call: None, .. } => Err(HostError::type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                self.function_name()
            ))),
            Kind::Proxy { target, traps } => traps.call(target, this, args),
            Kind::Ordinary => Err(HostError::type_error(format!(
                "{} is not a function",
                self.class()
            ))),
        }
    }

    /// Constructs an instance. `new_target` defaults to the object itself.
    pub fn construct(&self, args: Vec<Value>, new_target: Option<&ObjectRef>) -> HostResult<Value> {
        let new_target = new_target.unwrap_or(self);
        match &self.0.kind {
            Kind::Native {
                construct: Some(construct),
                ..
            } => construct(args, new_target),
            Kind::Proxy { target, traps } => traps.construct(target, args, new_target),
            _ => Err(HostError::type_error(format!(
                "{} is not a constructor",
                self.function_name()
            ))),
        }
    }

    /// Calls the method `name` with `this` bound to the object.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> HostResult<Value> {
        match self.get(name)? {
            Value::Object(method) if method.is_callable() => {
                method.call(&Value::Object(self.clone()), args)
            }
            _ => Err(HostError::type_error(format!(
                "{}.{} is not a function",
                self.class(),
                name
            ))),
        }
    }

    /// Reads the items of an array-like object.
    pub fn array_items(&self) -> HostResult<Vec<Value>> {
        let len = match self.get("length")? {
            Value::Number(n) if n.is_finite() && n >= 0.0 => (n as usize).min(MAX_ARRAY_ITEMS),
            _ => 0,
        };
        (0..len).map(|i| self.get(&i.to_string())).collect()
    }

    fn function_name(&self) -> String {
        self.get_own_property("name")
            .and_then(|p| p.value().and_then(|v| v.as_str().map(str::to_string)))
            .unwrap_or_else(|| self.class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_prototype_chain() {
        let proto = ObjectRef::plain();
        proto.define_property("greeting", Property::data("hi"));
        let obj = ObjectRef::with_proto("Thing", Some(proto));
        assert_eq!(obj.get("greeting").unwrap(), Value::from("hi"));
        assert!(obj.has("greeting"));
        assert!(!obj.has_own("greeting"));
        assert!(obj.get("missing").unwrap().is_undefined());
    }

    #[test]
    fn find_property_reaches_prototype() {
        let proto = ObjectRef::plain();
        proto.define_property("greeting", Property::readonly("hi"));
        let obj = ObjectRef::with_proto("Thing", Some(proto));
        let found = obj.find_property("greeting").unwrap();
        assert_eq!(found.value(), Some(&Value::from("hi")));
        assert!(obj.find_property("missing").is_none());
    }

    #[test]
    fn array_items_caps_length() {
        let obj = ObjectRef::plain();
        obj.define_property("length", Property::data(1e12));
        assert_eq!(obj.array_items().unwrap().len(), MAX_ARRAY_ITEMS);

        obj.define_property("length", Property::data(f64::INFINITY));
        assert!(obj.array_items().unwrap().is_empty());
    }

    #[test]
    fn set_shadows_prototype_data_property() {
        let proto = ObjectRef::plain();
        proto.define_property("x", Property::data(1.0));
        let obj = ObjectRef::with_proto("Thing", Some(proto.clone()));
        obj.set("x", Value::from(2.0)).unwrap();
        assert_eq!(obj.get("x").unwrap(), Value::from(2.0));
        assert_eq!(proto.get("x").unwrap(), Value::from(1.0));
    }

    #[test]
    fn set_respects_readonly() {
        let obj = ObjectRef::plain();
        obj.define_property("x", Property::readonly("fixed"));
        obj.set("x", Value::from("changed")).unwrap();
        assert_eq!(obj.get("x").unwrap(), Value::from("fixed"));
    }

    #[test]
    fn accessor_receives_receiver() {
        let proto = ObjectRef::plain();
        let getter = ObjectRef::function("get tag", |this, _| {
            let obj = this.as_object().cloned().unwrap();
            obj.get("_tag")
        });
        proto.define_property("tag", Property::accessor(Some(getter), None));
        let a = ObjectRef::with_proto("Thing", Some(proto.clone()));
        a.define_property("_tag", Property::data("a"));
        let b = ObjectRef::with_proto("Thing", Some(proto));
        b.define_property("_tag", Property::data("b"));
        assert_eq!(a.get("tag").unwrap(), Value::from("a"));
        assert_eq!(b.get("tag").unwrap(), Value::from("b"));
    }

    #[test]
    fn constructor_uses_new_target_prototype() {
        let ctor = ObjectRef::constructor("Widget", |_, new_target| {
            Ok(ObjectRef::instance_for(new_target, "Widget")?.into())
        });
        let proto = ctor.get("prototype").unwrap();
        let instance = ctor.construct(Vec::new(), None).unwrap();
        let instance = instance.as_object().unwrap();
        assert_eq!(instance.proto().map(Value::from), Some(proto));
        assert!(ctor.call(&Value::Undefined, Vec::new()).is_err());
    }

    #[test]
    fn calling_ordinary_object_is_type_error() {
        let err = ObjectRef::plain().call(&Value::Undefined, Vec::new()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }

    #[test]
    fn delete_refuses_non_configurable() {
        let ctor = ObjectRef::constructor("Widget", |_, _| Ok(Value::Undefined));
        assert!(!ctor.delete("prototype"));
        assert!(ctor.delete("name"));
        assert!(!ctor.has_own("name"));
    }

    #[test]
    fn proxy_forwards_by_default() {
        struct Passthrough;
        impl ProxyTraps for Passthrough {}

        let target = ObjectRef::function("double", |_, args| match args.first() {
            Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
            _ => Ok(Value::Undefined),
        });
        let proxy = ObjectRef::proxy(target.clone(), Rc::new(Passthrough));
        assert_eq!(
            proxy.call(&Value::Undefined, vec![Value::from(4.0)]).unwrap(),
            Value::from(8.0)
        );
        assert_eq!(
            proxy.get_own_property("name").map(|p| p.shape()),
            target.get_own_property("name").map(|p| p.shape())
        );
        assert_eq!(proxy.class(), "Function");
        assert!(!proxy.ptr_eq(&target));
    }

    #[test]
    fn display_string_uses_to_string() {
        let url = ObjectRef::new("URL");
        url.define_property("href", Property::data("https://a.test/"));
        url.define_property(
            "toString",
            Property::hidden(ObjectRef::function("toString", |this, _| {
                this.as_object().cloned().unwrap().get("href")
            })),
        );
        let value = Value::from(url);
        assert_eq!(value.to_display_string().unwrap(), "https://a.test/");
        assert_eq!(Value::from(3.0).to_display_string().unwrap(), "3");
        assert_eq!(
            Value::from(ObjectRef::plain()).to_display_string().unwrap(),
            "[object Object]"
        );
    }

    #[test]
    fn array_round_trip_items() {
        let array = ObjectRef::array(vec![Value::from("a"), Value::from(1.0)]);
        assert_eq!(
            array.array_items().unwrap(),
            vec![Value::from("a"), Value::from(1.0)]
        );
    }

    #[test]
    fn weak_reference_does_not_keep_object_alive() {
        let obj = ObjectRef::plain();
        let weak = obj.downgrade();
        assert!(weak.upgrade().is_some());
        drop(obj);
        assert!(weak.upgrade().is_none());
    }
}
