//! Per-API interception modules.
//!
//! Every module is a plain install function over the façade. The table below
//! is the complete set; [`modules_for`] filters it by execution context and
//! orders it (ascending `order`, table order on ties).

use std::fmt;

use crate::client::{Client, ExecutionContext};

pub mod document;
pub mod events;
pub mod fetch;
pub mod fontface;
pub mod serviceworker;
pub mod websocket;
pub mod worklet;
pub mod wrap;

/// Execution contexts a module applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleScope {
    /// Documents and workers.
    Shared,
    /// Documents only.
    Document,
    /// Workers only.
    Worker,
}

impl ModuleScope {
    /// Returns true if the scope covers `context`.
    pub fn applies_to(self, context: ExecutionContext) -> bool {
        match self {
            Self::Shared => true,
            Self::Document => context == ExecutionContext::Document,
            Self::Worker => context == ExecutionContext::Worker,
        }
    }
}

/// A statically registered interception module.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    pub name: &'static str,
    pub scope: ModuleScope,
    /// Lower runs first.
    pub order: i32,
    /// The module installs only when this returns true.
    pub enabled: Option<fn(&Client) -> bool>,
    /// Installs the module; returns the number of registrations made.
    pub install: fn(&Client) -> usize,
    /// Runs instead of `install` when the module is disabled.
    pub disabled: Option<fn(&Client)>,
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("order", &self.order)
            .finish()
    }
}

/// All interception modules.
pub static MODULES: &[ModuleDescriptor] = &[
    ModuleDescriptor {
        name: "wrap",
        scope: ModuleScope::Shared,
        order: -10,
        enabled: None,
        install: wrap::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "fetch",
        scope: ModuleScope::Shared,
        order: 0,
        enabled: None,
        install: fetch::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "websocket",
        scope: ModuleScope::Shared,
        order: 0,
        enabled: Some(websocket::enabled),
        install: websocket::install,
        disabled: Some(websocket::disabled),
    },
    ModuleDescriptor {
        name: "events",
        scope: ModuleScope::Shared,
        order: 0,
        enabled: None,
        install: events::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "serviceworker",
        scope: ModuleScope::Document,
        order: 0,
        enabled: None,
        install: serviceworker::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "worklet",
        scope: ModuleScope::Document,
        order: 0,
        enabled: None,
        install: worklet::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "fontface",
        scope: ModuleScope::Document,
        order: 0,
        enabled: None,
        install: fontface::install,
        disabled: None,
    },
    ModuleDescriptor {
        name: "document",
        scope: ModuleScope::Document,
        order: 0,
        enabled: None,
        install: document::install,
        disabled: None,
    },
];

/// Returns the modules for `context`, in install order.
pub fn modules_for(context: ExecutionContext) -> Vec<&'static ModuleDescriptor> {
    let mut modules: Vec<_> = MODULES
        .iter()
        .filter(|m| m.scope.applies_to(context))
        .collect();
    modules.sort_by_key(|m| m.order);
    modules
}
