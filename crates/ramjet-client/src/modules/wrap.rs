//! Global wrap function used by rewritten scripts.

use ramjet_core::WRAP_FN;

use crate::client::Client;
use crate::host::{ObjectRef, Property, Slot, Value};

pub fn install(client: &Client) -> usize {
    let env = client.env().clone();
    let wrap = ObjectRef::function(WRAP_FN, move |_, args| {
        Ok(env.wrap(args.into_iter().next().unwrap_or_default()))
    });
    client.global().define_property(
        WRAP_FN,
        Property {
            slot: Slot::Data {
                value: wrap.into(),
                writable: false,
            },
            enumerable: false,
            configurable: false,
        },
    );
    1
}
