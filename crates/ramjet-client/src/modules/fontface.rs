//! `FontFace` source descriptors.

use tracing::debug;

use crate::client::Client;
use crate::interception::{CallHooks, HookOutcome};

pub fn install(client: &Client) -> usize {
    let env = client.env().clone();
    client.interceptor().register_call(
        "FontFace",
        CallHooks::new().on_construct(move |ctx| {
            if let Some(source) = ctx.arg(1).as_str() {
                debug!("Rewriting FontFace source");
                let rewritten = env.rewrite_css(source)?;
                ctx.set_arg(1, rewritten.into());
            }
            Ok(HookOutcome::Continue)
        }),
    )
}
