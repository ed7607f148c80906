//! `Worklet.prototype.addModule`.

use crate::client::Client;
use crate::interception::{CallHooks, HookOutcome};

pub fn install(client: &Client) -> usize {
    let env = client.env().clone();
    client.interceptor().register_call(
        "Worklet.prototype.addModule",
        CallHooks::new().on_invoke(move |ctx| {
            let raw = ctx.arg(0).to_display_string()?;
            ctx.set_arg(0, env.encode_url(&raw).into());
            Ok(HookOutcome::Continue)
        }),
    )
}

#[cfg(test)]
mod tests {
    use crate::host::Value;
    use crate::test_support::BrowserFixture;

    #[test]
    fn module_url_is_encoded() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let worklet = fixture.worklet();
        worklet
            .invoke("addModule", vec![Value::from("paint.js")])
            .unwrap();
        assert_eq!(
            fixture.calls("Worklet.addModule")[0][0],
            Value::from(client.encode_url("https://example.com/app/paint.js"))
        );
    }
}
