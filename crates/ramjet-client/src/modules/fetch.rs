//! `fetch`, `Headers`, `Request` and `Response`.

use crate::client::Client;
use crate::host::Value;
use crate::interception::{AccessorHooks, CallHooks, HookOutcome};

pub fn install(client: &Client) -> usize {
    let interceptor = client.interceptor();
    let mut installed = 0;

    let env = client.env().clone();
    installed += interceptor.register_call(
        "fetch",
        CallHooks::new().on_invoke(move |ctx| {
            let input = ctx.arg(0);
            if input.as_str().is_some() || input.is_instance_of("URL") {
                let raw = input.to_display_string()?;
                ctx.set_arg(0, env.encode_url(&raw).into());
            }
            Ok(HookOutcome::Continue)
        }),
    );

    let env = client.env().clone();
    installed += interceptor.register_call(
        "Headers",
        CallHooks::new().on_construct(move |ctx| {
            let init = env.rewrite_header_init(&ctx.arg(0))?;
            if !ctx.args.is_empty() {
                ctx.set_arg(0, init);
            }
            Ok(HookOutcome::Continue)
        }),
    );

    let env = client.env().clone();
    installed += interceptor.register_call(
        "Request",
        CallHooks::new().on_construct(move |ctx| {
            if let Some(raw) = ctx.arg(0).as_str() {
                ctx.set_arg(0, env.encode_url(raw).into());
            }
            Ok(HookOutcome::Continue)
        }),
    );

    let env = client.env().clone();
    installed += interceptor.register_call(
        "Response.redirect",
        CallHooks::new().on_invoke(move |ctx| {
            let raw = ctx.arg(0).to_display_string()?;
            ctx.set_arg(0, env.encode_url(&raw).into());
            Ok(HookOutcome::Continue)
        }),
    );

    let env = client.env().clone();
    installed += interceptor.register_accessor(
        ["Request.prototype.url", "Response.prototype.url"],
        AccessorHooks::new().on_get(move |ctx| match ctx.get()? {
            Value::String(url) => Ok(env.decode_url(&url).into()),
            other => Ok(other),
        }),
    );

    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ObjectRef, Property};
    use crate::test_support::BrowserFixture;

    #[test]
    fn fetch_string_is_encoded() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        fixture.global.invoke("fetch", vec![Value::from("/api/data")]).unwrap();
        let calls = fixture.calls("fetch");
        assert_eq!(
            calls[0][0],
            Value::from(client.encode_url("https://example.com/api/data"))
        );
    }

    #[test]
    fn fetch_url_object_is_encoded() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let url = fixture.url_object("https://b.test/x");
        fixture.global.invoke("fetch", vec![url.into()]).unwrap();
        assert_eq!(
            fixture.calls("fetch")[0][0],
            Value::from(client.encode_url("https://b.test/x"))
        );
    }

    #[test]
    fn fetch_request_object_passes_through() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let request = ObjectRef::new("Request");
        fixture.global.invoke("fetch", vec![request.clone().into()]).unwrap();
        assert_eq!(fixture.calls("fetch")[0][0], Value::from(request));
    }

    #[test]
    fn fetch_identity_behavior_without_rewrite_targets() {
        let fixture = BrowserFixture::window();
        let before = fixture.global.invoke("fetch", Vec::new()).unwrap();
        let client = fixture.client();
        client.hook();
        let after = fixture.global.invoke("fetch", Vec::new()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn request_constructor_encodes_and_getter_decodes() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let request_ctor = fixture.global.get("Request").unwrap();
        let request = request_ctor
            .as_object()
            .unwrap()
            .construct(vec![Value::from("https://b.test/r")], None)
            .unwrap();
        let request = request.as_object().unwrap();
        assert_eq!(
            request.get("_url").unwrap(),
            Value::from(client.encode_url("https://b.test/r"))
        );
        assert_eq!(request.get("url").unwrap(), Value::from("https://b.test/r"));
    }

    #[test]
    fn headers_constructor_rewrites_record() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let init = ObjectRef::plain();
        init.define_property("Content-Security-Policy", Property::data("default-src 'none'"));
        init.define_property("Accept", Property::data("text/html"));
        let headers = fixture
            .global
            .get("Headers")
            .unwrap()
            .as_object()
            .unwrap()
            .construct(vec![init.into()], None)
            .unwrap();
        let stored = headers.as_object().unwrap().get("init").unwrap();
        let stored = stored.as_object().unwrap();
        assert!(!stored.has("content-security-policy"));
        assert_eq!(stored.get("accept").unwrap(), Value::from("text/html"));
    }

    #[test]
    fn headers_constructor_without_init_is_untouched() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let headers = fixture
            .global
            .get("Headers")
            .unwrap()
            .as_object()
            .unwrap()
            .construct(Vec::new(), None)
            .unwrap();
        assert!(headers.as_object().unwrap().get("init").unwrap().is_undefined());
    }

    #[test]
    fn response_redirect_is_encoded() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let response_ctor = fixture.global.get("Response").unwrap();
        let response = response_ctor
            .as_object()
            .unwrap()
            .invoke("redirect", vec![Value::from("https://b.test/login")])
            .unwrap();
        let response = response.as_object().unwrap();
        assert_eq!(
            response.get("_url").unwrap(),
            Value::from(client.encode_url("https://b.test/login"))
        );
        assert_eq!(response.get("url").unwrap(), Value::from("https://b.test/login"));
    }
}
