//! `Document.prototype` URL, domain and cookie accessors.

use crate::client::Client;
use crate::host::Value;
use crate::interception::AccessorHooks;

pub fn install(client: &Client) -> usize {
    let interceptor = client.interceptor();
    let mut installed = 0;

    let env = client.env().clone();
    installed += interceptor.register_accessor(
        ["Document.prototype.URL", "Document.prototype.documentURI"],
        AccessorHooks::new().on_get(move |ctx| match ctx.get()? {
            Value::String(url) => Ok(env.decode_url(&url).into()),
            other => Ok(other),
        }),
    );

    let env = client.env().clone();
    installed += interceptor.register_accessor(
        "Document.prototype.domain",
        AccessorHooks::new().on_get(move |_| {
            let url = env.url()?;
            Ok(url.host_str().unwrap_or_default().into())
        }),
    );

    let read_env = client.env().clone();
    let write_env = client.env().clone();
    installed += interceptor.register_accessor(
        "Document.prototype.cookie",
        AccessorHooks::new()
            .on_get(move |_| {
                let url = read_env.url()?;
                Ok(read_env.cookies().borrow().document_cookie(&url).into())
            })
            .on_set(move |_, value| {
                let url = write_env.url()?;
                let raw = value.to_display_string()?;
                write_env.cookies().borrow_mut().set_document_cookie(&raw, &url);
                Ok(())
            }),
    );

    installed
}

#[cfg(test)]
mod tests {
    use crate::host::Value;
    use crate::test_support::{BrowserFixture, PAGE_URL};

    #[test]
    fn url_accessors_read_real_url() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        assert_eq!(fixture.document.get("URL").unwrap(), Value::from(PAGE_URL));
        assert_eq!(fixture.document.get("documentURI").unwrap(), Value::from(PAGE_URL));
        assert_eq!(fixture.document.get("domain").unwrap(), Value::from("example.com"));
    }

    #[test]
    fn wrapped_document_reads_real_url() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        let doc = client.document_wrapper().unwrap();
        assert_eq!(doc.get("URL").unwrap(), Value::from(PAGE_URL));
    }

    #[test]
    fn cookie_accessor_uses_client_store() {
        let fixture = BrowserFixture::window();
        let client = fixture.client();
        client.hook();
        client.load_cookies("a=1").unwrap();
        fixture.document.set("cookie", Value::from("b=2; Path=/")).unwrap();
        assert_eq!(fixture.document.get("cookie").unwrap(), Value::from("a=1; b=2"));
        assert!(fixture.calls("document.cookie").is_empty());
    }
}
