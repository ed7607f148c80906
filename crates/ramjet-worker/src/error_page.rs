//! Error page served when a page navigation cannot be fetched.
//!
//! The markup is static. Dynamic values are handed to an inline script as
//! JSON string literals and assigned to `value`/`textContent`, never spliced
//! into markup.

/// Page template. `{{SCRIPT}}` is replaced with the populating script.
const ERROR_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8" />
    <title>Error</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: white;
            color: #202124;
            max-width: 640px;
            margin: 2rem auto;
            padding: 0 1rem;
        }
        textarea {
            width: 100%;
            font-family: monospace;
        }
    </style>
</head>
<body>
    <h1 id="errorTitle">Error processing your request</h1>
    <hr />
    <p>Failed to load <b id="fetchedURL"></b></p>
    <p id="errorMessage">Internal Server Error</p>
    <textarea id="errorTrace" cols="40" rows="10" readonly></textarea>
    <p>Try:</p>
    <ul>
        <li>Checking your internet connection</li>
        <li>Verifying you entered the correct address</li>
        <li>Clearing the site data</li>
        <li>Contacting <b class="hostname"></b>'s administrator</li>
        <li>Verifying the server isn't censored</li>
    </ul>
    <p>If you're the administrator of <b id="hostname" class="hostname"></b>, try:</p>
    <ul>
        <li>Restarting your server</li>
        <li>Updating Ramjet</li>
    </ul>
    <button id="reload">Reload</button>
    <hr />
    <p><i>Ramjet v<span id="version"></span></i></p>
    <script>{{SCRIPT}}</script>
</body>
</html>"#;

/// Renders the error page.
///
/// `trace` is the error text, `fetched_url` the decoded URL that failed and
/// `hostname` the proxy's own host name.
pub fn render(trace: &str, fetched_url: &str, hostname: &str) -> String {
    let script = format!(
        r#"
        document.getElementById("errorTrace").value = {trace};
        document.getElementById("fetchedURL").textContent = {url};
        for (const node of document.querySelectorAll(".hostname")) node.textContent = {host};
        document.getElementById("reload").addEventListener("click", () => location.reload());
        document.getElementById("version").textContent = {version};
    "#,
        trace = script_string(trace),
        url = script_string(fetched_url),
        host = script_string(hostname),
        version = script_string(env!("CARGO_PKG_VERSION")),
    );
    ERROR_PAGE_HTML.replace("{{SCRIPT}}", &script)
}

/// Encodes `value` as a JSON string literal that is safe inside a
/// `<script>` element.
fn script_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
