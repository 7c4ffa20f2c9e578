// Log redaction
//
// Request URLs embed installation ids and gateway serials; error bodies
// can echo bearer tokens. Everything logged by this crate passes through
// `redact` first.

use std::sync::LazyLock;

use regex::Regex;

static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Bearer\s+[A-Za-z0-9\-_.~+/]+=*").expect("static regex")
});

static GATEWAY_SERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(gateways/|"serial":\s?"?|Serial: )([0-9]{16})"#).expect("static regex")
});

static INSTALLATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(installations/|"installationId":\s?|ID: )([0-9]{4,10})"#).expect("static regex")
});

/// Mask bearer tokens, gateway serials and installation ids in `text`.
pub fn redact(text: &str) -> String {
    let text = BEARER.replace_all(text, "Bearer ***");
    let text = GATEWAY_SERIAL.replace_all(&text, "${1}****************");
    let text = INSTALLATION_ID.replace_all(&text, "${1}****");
    text.into_owned()
}
