use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Who a Basic credential claims to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claimant {
    /// A subscriber's personal token, by person name.
    Person(String),
    /// A named token, written `+name` in the username field.
    Named(String),
}

/// Extracts the claimant and secret from a Basic auth header.
/// Expects format: Basic base64(username:secret)
pub fn parse_basic_auth(header: &str) -> Option<(Claimant, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }

    let claimant = match username.strip_prefix('+') {
        Some("") => return None,
        Some(name) => Claimant::Named(name.to_string()),
        None => Claimant::Person(username.to_string()),
    };

    Some((claimant, password.to_string()))
}

/// Builds the header value `parse_basic_auth` accepts.
#[must_use]
pub fn basic_auth_header(username: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{secret}")))
}
