//! Bearer token authentication for the HTTP transport.

/// Realm advertised in `WWW-Authenticate` challenges.
pub const REALM: &str = "jqdex";

const BEARER_PREFIX: &str = "bearer ";

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// trimmed from the token. Returns `None` for other schemes or an empty token.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let prefix = header.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = header[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

/// Compare tokens in time independent of where they first differ.
pub fn tokens_match(expected: &str, candidate: &str) -> bool {
    if expected.len() != candidate.len() {
        return false;
    }
    expected
        .bytes()
        .zip(candidate.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Whether a request carrying `header` may proceed.
///
/// No expected token means authentication is disabled.
pub fn authorize(expected: Option<&str>, header: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return true;
    };
    header
        .and_then(extract_bearer_token)
        .is_some_and(|candidate| tokens_match(expected, candidate))
}

/// Value of the `WWW-Authenticate` header sent with a 401.
pub fn challenge() -> String {
    format!("Bearer realm=\"{REALM}\"")
}
