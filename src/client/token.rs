//! Bearer token extraction from a login response body.
//!
//! Only the first `"token"` key followed by `:` and a quoted string counts.
//! The rest of the document is not validated, so bodies that are not strict
//! JSON still work as long as that fragment is well formed.

const TOKEN_KEY: &str = "\"token\"";

/// Find the token value in a login response body.
pub fn extract_token(body: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(pos) = body[offset..].find(TOKEN_KEY) {
        let after_key = offset + pos + TOKEN_KEY.len();
        if let Some(token) = value_after_key(&body[after_key..]) {
            return Some(token);
        }
        offset = after_key;
    }
    None
}

fn value_after_key(rest: &str) -> Option<String> {
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    if !rest.starts_with('"') {
        return None;
    }
    // Decode only the string literal; whatever follows it is not inspected.
    serde_json::Deserializer::from_str(rest)
        .into_iter::<String>()
        .next()?
        .ok()
}
