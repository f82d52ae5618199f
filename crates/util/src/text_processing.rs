use once_cell::sync::Lazy;
use regex::Regex;

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+(?: [\w\-\.=:/+]+)?)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r#"(?i)("(?:access_token|refresh_token|token)"\s*:\s*)"[^"]*""#,
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
///
/// Used before logging remote error bodies and credential payloads.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for re in SENSITIVE_PATTERNS.iter() {
        redacted = re
            .replace_all(&redacted, |caps: &regex::Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{}<redacted>", prefix)
            })
            .to_string();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_headers_and_assignments() {
        assert_eq!(redact_sensitive("Authorization: Bearer abc123"), "Authorization: <redacted>");
        assert_eq!(redact_sensitive("API_TOKEN=xyz other=1"), "API_TOKEN=<redacted> other=1");
        assert_eq!(
            redact_sensitive(r#"{"access_token": "abc", "scope": "s"}"#),
            r#"{"access_token": <redacted>, "scope": "s"}"#
        );
    }
}
