use std::sync::LazyLock;

use regex::Regex;

/// One placeholder substitution: a pattern plus its lowercase signature
/// token and uppercase display token
struct Rule {
    regex: Regex,
    signature_token: String,
    template_token: String,
}

impl Rule {
    fn new(pattern: &str, name: &str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("hardwired pattern"),
            signature_token: format!("{{{name}}}"),
            template_token: format!("<{}>", name.to_uppercase()),
        }
    }
}

/// Substitution table in application order. The order is load-bearing:
/// composite tokens (uuids, timestamps, urls) must be replaced while
/// still intact, before the number rule can shred their digits. Each
/// rule rewrites the output of the previous one.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            "uuid",
        ),
        Rule::new(
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
            "timestamp",
        ),
        Rule::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b", "ip"),
        Rule::new(r#"https?://[^\s"']+"#, "url"),
        Rule::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}", "email"),
        // Two segments minimum so "and/or" style prose survives
        Rule::new(r"(?:/[\w.-]+){2,}", "path"),
        Rule::new(r#""[^"]*""#, "string"),
        Rule::new(r"\d+(?:\.\d+)?", "number"),
    ]
});

/// Deterministic reduction of log messages to their fixed shape.
///
/// Two messages that differ only in variable segments (ids, timestamps,
/// addresses, numbers) reduce to the same signature. The reduction is
/// idempotent: placeholder tokens contain nothing any rule matches.
pub struct PatternNormalizer;

impl PatternNormalizer {
    /// Grouping key for a message
    pub fn signature(message: &str) -> String {
        rewrite(message, |rule| &rule.signature_token)
    }

    /// The same reduction rendered with uppercase display tokens
    pub fn template(message: &str) -> String {
        rewrite(message, |rule| &rule.template_token)
    }
}

fn rewrite(message: &str, token: impl Fn(&Rule) -> &str) -> String {
    let mut out = message.to_owned();
    for rule in RULES.iter() {
        if let std::borrow::Cow::Owned(rewritten) = rule.regex.replace_all(&out, token(rule)) {
            out = rewritten;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_and_timestamp_collapse() {
        let a = PatternNormalizer::signature(
            "req 550e8400-e29b-41d4-a716-446655440000 finished at 2024-01-15T10:30:00Z",
        );
        let b = PatternNormalizer::signature(
            "req 123e4567-e89b-12d3-a456-426614174000 finished at 2025-06-01T08:00:05.123Z",
        );
        assert_eq!(a, b);
        assert_eq!(a, "req {uuid} finished at {timestamp}");
    }

    #[test]
    fn test_each_placeholder_class() {
        assert_eq!(
            PatternNormalizer::signature("peer 192.168.0.17 connected"),
            "peer {ip} connected"
        );
        assert_eq!(
            PatternNormalizer::signature("GET https://api.example.com/v2/users?page=3"),
            "GET {url}"
        );
        assert_eq!(
            PatternNormalizer::signature("mail bounced for ops@example.com"),
            "mail bounced for {email}"
        );
        assert_eq!(
            PatternNormalizer::signature("wrote /var/log/app/current.log"),
            "wrote {path}"
        );
        assert_eq!(
            PatternNormalizer::signature(r#"unknown key "shard-7""#),
            "unknown key {string}"
        );
        assert_eq!(
            PatternNormalizer::signature("retry 3 of 5 took 2.5s"),
            "retry {number} of {number} took {number}s"
        );
    }

    #[test]
    fn test_template_uses_uppercase_tokens() {
        assert_eq!(
            PatternNormalizer::template("Database timeout for user 123"),
            "Database timeout for user <NUMBER>"
        );
        assert_eq!(
            PatternNormalizer::template("session 550e8400-e29b-41d4-a716-446655440000"),
            "session <UUID>"
        );
    }

    #[test]
    fn test_idempotent() {
        let messages = [
            "req 550e8400-e29b-41d4-a716-446655440000 from 10.0.0.1 at 2024-01-15 10:30:00",
            r#"POST https://x.io/a?b=1 returned 503 "retry later""#,
            "plain message with no variables",
            "wrote 4096 bytes to /data/wal/segment-12",
        ];
        for message in messages {
            let once = PatternNormalizer::signature(message);
            assert_eq!(PatternNormalizer::signature(&once), once, "for {message:?}");
            let template = PatternNormalizer::template(message);
            assert_eq!(PatternNormalizer::template(&template), template);
        }
    }

    #[test]
    fn test_mixed_message() {
        let signature = PatternNormalizer::signature(
            r#"user 42 (10.1.2.3) uploaded "report.pdf" to /srv/files/inbox in 350ms"#,
        );
        assert_eq!(
            signature,
            "user {number} ({ip}) uploaded {string} to {path} in {number}ms"
        );
    }

    #[test]
    fn test_no_variables_is_untouched() {
        assert_eq!(
            PatternNormalizer::signature("connection pool exhausted"),
            "connection pool exhausted"
        );
    }
}
