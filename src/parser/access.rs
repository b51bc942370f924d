//! Combined/Common Log Format matcher.

use super::record::AccessRecord;
use fancy_regex::Regex;
use std::sync::LazyLock;

// client ident user [timestamp] "METHOD path protocol" status size "referrer" "user-agent"
static ACCESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<ip>\S+)\s+\S+\s+\S+\s+\[(?P<ts>[^\]]+)\]\s+"(?P<method>\S+)\s+(?P<path>\S+)\s+(?P<proto>[^"]+)"\s+(?P<status>\d{3})\s+(?P<bytes>\S+)\s+"(?P<ref>[^"]*)"\s+"(?P<ua>[^"]*)""#,
    )
    .expect("valid regex literal")
});

/// Parse one access-log line.
///
/// Returns `None` for anything that does not match the grammar, including a
/// size field that is neither `-` nor an unsigned integer.
#[must_use]
pub fn parse_access_line(line: &str) -> Option<AccessRecord> {
    let caps = ACCESS_LINE.captures(line.trim()).ok()??;
    let field = |name: &str| caps.name(name).map_or("", |m| m.as_str());

    let status = field("status").parse::<u16>().ok()?;
    let size = match field("bytes") {
        "-" => 0,
        bytes => bytes.parse::<u64>().ok()?,
    };

    Some(AccessRecord {
        client: field("ip").to_string(),
        timestamp: field("ts").to_string(),
        method: field("method").to_string(),
        path: field("path").to_string(),
        protocol: field("proto").to_string(),
        status,
        size,
        referrer: field("ref").to_string(),
        user_agent: field("ua").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMBINED: &str = r#"192.168.1.10 - frank [10/Oct/2025:13:55:36 +0000] "GET /index.html?lang=en HTTP/1.1" 200 2326 "http://example.com/start" "Mozilla/5.0 (X11; Linux x86_64)""#;

    #[test]
    fn test_combined_format() {
        let record = parse_access_line(COMBINED).expect("should parse combined line");
        assert_eq!(record.client, "192.168.1.10");
        assert_eq!(record.timestamp, "10/Oct/2025:13:55:36 +0000");
        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/index.html?lang=en");
        assert_eq!(record.protocol, "HTTP/1.1");
        assert_eq!(record.status, 200);
        assert_eq!(record.size, 2326);
        assert_eq!(record.referrer, "http://example.com/start");
        assert_eq!(record.user_agent, "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(record.query(), Some("lang=en"));
    }

    #[test]
    fn test_dash_size_is_zero() {
        let raw = r#"10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] "HEAD / HTTP/1.0" 304 - "-" "curl/8.0""#;
        let record = parse_access_line(raw).expect("should parse dash size");
        assert_eq!(record.size, 0);
        assert_eq!(record.status, 304);
        assert_eq!(record.referrer, "-");
    }

    #[test]
    fn test_trailing_newline_and_extra_fields() {
        let raw = format!("{COMBINED} \"extra\" 0.003\n");
        assert!(parse_access_line(&raw).is_some());
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(parse_access_line("").is_none());
        assert!(parse_access_line("Nov 20 14:23:45 INFO Application started").is_none());
        // Missing user agent
        assert!(parse_access_line(
            r#"10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] "GET / HTTP/1.1" 200 12 "-""#
        )
        .is_none());
        // Non-numeric size
        assert!(parse_access_line(
            r#"10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] "GET / HTTP/1.1" 200 big "-" "ua""#
        )
        .is_none());
        // Status must be three digits
        assert!(parse_access_line(
            r#"10.0.0.1 - - [10/Oct/2025:13:55:36 +0000] "GET / HTTP/1.1" 20 12 "-" "ua""#
        )
        .is_none());
    }

    #[test]
    fn test_reparse_is_stable() {
        let first = parse_access_line(COMBINED);
        let second = parse_access_line(COMBINED);
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
