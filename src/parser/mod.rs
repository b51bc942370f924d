pub mod access;
pub mod record;

pub use access::parse_access_line;
pub use record::{AccessRecord, ParsedLine};

/// Parse a whole corpus, keeping raw text aligned with each record.
///
/// Lines that do not match the access-log grammar are skipped silently;
/// only the count is logged.
#[must_use]
pub fn parse_corpus<I, S>(lines: I) -> Vec<ParsedLine>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = Vec::new();
    let mut skipped = 0usize;

    for line in lines {
        let line = line.as_ref();
        match parse_access_line(line) {
            Some(record) => parsed.push(ParsedLine {
                raw: line.trim_end_matches(['\r', '\n']).to_string(),
                record,
            }),
            None => skipped += 1,
        }
    }

    tracing::debug!("Parsed {} access-log lines, skipped {skipped}", parsed.len());
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corpus_skips_garbage() {
        let text = "\
127.0.0.1 - - [10/Oct/2025:13:55:36 +0000] \"GET /a HTTP/1.1\" 200 10 \"-\" \"ua\"\r\n\
this is not an access log line\n\
\n\
127.0.0.1 - - [10/Oct/2025:13:55:37 +0000] \"POST /b HTTP/1.1\" 201 - \"-\" \"ua\"\n";

        let parsed = parse_corpus(text.split_inclusive('\n'));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].record.path, "/a");
        assert!(!parsed[0].raw.ends_with('\r'));
        assert!(!parsed[1].raw.ends_with('\n'));
        assert_eq!(parsed[1].record.method, "POST");
        assert_eq!(parsed[1].record.size, 0);
    }

    #[test]
    fn test_parse_corpus_empty() {
        let parsed = parse_corpus(Vec::<String>::new());
        assert!(parsed.is_empty());
    }
}
