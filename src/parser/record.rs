/// One access-log line that matched the expected grammar.
///
/// The timestamp is kept verbatim; nothing downstream needs it as a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub client: String,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status: u16,
    /// Response size in bytes, `-` in the log maps to 0
    pub size: u64,
    pub referrer: String,
    pub user_agent: String,
}

impl AccessRecord {
    /// Query string after the first `?`, if the path has one
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, query)| query)
    }
}

/// A raw line paired with the record parsed from it
#[derive(Debug, Clone)]
pub struct ParsedLine {
    /// Raw text with the trailing newline removed
    pub raw: String,
    pub record: AccessRecord,
}
