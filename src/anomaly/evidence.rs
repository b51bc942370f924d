use crate::config::EngineConfig;

/// Suspicious-token scanner for raw lines.
///
/// Runs on the full lower-cased line, independently of any model score, so
/// a statistically ordinary line can still carry evidence and vice versa.
#[derive(Debug, Clone)]
pub struct EvidenceAnnotator {
    /// Lower-cased, non-empty, in configured order
    tokens: Vec<String>,
}

impl EvidenceAnnotator {
    #[must_use]
    pub fn new(tokens: &[String]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.suspicious_tokens)
    }

    /// Every token found in `line`, in token-list order
    #[must_use]
    pub fn matches(&self, line: &str) -> Vec<&str> {
        let line = line.to_lowercase();
        self.tokens
            .iter()
            .filter(|token| line.contains(token.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Matches joined with commas, empty when nothing matched
    #[must_use]
    pub fn annotate(&self, line: &str) -> String {
        self.matches(line).join(",")
    }
}
