use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("'{input}' does not match the {expected} pattern")]
    PatternMismatch {
        input: String,
        expected: &'static str,
    },
    #[error("session '{session_id}' must have exactly one keyboard box entry, found {matches}")]
    SessionMatch { session_id: String, matches: usize },
}

impl DomainError {
    pub fn pattern_mismatch<T: Into<String>>(input: T, expected: &'static str) -> Self {
        Self::PatternMismatch {
            input: input.into(),
            expected,
        }
    }
}
