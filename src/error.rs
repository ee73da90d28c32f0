use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while asking the provider for rows.
/// An empty result is not an error here; the service reports it separately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid {field} '{value}': expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("{0}")]
    Provider(String),
}

impl FetchError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDate { .. } => "invalid_date",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::Provider(_) => "provider",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_underlying_detail() {
        let err = FetchError::InvalidDate {
            field: "start_date",
            value: "2024-13-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid start_date '2024-13-01': expected YYYY-MM-DD"
        );
        assert_eq!(err.kind(), "invalid_date");

        let err = FetchError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }
}
