use std::time::Duration;

use thiserror::Error;

/// Failure talking to a weather/social/news provider or the oracle.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Why the synthesizer used knowledge-base data instead of the oracle.
#[derive(Error, Debug)]
pub enum FallbackReason {
    #[error("insufficient signals: {0}")]
    InsufficientSignals(&'static str),

    #[error("no oracle configured")]
    NoOracle,

    #[error("oracle unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("oracle returned an empty response")]
    EmptyResponse,

    #[error("oracle response unusable: {0}")]
    Unusable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = UpstreamError::Api {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "API error (429): rate limited");

        let err = FallbackReason::from(UpstreamError::NotConfigured("news provider"));
        assert_eq!(err.to_string(), "oracle unavailable: news provider is not configured");

        let err = FallbackReason::InsufficientSignals("no social posts");
        assert_eq!(err.to_string(), "insufficient signals: no social posts");
    }
}
