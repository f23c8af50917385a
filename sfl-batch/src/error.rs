//! Upstream error types
//!
//! Fetch and classifier failures carry their own detail while they travel
//! through the adapters. At the pipeline boundary both fold into
//! [`sfl_common::Error::Upstream`], which aborts the run before any write.

use thiserror::Error;

/// Fetch source errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search API error {0}: {1}")]
    Api(u16, String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<FetchError> for sfl_common::Error {
    fn from(err: FetchError) -> Self {
        sfl_common::Error::Upstream(format!("fetch source: {}", err))
    }
}

impl From<ClassifyError> for sfl_common::Error {
    fn from(err: ClassifyError) -> Self {
        sfl_common::Error::Upstream(format!("classifier: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_fold_into_common_upstream() {
        let err: sfl_common::Error = FetchError::Api(503, "busy".to_string()).into();
        assert!(matches!(err, sfl_common::Error::Upstream(ref msg) if msg.contains("503")));

        let err: sfl_common::Error = ClassifyError::Parse("bad json".to_string()).into();
        assert!(matches!(err, sfl_common::Error::Upstream(_)));
        assert!(!err.is_retryable());
    }
}
