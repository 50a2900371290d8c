use std::time::Duration;

/// Errors produced while fetching or reading Airly measurements.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection, DNS or TLS failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The body was not JSON, or not shaped like a measurement payload.
    #[error("Protocol error (HTTP {status}): {detail}")]
    Protocol { status: u16, detail: String },

    #[error("Missing field in payload: {0}")]
    MissingField(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the request itself, as opposed to data-shape issues.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(crate::client::REQUEST_TIMEOUT)
        } else {
            Error::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_seconds() {
        let err = Error::Timeout(Duration::from_secs(20));
        assert_eq!(err.to_string(), "Request timed out after 20s");
        assert!(err.is_transport());
    }

    #[test]
    fn protocol_and_missing_field_are_not_transport_errors() {
        let err = Error::Protocol { status: 502, detail: "expected value".into() };
        assert!(err.to_string().contains("HTTP 502"));
        assert!(!err.is_transport());
        assert!(!Error::MissingField("PM10".into()).is_transport());
    }
}
