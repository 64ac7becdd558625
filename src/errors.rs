use std::fmt::Display;

use thiserror::Error;

/// Failures raised while ingesting the catalog.
///
/// `Transport` and `Decode` come from the HTTP side, `Storage` from the
/// relational store. None of them are retried.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("decode error for {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn transport(url: &str, reason: impl Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(url: &str, reason: impl Display) -> Self {
        Self::Decode {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_url_and_reason() {
        let err = IngestError::transport("https://swapi.test/api/people/1/", "HTTP 404");
        assert_eq!(
            err.to_string(),
            "transport error for https://swapi.test/api/people/1/: HTTP 404"
        );
        let err = IngestError::decode("https://swapi.test/api/people/", "missing count");
        assert!(err.to_string().starts_with("decode error for"));
    }

    #[test]
    fn sqlx_errors_map_to_storage() {
        let err: IngestError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, IngestError::Storage(_)));
    }
}
