//! Structural errors.
//!
//! These abort the call that produced them. Per-metric fetch failures are
//! reported through [`RepoError`] and fleet aggregates instead.

use crate::config::ConfigError;
use crate::repo::RepoError;

use thiserror::Error;

/// Errors returned by [`Client`](crate::Client).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("option validation failed: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to authenticate with vCloud host '{url}': {source}")]
    Authenticate { url: String, source: RepoError },
    #[error("failed to retrieve org '{org_id}': {source}")]
    Org { org_id: String, source: RepoError },
    #[error("failed to retrieve VDC '{vdc_id}' for org '{org_id}': {source}")]
    Vdc {
        vdc_id: String,
        org_id: String,
        source: RepoError,
    },
    #[error("failed to retrieve VDCs for org '{org_id}': {source}")]
    Vdcs { org_id: String, source: RepoError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_argument() {
        let err = Error::Org {
            org_id: "urn:vcloud:org:abc".to_string(),
            source: RepoError::NotFound("org 'urn:vcloud:org:abc'".to_string()),
        };
        assert!(err.to_string().starts_with("failed to retrieve org 'urn:vcloud:org:abc'"));

        let err = Error::Vdc {
            vdc_id: "urn:vcloud:vdc:1".to_string(),
            org_id: "urn:vcloud:org:abc".to_string(),
            source: RepoError::Network("timed out".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to retrieve VDC 'urn:vcloud:vdc:1' for org 'urn:vcloud:org:abc': network error: timed out"
        );

        let err: Error = ConfigError::NoUsername.into();
        assert_eq!(err.to_string(), "option validation failed: username required");
    }
}
