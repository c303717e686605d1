//! Resource repository module.
//!
//! The engine never talks to the control plane directly; it asks a
//! [`ResourceRepository`] for records and computes usage from them.

mod http;
mod memory;
mod models;
mod wire;

pub use http::*;
pub use memory::*;
pub use models::*;

use async_trait::async_trait;
use thiserror::Error;

/// Repository error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepoError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RepoError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RepoError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::Network(e.to_string())
        }
    }
}

/// Source of raw organization, VDC, storage-profile and VM records.
///
/// Implementations own their timeout and retry policy. Every call is a fresh
/// fetch; the engine performs no caching.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Look up an organization by its fully-qualified identifier.
    async fn get_org_by_id(&self, id: &str) -> Result<Org, RepoError>;

    async fn list_vdcs(&self, org: &Org) -> Result<Vec<VdcHandle>, RepoError>;

    async fn get_vdc(&self, org: &Org, id: &str) -> Result<VdcHandle, RepoError>;

    async fn get_vdc_capacity(&self, vdc: &VdcHandle) -> Result<VdcCapacity, RepoError>;

    async fn get_default_storage_profile(
        &self,
        vdc: &VdcHandle,
    ) -> Result<StorageProfile, RepoError>;

    /// All storage profiles attached to the VDC. Fails if any one of them
    /// cannot be fetched.
    async fn list_storage_profiles(
        &self,
        vdc: &VdcHandle,
    ) -> Result<Vec<StorageProfile>, RepoError>;

    async fn list_deployed_vms(&self, vdc: &VdcHandle) -> Result<Vec<VmRecord>, RepoError>;
}
