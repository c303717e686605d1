//! Org and VDC resolution.

use crate::config::Options;
use crate::error::Error;
use crate::repo::{qualify_urn, HttpRepository, Org, ResourceRepository, ORG_URN_PREFIX};
use crate::usage::{Vdc, Vdcs};

use std::fmt;
use std::sync::Arc;

/// A session-bound handle that resolves organizations and their VDCs.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone)]
pub struct Client {
    repo: Arc<dyn ResourceRepository>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Validate `options`, log in and return a client bound to the session.
    pub async fn new(options: Options) -> Result<Self, Error> {
        options.validate()?;

        let repo = HttpRepository::connect(&options)
            .await
            .map_err(|source| Error::Authenticate {
                url: options
                    .url
                    .as_ref()
                    .map(|u| u.to_string())
                    .unwrap_or_default(),
                source,
            })?;

        Ok(Self::with_repository(Arc::new(repo)))
    }

    /// Bind a client to an existing repository.
    pub fn with_repository(repo: Arc<dyn ResourceRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn ResourceRepository> {
        &self.repo
    }

    /// Look up an organization. A bare ID is qualified as an org URN.
    pub async fn org(&self, org_id: &str) -> Result<Org, Error> {
        let org_id = qualify_urn(org_id, ORG_URN_PREFIX);
        self.repo
            .get_org_by_id(&org_id)
            .await
            .map_err(|source| Error::Org { org_id, source })
    }

    /// Usage accessor for one VDC of an organization.
    pub async fn vdc(&self, org_id: &str, vdc_id: &str) -> Result<Vdc, Error> {
        let org = self.org(org_id).await?;
        let handle = self
            .repo
            .get_vdc(&org, vdc_id)
            .await
            .map_err(|source| Error::Vdc {
                vdc_id: vdc_id.to_string(),
                org_id: org.id.clone(),
                source,
            })?;
        tracing::debug!("Resolved VDC {} ({}) in org {}", handle.name, handle.id, org.name);
        Ok(Vdc::new(handle, self.repo.clone()))
    }

    /// Usage aggregator over every VDC of an organization.
    pub async fn vdcs(&self, org_id: &str) -> Result<Vdcs, Error> {
        let org = self.org(org_id).await?;
        let handles = self.repo.list_vdcs(&org).await.map_err(|source| Error::Vdcs {
            org_id: org.id.clone(),
            source,
        })?;
        tracing::info!("Org {} has {} VDCs", org.name, handles.len());
        Ok(handles
            .into_iter()
            .map(|handle| Vdc::new(handle, self.repo.clone()))
            .collect())
    }
}
