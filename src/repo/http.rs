//! HTTP repository backed by the control-plane REST API.

use super::models::*;
use super::wire::{AdminOrg, AdminVdc, AdminVdcStorageProfile, QueryResultRecords};
use super::{RepoError, ResourceRepository};
use crate::config::Options;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;

/// Records requested per page from the query service.
const QUERY_PAGE_SIZE: u64 = 128;

const ACCESS_TOKEN_HEADER: &str = "x-vmware-vcloud-access-token";
const LEGACY_TOKEN_HEADER: &str = "x-vcloud-authorization";

/// Credential returned by the login endpoint.
#[derive(Clone)]
enum SessionToken {
    Bearer(String),
    Legacy(String),
}

impl SessionToken {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        value(ACCESS_TOKEN_HEADER)
            .map(SessionToken::Bearer)
            .or_else(|| value(LEGACY_TOKEN_HEADER).map(SessionToken::Legacy))
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            SessionToken::Bearer(token) => {
                request.header(AUTHORIZATION, format!("Bearer {}", token))
            }
            SessionToken::Legacy(token) => request.header(LEGACY_TOKEN_HEADER, token),
        }
    }
}

/// An authenticated session against the control-plane API.
///
/// The session is shared read-only by concurrent fetches.
#[derive(Clone)]
pub struct HttpRepository {
    base: String,
    accept: String,
    token: SessionToken,
    http: reqwest::Client,
}

impl fmt::Debug for HttpRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRepository")
            .field("base", &self.base)
            .field("accept", &self.accept)
            .finish_non_exhaustive()
    }
}

impl HttpRepository {
    /// Log in with the given options and return a session-bound repository.
    pub async fn connect(options: &Options) -> Result<Self, RepoError> {
        let url = options
            .url
            .as_ref()
            .ok_or_else(|| RepoError::Auth("no URL configured".to_string()))?;
        let base = url.as_str().trim_end_matches('/').to_string();
        let accept = format!("application/*+json;version={}", options.api_version);

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|e| RepoError::Network(e.to_string()))?;

        let user = format!("{}@{}", options.username, options.org);
        let response = http
            .post(format!("{}/sessions", base))
            .basic_auth(&user, Some(&options.password))
            .header(ACCEPT, &accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Auth(format!("login as {} returned {}", user, status)));
        }

        let token = SessionToken::from_headers(response.headers())
            .ok_or_else(|| RepoError::Auth("login response carried no session token".to_string()))?;

        tracing::info!("Authenticated with {} as {}", base, user);

        Ok(Self {
            base,
            accept,
            token,
            http,
        })
    }

    fn admin_url(&self, kind: &str, id: &str) -> String {
        format!("{}/admin/{}/{}", self.base, kind, urn_uuid(id))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RepoError> {
        tracing::debug!("GET {}", url);

        let request = self.http.get(url).header(ACCEPT, &self.accept).query(query);
        let response = self.token.apply(request).send().await?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(RepoError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(RepoError::Auth(format!("{} returned {}", url, status)))
            }
            s if !s.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(RepoError::Http {
                    status: s.as_u16(),
                    message,
                });
            }
            _ => {}
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RepoError::Decode(format!("{}: {}", url, e)))
    }

    async fn admin_vdc(&self, vdc: &VdcHandle) -> Result<AdminVdc, RepoError> {
        self.get(&self.admin_url("vdc", &vdc.id), &[]).await
    }
}

/// Whether paging stops after a page of `received` records, with `fetched`
/// records read so far out of `total`.
fn is_last_page(received: usize, fetched: usize, total: u64) -> bool {
    received == 0 || fetched as u64 >= total
}

#[async_trait]
impl ResourceRepository for HttpRepository {
    async fn get_org_by_id(&self, id: &str) -> Result<Org, RepoError> {
        let org: AdminOrg = self.get(&self.admin_url("org", id), &[]).await?;
        Ok(org.into())
    }

    async fn list_vdcs(&self, org: &Org) -> Result<Vec<VdcHandle>, RepoError> {
        Ok(org
            .vdcs
            .iter()
            .map(|r| VdcHandle::from_reference(r, org))
            .collect())
    }

    async fn get_vdc(&self, org: &Org, id: &str) -> Result<VdcHandle, RepoError> {
        let uuid = urn_uuid(id);
        org.vdcs
            .iter()
            .find(|r| urn_uuid(&r.id) == uuid)
            .map(|r| VdcHandle::from_reference(r, org))
            .ok_or_else(|| RepoError::NotFound(format!("VDC '{}' in org '{}'", id, org.name)))
    }

    async fn get_vdc_capacity(&self, vdc: &VdcHandle) -> Result<VdcCapacity, RepoError> {
        Ok(self.admin_vdc(vdc).await?.capacity())
    }

    async fn get_default_storage_profile(
        &self,
        vdc: &VdcHandle,
    ) -> Result<StorageProfile, RepoError> {
        self.list_storage_profiles(vdc)
            .await?
            .into_iter()
            .find(|p| p.default)
            .ok_or_else(|| {
                RepoError::NotFound(format!("default storage profile of VDC '{}'", vdc.name))
            })
    }

    async fn list_storage_profiles(
        &self,
        vdc: &VdcHandle,
    ) -> Result<Vec<StorageProfile>, RepoError> {
        let refs = self.admin_vdc(vdc).await?.storage_profile_refs();
        let mut profiles = Vec::with_capacity(refs.len());
        for r in refs {
            let profile: AdminVdcStorageProfile = self
                .get(&self.admin_url("vdcStorageProfile", &r.href), &[])
                .await?;
            profiles.push(profile.into());
        }
        Ok(profiles)
    }

    async fn list_deployed_vms(&self, vdc: &VdcHandle) -> Result<Vec<VmRecord>, RepoError> {
        let url = format!("{}/query", self.base);
        let filter = format!("vdc=={}/vdc/{}", self.base, urn_uuid(&vdc.id));

        let mut vms = Vec::new();
        let mut page: u64 = 1;
        loop {
            let query = [
                ("type", "adminVM".to_string()),
                ("format", "records".to_string()),
                ("pageSize", QUERY_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
                ("filter", filter.clone()),
            ];
            let records: QueryResultRecords = self.get(&url, &query).await?;
            let received = records.record.len();
            vms.extend(records.record.into_iter().map(VmRecord::from));

            if is_last_page(received, vms.len(), records.total) {
                break;
            }
            page += 1;
        }

        tracing::debug!("VDC {}: fetched {} VM records", vdc.name, vms.len());
        Ok(vms)
    }
}
