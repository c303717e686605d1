//! In-memory repository backed by fixtures.

use super::models::*;
use super::{RepoError, ResourceRepository};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records served for one VDC. A `None` facet is unavailable and fetching
/// it fails.
#[derive(Debug, Clone)]
pub struct VdcFixture {
    pub handle: VdcHandle,
    pub capacity: Option<VdcCapacity>,
    pub storage_profiles: Option<Vec<StorageProfile>>,
    pub vms: Option<Vec<VmRecord>>,
}

impl VdcFixture {
    pub fn new(id: &str, name: &str, org_id: &str) -> Self {
        Self {
            handle: VdcHandle {
                id: id.to_string(),
                name: name.to_string(),
                href: String::new(),
                org_id: org_id.to_string(),
            },
            capacity: Some(VdcCapacity::default()),
            storage_profiles: Some(Vec::new()),
            vms: Some(Vec::new()),
        }
    }

    pub fn with_capacity(mut self, capacity: VdcCapacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_storage_profiles(mut self, profiles: Vec<StorageProfile>) -> Self {
        self.storage_profiles = Some(profiles);
        self
    }

    pub fn with_vms(mut self, vms: Vec<VmRecord>) -> Self {
        self.vms = Some(vms);
        self
    }

    pub fn without_capacity(mut self) -> Self {
        self.capacity = None;
        self
    }

    pub fn without_storage_profiles(mut self) -> Self {
        self.storage_profiles = None;
        self
    }

    pub fn without_vms(mut self) -> Self {
        self.vms = None;
        self
    }
}

/// A [`ResourceRepository`] serving fixed records.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    orgs: HashMap<String, Org>,
    vdcs: HashMap<String, VdcFixture>,
    fetches: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization. Its VDC references are filled in as VDCs
    /// are registered.
    pub fn with_org(mut self, id: &str, name: &str) -> Self {
        self.orgs.insert(
            id.to_string(),
            Org {
                id: id.to_string(),
                name: name.to_string(),
                href: String::new(),
                vdcs: Vec::new(),
            },
        );
        self
    }

    pub fn with_vdc(mut self, fixture: VdcFixture) -> Self {
        if let Some(org) = self.orgs.get_mut(&fixture.handle.org_id) {
            org.vdcs.push(Reference {
                id: fixture.handle.id.clone(),
                name: fixture.handle.name.clone(),
                href: fixture.handle.href.clone(),
            });
        }
        self.vdcs.insert(fixture.handle.id.clone(), fixture);
        self
    }

    /// Number of fetches served so far, failed ones included.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn fixture(&self, vdc: &VdcHandle) -> Result<&VdcFixture, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.vdcs
            .get(&vdc.id)
            .ok_or_else(|| RepoError::NotFound(format!("VDC '{}'", vdc.id)))
    }
}

fn facet<T: Clone>(value: &Option<T>, what: &str, vdc: &VdcHandle) -> Result<T, RepoError> {
    value
        .clone()
        .ok_or_else(|| RepoError::Unavailable(format!("{} of VDC '{}'", what, vdc.id)))
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    async fn get_org_by_id(&self, id: &str) -> Result<Org, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.orgs
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(format!("org '{}'", id)))
    }

    async fn list_vdcs(&self, org: &Org) -> Result<Vec<VdcHandle>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        org.vdcs
            .iter()
            .map(|r| {
                self.vdcs
                    .get(&r.id)
                    .map(|f| f.handle.clone())
                    .ok_or_else(|| RepoError::NotFound(format!("VDC '{}'", r.id)))
            })
            .collect()
    }

    async fn get_vdc(&self, org: &Org, id: &str) -> Result<VdcHandle, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.vdcs
            .get(id)
            .filter(|f| f.handle.org_id == org.id)
            .map(|f| f.handle.clone())
            .ok_or_else(|| RepoError::NotFound(format!("VDC '{}' in org '{}'", id, org.name)))
    }

    async fn get_vdc_capacity(&self, vdc: &VdcHandle) -> Result<VdcCapacity, RepoError> {
        let fixture = self.fixture(vdc)?;
        facet(&fixture.capacity, "capacity", vdc)
    }

    async fn get_default_storage_profile(
        &self,
        vdc: &VdcHandle,
    ) -> Result<StorageProfile, RepoError> {
        let fixture = self.fixture(vdc)?;
        facet(&fixture.storage_profiles, "storage profiles", vdc)?
            .into_iter()
            .find(|p| p.default)
            .ok_or_else(|| {
                RepoError::NotFound(format!("default storage profile of VDC '{}'", vdc.id))
            })
    }

    async fn list_storage_profiles(
        &self,
        vdc: &VdcHandle,
    ) -> Result<Vec<StorageProfile>, RepoError> {
        let fixture = self.fixture(vdc)?;
        facet(&fixture.storage_profiles, "storage profiles", vdc)
    }

    async fn list_deployed_vms(&self, vdc: &VdcHandle) -> Result<Vec<VmRecord>, RepoError> {
        let fixture = self.fixture(vdc)?;
        facet(&fixture.vms, "VM list", vdc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_org_and_vdc_lookup() {
        let repo = InMemoryRepository::new()
            .with_org("urn:vcloud:org:1", "acme")
            .with_vdc(VdcFixture::new("urn:vcloud:vdc:a", "prod", "urn:vcloud:org:1"))
            .with_vdc(VdcFixture::new("urn:vcloud:vdc:b", "dev", "urn:vcloud:org:1"));

        let org = repo.get_org_by_id("urn:vcloud:org:1").await.unwrap();
        assert_eq!(org.vdcs.len(), 2);

        let vdcs = repo.list_vdcs(&org).await.unwrap();
        assert_eq!(vdcs.len(), 2);
        assert!(vdcs.iter().all(|v| v.org_id == org.id));

        let vdc = repo.get_vdc(&org, "urn:vcloud:vdc:b").await.unwrap();
        assert_eq!(vdc.name, "dev");
        assert!(repo.get_vdc(&org, "urn:vcloud:vdc:zzz").await.is_err());
        assert!(repo.get_org_by_id("urn:vcloud:org:2").await.is_err());
        assert_eq!(repo.fetches(), 5);
    }

    #[tokio::test]
    async fn test_unavailable_facets() {
        let fixture = VdcFixture::new("urn:vcloud:vdc:a", "prod", "urn:vcloud:org:1")
            .without_capacity()
            .without_vms();
        let handle = fixture.handle.clone();
        let repo = InMemoryRepository::new().with_vdc(fixture);

        assert!(matches!(
            repo.get_vdc_capacity(&handle).await,
            Err(RepoError::Unavailable(_))
        ));
        assert!(repo.list_deployed_vms(&handle).await.is_err());
        assert_eq!(repo.list_storage_profiles(&handle).await.unwrap(), Vec::new());
        assert!(matches!(
            repo.get_default_storage_profile(&handle).await,
            Err(RepoError::NotFound(_))
        ));
    }
}
