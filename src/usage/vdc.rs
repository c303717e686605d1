//! Per-VDC usage accessor.

use super::report::{MetricError, Usage, VdcReport};
use super::{DataStorage, MetricBasis, StorageScope, VmQuery, MB};
use crate::repo::{
    ComputeCapacity, RepoError, ResourceRepository, StorageProfile, VdcCapacity, VdcHandle,
    VmRecord,
};

use std::fmt;
use std::sync::Arc;

impl MetricBasis {
    fn cpu_mhz(&self, block: &ComputeCapacity) -> f64 {
        match self {
            MetricBasis::Used => block.cpu_used,
            MetricBasis::Allocated => block.cpu_allocated,
        }
    }

    fn memory(&self, block: &ComputeCapacity) -> f64 {
        match self {
            MetricBasis::Used => block.memory_used,
            MetricBasis::Allocated => block.memory_allocated,
        }
    }

    fn storage_mb(&self, profile: &StorageProfile) -> u64 {
        match self {
            MetricBasis::Used => profile.storage_used_mb,
            MetricBasis::Allocated => profile.storage_total_mb,
        }
    }
}

/// Cores in use: summed MHz (truncated per block) divided by the vCPU speed,
/// truncating. Zero when the speed is zero or unknown.
pub fn core_count(capacity: &VdcCapacity, basis: MetricBasis) -> u64 {
    let speed = capacity.speed_mhz.unwrap_or(0);
    if speed == 0 {
        return 0;
    }
    let mhz: u64 = capacity
        .compute_capacity
        .iter()
        .map(|block| basis.cpu_mhz(block) as u64)
        .sum();
    mhz / speed
}

/// Memory across all compute capacity blocks, each scaled by its own unit.
pub fn memory(capacity: &VdcCapacity, basis: MetricBasis) -> DataStorage {
    capacity
        .compute_capacity
        .iter()
        .map(|block| DataStorage::from_unit(basis.memory(block), &block.memory_unit))
        .sum()
}

/// Storage across the given profiles.
pub fn storage(profiles: &[StorageProfile], basis: MetricBasis) -> DataStorage {
    profiles
        .iter()
        .map(|p| DataStorage::new(basis.storage_mb(p) as f64 * MB))
        .sum()
}

/// Usage metrics of one VDC.
///
/// Every metric is computed from a fresh fetch. `try_*` methods report
/// fetch failures; the plain methods log them and return zero.
#[derive(Clone)]
pub struct Vdc {
    handle: VdcHandle,
    repo: Arc<dyn ResourceRepository>,
    basis: MetricBasis,
    scope: StorageScope,
}

impl fmt::Debug for Vdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vdc")
            .field("handle", &self.handle)
            .field("basis", &self.basis)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Vdc {
    pub fn new(handle: VdcHandle, repo: Arc<dyn ResourceRepository>) -> Self {
        Self {
            handle,
            repo,
            basis: MetricBasis::default(),
            scope: StorageScope::default(),
        }
    }

    pub fn with_basis(mut self, basis: MetricBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_scope(mut self, scope: StorageScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn id(&self) -> &str {
        &self.handle.id
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn handle(&self) -> &VdcHandle {
        &self.handle
    }

    pub fn basis(&self) -> MetricBasis {
        self.basis
    }

    pub fn scope(&self) -> StorageScope {
        self.scope
    }

    fn or_zero<T: Default>(&self, metric: &str, result: Result<T, RepoError>) -> T {
        result.unwrap_or_else(|e| {
            tracing::warn!("VDC {}: failed to fetch {}: {}", self.handle.name, metric, e);
            T::default()
        })
    }

    async fn storage_profiles(&self) -> Result<Vec<StorageProfile>, RepoError> {
        match self.scope {
            StorageScope::AllProfiles => self.repo.list_storage_profiles(&self.handle).await,
            StorageScope::DefaultProfile => Ok(vec![
                self.repo.get_default_storage_profile(&self.handle).await?,
            ]),
        }
    }

    async fn counted_vms(&self) -> Result<Vec<VmRecord>, RepoError> {
        let vms = self.repo.list_deployed_vms(&self.handle).await?;
        Ok(vms.into_iter().filter(VmRecord::is_counted).collect())
    }

    /// Configured vCPU speed in MHz; zero when the VDC does not report one.
    pub async fn try_speed(&self) -> Result<u64, RepoError> {
        let capacity = self.repo.get_vdc_capacity(&self.handle).await?;
        Ok(capacity.speed_mhz.unwrap_or(0))
    }

    pub async fn speed(&self) -> u64 {
        self.or_zero("speed", self.try_speed().await)
    }

    /// Cores consumed, derived from CPU MHz and the vCPU speed.
    ///
    /// For example, 49,600 MHz used at a speed of 3,100 MHz is 16 cores.
    pub async fn try_core_count(&self) -> Result<u64, RepoError> {
        let capacity = self.repo.get_vdc_capacity(&self.handle).await?;
        Ok(core_count(&capacity, self.basis))
    }

    pub async fn core_count(&self) -> u64 {
        self.or_zero("core count", self.try_core_count().await)
    }

    pub async fn try_memory(&self) -> Result<DataStorage, RepoError> {
        let capacity = self.repo.get_vdc_capacity(&self.handle).await?;
        Ok(memory(&capacity, self.basis))
    }

    pub async fn memory(&self) -> DataStorage {
        self.or_zero("memory", self.try_memory().await)
    }

    /// Storage over the profiles selected by the storage scope. Fails as a
    /// whole if any profile cannot be fetched.
    pub async fn try_storage(&self) -> Result<DataStorage, RepoError> {
        let profiles = self.storage_profiles().await?;
        Ok(storage(&profiles, self.basis))
    }

    pub async fn storage(&self) -> DataStorage {
        self.or_zero("storage", self.try_storage().await)
    }

    /// Number of VMs that exist in the VDC, templates and deleted VMs
    /// excluded.
    pub async fn try_vm_count(&self) -> Result<u64, RepoError> {
        Ok(self.counted_vms().await?.len() as u64)
    }

    pub async fn vm_count(&self) -> u64 {
        self.or_zero("VM count", self.try_vm_count().await)
    }

    pub async fn try_powered_on_vm_count(&self) -> Result<u64, RepoError> {
        let vms = self.counted_vms().await?;
        Ok(vms.iter().filter(|vm| vm.is_powered_on()).count() as u64)
    }

    pub async fn powered_on_vm_count(&self) -> u64 {
        self.or_zero("powered-on VM count", self.try_powered_on_vm_count().await)
    }

    pub async fn try_vm_count_with_query(&self, query: &VmQuery) -> Result<u64, RepoError> {
        let vms = self.counted_vms().await?;
        Ok(vms.iter().filter(|vm| query.matches(vm)).count() as u64)
    }

    pub async fn vm_count_with_query(&self, query: &VmQuery) -> u64 {
        self.or_zero("VM count", self.try_vm_count_with_query(query).await)
    }

    /// Sum of vCPUs of the VMs matching `query`.
    pub async fn try_vm_core_count_with_query(&self, query: &VmQuery) -> Result<u64, RepoError> {
        let vms = self.counted_vms().await?;
        Ok(vms
            .iter()
            .filter(|vm| query.matches(vm))
            .map(|vm| vm.cpu_count)
            .sum())
    }

    pub async fn vm_core_count_with_query(&self, query: &VmQuery) -> u64 {
        self.or_zero("VM core count", self.try_vm_core_count_with_query(query).await)
    }

    /// Compute every metric with one fetch per record kind.
    pub async fn report(&self, query: Option<&VmQuery>) -> VdcReport {
        let (capacity, profiles, vms) = tokio::join!(
            self.repo.get_vdc_capacity(&self.handle),
            self.storage_profiles(),
            self.counted_vms(),
        );

        let mut usage = Usage::default();
        let mut errors = Vec::new();

        match capacity {
            Ok(capacity) => {
                usage.speed_mhz = capacity.speed_mhz.unwrap_or(0);
                usage.core_count = core_count(&capacity, self.basis);
                usage.memory = memory(&capacity, self.basis);
            }
            Err(e) => errors.push(MetricError::new("capacity", &e)),
        }

        match profiles {
            Ok(profiles) => usage.storage = storage(&profiles, self.basis),
            Err(e) => errors.push(MetricError::new("storage", &e)),
        }

        match vms {
            Ok(vms) => {
                usage.vm_count = vms.len() as u64;
                usage.powered_on_vm_count =
                    vms.iter().filter(|vm| vm.is_powered_on()).count() as u64;
                if let Some(query) = query {
                    let matching = vms.iter().filter(|vm| query.matches(vm));
                    usage.query_vm_count = Some(matching.clone().count() as u64);
                    usage.query_core_count = Some(matching.map(|vm| vm.cpu_count).sum());
                }
            }
            Err(e) => {
                if query.is_some() {
                    usage.query_vm_count = Some(0);
                    usage.query_core_count = Some(0);
                }
                errors.push(MetricError::new("vms", &e));
            }
        }

        for error in &errors {
            tracing::warn!(
                "VDC {}: failed to fetch {}: {}",
                self.handle.name,
                error.metric,
                error.reason
            );
        }

        VdcReport {
            id: self.handle.id.clone(),
            name: self.handle.name.clone(),
            usage,
            errors,
        }
    }
}
