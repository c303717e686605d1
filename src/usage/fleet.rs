//! Fleet-wide aggregation across VDCs.
//!
//! Each metric fans out one task per VDC and reduces the results on the
//! calling task after all of them are joined.

use super::report::{FleetReport, MetricError, VdcReport};
use super::vdc::Vdc;
use super::{Aggregate, DataStorage, FailedVdc, MetricBasis, StorageScope, VmQuery};
use crate::repo::RepoError;

use std::future::Future;
use tokio::task::JoinSet;

/// A collection of VDCs reported on together.
///
/// Duplicates are not removed; a VDC listed twice counts twice.
#[derive(Debug, Clone, Default)]
pub struct Vdcs {
    vdcs: Vec<Vdc>,
}

impl FromIterator<Vdc> for Vdcs {
    fn from_iter<I: IntoIterator<Item = Vdc>>(iter: I) -> Self {
        Self {
            vdcs: iter.into_iter().collect(),
        }
    }
}

impl Vdcs {
    pub fn new(vdcs: Vec<Vdc>) -> Self {
        Self { vdcs }
    }

    pub fn len(&self) -> usize {
        self.vdcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vdcs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vdc> {
        self.vdcs.iter()
    }

    /// Set the metric basis on every VDC.
    pub fn with_basis(self, basis: MetricBasis) -> Self {
        self.vdcs.into_iter().map(|v| v.with_basis(basis)).collect()
    }

    /// Set the storage scope on every VDC.
    pub fn with_scope(self, scope: StorageScope) -> Self {
        self.vdcs.into_iter().map(|v| v.with_scope(scope)).collect()
    }

    /// Run `fetch` for every VDC on its own task and return the results in
    /// fleet order. A task that does not complete counts as a failure.
    async fn fan_out<T, F, Fut>(&self, metric: &str, fetch: F) -> Vec<Result<T, RepoError>>
    where
        T: Send + 'static,
        F: Fn(Vdc) -> Fut,
        Fut: Future<Output = Result<T, RepoError>> + Send + 'static,
    {
        let mut set = JoinSet::new();
        for (i, vdc) in self.vdcs.iter().enumerate() {
            let task = fetch(vdc.clone());
            set.spawn(async move { (i, task.await) });
        }

        let mut results: Vec<Option<Result<T, RepoError>>> =
            std::iter::repeat_with(|| None).take(self.vdcs.len()).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, result)) => results[i] = Some(result),
                Err(e) => tracing::error!("Fleet: {} task failed: {}", metric, e),
            }
        }

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(RepoError::Unavailable(format!("{} task did not complete", metric)))
                })
            })
            .collect()
    }

    /// Fold per-VDC results with `combine`. Failed VDCs are left out of the
    /// value and listed in the aggregate.
    fn reduce<T>(
        &self,
        metric: &str,
        results: Vec<Result<T, RepoError>>,
        init: T,
        combine: impl Fn(T, T) -> T,
    ) -> Aggregate<T> {
        let mut value = init;
        let mut failed = Vec::new();
        for (vdc, result) in self.vdcs.iter().zip(results) {
            match result {
                Ok(v) => value = combine(value, v),
                Err(e) => {
                    tracing::warn!("VDC {}: failed to fetch {}: {}", vdc.name(), metric, e);
                    failed.push(FailedVdc {
                        id: vdc.id().to_string(),
                        name: vdc.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Aggregate { value, failed }
    }

    async fn sum<F, Fut>(&self, metric: &str, fetch: F) -> Aggregate<u64>
    where
        F: Fn(Vdc) -> Fut,
        Fut: Future<Output = Result<u64, RepoError>> + Send + 'static,
    {
        let results = self.fan_out(metric, fetch).await;
        self.reduce(metric, results, 0, |a, b| a + b)
    }

    async fn sum_storage<F, Fut>(&self, metric: &str, fetch: F) -> Aggregate<DataStorage>
    where
        F: Fn(Vdc) -> Fut,
        Fut: Future<Output = Result<DataStorage, RepoError>> + Send + 'static,
    {
        let results = self.fan_out(metric, fetch).await;
        self.reduce(metric, results, DataStorage::ZERO, |a, b| a + b)
    }

    /// Highest vCPU speed across the fleet, in MHz.
    pub async fn speed_aggregate(&self) -> Aggregate<u64> {
        let results = self
            .fan_out("speed", |vdc| async move { vdc.try_speed().await })
            .await;
        self.reduce("speed", results, 0, u64::max)
    }

    pub async fn speed(&self) -> u64 {
        self.speed_aggregate().await.value
    }

    pub async fn core_count_aggregate(&self) -> Aggregate<u64> {
        self.sum("core count", |vdc| async move { vdc.try_core_count().await })
            .await
    }

    /// Cores consumed by all VDCs, each VDC computed against its own vCPU
    /// speed.
    pub async fn core_count(&self) -> u64 {
        self.core_count_aggregate().await.value
    }

    pub async fn memory_aggregate(&self) -> Aggregate<DataStorage> {
        self.sum_storage("memory", |vdc| async move { vdc.try_memory().await })
            .await
    }

    pub async fn memory(&self) -> DataStorage {
        self.memory_aggregate().await.value
    }

    pub async fn storage_aggregate(&self) -> Aggregate<DataStorage> {
        self.sum_storage("storage", |vdc| async move { vdc.try_storage().await })
            .await
    }

    pub async fn storage(&self) -> DataStorage {
        self.storage_aggregate().await.value
    }

    pub async fn vm_count_aggregate(&self) -> Aggregate<u64> {
        self.sum("VM count", |vdc| async move { vdc.try_vm_count().await })
            .await
    }

    pub async fn vm_count(&self) -> u64 {
        self.vm_count_aggregate().await.value
    }

    pub async fn powered_on_vm_count_aggregate(&self) -> Aggregate<u64> {
        self.sum("powered-on VM count", |vdc| async move {
            vdc.try_powered_on_vm_count().await
        })
        .await
    }

    pub async fn powered_on_vm_count(&self) -> u64 {
        self.powered_on_vm_count_aggregate().await.value
    }

    pub async fn vm_count_with_query_aggregate(&self, query: &VmQuery) -> Aggregate<u64> {
        self.sum("VM count", |vdc| {
            let query = query.clone();
            async move { vdc.try_vm_count_with_query(&query).await }
        })
        .await
    }

    pub async fn vm_count_with_query(&self, query: &VmQuery) -> u64 {
        self.vm_count_with_query_aggregate(query).await.value
    }

    pub async fn vm_core_count_with_query_aggregate(&self, query: &VmQuery) -> Aggregate<u64> {
        self.sum("VM core count", |vdc| {
            let query = query.clone();
            async move { vdc.try_vm_core_count_with_query(&query).await }
        })
        .await
    }

    pub async fn vm_core_count_with_query(&self, query: &VmQuery) -> u64 {
        self.vm_core_count_with_query_aggregate(query).await.value
    }

    /// Compute every metric for every VDC and total them.
    ///
    /// The basis and scope recorded in the report are those of the first
    /// VDC; set them fleet-wide with [`Vdcs::with_basis`] and
    /// [`Vdcs::with_scope`].
    pub async fn report(&self, query: Option<&VmQuery>) -> FleetReport {
        let results = self
            .fan_out("report", |vdc| {
                let query = query.cloned();
                async move { Ok(vdc.report(query.as_ref()).await) }
            })
            .await;

        let reports: Vec<VdcReport> = self
            .vdcs
            .iter()
            .zip(results)
            .map(|(vdc, result)| {
                result.unwrap_or_else(|e| VdcReport {
                    id: vdc.id().to_string(),
                    name: vdc.name().to_string(),
                    usage: Default::default(),
                    errors: vec![MetricError::new("report", &e)],
                })
            })
            .collect();

        let (basis, scope) = self
            .vdcs
            .first()
            .map(|v| (v.basis(), v.scope()))
            .unwrap_or_default();

        tracing::info!(
            "Fleet: reported on {} VDCs ({} with errors)",
            reports.len(),
            reports.iter().filter(|r| !r.errors.is_empty()).count()
        );

        FleetReport::from_vdcs(basis, scope, reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{
        ComputeCapacity, InMemoryRepository, Org, ResourceRepository, StorageProfile, VdcCapacity,
        VdcFixture, VdcHandle, VmRecord, VmStatus,
    };
    use std::sync::Arc;

    const ORG: &str = "urn:vcloud:org:1";

    fn capacity(speed: u64, cpu_used: f64, memory_gb: f64) -> VdcCapacity {
        VdcCapacity {
            speed_mhz: Some(speed),
            compute_capacity: vec![ComputeCapacity {
                cpu_used,
                cpu_allocated: cpu_used,
                memory_used: memory_gb,
                memory_allocated: memory_gb,
                memory_unit: "GB".to_string(),
            }],
        }
    }

    fn profile(used_mb: u64) -> StorageProfile {
        StorageProfile {
            id: "urn:vcloud:vdcstorageProfile:p".to_string(),
            name: "gold".to_string(),
            default: true,
            storage_used_mb: used_mb,
            storage_total_mb: used_mb * 2,
        }
    }

    fn vms(on: usize, off: usize, guest_os: &str) -> Vec<VmRecord> {
        let record = |i: usize, status: VmStatus| VmRecord {
            name: format!("vm-{}", i),
            guest_os: guest_os.to_string(),
            status,
            cpu_count: 2,
            is_template: false,
            is_deleted: false,
        };
        (0..on)
            .map(|i| record(i, VmStatus::PoweredOn))
            .chain((on..on + off).map(|i| record(i, VmStatus::PoweredOff)))
            .collect()
    }

    fn fixture_a() -> VdcFixture {
        VdcFixture::new("urn:vcloud:vdc:a", "prod", ORG)
            .with_capacity(capacity(3100, 49_600.0, 16.0))
            .with_storage_profiles(vec![profile(102_400)])
            .with_vms(vms(3, 1, "Microsoft Windows Server 2022"))
    }

    fn fixture_b() -> VdcFixture {
        VdcFixture::new("urn:vcloud:vdc:b", "dev", ORG)
            .with_capacity(capacity(2600, 20_800.0, 32.0))
            .with_storage_profiles(vec![profile(51_200)])
            .with_vms(vms(2, 4, "Ubuntu Linux (64-bit)"))
    }

    const AB: &[&str] = &["urn:vcloud:vdc:a", "urn:vcloud:vdc:b"];
    const BA: &[&str] = &["urn:vcloud:vdc:b", "urn:vcloud:vdc:a"];

    fn repository(fixtures: Vec<VdcFixture>) -> InMemoryRepository {
        fixtures
            .into_iter()
            .fold(InMemoryRepository::new().with_org(ORG, "acme"), |repo, f| {
                repo.with_vdc(f)
            })
    }

    async fn resolve(repo: Arc<dyn ResourceRepository>, order: &[&str]) -> Vdcs {
        let org = repo.get_org_by_id(ORG).await.unwrap();
        let mut vdcs = Vec::new();
        for id in order {
            let handle = repo.get_vdc(&org, id).await.unwrap();
            vdcs.push(Vdc::new(handle, repo.clone()));
        }
        Vdcs::new(vdcs)
    }

    async fn fleet(fixtures: Vec<VdcFixture>, order: &[&str]) -> Vdcs {
        resolve(Arc::new(repository(fixtures)), order).await
    }

    async fn both(order: &[&str]) -> Vdcs {
        fleet(vec![fixture_a(), fixture_b()], order).await
    }

    /// Serves fixtures but panics when asked for one VDC's capacity.
    struct PanicOnCapacity {
        inner: InMemoryRepository,
        vdc_id: &'static str,
    }

    #[async_trait::async_trait]
    impl ResourceRepository for PanicOnCapacity {
        async fn get_org_by_id(&self, id: &str) -> Result<Org, RepoError> {
            self.inner.get_org_by_id(id).await
        }

        async fn list_vdcs(&self, org: &Org) -> Result<Vec<VdcHandle>, RepoError> {
            self.inner.list_vdcs(org).await
        }

        async fn get_vdc(&self, org: &Org, id: &str) -> Result<VdcHandle, RepoError> {
            self.inner.get_vdc(org, id).await
        }

        async fn get_vdc_capacity(&self, vdc: &VdcHandle) -> Result<VdcCapacity, RepoError> {
            if vdc.id == self.vdc_id {
                panic!("capacity of {} exploded", vdc.id);
            }
            self.inner.get_vdc_capacity(vdc).await
        }

        async fn get_default_storage_profile(
            &self,
            vdc: &VdcHandle,
        ) -> Result<StorageProfile, RepoError> {
            self.inner.get_default_storage_profile(vdc).await
        }

        async fn list_storage_profiles(
            &self,
            vdc: &VdcHandle,
        ) -> Result<Vec<StorageProfile>, RepoError> {
            self.inner.list_storage_profiles(vdc).await
        }

        async fn list_deployed_vms(&self, vdc: &VdcHandle) -> Result<Vec<VmRecord>, RepoError> {
            self.inner.list_deployed_vms(vdc).await
        }
    }

    #[tokio::test]
    async fn test_sums_and_max() {
        let vdcs = both(AB).await;

        assert_eq!(vdcs.speed().await, 3100);
        assert_eq!(vdcs.core_count().await, 16 + 8);
        assert_eq!(vdcs.memory().await.gb(), 48.0);
        assert_eq!(vdcs.storage().await.mb(), 153_600.0);
        assert_eq!(vdcs.vm_count().await, 10);
        assert_eq!(vdcs.powered_on_vm_count().await, 5);
    }

    #[tokio::test]
    async fn test_order_does_not_matter() {
        let ab = both(AB).await;
        let ba = both(BA).await;

        assert_eq!(ab.core_count().await, ba.core_count().await);
        assert_eq!(ab.memory().await, ba.memory().await);
        assert_eq!(ab.storage().await, ba.storage().await);
        assert_eq!(ab.vm_count().await, ba.vm_count().await);
    }

    #[tokio::test]
    async fn test_fleet_equals_sum_of_parts() {
        let ab = both(AB).await;
        let a = fleet(vec![fixture_a()], &["urn:vcloud:vdc:a"]).await;
        let b = fleet(vec![fixture_b()], &["urn:vcloud:vdc:b"]).await;

        assert_eq!(ab.core_count().await, a.core_count().await + b.core_count().await);
        assert_eq!(ab.memory().await, a.memory().await + b.memory().await);
        assert_eq!(ab.storage().await, a.storage().await + b.storage().await);
        assert_eq!(ab.vm_count().await, a.vm_count().await + b.vm_count().await);
    }

    #[tokio::test]
    async fn test_duplicates_count_twice() {
        let vdcs = fleet(vec![fixture_a()], &["urn:vcloud:vdc:a", "urn:vcloud:vdc:a"]).await;
        assert_eq!(vdcs.len(), 2);
        assert_eq!(vdcs.core_count().await, 32);
        assert_eq!(vdcs.vm_count().await, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_large_fleet_on_worker_threads() {
        let order = vec!["urn:vcloud:vdc:a"; 64];
        let vdcs = fleet(vec![fixture_a()], &order).await;

        let cores = vdcs.core_count_aggregate().await;
        assert!(cores.is_complete());
        assert_eq!(cores.value, 64 * 16);
        assert_eq!(vdcs.memory().await.gb(), 64.0 * 16.0);
        assert_eq!(vdcs.vm_count().await, 64 * 4);
        assert_eq!(vdcs.powered_on_vm_count().await, 64 * 3);
        assert_eq!(vdcs.report(None).await.totals.core_count, 64 * 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_task_fails_only_its_vdc() {
        let repo = PanicOnCapacity {
            inner: repository(vec![fixture_a(), fixture_b()]),
            vdc_id: "urn:vcloud:vdc:b",
        };
        let vdcs = resolve(Arc::new(repo), AB).await;

        let cores = vdcs.core_count_aggregate().await;
        assert_eq!(cores.value, 16);
        assert_eq!(cores.failed.len(), 1);
        assert_eq!(cores.failed[0].id, "urn:vcloud:vdc:b");
        assert_eq!(
            cores.failed[0].reason,
            "unavailable: core count task did not complete"
        );

        // Metrics that never touch capacity are unaffected
        let count = vdcs.vm_count_aggregate().await;
        assert!(count.is_complete());
        assert_eq!(count.value, 10);

        let report = vdcs.report(None).await;
        assert_eq!(report.vdcs.len(), 2);
        assert_eq!(report.totals.core_count, 16);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "urn:vcloud:vdc:b");
        assert!(report.failed[0].reason.contains("report task did not complete"));
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let vdcs = Vdcs::default();
        assert!(vdcs.is_empty());
        assert_eq!(vdcs.core_count().await, 0);
        assert_eq!(vdcs.memory().await, DataStorage::ZERO);
        assert_eq!(vdcs.speed().await, 0);
        assert!(vdcs.report(None).await.vdcs.is_empty());
    }

    #[tokio::test]
    async fn test_failed_vdc_is_reported_not_fatal() {
        let vdcs = fleet(vec![fixture_a(), fixture_b().without_capacity()], AB).await;

        let cores = vdcs.core_count_aggregate().await;
        assert_eq!(cores.value, 16);
        assert!(!cores.is_complete());
        assert_eq!(cores.failed.len(), 1);
        assert_eq!(cores.failed[0].id, "urn:vcloud:vdc:b");
        assert_eq!(cores.failed[0].name, "dev");

        let memory = vdcs.memory_aggregate().await;
        assert_eq!(memory.value.gb(), 16.0);

        let count = vdcs.vm_count_aggregate().await;
        assert!(count.is_complete());
        assert_eq!(count.value, 10);
    }

    #[tokio::test]
    async fn test_query_aggregates() {
        let vdcs = both(AB).await;

        assert_eq!(
            vdcs.vm_count_with_query(&VmQuery::all()).await,
            vdcs.vm_count().await
        );

        let windows = VmQuery::all().guest_os_containing("WINDOWS");
        assert_eq!(vdcs.vm_count_with_query(&windows).await, 4);
        assert_eq!(vdcs.vm_core_count_with_query(&windows).await, 8);

        let windows_on = windows.powered_on();
        assert_eq!(vdcs.vm_count_with_query(&windows_on).await, 3);
    }

    #[tokio::test]
    async fn test_basis_applies_fleet_wide() {
        let vdcs = both(AB)
            .await
            .with_basis(MetricBasis::Allocated)
            .with_scope(StorageScope::DefaultProfile);
        assert!(vdcs.iter().all(|v| v.basis() == MetricBasis::Allocated));
        assert_eq!(vdcs.storage().await.mb(), 307_200.0);
    }

    #[tokio::test]
    async fn test_report_totals() {
        let vdcs = fleet(vec![fixture_a(), fixture_b().without_vms()], AB).await;
        let query = VmQuery::all().powered_on();
        let report = vdcs.report(Some(&query)).await;

        assert_eq!(report.vdcs.len(), 2);
        assert_eq!(report.vdcs[0].id, "urn:vcloud:vdc:a");
        assert_eq!(report.totals.speed_mhz, 3100);
        assert_eq!(report.totals.core_count, 24);
        assert_eq!(report.totals.memory.gb(), 48.0);
        assert_eq!(report.totals.vm_count, 4);
        assert_eq!(report.totals.query_vm_count, Some(3));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "urn:vcloud:vdc:b");
        assert_eq!(report.basis, MetricBasis::Used);
    }
}
