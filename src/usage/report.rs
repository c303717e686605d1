//! Usage snapshots for one VDC or a whole fleet.

use super::{DataStorage, FailedVdc, MetricBasis, StorageScope};
use crate::repo::RepoError;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Render a byte quantity with its GB and TB figures.
fn storage_figure<S: Serializer>(value: &DataStorage, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("DataStorage", 3)?;
    s.serialize_field("bytes", &value.as_u64())?;
    s.serialize_field("gb", &value.gb())?;
    s.serialize_field("tb", &value.tb())?;
    s.end()
}

/// Every usage metric of a VDC or a fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Usage {
    /// vCPU speed in MHz; the maximum across VDCs for a fleet
    pub speed_mhz: u64,
    pub core_count: u64,
    #[serde(serialize_with = "storage_figure")]
    pub memory: DataStorage,
    #[serde(serialize_with = "storage_figure")]
    pub storage: DataStorage,
    pub vm_count: u64,
    pub powered_on_vm_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_vm_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_core_count: Option<u64>,
}

impl Usage {
    /// Fold `other` into `self`: figures add up, speed takes the maximum.
    pub fn merge(&mut self, other: &Usage) {
        self.speed_mhz = self.speed_mhz.max(other.speed_mhz);
        self.core_count += other.core_count;
        self.memory += other.memory;
        self.storage += other.storage;
        self.vm_count += other.vm_count;
        self.powered_on_vm_count += other.powered_on_vm_count;
        self.query_vm_count = add_optional(self.query_vm_count, other.query_vm_count);
        self.query_core_count = add_optional(self.query_core_count, other.query_core_count);
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

/// A record kind that could not be fetched for a VDC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricError {
    pub metric: String,
    pub reason: String,
}

impl MetricError {
    pub fn new(metric: &str, error: &RepoError) -> Self {
        Self {
            metric: metric.to_string(),
            reason: error.to_string(),
        }
    }
}

/// Usage of one VDC. Metrics whose records could not be fetched are zero
/// and listed in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VdcReport {
    pub id: String,
    pub name: String,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<MetricError>,
}

impl VdcReport {
    /// The report as a failed-VDC entry, if anything failed.
    pub fn failure(&self) -> Option<FailedVdc> {
        if self.errors.is_empty() {
            return None;
        }
        let reason = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.metric, e.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Some(FailedVdc {
            id: self.id.clone(),
            name: self.name.clone(),
            reason,
        })
    }
}

/// Usage of a fleet of VDCs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReport {
    pub generated_at: DateTime<Utc>,
    pub basis: MetricBasis,
    pub scope: StorageScope,
    pub totals: Usage,
    pub vdcs: Vec<VdcReport>,
    pub failed: Vec<FailedVdc>,
}

impl FleetReport {
    /// Build a report from per-VDC reports, in the given order.
    pub fn from_vdcs(basis: MetricBasis, scope: StorageScope, vdcs: Vec<VdcReport>) -> Self {
        let mut totals = Usage::default();
        for vdc in &vdcs {
            totals.merge(&vdc.usage);
        }
        let failed = vdcs.iter().filter_map(VdcReport::failure).collect();
        Self {
            generated_at: Utc::now(),
            basis,
            scope,
            totals,
            vdcs,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(speed: u64, cores: u64, gb: f64, vms: u64) -> Usage {
        Usage {
            speed_mhz: speed,
            core_count: cores,
            memory: DataStorage::from_unit(gb, "GB"),
            storage: DataStorage::from_unit(gb * 10.0, "GB"),
            vm_count: vms,
            powered_on_vm_count: vms / 2,
            query_vm_count: None,
            query_core_count: None,
        }
    }

    #[test]
    fn test_merge() {
        let mut total = usage(2600, 4, 8.0, 4);
        total.merge(&usage(3100, 16, 64.0, 10));
        assert_eq!(total.speed_mhz, 3100);
        assert_eq!(total.core_count, 20);
        assert_eq!(total.memory.gb(), 72.0);
        assert_eq!(total.storage.gb(), 720.0);
        assert_eq!(total.vm_count, 14);
        assert_eq!(total.powered_on_vm_count, 7);
        assert_eq!(total.query_vm_count, None);
    }

    #[test]
    fn test_add_optional() {
        assert_eq!(add_optional(None, None), None);
        assert_eq!(add_optional(Some(2), None), Some(2));
        assert_eq!(add_optional(Some(2), Some(3)), Some(5));
    }

    #[test]
    fn test_fleet_report_failures() {
        let ok = VdcReport {
            id: "urn:vcloud:vdc:a".to_string(),
            name: "prod".to_string(),
            usage: usage(3100, 16, 16.0, 4),
            errors: Vec::new(),
        };
        let broken = VdcReport {
            id: "urn:vcloud:vdc:b".to_string(),
            name: "dev".to_string(),
            usage: Usage::default(),
            errors: vec![MetricError::new("capacity", &RepoError::Network("reset".to_string()))],
        };
        let report = FleetReport::from_vdcs(
            MetricBasis::Used,
            StorageScope::AllProfiles,
            vec![ok, broken],
        );

        assert_eq!(report.totals.core_count, 16);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "urn:vcloud:vdc:b");
        assert_eq!(report.failed[0].reason, "capacity: network error: reset");
    }

    #[test]
    fn test_serialized_storage_figures() {
        let value = serde_json::to_value(usage(3100, 16, 512.0, 4)).unwrap();
        assert_eq!(value["memory"]["gb"], 512.0);
        assert_eq!(value["memory"]["bytes"], 512u64 * 1_073_741_820);
        assert_eq!(value["storage"]["gb"], 5120.0);
        assert!(value.get("query_vm_count").is_none());
    }
}
