//! JSON payloads of the control-plane REST API and their mapping onto
//! repository records.

use super::models::*;
use serde::Deserialize;

/// A field the API renders as a single object or as an array of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireReference {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl WireReference {
    /// Convert to a [`Reference`], deriving the ID from the href when the
    /// API leaves it out.
    pub(crate) fn into_reference(self, urn_prefix: &str) -> Reference {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => qualify_urn(urn_uuid(&self.href), urn_prefix),
        };
        Reference {
            id,
            name: self.name,
            href: self.href,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VdcReferences {
    #[serde(default)]
    pub vdc: Vec<WireReference>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminOrg {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub vdcs: Option<VdcReferences>,
}

impl From<AdminOrg> for Org {
    fn from(org: AdminOrg) -> Self {
        let vdcs = org
            .vdcs
            .unwrap_or_default()
            .vdc
            .into_iter()
            .map(|r| r.into_reference(VDC_URN_PREFIX))
            .collect();
        Org {
            id: org.id,
            name: org.name,
            href: org.href,
            vdcs,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CapacityWithUsage {
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub allocated: f64,
    #[serde(default)]
    pub used: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireComputeCapacity {
    #[serde(default)]
    pub cpu: CapacityWithUsage,
    #[serde(default)]
    pub memory: CapacityWithUsage,
}

impl From<WireComputeCapacity> for ComputeCapacity {
    fn from(c: WireComputeCapacity) -> Self {
        ComputeCapacity {
            cpu_used: c.cpu.used,
            cpu_allocated: c.cpu.allocated,
            memory_used: c.memory.used,
            memory_allocated: c.memory.allocated,
            memory_unit: c.memory.units,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorageProfileReferences {
    #[serde(default)]
    pub vdc_storage_profile: Vec<WireReference>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminVdc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub href: String,
    #[serde(default, rename = "vCpuInMhz2")]
    pub v_cpu_in_mhz2: Option<f64>,
    #[serde(default)]
    pub compute_capacity: OneOrMany<WireComputeCapacity>,
    #[serde(default)]
    pub vdc_storage_profiles: Option<StorageProfileReferences>,
}

impl AdminVdc {
    pub(crate) fn capacity(&self) -> VdcCapacity {
        VdcCapacity {
            speed_mhz: self.v_cpu_in_mhz2.map(|s| s as u64),
            compute_capacity: self
                .compute_capacity
                .clone()
                .into_vec()
                .into_iter()
                .map(ComputeCapacity::from)
                .collect(),
        }
    }

    pub(crate) fn storage_profile_refs(&self) -> Vec<Reference> {
        self.vdc_storage_profiles
            .clone()
            .unwrap_or_default()
            .vdc_storage_profile
            .into_iter()
            .map(|r| r.into_reference("urn:vcloud:vdcstorageProfile:"))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminVdcStorageProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: bool,
    /// Capacity limit in MB.
    #[serde(default)]
    pub limit: u64,
    #[serde(default, rename = "storageUsedMB")]
    pub storage_used_mb: u64,
}

impl From<AdminVdcStorageProfile> for StorageProfile {
    fn from(p: AdminVdcStorageProfile) -> Self {
        StorageProfile {
            id: p.id,
            name: p.name,
            default: p.default,
            storage_used_mb: p.storage_used_mb,
            storage_total_mb: p.limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResultVmRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub guest_os: String,
    pub status: VmStatus,
    #[serde(default)]
    pub number_of_cpus: u64,
    #[serde(default, rename = "isVAppTemplate")]
    pub is_vapp_template: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl From<QueryResultVmRecord> for VmRecord {
    fn from(r: QueryResultVmRecord) -> Self {
        VmRecord {
            name: r.name,
            guest_os: r.guest_os,
            status: r.status,
            cpu_count: r.number_of_cpus,
            is_template: r.is_vapp_template,
            is_deleted: r.is_deleted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResultRecords {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub record: Vec<QueryResultVmRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_org_references() {
        let json = r#"{
            "id": "urn:vcloud:org:0001",
            "name": "acme",
            "href": "https://vcd.example.com/api/admin/org/0001",
            "vdcs": {"vdc": [
                {"href": "https://vcd.example.com/api/vdc/aaaa", "name": "prod"},
                {"href": "https://vcd.example.com/api/vdc/bbbb", "id": "urn:vcloud:vdc:bbbb", "name": "dev"}
            ]}
        }"#;
        let org: Org = serde_json::from_str::<AdminOrg>(json).unwrap().into();
        assert_eq!(org.vdcs.len(), 2);
        assert_eq!(org.vdcs[0].id, "urn:vcloud:vdc:aaaa");
        assert_eq!(org.vdcs[1].id, "urn:vcloud:vdc:bbbb");
        assert_eq!(org.vdcs[1].name, "dev");
    }

    #[test]
    fn test_admin_vdc_single_capacity_block() {
        let json = r#"{
            "id": "urn:vcloud:vdc:aaaa",
            "name": "prod",
            "vCpuInMhz2": 3100,
            "computeCapacity": {
                "cpu": {"units": "MHz", "allocated": 62000, "used": 49600},
                "memory": {"units": "MB", "allocated": 65536, "used": 16384}
            },
            "vdcStorageProfiles": {"vdcStorageProfile": [
                {"href": "https://vcd.example.com/api/vdcStorageProfile/cccc", "name": "Gold"}
            ]}
        }"#;
        let vdc: AdminVdc = serde_json::from_str(json).unwrap();
        let capacity = vdc.capacity();
        assert_eq!(capacity.speed_mhz, Some(3100));
        assert_eq!(capacity.compute_capacity.len(), 1);
        assert_eq!(capacity.compute_capacity[0].cpu_used, 49600.0);
        assert_eq!(capacity.compute_capacity[0].memory_unit, "MB");
        let refs = vdc.storage_profile_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "Gold");
    }

    #[test]
    fn test_admin_vdc_without_speed() {
        let vdc: AdminVdc = serde_json::from_str(r#"{"name": "empty"}"#).unwrap();
        let capacity = vdc.capacity();
        assert_eq!(capacity.speed_mhz, None);
        assert!(capacity.compute_capacity.is_empty());
        assert!(vdc.storage_profile_refs().is_empty());
    }

    #[test]
    fn test_vm_query_records() {
        let json = r#"{
            "total": 2,
            "record": [
                {"name": "dc-01", "guestOs": "Microsoft Windows Server 2022", "status": "POWERED_ON",
                 "numberOfCpus": 4, "isVAppTemplate": false, "isDeleted": false},
                {"name": "tmpl", "guestOs": "Ubuntu", "status": "POWERED_OFF",
                 "numberOfCpus": 2, "isVAppTemplate": true}
            ]
        }"#;
        let page: QueryResultRecords = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 2);
        let vms: Vec<VmRecord> = page.record.into_iter().map(VmRecord::from).collect();
        assert_eq!(vms[0].cpu_count, 4);
        assert_eq!(vms[0].status, VmStatus::PoweredOn);
        assert!(vms[1].is_template);
        assert!(!vms[1].is_deleted);
    }
}
