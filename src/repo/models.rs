//! Record types handed out by a [`ResourceRepository`](super::ResourceRepository).

use serde::{Deserialize, Serialize};

/// Prefix of a fully-qualified organization identifier.
pub const ORG_URN_PREFIX: &str = "urn:vcloud:org:";

/// Prefix of a fully-qualified VDC identifier.
pub const VDC_URN_PREFIX: &str = "urn:vcloud:vdc:";

/// A named link to another control-plane object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub href: String,
}

/// An organization as seen by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub href: String,
    /// VDCs belonging to the organization.
    #[serde(default)]
    pub vdcs: Vec<Reference>,
}

/// Identifies one VDC within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdcHandle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub href: String,
    pub org_id: String,
}

impl VdcHandle {
    pub fn from_reference(reference: &Reference, org: &Org) -> Self {
        Self {
            id: reference.id.clone(),
            name: reference.name.clone(),
            href: reference.href.clone(),
            org_id: org.id.clone(),
        }
    }
}

/// One block of a VDC's capacity report.
///
/// CPU figures are in MHz. Memory figures are in `memory_unit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeCapacity {
    pub cpu_used: f64,
    pub cpu_allocated: f64,
    pub memory_used: f64,
    pub memory_allocated: f64,
    pub memory_unit: String,
}

/// Capacity report of a VDC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VdcCapacity {
    /// Configured vCPU speed in MHz, when the VDC reports one.
    pub speed_mhz: Option<u64>,
    pub compute_capacity: Vec<ComputeCapacity>,
}

/// Capacity figures of one storage profile attached to a VDC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageProfile {
    pub id: String,
    pub name: String,
    pub default: bool,
    pub storage_used_mb: u64,
    pub storage_total_mb: u64,
}

/// Lifecycle status of a VM as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmStatus {
    PoweredOn,
    PoweredOff,
    Suspended,
    PartiallyPoweredOff,
    PartiallySuspended,
    Mixed,
    Resolved,
    Deployed,
    Unresolved,
    FailedCreation,
    WaitingForInput,
    InconsistentState,
    #[serde(other)]
    Unknown,
}

impl VmStatus {
    /// Statuses of a VM that exists and counts toward usage.
    pub const VALID: [VmStatus; 8] = [
        VmStatus::PoweredOn,
        VmStatus::PoweredOff,
        VmStatus::Suspended,
        VmStatus::PartiallyPoweredOff,
        VmStatus::PartiallySuspended,
        VmStatus::Mixed,
        VmStatus::Resolved,
        VmStatus::Deployed,
    ];

    pub fn is_valid(&self) -> bool {
        Self::VALID.contains(self)
    }
}

/// A virtual machine record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub guest_os: String,
    pub status: VmStatus,
    pub cpu_count: u64,
    pub is_template: bool,
    pub is_deleted: bool,
}

impl VmRecord {
    /// Whether the VM counts toward the VM total.
    pub fn is_counted(&self) -> bool {
        !self.is_template && !self.is_deleted && self.status.is_valid()
    }

    pub fn is_powered_on(&self) -> bool {
        self.status == VmStatus::PoweredOn
    }
}

/// Prefix `id` with `prefix` unless it already carries it.
pub fn qualify_urn(id: &str, prefix: &str) -> String {
    if id.starts_with(prefix) {
        id.to_string()
    } else {
        format!("{}{}", prefix, id)
    }
}

/// The trailing UUID of a URN or href.
pub fn urn_uuid(id: &str) -> &str {
    let id = id.trim_end_matches('/');
    id.rsplit(|c| c == ':' || c == '/').next().unwrap_or(id)
}
