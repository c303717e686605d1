//! Usage aggregation module.
//!
//! Per-VDC metric accessors, fleet-wide aggregation and the value types
//! they produce.

mod fleet;
mod query;
mod report;
mod storage;
mod vdc;

pub use fleet::*;
pub use query::*;
pub use report::*;
pub use storage::*;
pub use vdc::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which capacity figures a metric reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricBasis {
    /// Capacity in use
    #[default]
    Used,
    /// Capacity allocated to the VDC
    Allocated,
}

impl FromStr for MetricBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "used" => Ok(MetricBasis::Used),
            "allocated" => Ok(MetricBasis::Allocated),
            other => Err(format!("unknown metric basis: {}", other)),
        }
    }
}

impl fmt::Display for MetricBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricBasis::Used => f.write_str("used"),
            MetricBasis::Allocated => f.write_str("allocated"),
        }
    }
}

/// Which storage profiles count toward a VDC's storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScope {
    /// Every profile attached to the VDC
    #[default]
    AllProfiles,
    /// Only the VDC's default profile
    DefaultProfile,
}

impl FromStr for StorageScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_profiles" => Ok(StorageScope::AllProfiles),
            "default" | "default_profile" => Ok(StorageScope::DefaultProfile),
            other => Err(format!("unknown storage scope: {}", other)),
        }
    }
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageScope::AllProfiles => f.write_str("all_profiles"),
            StorageScope::DefaultProfile => f.write_str("default_profile"),
        }
    }
}

/// A VDC whose contribution to an aggregate could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedVdc {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// A fleet-wide figure together with the VDCs left out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate<T> {
    pub value: T,
    pub failed: Vec<FailedVdc>,
}

impl<T> Aggregate<T> {
    /// Whether every VDC contributed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
