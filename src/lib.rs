//! vcdusage - resource usage reporting for virtual datacenters.
//!
//! Resolve an organization's VDCs through a [`Client`], then read CPU,
//! memory, storage and VM figures from a single [`Vdc`] or a whole fleet of
//! [`Vdcs`]. Records come from a [`ResourceRepository`]: the REST-backed
//! [`HttpRepository`] or the fixture-backed [`InMemoryRepository`].

pub mod client;
pub mod config;
pub mod error;
pub mod repo;
pub mod usage;

pub use client::Client;
pub use config::{parse_url, ConfigError, Options, ReportConfig};
pub use error::Error;
pub use repo::{
    ComputeCapacity, HttpRepository, InMemoryRepository, Org, Reference, RepoError,
    ResourceRepository, StorageProfile, VdcCapacity, VdcFixture, VdcHandle, VmRecord, VmStatus,
};
pub use usage::{
    Aggregate, DataStorage, FailedVdc, FleetReport, MetricBasis, MetricError, StorageScope,
    Usage, Vdc, VdcReport, Vdcs, VmQuery, GB, KB, MB, TB,
};
