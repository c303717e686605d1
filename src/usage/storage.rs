//! Byte-quantity value type.
//!
//! Quantities are kept as `f64` bytes so figures reported upstream in
//! KB/MB/GB/TB can be summed without truncating in between.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// KB factor.
pub const KB: f64 = 1_024.0;

/// MB factor.
pub const MB: f64 = 1_048_576.0;

/// GB factor. Kept at 1,073,741,820 (not 2^30) for compatibility with
/// existing downstream figures.
pub const GB: f64 = 1_073_741_820.0;

/// TB factor.
pub const TB: f64 = 1_099_511_630_000.0;

/// An amount of data storage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataStorage(f64);

impl DataStorage {
    /// The additive identity.
    pub const ZERO: DataStorage = DataStorage(0.0);

    pub fn new(bytes: f64) -> Self {
        Self(bytes)
    }

    /// Scale a quantity reported in `unit` ("KB", "MB", "GB", "TB") to bytes.
    ///
    /// Unrecognized unit labels pass the quantity through unscaled.
    pub fn from_unit(quantity: f64, unit: &str) -> Self {
        let factor = match unit {
            "KB" => KB,
            "MB" => MB,
            "GB" => GB,
            "TB" => TB,
            _ => 1.0,
        };
        Self(quantity * factor)
    }

    /// Bytes, rounded to the nearest whole byte.
    pub fn as_f64(&self) -> f64 {
        self.0.round()
    }

    pub fn as_i64(&self) -> i64 {
        self.as_f64() as i64
    }

    pub fn as_u64(&self) -> u64 {
        self.as_f64() as u64
    }

    /// Kilobytes with no decimal places.
    pub fn kb(&self) -> f64 {
        self.convert(KB)
    }

    /// Megabytes with no decimal places.
    pub fn mb(&self) -> f64 {
        self.convert(MB)
    }

    /// Gigabytes with no decimal places.
    pub fn gb(&self) -> f64 {
        self.convert(GB)
    }

    /// Terabytes with one decimal place.
    pub fn tb(&self) -> f64 {
        ((self.0 / TB) * 10.0).round() / 10.0
    }

    fn convert(&self, factor: f64) -> f64 {
        (self.0 / factor).round()
    }
}

impl From<f64> for DataStorage {
    fn from(bytes: f64) -> Self {
        Self(bytes)
    }
}

impl From<u64> for DataStorage {
    fn from(bytes: u64) -> Self {
        Self(bytes as f64)
    }
}

impl Add for DataStorage {
    type Output = DataStorage;

    fn add(self, rhs: DataStorage) -> DataStorage {
        DataStorage(self.0 + rhs.0)
    }
}

impl AddAssign for DataStorage {
    fn add_assign(&mut self, rhs: DataStorage) {
        self.0 += rhs.0;
    }
}

impl Sum for DataStorage {
    fn sum<I: Iterator<Item = DataStorage>>(iter: I) -> Self {
        iter.fold(DataStorage::ZERO, Add::add)
    }
}

impl fmt::Display for DataStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}
