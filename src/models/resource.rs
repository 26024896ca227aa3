//! Resource model.
//!
//! A resource is a named capacity dimension of a node (CPU, RAM, disk, ...).
//! Allocations, capacities and demands are all vectors indexed by the
//! resource's position in the scenario's resource list.

use serde::{Deserialize, Serialize};

/// A capacity dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name (e.g. "CPU").
    pub name: String,
    /// Measurement unit (e.g. "MIPS", "GB").
    pub unit: String,
    /// Smallest meaningful increment of an allocation.
    pub precision: f64,
}

impl Resource {
    /// Creates a resource with unit precision.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            precision: 1.0,
        }
    }

    /// Processing capacity (MIPS).
    pub fn cpu() -> Self {
        Self::new("CPU", "MIPS")
    }

    /// Memory (MB).
    pub fn ram() -> Self {
        Self::new("RAM", "MB")
    }

    /// Storage (GB).
    pub fn disk() -> Self {
        Self::new("DISK", "GB")
    }

    /// Sets the allocation precision.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Whether this is the processing dimension.
    pub fn is_cpu(&self) -> bool {
        self.name.eq_ignore_ascii_case("cpu")
    }
}
