// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Physical region mapper backing peripheral handler plugins
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests + proptest (mapper, shadow backing, os backing)
//!
//! PUBLIC API: Region, Mapping, RegionMapper, MapperConfig, Backing,
//!             ShadowBacking, OsBacking (backend-os), Status, MapError
//! INVARIANTS: size > 0; base + size never overflows; overlapping requests
//!             are rejected and never alias an existing mapping
//!
//! A handler asks the [`RegionMapper`] to expose a physical address range as
//! read-write memory of the analysis process. The mapper validates the
//! request, checks it against every live [`Mapping`] and only then asks its
//! [`Backing`] to make the range accessible. Mappings live until the mapper
//! is dropped; there is no unmap path.

#![deny(clippy::all, missing_docs)]

mod backing;
mod mapper;
#[cfg(all(feature = "backend-os", unix))]
mod os;

pub use backing::{Backing, ShadowBacking, DEFAULT_SHADOW_BUDGET};
pub use mapper::{MapperConfig, RegionMapper, DEFAULT_MAX_MAPPINGS};
#[cfg(all(feature = "backend-os", unix))]
pub use os::OsBacking;

use core::fmt;

use thiserror::Error;

/// Result alias for mapping requests.
pub type Result<T> = core::result::Result<T, MapError>;

/// Reasons a map request is refused.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MapError {
    /// The request itself is malformed (zero size, overflowing range, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The caller has no rights to map this physical range.
    #[error("permission denied for {0}")]
    PermissionDenied(Region),
    /// The range intersects a mapping that already exists.
    #[error("{requested} overlaps existing mapping {existing}")]
    Overlap {
        /// Range that was asked for.
        requested: Region,
        /// Live mapping (or foreign process mapping) in the way.
        existing: Region,
    },
    /// Mapping table, shadow budget or address space exhausted.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

/// Errors returned when touching memory through the mapper.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The byte range is not covered by a single live mapping.
    #[error("access of {len} bytes at {addr:#x} is not mapped")]
    Unmapped {
        /// First byte of the access.
        addr: u64,
        /// Length of the access.
        len: usize,
    },
}

/// Coarse outcome of a map request, as checked by handler bootstrap code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The range is now readable and writable.
    Success,
    /// See [`MapError::InvalidArgument`].
    InvalidArgument,
    /// See [`MapError::PermissionDenied`].
    PermissionDenied,
    /// See [`MapError::Overlap`].
    Overlap,
    /// See [`MapError::ResourceExhausted`].
    ResourceExhausted,
}

impl Status {
    /// Returns `true` for [`Status::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<&MapError> for Status {
    fn from(err: &MapError) -> Self {
        match err {
            MapError::InvalidArgument(_) => Self::InvalidArgument,
            MapError::PermissionDenied(_) => Self::PermissionDenied,
            MapError::Overlap { .. } => Self::Overlap,
            MapError::ResourceExhausted(_) => Self::ResourceExhausted,
        }
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::from(err),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "SUCCESS",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Overlap => "OVERLAP",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
        };
        f.write_str(text)
    }
}

/// Contiguous range `[base, base + size)` of physical address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    base: u64,
    size: u64,
}

impl Region {
    /// Validates and builds a region.
    pub fn new(base: u64, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(MapError::InvalidArgument("zero-sized region"));
        }
        if base.checked_add(size).is_none() {
            return Err(MapError::InvalidArgument("region overflows the address space"));
        }
        Ok(Self { base, size })
    }

    /// First byte of the region.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Length in bytes, never zero.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Exclusive end address.
    pub fn end(&self) -> u64 {
        // Checked in `new`.
        self.base + self.size
    }

    /// Returns `true` if `addr` falls inside the region.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Returns `true` if all of `[addr, addr + len)` falls inside the region.
    pub fn contains_range(&self, addr: u64, len: u64) -> bool {
        match addr.checked_add(len) {
            Some(end) => addr >= self.base && end <= self.end(),
            None => false,
        }
    }

    /// Returns `true` if the two regions share at least one byte.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.base, self.end())
    }
}

/// Access mode of a mapping. Only read-write mappings are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Readable and writable by the analysis process.
    ReadWrite,
}

/// Snapshot of a live mapping owned by a [`RegionMapper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    region: Region,
    access: Access,
    label: Option<String>,
}

impl Mapping {
    pub(crate) fn new(region: Region, label: Option<String>) -> Self {
        Self { region, access: Access::ReadWrite, label }
    }

    /// The mapped physical range.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Access mode the range was mapped with.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Requester label, e.g. `camera_icp/PERIPHERALS_1`.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
