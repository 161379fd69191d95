// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use log::{debug, warn};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::backing::{Backing, ShadowBacking, DEFAULT_SHADOW_BUDGET};
use crate::{AccessError, MapError, Mapping, Region, Result, Status};

/// Default capacity of the mapping table.
pub const DEFAULT_MAX_MAPPINGS: usize = 256;

/// Tunables for a [`RegionMapper`], usually read from the `[mapper]` table
/// of the runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Upper bound on live mappings.
    pub max_mappings: usize,
    /// Byte budget of the shadow backing built by [`RegionMapper::shadow`].
    pub shadow_budget: u64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self { max_mappings: DEFAULT_MAX_MAPPINGS, shadow_budget: DEFAULT_SHADOW_BUDGET }
    }
}

/// Owns every live mapping and the backing that provides the memory.
///
/// All state sits behind one lock: the overlap query, the backing call and
/// the table insert of a request happen in a single critical section, so
/// concurrent requests for the same range cannot both succeed.
pub struct RegionMapper<B: Backing> {
    config: MapperConfig,
    inner: Mutex<Inner<B>>,
}

struct Inner<B> {
    table: BTreeMap<u64, Mapping>,
    backing: B,
}

impl<B: Backing> RegionMapper<B> {
    /// Creates a mapper with default limits.
    pub fn new(backing: B) -> Self {
        Self::with_config(backing, MapperConfig::default())
    }

    /// Creates a mapper with explicit limits.
    pub fn with_config(backing: B, config: MapperConfig) -> Self {
        Self { config, inner: Mutex::new(Inner { table: BTreeMap::new(), backing }) }
    }

    /// Limits this mapper was built with.
    pub fn config(&self) -> MapperConfig {
        self.config
    }

    /// Maps `[address, address + size)` read-write into the process.
    pub fn map_rw_region(&self, address: u64, size: u64) -> Result<Mapping> {
        self.map(None, address, size)
    }

    /// Same as [`map_rw_region`](Self::map_rw_region), tagging the mapping
    /// with the requester for later diagnostics.
    pub fn map_rw_labeled(&self, label: &str, address: u64, size: u64) -> Result<Mapping> {
        self.map(Some(label.to_string()), address, size)
    }

    /// Maps like [`map_rw_region`](Self::map_rw_region), returning only the
    /// coarse [`Status`].
    pub fn map_rw_status(&self, address: u64, size: u64) -> Status {
        Status::from(&self.map_rw_region(address, size))
    }

    fn map(&self, label: Option<String>, address: u64, size: u64) -> Result<Mapping> {
        let region = Region::new(address, size)?;
        let mut inner = self.inner.lock();

        if let Some(existing) = overlapping(&inner.table, &region) {
            warn!("regions: {region} overlaps live mapping {existing}");
            return Err(MapError::Overlap { requested: region, existing });
        }
        if inner.table.len() >= self.config.max_mappings {
            return Err(MapError::ResourceExhausted("mapping table full"));
        }

        inner.backing.map_rw(region)?;
        let mapping = Mapping::new(region, label);
        inner.table.insert(region.base(), mapping.clone());
        debug!(
            "regions: mapped {region} rw ({})",
            mapping.label().unwrap_or("unlabeled")
        );
        Ok(mapping)
    }

    /// Returns `true` if `addr` lies in a live mapping.
    pub fn is_mapped(&self, addr: u64) -> bool {
        self.lookup(addr).is_some()
    }

    /// Returns the mapping covering `addr`, if any.
    pub fn lookup(&self, addr: u64) -> Option<Mapping> {
        let inner = self.inner.lock();
        covering(&inner.table, addr, 1).cloned()
    }

    /// Snapshot of all live mappings ordered by base address.
    pub fn mappings(&self) -> Vec<Mapping> {
        self.inner.lock().table.values().cloned().collect()
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Returns `true` when nothing has been mapped yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads mapped memory. The range must sit inside one mapping.
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> core::result::Result<(), AccessError> {
        let inner = self.inner.lock();
        if covering(&inner.table, addr, buf.len() as u64).is_none() {
            return Err(AccessError::Unmapped { addr, len: buf.len() });
        }
        inner.backing.read(addr, buf)
    }

    /// Writes mapped memory. The range must sit inside one mapping.
    pub fn write(&self, addr: u64, data: &[u8]) -> core::result::Result<(), AccessError> {
        let mut inner = self.inner.lock();
        if covering(&inner.table, addr, data.len() as u64).is_none() {
            return Err(AccessError::Unmapped { addr, len: data.len() });
        }
        inner.backing.write(addr, data)
    }
}

impl RegionMapper<ShadowBacking> {
    /// Creates a mapper over process-local shadow memory capped at
    /// `config.shadow_budget` bytes.
    pub fn shadow(config: MapperConfig) -> Self {
        Self::with_config(ShadowBacking::with_budget(config.shadow_budget), config)
    }
}

fn covering(table: &BTreeMap<u64, Mapping>, addr: u64, len: u64) -> Option<&Mapping> {
    let (_, mapping) = table.range(..=addr).next_back()?;
    mapping.region().contains_range(addr, len).then_some(mapping)
}

fn overlapping(table: &BTreeMap<u64, Mapping>, region: &Region) -> Option<Region> {
    // Mappings never overlap each other, so only the predecessor and the
    // first mapping starting inside the request can intersect it.
    let below = table.range(..=region.base()).next_back();
    let inside = table.range(region.base()..region.end()).next();
    below
        .into_iter()
        .chain(inside)
        .map(|(_, mapping)| mapping.region())
        .find(|existing| existing.overlaps(region))
}
