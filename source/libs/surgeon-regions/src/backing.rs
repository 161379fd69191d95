// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory backings: the capability that turns a physical range into process
//! accessible memory.

use std::collections::BTreeMap;

use crate::{AccessError, MapError, Region, Result};

/// Default cap on bytes a [`ShadowBacking`] hands out (256 MiB).
pub const DEFAULT_SHADOW_BUDGET: u64 = 256 * 1024 * 1024;

/// Makes physical ranges accessible to the analysis process.
///
/// The [`RegionMapper`](crate::RegionMapper) calls [`Backing::map_rw`] only
/// after it has ruled out overlaps with its own mappings, and routes
/// [`Backing::read`]/[`Backing::write`] only to ranges it has mapped.
pub trait Backing: Send {
    /// Backs `region` with read-write memory.
    fn map_rw(&mut self, region: Region) -> Result<()>;

    /// Copies `buf.len()` bytes starting at physical address `addr`.
    fn read(&self, addr: u64, buf: &mut [u8]) -> core::result::Result<(), AccessError>;

    /// Stores `data` starting at physical address `addr`.
    fn write(&mut self, addr: u64, data: &[u8]) -> core::result::Result<(), AccessError>;
}

/// Process-local substitute memory for pure-analysis deployments.
///
/// Every mapped region gets its own zeroed buffer; physical addresses are
/// never dereferenced directly.
pub struct ShadowBacking {
    blocks: BTreeMap<u64, Vec<u8>>,
    budget: u64,
    used: u64,
}

impl Default for ShadowBacking {
    fn default() -> Self {
        Self::with_budget(DEFAULT_SHADOW_BUDGET)
    }
}

impl ShadowBacking {
    /// Creates a shadow backing with the default budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shadow backing that refuses to shadow more than `budget` bytes.
    pub fn with_budget(budget: u64) -> Self {
        Self { blocks: BTreeMap::new(), budget, used: 0 }
    }

    /// Bytes currently shadowed.
    pub fn used(&self) -> u64 {
        self.used
    }

    fn block(&self, addr: u64, len: usize) -> Option<(u64, usize)> {
        let (&base, block) = self.blocks.range(..=addr).next_back()?;
        let offset = usize::try_from(addr - base).ok()?;
        let end = offset.checked_add(len)?;
        (end <= block.len()).then_some((base, offset))
    }
}

impl Backing for ShadowBacking {
    fn map_rw(&mut self, region: Region) -> Result<()> {
        let used = self
            .used
            .checked_add(region.size())
            .filter(|used| *used <= self.budget)
            .ok_or(MapError::ResourceExhausted("shadow budget"))?;
        let len = usize::try_from(region.size())
            .map_err(|_| MapError::InvalidArgument("region larger than the host address space"))?;
        let mut block = Vec::new();
        block
            .try_reserve_exact(len)
            .map_err(|_| MapError::ResourceExhausted("shadow allocation"))?;
        block.resize(len, 0);
        self.blocks.insert(region.base(), block);
        self.used = used;
        Ok(())
    }

    fn read(&self, addr: u64, buf: &mut [u8]) -> core::result::Result<(), AccessError> {
        let unmapped = AccessError::Unmapped { addr, len: buf.len() };
        let (base, offset) = self.block(addr, buf.len()).ok_or(unmapped)?;
        let block = self.blocks.get(&base).ok_or(unmapped)?;
        buf.copy_from_slice(&block[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> core::result::Result<(), AccessError> {
        let unmapped = AccessError::Unmapped { addr, len: data.len() };
        let (base, offset) = self.block(addr, data.len()).ok_or(unmapped)?;
        let block = self.blocks.get_mut(&base).ok_or(unmapped)?;
        block[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
