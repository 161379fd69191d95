// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Identity mapping of physical ranges into the analysis process via `mmap`.
//!
//! The firmware under analysis dereferences its peripheral addresses
//! directly, so the range is placed at the same virtual address. Mapping is
//! page granular; pages already backed by this instance are reused so that
//! two sub-page regions may share a page.

use std::collections::BTreeSet;
use std::io;
use std::ptr;

use log::{debug, error};

use crate::backing::Backing;
use crate::{AccessError, MapError, Region, Result};

/// Backing that maps anonymous read-write pages at the requested address.
pub struct OsBacking {
    page_size: u64,
    pages: BTreeSet<u64>,
}

impl OsBacking {
    /// Creates a backing using the host page size.
    pub fn new() -> Self {
        // SAFETY: sysconf has no preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size =
            u64::try_from(raw).ok().filter(|size| size.is_power_of_two()).unwrap_or(4096);
        Self { page_size, pages: BTreeSet::new() }
    }

    /// Page size used to round requests.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    fn page_span(&self, region: Region) -> Result<(u64, u64)> {
        let first = align_down(region.base(), self.page_size);
        let last = align_up(region.end(), self.page_size)?;
        if usize::try_from(last).is_err() {
            return Err(MapError::InvalidArgument("address not representable on this host"));
        }
        Ok((first, last))
    }

    fn map_run(&mut self, start: u64, end: u64, region: Region) -> Result<()> {
        let len = (end - start) as usize;
        let hint = start as usize as *mut libc::c_void;
        // SAFETY: anonymous mapping; MAP_FIXED_NOREPLACE (or the verification
        // below) guarantees no existing mapping of this process is replaced.
        let addr = unsafe {
            libc::mmap(
                hint,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | FIXED_NOREPLACE,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            error!("regions: mmap {:#x}+{:#x} failed: {err}", start, len);
            return Err(errno_to_map_error(err.raw_os_error(), region, start, end));
        }
        if addr != hint {
            // Kernels without MAP_FIXED_NOREPLACE treat the address as a hint.
            // SAFETY: `addr` was just returned by mmap with length `len`.
            unsafe { libc::munmap(addr, len) };
            return Err(foreign_overlap(region, start, end));
        }
        let mut page = start;
        while page < end {
            self.pages.insert(page);
            page += self.page_size;
        }
        debug!("regions: backed {:#x}..{:#x} with anonymous pages", start, end);
        Ok(())
    }

    fn covers(&self, addr: u64, len: usize) -> bool {
        let Some(end) = addr.checked_add(len as u64) else {
            return false;
        };
        let mut page = align_down(addr, self.page_size);
        while page < end {
            if !self.pages.contains(&page) {
                return false;
            }
            page += self.page_size;
        }
        true
    }
}

impl Default for OsBacking {
    fn default() -> Self {
        Self::new()
    }
}

impl Backing for OsBacking {
    fn map_rw(&mut self, region: Region) -> Result<()> {
        let (first, last) = self.page_span(region)?;
        // Map each run of pages this backing does not own yet.
        let mut mapped = Vec::new();
        let mut page = first;
        while page < last {
            if self.pages.contains(&page) {
                page += self.page_size;
                continue;
            }
            let run_start = page;
            while page < last && !self.pages.contains(&page) {
                page += self.page_size;
            }
            if let Err(err) = self.map_run(run_start, page, region) {
                for (start, end) in mapped {
                    self.unmap_run(start, end);
                }
                return Err(err);
            }
            mapped.push((run_start, page));
        }
        Ok(())
    }

    fn read(&self, addr: u64, buf: &mut [u8]) -> core::result::Result<(), AccessError> {
        if !self.covers(addr, buf.len()) {
            return Err(AccessError::Unmapped { addr, len: buf.len() });
        }
        // SAFETY: every page of the source range is a live read-write
        // mapping owned by this backing.
        unsafe {
            ptr::copy_nonoverlapping(addr as usize as *const u8, buf.as_mut_ptr(), buf.len())
        };
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> core::result::Result<(), AccessError> {
        if !self.covers(addr, data.len()) {
            return Err(AccessError::Unmapped { addr, len: data.len() });
        }
        // SAFETY: as in `read`; the destination pages are writable.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), addr as usize as *mut u8, data.len()) };
        Ok(())
    }
}

impl OsBacking {
    fn unmap_run(&mut self, start: u64, end: u64) {
        // SAFETY: the run was mapped by `map_run` and is owned by this backing.
        unsafe { libc::munmap(start as usize as *mut libc::c_void, (end - start) as usize) };
        self.pages.retain(|page| *page < start || *page >= end);
    }
}

impl Drop for OsBacking {
    fn drop(&mut self) {
        for page in &self.pages {
            // SAFETY: each page was mapped by this backing and is released once.
            unsafe { libc::munmap(*page as usize as *mut libc::c_void, self.page_size as usize) };
        }
    }
}

#[cfg(target_os = "linux")]
const FIXED_NOREPLACE: libc::c_int = libc::MAP_FIXED_NOREPLACE;
#[cfg(not(target_os = "linux"))]
const FIXED_NOREPLACE: libc::c_int = 0;

fn errno_to_map_error(errno: Option<i32>, region: Region, start: u64, end: u64) -> MapError {
    match errno {
        Some(libc::EPERM) | Some(libc::EACCES) => MapError::PermissionDenied(region),
        Some(libc::ENOMEM) | Some(libc::EAGAIN) | Some(libc::EMFILE) => {
            MapError::ResourceExhausted("host address space")
        }
        Some(libc::EEXIST) => foreign_overlap(region, start, end),
        _ => MapError::InvalidArgument("host rejected the mapping"),
    }
}

fn foreign_overlap(region: Region, start: u64, end: u64) -> MapError {
    let existing = Region::new(start, end - start).unwrap_or(region);
    MapError::Overlap { requested: region, existing }
}

fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

fn align_up(value: u64, align: u64) -> Result<u64> {
    let sum = value
        .checked_add(align - 1)
        .ok_or(MapError::InvalidArgument("region overflows the address space"))?;
    Ok(sum & !(align - 1))
}
