// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `camera_icp` handler plugin.
//!
//! Only the region declarations and the registration entry point live here;
//! what the camera ICP registers do once mapped is not modelled.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use log::info;
use surgeon_bootstrap::{BootedHandler, Bootstrapper, DiagnosticSink, Handler, RegionDecl};
use surgeon_regions::Backing;

/// Handler name as reported in diagnostics.
pub const NAME: &str = "camera_icp";

/// Peripheral block of the camera ICP.
pub const PERIPHERALS_1: (u64, u64) = (0x4000_0000, 0x10000);
/// SRAM bit-band alias used by the ICP firmware.
pub const SRAM_BITBAND: (u64, u64) = (0x2000_0000, 0x10000);

/// The `camera_icp` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraIcp {
    regions: Vec<RegionDecl>,
}

impl CameraIcp {
    /// Builds the handler with its fixed region list.
    pub fn new() -> Self {
        let regions = vec![
            RegionDecl::new("PERIPHERALS_1", PERIPHERALS_1.0, PERIPHERALS_1.1),
            RegionDecl::new("SRAM_BITBAND", SRAM_BITBAND.0, SRAM_BITBAND.1),
        ];
        Self { regions }
    }
}

impl Default for CameraIcp {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for CameraIcp {
    fn name(&self) -> &str {
        NAME
    }

    fn regions(&self) -> &[RegionDecl] {
        &self.regions
    }
}

/// Registers the handler with the host's bootstrapper.
///
/// Called once by the host during startup; the returned handle is the only
/// way to reach the handler afterwards.
pub fn register<B, S>(
    bootstrapper: &mut Bootstrapper<'_, B, S>,
) -> surgeon_bootstrap::Result<BootedHandler<CameraIcp>>
where
    B: Backing,
    S: DiagnosticSink,
{
    let booted = bootstrapper.bootstrap(CameraIcp::new())?;
    info!("camera_icp: registered ({})", booted.state());
    Ok(booted)
}
