// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

/// One physical range a handler needs, named for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionDecl {
    /// Symbolic name, e.g. `PERIPHERALS_1`.
    pub name: String,
    /// Physical base address.
    pub base: u64,
    /// Length in bytes.
    pub size: u64,
}

impl RegionDecl {
    /// Builds a declaration.
    pub fn new(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self { name: name.into(), base, size }
    }
}

/// A peripheral handler plugin.
///
/// The region list is fixed for the handler's lifetime and is requested in
/// the order returned, before any interception logic of the handler runs.
pub trait Handler {
    /// Name identifying the handler, e.g. `camera_icp`.
    fn name(&self) -> &str;

    /// Regions to map, in request order.
    fn regions(&self) -> &[RegionDecl];
}
