// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Explicit, once-per-handler bootstrap of peripheral handler plugins
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: unit tests (state machine, bootstrap policy, recipes, config)
//!
//! PUBLIC API: Handler, RegionDecl, Bootstrapper, BootedHandler, BootReport,
//!             HandlerState, DiagnosticSink, HandlerCatalog, RuntimeConfig
//! DEPENDS_ON: surgeon-regions
//! INVARIANTS: every declared region is requested in declaration order before
//!             the handler is reachable; no retries; no short-circuit on failure
//!
//! The host creates one [`RegionMapper`](surgeon_regions::RegionMapper),
//! hands it to a [`Bootstrapper`] and registers its handler plugins during a
//! defined startup phase. A handler whose regions all map is `Ready`; a
//! handler with at least one failed region is `Degraded`, the failure is
//! written to the diagnostic sink and the remaining handlers keep going.
//! [`Bootstrapper::finish`] gives the host the aggregate picture.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

mod bootstrap;
mod config;
mod diag;
mod handler;
mod recipe;
mod state;

pub use bootstrap::{BootReport, BootedHandler, Bootstrapper, HandlerReport, RegionFailure};
pub use config::{ConfigError, RuntimeConfig};
pub use diag::{DiagnosticSink, MemorySink, StderrSink};
pub use handler::{Handler, RegionDecl};
pub use recipe::{CatalogError, HandlerCatalog, RecipeHandler};
pub use state::HandlerState;

use thiserror::Error;

/// Result alias for bootstrap operations.
pub type Result<T> = core::result::Result<T, BootstrapError>;

/// Errors that prevent a handler from being bootstrapped at all.
///
/// Region mapping failures are not errors here; they degrade the handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    /// The handler already ran its bootstrap in this process.
    #[error("handler {0} already bootstrapped")]
    AlreadyBootstrapped(String),
    /// A state change outside `Unloaded -> Initializing -> Ready | Degraded`.
    #[error("invalid handler state transition {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted change.
        from: HandlerState,
        /// Requested state.
        to: HandlerState,
    },
}
