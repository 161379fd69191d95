// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use log::{error, info, warn};
use surgeon_regions::{Backing, MapError, RegionMapper, Status};

use crate::diag::DiagnosticSink;
use crate::handler::{Handler, RegionDecl};
use crate::state::HandlerState;
use crate::{BootstrapError, Result};

/// A declared region that could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    /// Declared region name.
    pub region: String,
    /// Coarse status returned by the mapper.
    pub status: Status,
    /// Full mapper error.
    pub error: MapError,
}

/// Outcome of bootstrapping one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReport {
    /// Handler name.
    pub name: String,
    /// Settled state, `Ready` or `Degraded`.
    pub state: HandlerState,
    /// Names of regions that mapped, in request order.
    pub mapped: Vec<String>,
    /// Regions that failed, in request order.
    pub failures: Vec<RegionFailure>,
}

/// Aggregate readiness of every handler bootstrapped so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    /// Per-handler reports in bootstrap order.
    pub handlers: Vec<HandlerReport>,
}

impl BootReport {
    /// Returns `true` when every handler is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.handlers.iter().all(|report| report.state == HandlerState::Ready)
    }

    /// Handlers that ended up `Degraded`.
    pub fn degraded(&self) -> impl Iterator<Item = &HandlerReport> {
        self.handlers.iter().filter(|report| report.state == HandlerState::Degraded)
    }

    /// Report for the handler called `name`.
    pub fn get(&self, name: &str) -> Option<&HandlerReport> {
        self.handlers.iter().find(|report| report.name == name)
    }
}

/// A handler that has completed its bootstrap.
///
/// The handler is only reachable through this wrapper, so its interception
/// logic cannot run before its regions were requested.
#[derive(Debug)]
pub struct BootedHandler<H> {
    handler: H,
    report: HandlerReport,
}

impl<H: Handler> BootedHandler<H> {
    /// Settled lifecycle state.
    pub fn state(&self) -> HandlerState {
        self.report.state
    }

    /// Bootstrap outcome.
    pub fn report(&self) -> &HandlerReport {
        &self.report
    }

    /// Returns `true` if the declared region `name` was mapped.
    pub fn is_mapped(&self, name: &str) -> bool {
        self.report.mapped.iter().any(|mapped| mapped == name)
    }

    /// The bootstrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The bootstrapped handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

/// Runs handler bootstraps against one mapper during host startup.
pub struct Bootstrapper<'m, B: Backing, S: DiagnosticSink> {
    mapper: &'m RegionMapper<B>,
    sink: S,
    booted: HashSet<String>,
    reports: Vec<HandlerReport>,
}

impl<'m, B: Backing, S: DiagnosticSink> Bootstrapper<'m, B, S> {
    /// Creates a bootstrapper that maps through `mapper` and reports failures to `sink`.
    pub fn new(mapper: &'m RegionMapper<B>, sink: S) -> Self {
        Self { mapper, sink, booted: HashSet::new(), reports: Vec::new() }
    }

    /// The mapper handlers are bootstrapped against.
    pub fn mapper(&self) -> &'m RegionMapper<B> {
        self.mapper
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Requests every region of `handler` and settles its state.
    ///
    /// Each region is requested exactly once, in declaration order, even if
    /// an earlier one failed. A failure is written to the sink and degrades
    /// the handler; it never aborts the bootstrap.
    pub fn bootstrap<H: Handler>(&mut self, handler: H) -> Result<BootedHandler<H>> {
        let name = handler.name().to_string();
        if !self.booted.insert(name.clone()) {
            return Err(BootstrapError::AlreadyBootstrapped(name));
        }

        let mut state = HandlerState::Unloaded;
        state.advance(HandlerState::Initializing)?;
        info!("bootstrap: {name} initializing ({} regions)", handler.regions().len());

        let mut mapped = Vec::new();
        let mut failures = Vec::new();
        for decl in handler.regions() {
            match self.request(&name, decl) {
                Ok(()) => mapped.push(decl.name.clone()),
                Err(err) => failures.push(RegionFailure {
                    region: decl.name.clone(),
                    status: Status::from(&err),
                    error: err,
                }),
            }
        }

        if failures.is_empty() {
            state.advance(HandlerState::Ready)?;
            info!("bootstrap: {name} ready");
        } else {
            state.advance(HandlerState::Degraded)?;
            warn!(
                "bootstrap: {name} degraded ({} of {} regions failed)",
                failures.len(),
                handler.regions().len()
            );
        }

        let report = HandlerReport { name, state, mapped, failures };
        self.reports.push(report.clone());
        Ok(BootedHandler { handler, report })
    }

    fn request(&mut self, handler: &str, decl: &RegionDecl) -> core::result::Result<(), MapError> {
        let label = format!("{handler}/{}", decl.name);
        match self.mapper.map_rw_labeled(&label, decl.base, decl.size) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("bootstrap: {label} {}: {err}", Status::from(&err));
                self.sink.emit(&format!(
                    "[FATAL] {handler}: failed to map {} at {:#x}+{:#x}: {err}",
                    decl.name, decl.base, decl.size
                ));
                Err(err)
            }
        }
    }

    /// Aggregate readiness of the handlers bootstrapped so far.
    pub fn report(&self) -> BootReport {
        BootReport { handlers: self.reports.clone() }
    }

    /// Ends the startup phase and hands the aggregate report to the host.
    pub fn finish(self) -> BootReport {
        BootReport { handlers: self.reports }
    }
}
