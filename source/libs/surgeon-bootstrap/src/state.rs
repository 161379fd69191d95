// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

use crate::{BootstrapError, Result};

/// Lifecycle of one handler: `Unloaded -> Initializing -> Ready | Degraded`.
///
/// There is no way back to `Unloaded`; only process teardown ends a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HandlerState {
    /// Not yet bootstrapped.
    #[default]
    Unloaded,
    /// Region requests are in flight.
    Initializing,
    /// Every declared region is mapped.
    Ready,
    /// At least one declared region failed to map.
    Degraded,
}

impl HandlerState {
    /// Moves to `next` if the lifecycle allows it.
    pub fn advance(&mut self, next: HandlerState) -> Result<()> {
        let allowed = matches!(
            (*self, next),
            (Self::Unloaded, Self::Initializing)
                | (Self::Initializing, Self::Ready)
                | (Self::Initializing, Self::Degraded)
        );
        if !allowed {
            return Err(BootstrapError::InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }

    /// Returns `true` for `Ready` and `Degraded`.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Degraded)
    }
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unloaded => "unloaded",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        };
        f.write_str(text)
    }
}
