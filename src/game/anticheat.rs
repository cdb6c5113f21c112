//! Anti-Cheat Reporting
//!
//! The relay never disconnects anyone on its own. Every authority or
//! protocol violation is reported here, and the reporter decides whether
//! the offending connection should be dropped.

use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::player::ClientId;

/// What kind of rule was broken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheatCategory {
    /// Unexpected or malformed protocol usage
    ProtocolExtension,
    /// Action out of order for the game flow
    GameFlow,
    /// Host-only action from a non-host
    MustBeHost,
    /// Acting on something the sender does not own
    Ownership,
    /// Anything else
    Other,
}

/// Where the violation happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheatContext(pub String);

impl CheatContext {
    /// Context for a named sub-message or call.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for CheatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives violation reports.
pub trait CheatReporter: Send + Sync {
    /// Report a violation. Returns `true` if the client should be disconnected.
    fn report(
        &self,
        client_id: ClientId,
        context: &CheatContext,
        category: CheatCategory,
        reason: &str,
    ) -> bool;
}

/// Logs every report and disconnects when enabled.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredAntiCheat {
    enabled: bool,
}

impl ConfiguredAntiCheat {
    /// Create a reporter.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl CheatReporter for ConfiguredAntiCheat {
    fn report(
        &self,
        client_id: ClientId,
        context: &CheatContext,
        category: CheatCategory,
        reason: &str,
    ) -> bool {
        warn!(
            client_id,
            %context,
            ?category,
            enforced = self.enabled,
            "Client {} reported: {}",
            client_id,
            reason
        );
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_reporter_never_disconnects() {
        let reporter = ConfiguredAntiCheat::new(false);
        let ctx = CheatContext::new("SpawnFlag");
        assert!(!reporter.report(1, &ctx, CheatCategory::MustBeHost, "not host"));
    }

    #[test]
    fn test_enabled_reporter_disconnects() {
        let reporter = ConfiguredAntiCheat::new(true);
        let ctx = CheatContext::new("DespawnFlag");
        assert!(reporter.report(1, &ctx, CheatCategory::Ownership, "not owner"));
    }
}
