//! Process start-up.
//!
//! Every start begins from zeroed structures. Only a live update looks at the
//! exchange, and a failed restore does not abort start-up: the engine keeps
//! whatever parts were restored and the failure is handed back to the host.

use crate::exchange::Exchange;
use crate::handoff::{restore_snapshot, HandoffError};
use dfadev_core::{DfaEngine, EngineConfig, SnapshotPart};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the process was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitKind {
    /// First start.
    #[default]
    Fresh,
    /// Restart after a crash or stop. State is not recovered.
    Restart,
    /// Replacement of a running instance; state comes from the exchange.
    LiveUpdate,
}

impl InitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitKind::Fresh => "fresh",
            InitKind::Restart => "restart",
            InitKind::LiveUpdate => "live_update",
        }
    }
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fresh" => Ok(InitKind::Fresh),
            "restart" => Ok(InitKind::Restart),
            "live_update" | "live-update" | "lu" => Ok(InitKind::LiveUpdate),
            other => Err(format!("unknown init kind '{}'", other)),
        }
    }
}

/// Result of process initialization.
#[derive(Debug)]
pub struct Startup {
    pub engine: DfaEngine,
    pub kind: InitKind,
    /// Set when a live update could not restore every snapshot part.
    pub restore_error: Option<HandoffError>,
}

/// Builds the engine for a start of the given kind.
pub fn initialize(kind: InitKind, config: EngineConfig, exchange: &dyn Exchange) -> Startup {
    let mut engine = DfaEngine::new(config);
    let mut restore_error = None;

    match kind {
        InitKind::Fresh => tracing::info!("Hello, DFA!"),
        InitKind::Restart => tracing::info!("Hey, I've just been restarted!"),
        InitKind::LiveUpdate => {
            tracing::info!("Hey, I'm a new version!");
            if let Err(e) = restore_snapshot(&mut engine, exchange) {
                tracing::warn!(
                    "Live update restore stopped after {} of {} parts: {}",
                    e.completed.len(),
                    SnapshotPart::ALL.len(),
                    e
                );
                restore_error = Some(e);
            }
        }
    }

    Startup {
        engine,
        kind,
        restore_error,
    }
}
