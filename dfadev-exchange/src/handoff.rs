//! Snapshot handoff across a live update.
//!
//! The outgoing process publishes every snapshot part; the incoming process
//! retrieves each part, imports it, and deletes it. The first failing step
//! ends the handoff and whatever was imported before it stays in place.

use crate::error::ExchangeError;
use crate::exchange::Exchange;
use dfadev_core::{CoreError, DfaEngine, SnapshotPart};
use std::fmt;
use thiserror::Error;

/// A step of the handoff protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStep {
    Publish,
    Retrieve,
    Import,
    Delete,
}

impl fmt::Display for HandoffStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffStep::Publish => write!(f, "publish"),
            HandoffStep::Retrieve => write!(f, "retrieve"),
            HandoffStep::Import => write!(f, "import"),
            HandoffStep::Delete => write!(f, "delete"),
        }
    }
}

/// A failed handoff step.
#[derive(Debug, Error)]
#[error("{step} of '{}' failed: {source}", .part.key())]
pub struct HandoffError {
    pub step: HandoffStep,
    pub part: SnapshotPart,
    #[source]
    pub source: ExchangeError,
    /// Parts fully handed off before the failure.
    pub completed: Vec<SnapshotPart>,
}

impl From<HandoffError> for CoreError {
    fn from(e: HandoffError) -> Self {
        CoreError::PersistenceFault {
            key: e.part.key().to_string(),
            reason: format!("{} failed: {}", e.step, e.source),
        }
    }
}

/// Publishes every part of the engine's automaton, overwriting old values.
pub fn publish_snapshot(engine: &DfaEngine, exchange: &dyn Exchange) -> Result<(), HandoffError> {
    let mut completed = Vec::with_capacity(SnapshotPart::ALL.len());

    for part in SnapshotPart::ALL {
        let blob = engine.export_part(part);
        if let Err(source) = exchange.publish(part.key(), &blob) {
            return Err(HandoffError {
                step: HandoffStep::Publish,
                part,
                source,
                completed,
            });
        }
        completed.push(part);
    }

    tracing::info!(
        "Published automaton snapshot (state {}, {} accepting, {} transitions)",
        engine.current_state(),
        engine.accepting().states().len(),
        engine.table().configured_count()
    );
    Ok(())
}

/// Retrieves, imports and consumes every published part.
///
/// A part is only deleted once it has been imported, so a blob that failed
/// to import is left in the exchange.
pub fn restore_snapshot(
    engine: &mut DfaEngine,
    exchange: &dyn Exchange,
) -> Result<Vec<SnapshotPart>, HandoffError> {
    let mut completed = Vec::with_capacity(SnapshotPart::ALL.len());

    for part in SnapshotPart::ALL {
        let fail = |step: HandoffStep, source: ExchangeError, completed: Vec<SnapshotPart>| HandoffError {
            step,
            part,
            source,
            completed,
        };

        let blob = match exchange.retrieve(part.key()) {
            Ok(blob) => blob,
            Err(e) => return Err(fail(HandoffStep::Retrieve, e, completed)),
        };

        if let Err(e) = engine.import_part(part, &blob) {
            return Err(fail(HandoffStep::Import, e.into(), completed));
        }

        if let Err(e) = exchange.delete(part.key()) {
            return Err(fail(HandoffStep::Delete, e, completed));
        }

        completed.push(part);
    }

    tracing::info!(
        "Restored automaton snapshot (state {}, {} accepting, {} transitions)",
        engine.current_state(),
        engine.accepting().states().len(),
        engine.table().configured_count()
    );
    Ok(completed)
}
