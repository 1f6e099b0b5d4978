//! Export and import of the full automaton state.
//!
//! A snapshot is transferred as three independent blobs so that a failed
//! step leaves the earlier parts restored.

use crate::engine::DfaEngine;
use crate::error::CoreError;
use crate::table::{AcceptingSet, State, TransitionTable, STATE_COUNT, TRANSITION_TABLE_LEN};

/// Exchange key for the current state (1 byte).
pub const CURRENT_STATE_KEY: &str = "automaton.currentState";
/// Exchange key for the accepting set (256 bytes).
pub const ACCEPTING_SET_KEY: &str = "automaton.acceptingSet";
/// Exchange key for the transition table (65536 bytes).
pub const TRANSITION_TABLE_KEY: &str = "automaton.transitionTable";

/// One of the independently transferred parts of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotPart {
    CurrentState,
    AcceptingSet,
    TransitionTable,
}

impl SnapshotPart {
    /// All parts, in transfer order.
    pub const ALL: [SnapshotPart; 3] = [
        SnapshotPart::CurrentState,
        SnapshotPart::AcceptingSet,
        SnapshotPart::TransitionTable,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SnapshotPart::CurrentState => CURRENT_STATE_KEY,
            SnapshotPart::AcceptingSet => ACCEPTING_SET_KEY,
            SnapshotPart::TransitionTable => TRANSITION_TABLE_KEY,
        }
    }

    /// Exact blob length for this part.
    pub fn blob_len(&self) -> usize {
        match self {
            SnapshotPart::CurrentState => 1,
            SnapshotPart::AcceptingSet => STATE_COUNT,
            SnapshotPart::TransitionTable => TRANSITION_TABLE_LEN,
        }
    }
}

/// A full copy of the automaton state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutomatonSnapshot {
    pub current_state: State,
    pub accepting: AcceptingSet,
    pub transitions: TransitionTable,
}

impl AutomatonSnapshot {
    /// Serializes one part.
    pub fn part_bytes(&self, part: SnapshotPart) -> Vec<u8> {
        match part {
            SnapshotPart::CurrentState => vec![self.current_state],
            SnapshotPart::AcceptingSet => self.accepting.to_bytes(),
            SnapshotPart::TransitionTable => self.transitions.to_bytes(),
        }
    }

    /// Replaces one part from its serialized form.
    ///
    /// Blobs of the wrong length are rejected and leave `self` untouched.
    pub fn load_part(&mut self, part: SnapshotPart, bytes: &[u8]) -> Result<(), CoreError> {
        match part {
            SnapshotPart::CurrentState => self.current_state = parse_state(bytes)?,
            SnapshotPart::AcceptingSet => self.accepting = parse_accepting(bytes)?,
            SnapshotPart::TransitionTable => self.transitions = parse_transitions(bytes)?,
        }
        Ok(())
    }
}

fn wrong_len(part: SnapshotPart, bytes: &[u8]) -> CoreError {
    CoreError::PersistenceFault {
        key: part.key().to_string(),
        reason: format!("blob is {} bytes, expected {}", bytes.len(), part.blob_len()),
    }
}

fn parse_state(bytes: &[u8]) -> Result<State, CoreError> {
    match bytes {
        [state] => Ok(*state),
        _ => Err(wrong_len(SnapshotPart::CurrentState, bytes)),
    }
}

fn parse_accepting(bytes: &[u8]) -> Result<AcceptingSet, CoreError> {
    AcceptingSet::from_bytes(bytes).ok_or_else(|| wrong_len(SnapshotPart::AcceptingSet, bytes))
}

fn parse_transitions(bytes: &[u8]) -> Result<TransitionTable, CoreError> {
    TransitionTable::from_bytes(bytes)
        .ok_or_else(|| wrong_len(SnapshotPart::TransitionTable, bytes))
}

impl DfaEngine {
    /// Captures the current automaton.
    pub fn snapshot(&self) -> AutomatonSnapshot {
        AutomatonSnapshot {
            current_state: self.current,
            accepting: self.accepting.clone(),
            transitions: self.table.clone(),
        }
    }

    /// Replaces the automaton with `snapshot`.
    pub fn restore(&mut self, snapshot: AutomatonSnapshot) {
        self.current = snapshot.current_state;
        self.accepting = snapshot.accepting;
        self.table = snapshot.transitions;
    }

    /// Serializes one part of the live automaton.
    pub fn export_part(&self, part: SnapshotPart) -> Vec<u8> {
        match part {
            SnapshotPart::CurrentState => vec![self.current],
            SnapshotPart::AcceptingSet => self.accepting.to_bytes(),
            SnapshotPart::TransitionTable => self.table.to_bytes(),
        }
    }

    /// Replaces one part of the live automaton.
    ///
    /// Only the named part is parsed; the others are not touched.
    pub fn import_part(&mut self, part: SnapshotPart, bytes: &[u8]) -> Result<(), CoreError> {
        match part {
            SnapshotPart::CurrentState => self.current = parse_state(bytes)?,
            SnapshotPart::AcceptingSet => self.accepting = parse_accepting(bytes)?,
            SnapshotPart::TransitionTable => self.table = parse_transitions(bytes)?,
        }
        Ok(())
    }
}
