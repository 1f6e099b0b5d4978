//! # dfadev-core
//!
//! Automaton engine for dfadev.
//!
//! This crate provides:
//! - A total 256x256 transition table and accepting set
//! - Chunked feed and verdict polling over caller buffers
//! - Control codes for editing the automaton at runtime
//! - Snapshot export/import for live-update handoff

pub mod control;
pub mod engine;
pub mod error;
pub mod grant;
pub mod snapshot;
pub mod table;

pub use control::{
    ControlCode, ControlRequest, DFAIOCACCEPT, DFAIOCADD, DFAIOCREJECT, DFAIOCRESET,
};
pub use engine::{DfaEngine, EngineConfig, EngineStats, ACCEPT_SENTINEL, REJECT_SENTINEL};
pub use error::CoreError;
pub use grant::{CallerBuffer, GrantBuffer};
pub use snapshot::{AutomatonSnapshot, SnapshotPart};
pub use table::{AcceptingSet, State, Symbol, TransitionTable};
