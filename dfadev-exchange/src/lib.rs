//! # dfadev-exchange
//!
//! Live-update support for dfadev.
//!
//! This crate provides:
//! - The [`Exchange`] trait with in-memory and directory-backed stores
//! - Snapshot publish/restore across a live update
//! - Process initialization for fresh, restarted and live-updated starts

pub mod dir;
pub mod error;
pub mod exchange;
pub mod handoff;
pub mod lifecycle;

pub use dir::DirExchange;
pub use error::ExchangeError;
pub use exchange::{Exchange, MemoryExchange};
pub use handoff::{publish_snapshot, restore_snapshot, HandoffError, HandoffStep};
pub use lifecycle::{initialize, InitKind, Startup};
