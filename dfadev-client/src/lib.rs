//! # dfadev-client
//!
//! Client library for dfadev hosts.
//!
//! This crate provides:
//! - Async TCP connection with request/response correlation
//! - High-level API for feeding, polling and configuring the automaton
//! - HANDOFF to trigger a live update

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
