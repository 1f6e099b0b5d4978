//! # dfadev-server
//!
//! TCP host for the dfadev device.
//!
//! This crate provides:
//! - YAML configuration with environment overrides
//! - A single-owner dispatcher that serializes access to the engine
//! - Command handlers for the READ/WRITE/CONTROL dispatch contract
//! - TCP connection handling with async I/O
//! - HANDOFF: publish the automaton for the next host version and stop

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{Config, ConfigError, EngineSettings, HandoffConfig, NetworkConfig, CONFIG_ENV};
pub use dispatcher::{
    DeviceInfo, DeviceReply, DeviceRequest, Dispatcher, DispatcherHandle, DispatcherOutcome,
};
pub use error::ServerError;
pub use handler::{CommandHandler, ServerInfo};
pub use server::{Server, ServerConfig, ServerStats};
