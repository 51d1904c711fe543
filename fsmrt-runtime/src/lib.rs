//! # fsmrt-runtime
//!
//! Runtime driver for fsmrt.
//!
//! This crate provides:
//! - The UDP implementation of the engine-peer channel
//! - Runtime configuration (defaults, YAML file, environment overrides)
//! - The document-to-automaton builder
//! - The control-loop driver pumping peer commands, stdin and signals

pub mod builder;
pub mod channel;
pub mod config;
pub mod driver;

pub use builder::build_automaton;
pub use channel::UdpChannel;
pub use config::{Config, ConfigError};
pub use driver::Driver;
