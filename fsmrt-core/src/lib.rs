//! # fsmrt-core
//!
//! Timed finite-state-machine engine for fsmrt.
//!
//! This crate provides:
//! - Typed values and automaton variables
//! - The FSM document model with JSON load/save and static validation
//! - Guard/action script compilation and evaluation
//! - The delay scheduler and the Moore-style executor loop
//! - The abstract channel trait used to reach the monitoring peer

pub mod automaton;
pub mod channel;
pub mod document;
pub mod error;
pub mod scheduler;
pub mod script;
pub mod state;
pub mod transition;
pub mod value;

pub use automaton::{Automaton, AutomatonHandle, EventRecord, SnapshotHook};
pub use channel::{Channel, Packet};
pub use document::{DelaySpec, FsmDocument, LoadWarning};
pub use error::CoreError;
pub use scheduler::Scheduler;
pub use script::{CompiledAction, CompiledGuard, ScriptEnv, ScriptHost};
pub use state::State;
pub use transition::{Delay, Transition};
pub use value::{Value, VarType, Variable};
