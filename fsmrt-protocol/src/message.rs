//! JSON message types exchanged between the engine and its peer.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Full observable state of the engine at one instant.
///
/// The maps are ordered so a snapshot always serialises with stable key
/// order. `seq` starts at 1 and increases by exactly one per snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Message type, always `"state"`.
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Monotonic sequence number, starting at 1.
    pub seq: u64,

    /// Milliseconds since the Unix epoch.
    pub ts: i64,

    /// Name of the active state.
    pub state: String,

    /// Last-seen value of each input since the previous transition.
    pub inputs: BTreeMap<String, String>,

    /// Current variable values, JSON-typed.
    pub vars: BTreeMap<String, Value>,

    /// Last value written to each output.
    pub outputs: BTreeMap<String, String>,
}

impl Snapshot {
    /// The `type` tag carried by every snapshot.
    pub const TYPE: &'static str = "state";

    pub fn new(seq: u64, ts: i64, state: impl Into<String>) -> Self {
        Self {
            msg_type: Self::TYPE.to_string(),
            seq,
            ts,
            state: state.into(),
            inputs: BTreeMap::new(),
            vars: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Serialises the snapshot into a datagram payload.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot datagram, checking the `type` tag.
    pub fn decode(json: &str) -> Result<Self, ProtocolError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.msg_type != Self::TYPE {
            return Err(ProtocolError::UnexpectedType(snapshot.msg_type));
        }
        Ok(snapshot)
    }
}

/// Commands a peer may send to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PeerCommand {
    /// Inject an input event into the automaton.
    Inject { name: String, value: String },

    /// Overwrite a variable, coerced to its declared type.
    SetVar { name: String, value: String },

    /// Request a graceful engine shutdown.
    Shutdown,
}

impl PeerCommand {
    /// Decodes a peer datagram.
    ///
    /// Unknown `type` values decode to `None` (the engine ignores them);
    /// malformed JSON and missing fields are errors, which the driver drops.
    pub fn decode(json: &str) -> Result<Option<Self>, ProtocolError> {
        let value: Value = serde_json::from_str(json)?;
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err(ProtocolError::MissingType);
        };
        match kind {
            "inject" | "setVar" | "shutdown" => Ok(Some(serde_json::from_value(value)?)),
            _ => Ok(None),
        }
    }

    /// Serialises the command into a datagram payload.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
