//! # fsmrt-protocol
//!
//! Wire protocol for the fsmrt monitoring channel.
//!
//! Messages travel as one JSON document per UDP datagram:
//! - engine → peer: `state` snapshots of the full observable automaton state
//! - peer → engine: `inject`, `setVar` and `shutdown` commands
//!
//! Datagrams carry no framing and no ordering guarantee; the snapshot `seq`
//! field is the only order a monitor can rely on.

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{PeerCommand, Snapshot};

/// Maximum datagram payload carried by the channel.
pub const MAX_DATAGRAM: usize = 2048;
