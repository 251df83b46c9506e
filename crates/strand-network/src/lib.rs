//! Gossip sync protocol: wire messages, shared node state, and the TCP
//! server that drives block and transaction propagation between peers.

pub mod error;
pub mod message;
pub mod server;
pub mod state;

pub use error::NetworkError;
pub use message::{InvKind, Message};
pub use server::NetworkServer;
pub use state::NodeState;
