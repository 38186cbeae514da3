//! Relay module
//!
//! Everything between the agent and its viewers: the wire protocol, the
//! WebSocket transport with reconnection, the connection state machine, and
//! the connector that orchestrates registration, viewers, encryption, and
//! frame/input flow.

pub mod connector;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use connector::{
    AgentIdentity, ConnectorConfig, ConnectorEvent, RelayConnector, Viewer,
};
pub use protocol::{
    AgentRegister, Capability, EncryptedFrame, FramePayload, RelayMessage,
};
pub use state::{ConnectionState, ConnectionStateMachine};
pub use transport::{
    connect, loopback_link, LoopbackRelay, RelayLink, TransportConfig, TransportEvent,
};
