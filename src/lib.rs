//! Relaycast - screen-sharing and input relay agent
//!
//! This library implements the agent-side core of a remote screen-sharing
//! system:
//! - Screen capture with publish/subscribe frame fan-out
//! - Per-viewer end-to-end encryption (X25519 + AES-256-GCM)
//! - The relay wire protocol and connection lifecycle
//! - Cross-platform remote input injection
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use relaycast::capture::{ScreenCapture, StreamSettings};
//! use relaycast::input::InputController;
//! use relaycast::relay::{connect, ConnectorConfig, RelayConnector, TransportConfig};
//!
//! # async fn run() {
//! let capture = Arc::new(ScreenCapture::new(StreamSettings::default()));
//! let input = Arc::new(InputController::new(true));
//!
//! let link = connect(TransportConfig {
//!     url: "wss://relay.example.com/agent".to_string(),
//!     ..TransportConfig::default()
//! });
//! let connector =
//!     RelayConnector::new(ConnectorConfig::default(), capture, input, link.outbound);
//! connector.run(link.events).await;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod crypto;
pub mod error;
pub mod input;
pub mod logging;
pub mod relay;

// Re-export commonly used types at crate root
pub use error::{AgentError, Result};
