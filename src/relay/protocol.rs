//! Relay wire protocol
//!
//! Every relay event is one JSON object: `{"event": "<name>", "data": {...}}`.
//! Binary fields (frame bytes, public keys, nonces) travel as base64 strings.
//! Coordinates are floating point in `[0,1]`; key names use the canonical
//! vocabulary from the input module.

use crate::capture::{DisplayInfo, Frame};
use crate::crypto::{EncryptedPayload, NONCE_LEN};
use crate::error::RelayError;
use crate::input::MouseButton;
use serde::{Deserialize, Serialize};

/// Base64 (de)serialization for binary wire fields
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Base64 (de)serialization for optional binary wire fields
mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Capability flags advertised at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Screen streaming
    Screen,
    /// Remote input injection
    Input,
    /// End-to-end frame encryption
    Encryption,
}

/// Registration request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegister {
    /// Display name shown to viewers
    pub name: String,
    /// Host machine name
    pub hostname: String,
    /// Host platform identifier
    pub platform: String,
    /// Agent version
    pub version: String,
    /// Advertised capabilities
    pub capabilities: Vec<Capability>,
}

impl AgentRegister {
    /// Builds the registration payload for this host
    ///
    /// Uses the hostname as the display name when `name` is empty.
    pub fn for_host(name: &str, capabilities: Vec<Capability>) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let name = if name.is_empty() {
            hostname.clone()
        } else {
            name.to_string()
        };

        Self {
            name,
            hostname,
            platform: std::env::consts::OS.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities,
        }
    }
}

/// An encrypted frame body on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedFrame {
    /// Ciphertext with appended authentication tag
    #[serde(with = "b64")]
    pub data: Vec<u8>,
    /// AES-GCM nonce
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
}

impl From<&EncryptedPayload> for EncryptedFrame {
    fn from(payload: &EncryptedPayload) -> Self {
        Self {
            data: payload.data.clone(),
            iv: payload.iv.to_vec(),
        }
    }
}

impl TryFrom<&EncryptedFrame> for EncryptedPayload {
    type Error = RelayError;

    fn try_from(frame: &EncryptedFrame) -> Result<Self, Self::Error> {
        let iv: [u8; NONCE_LEN] = frame.iv.as_slice().try_into().map_err(|_| {
            RelayError::Protocol(format!("expected {}-byte iv, got {}", NONCE_LEN, frame.iv.len()))
        })?;
        Ok(Self {
            data: frame.data.clone(),
            iv,
        })
    }
}

/// A frame on the wire: either plaintext or one viewer's ciphertext
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    /// Target viewer for ciphertext frames; plaintext frames are untargeted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    /// Plaintext JPEG bytes
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64_opt")]
    pub image: Option<Vec<u8>>,
    /// Encrypted frame body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<EncryptedFrame>,
    /// Monotonically increasing frame number
    pub frame_number: u64,
    /// Capture timestamp in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Source display
    pub display_id: u32,
}

impl FramePayload {
    /// Builds an untargeted plaintext frame
    pub fn plaintext(frame: &Frame) -> Self {
        Self {
            viewer_id: None,
            image: Some(frame.image_bytes.clone()),
            encrypted: None,
            frame_number: frame.frame_number,
            timestamp: frame.timestamp_ms,
            display_id: frame.display_id,
        }
    }

    /// Builds one viewer's encrypted copy of a frame
    pub fn sealed(viewer_id: String, frame: &Frame, payload: &EncryptedPayload) -> Self {
        Self {
            viewer_id: Some(viewer_id),
            image: None,
            encrypted: Some(EncryptedFrame::from(payload)),
            frame_number: frame.frame_number,
            timestamp: frame.timestamp_ms,
            display_id: frame.display_id,
        }
    }
}

/// A relay wire event
///
/// The `event` tag carries the literal protocol names; unit variants
/// serialize without a `data` member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayMessage {
    /// Agent → relay: registration request
    #[serde(rename = "agent:register")]
    AgentRegister(AgentRegister),

    /// Relay → agent: registration acknowledgement
    #[serde(rename = "agent:registered")]
    AgentRegistered {
        /// Relay-assigned agent identifier
        #[serde(rename = "agentId")]
        agent_id: String,
        /// Out-of-band secret viewers enter to join
        #[serde(rename = "pairingCode")]
        pairing_code: String,
    },

    /// Relay → agent: a viewer joined the session
    #[serde(rename = "viewer:joined")]
    ViewerJoined {
        #[serde(rename = "viewerId")]
        viewer_id: String,
        #[serde(rename = "viewerCount")]
        viewer_count: u32,
    },

    /// Relay → agent: a viewer left the session
    #[serde(rename = "viewer:left")]
    ViewerLeft {
        #[serde(rename = "viewerId")]
        viewer_id: String,
        #[serde(rename = "viewerCount")]
        viewer_count: u32,
    },

    /// Viewer → agent: start key exchange with the viewer's public key
    #[serde(rename = "encryption:init")]
    EncryptionInit {
        #[serde(rename = "viewerId")]
        viewer_id: String,
        #[serde(rename = "publicKey", with = "b64")]
        public_key: Vec<u8>,
    },

    /// Agent → viewer: key exchange complete, carrying the agent public key
    #[serde(rename = "encryption:ready")]
    EncryptionReady {
        #[serde(rename = "viewerId")]
        viewer_id: String,
        #[serde(rename = "publicKey", with = "b64")]
        public_key: Vec<u8>,
    },

    /// Viewer → agent: start the screen stream
    #[serde(rename = "screen:start")]
    ScreenStart {
        fps: u8,
        quality: u8,
        #[serde(rename = "displayId", default)]
        display_id: u32,
    },

    /// Agent → viewer: the enumerated display list
    #[serde(rename = "screen:displays")]
    ScreenDisplays { displays: Vec<DisplayInfo> },

    /// Agent → viewer: stream started acknowledgement
    #[serde(rename = "screen:started")]
    ScreenStarted {
        fps: u8,
        quality: u8,
        #[serde(rename = "displayId")]
        display_id: u32,
    },

    /// Agent → relay → viewer: one captured frame
    #[serde(rename = "screen:frame")]
    ScreenFrame(FramePayload),

    /// Viewer → agent: stop the screen stream
    #[serde(rename = "screen:stop")]
    ScreenStop,

    /// Agent → viewer: stream stopped acknowledgement
    #[serde(rename = "screen:stopped")]
    ScreenStopped,

    /// Viewer → agent: pointer move (normalized coordinates)
    #[serde(rename = "input:mousemove")]
    InputMouseMove { x: f64, y: f64 },

    /// Viewer → agent: click, optionally preceded by a move
    #[serde(rename = "input:click")]
    InputClick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(default)]
        button: MouseButton,
    },

    /// Viewer → agent: double click at the current pointer position
    #[serde(rename = "input:dblclick")]
    InputDoubleClick,

    /// Viewer → agent: right click, optionally preceded by a move
    #[serde(rename = "input:rightclick")]
    InputRightClick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },

    /// Viewer → agent: type a text string
    #[serde(rename = "input:type")]
    InputType { text: String },

    /// Viewer → agent: press a canonical key, optionally with modifiers
    #[serde(rename = "input:key")]
    InputKey {
        key: String,
        #[serde(default)]
        modifiers: Vec<String>,
    },

    /// Viewer → agent: scroll by wire deltas (positive = down/right)
    #[serde(rename = "input:scroll")]
    InputScroll {
        #[serde(rename = "deltaY")]
        delta_y: i32,
        #[serde(rename = "deltaX", default)]
        delta_x: i32,
    },
}

impl RelayMessage {
    /// Serializes the message to a JSON text frame
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a message from a JSON text frame
    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }
}
