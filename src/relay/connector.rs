//! Relay connector
//!
//! The orchestrator: owns the relay link, runs the registration handshake,
//! tracks viewers and their encryption contexts, wires captured frames out
//! to the relay and viewer input back into the host. All relay event
//! handling is serialized on one dispatch task; the capture thread hands
//! frames over through a bounded channel, dropping frames when the dispatch
//! path lags rather than queueing them.

use crate::capture::{Frame, ScreenCapture, SubscriptionId};
use crate::crypto::EncryptionContext;
use crate::error::{InjectionError, RelayError};
use crate::input::InputController;
use crate::relay::protocol::{
    AgentRegister, Capability, FramePayload, RelayMessage,
};
use crate::relay::state::{ConnectionState, ConnectionStateMachine};
use crate::relay::transport::TransportEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Buffer between the capture thread and the dispatch task
const FRAME_BUFFER: usize = 4;

/// Broadcast capacity for lifecycle events
const EVENT_CAPACITY: usize = 32;

/// Housekeeping tick for timeout checks
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(500);

/// Connector configuration
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Display name reported to the relay (hostname when empty)
    pub name: String,
    /// How long to wait for `agent:registered` before re-sending
    pub registration_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            registration_timeout: Duration::from_secs(15),
        }
    }
}

/// Identity assigned by the relay at registration
///
/// Lives for the duration of the relay connection.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Relay-assigned agent identifier
    pub agent_id: String,
    /// Out-of-band secret a viewer enters to join
    pub pairing_code: String,
}

impl fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("agent_id", &self.agent_id)
            .field("pairing_code", &"***")
            .finish()
    }
}

/// A connected viewer
///
/// Destroyed on leave, which also drops its encryption context; a departed
/// viewer's key is never reused.
#[derive(Debug)]
pub struct Viewer {
    /// Relay-assigned viewer identifier
    pub viewer_id: String,
    /// When the viewer joined
    pub joined_at: SystemTime,
    /// Per-viewer encryption, present once key exchange completes
    pub encryption: Option<EncryptionContext>,
}

impl Viewer {
    fn new(viewer_id: String) -> Self {
        Self {
            viewer_id,
            joined_at: SystemTime::now(),
            encryption: None,
        }
    }

    /// Returns whether this viewer completed key exchange
    pub fn is_encrypted(&self) -> bool {
        self.encryption
            .as_ref()
            .map(|context| context.is_ready())
            .unwrap_or(false)
    }
}

/// Lifecycle events emitted by the connector
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    /// Transport (re)connected
    Connected,
    /// Transport lost
    Disconnected,
    /// Registration acknowledged
    Registered {
        /// Relay-assigned agent identifier
        agent_id: String,
        /// Pairing code to show the user
        pairing_code: String,
    },
    /// A viewer joined
    ViewerJoined {
        /// The viewer's identifier
        viewer_id: String,
        /// Total viewers after the join
        viewer_count: u32,
    },
    /// A viewer left
    ViewerLeft {
        /// The viewer's identifier
        viewer_id: String,
        /// Total viewers after the leave
        viewer_count: u32,
    },
    /// Key exchange completed for a viewer
    EncryptionEstablished {
        /// The viewer's identifier
        viewer_id: String,
    },
    /// Screen streaming started
    StreamingStarted,
    /// Screen streaming stopped
    StreamingStopped,
}

/// The relay connector state machine and dispatch loop
pub struct RelayConnector {
    config: ConnectorConfig,
    capture: Arc<ScreenCapture>,
    input: Arc<InputController>,
    outbound: mpsc::Sender<RelayMessage>,
    state: ConnectionStateMachine,
    identity: Option<AgentIdentity>,
    viewers: HashMap<String, Viewer>,
    forward_sub: Option<SubscriptionId>,
    frame_tx: mpsc::Sender<Arc<Frame>>,
    frame_rx: Option<mpsc::Receiver<Arc<Frame>>>,
    registration_deadline: Option<Instant>,
    events: broadcast::Sender<ConnectorEvent>,
}

impl RelayConnector {
    /// Creates a connector over an outbound relay channel
    pub fn new(
        config: ConnectorConfig,
        capture: Arc<ScreenCapture>,
        input: Arc<InputController>,
        outbound: mpsc::Sender<RelayMessage>,
    ) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            config,
            capture,
            input,
            outbound,
            state: ConnectionStateMachine::new(),
            identity: None,
            viewers: HashMap::new(),
            forward_sub: None,
            frame_tx,
            frame_rx: Some(frame_rx),
            registration_deadline: None,
            events,
        }
    }

    /// Subscribes to lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    /// Returns the current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    /// Returns the relay-assigned identity, if registered
    pub fn identity(&self) -> Option<&AgentIdentity> {
        self.identity.as_ref()
    }

    /// Returns the number of connected viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Returns whether the given viewer completed key exchange
    pub fn viewer_is_encrypted(&self, viewer_id: &str) -> bool {
        self.viewers
            .get(viewer_id)
            .map(Viewer::is_encrypted)
            .unwrap_or(false)
    }

    /// Runs the dispatch loop until the transport closes
    ///
    /// Consumes the connector: all relay event handling, frame forwarding,
    /// and input dispatch is serialized here.
    pub async fn run(mut self, mut transport: mpsc::Receiver<TransportEvent>) {
        let mut frame_rx = match self.frame_rx.take() {
            Some(rx) => rx,
            None => {
                error!("Connector dispatch loop started twice");
                return;
            }
        };

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Relay connector dispatch loop started");
        loop {
            tokio::select! {
                event = transport.recv() => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        info!("Transport closed; connector stopping");
                        break;
                    }
                },
                frame = frame_rx.recv() => {
                    if let Some(frame) = frame {
                        self.forward_frame(&frame).await;
                    }
                },
                _ = housekeeping.tick() => self.check_registration_deadline().await,
            }
        }
        self.teardown_streaming();
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.state.current() == ConnectionState::Disconnected {
                    let _ = self.state.transition(ConnectionState::Connecting);
                    let _ = self.state.transition(ConnectionState::Connected);
                } else {
                    self.state.force_transition(ConnectionState::Connected);
                }
                self.emit(ConnectorEvent::Connected);
                self.send_registration().await;
            }
            TransportEvent::Disconnected { reason } => {
                warn!("Relay transport disconnected: {}", reason);
                self.state.force_transition(ConnectionState::Disconnected);
                self.identity = None;
                self.registration_deadline = None;
                // Viewer sessions do not survive the relay connection;
                // dropping the records discards their encryption contexts.
                self.viewers.clear();
                self.teardown_streaming();
                self.emit(ConnectorEvent::Disconnected);
            }
            TransportEvent::Message(message) => self.handle_message(message).await,
        }
    }

    async fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::AgentRegistered {
                agent_id,
                pairing_code,
            } => self.handle_registered(agent_id, pairing_code),
            RelayMessage::ViewerJoined {
                viewer_id,
                viewer_count,
            } => self.handle_viewer_joined(viewer_id, viewer_count),
            RelayMessage::ViewerLeft {
                viewer_id,
                viewer_count,
            } => self.handle_viewer_left(viewer_id, viewer_count),
            RelayMessage::EncryptionInit {
                viewer_id,
                public_key,
            } => self.handle_encryption_init(viewer_id, public_key).await,
            RelayMessage::ScreenStart {
                fps,
                quality,
                display_id,
            } => self.handle_screen_start(fps, quality, display_id).await,
            RelayMessage::ScreenStop => self.handle_screen_stop().await,
            RelayMessage::InputMouseMove { .. }
            | RelayMessage::InputClick { .. }
            | RelayMessage::InputDoubleClick
            | RelayMessage::InputRightClick { .. }
            | RelayMessage::InputType { .. }
            | RelayMessage::InputKey { .. }
            | RelayMessage::InputScroll { .. } => self.dispatch_input(&message),
            // Agent-originated events echoed back are a relay bug
            other => debug!("Ignoring unexpected relay message: {:?}", other),
        }
    }

    fn handle_registered(&mut self, agent_id: String, pairing_code: String) {
        self.registration_deadline = None;
        if self.state.current() == ConnectionState::Connected {
            let _ = self.state.transition(ConnectionState::Registered);
        } else {
            self.state.force_transition(ConnectionState::Registered);
        }

        info!("Registered with relay as agent {}", agent_id);
        self.identity = Some(AgentIdentity {
            agent_id: agent_id.clone(),
            pairing_code: pairing_code.clone(),
        });
        self.emit(ConnectorEvent::Registered {
            agent_id,
            pairing_code,
        });
    }

    fn handle_viewer_joined(&mut self, viewer_id: String, viewer_count: u32) {
        info!("Viewer {} joined ({} total)", viewer_id, viewer_count);
        self.viewers
            .insert(viewer_id.clone(), Viewer::new(viewer_id.clone()));
        self.emit(ConnectorEvent::ViewerJoined {
            viewer_id,
            viewer_count,
        });
    }

    fn handle_viewer_left(&mut self, viewer_id: String, viewer_count: u32) {
        // Dropping the record discards the viewer's encryption context;
        // a departed viewer's key is never reused.
        if self.viewers.remove(&viewer_id).is_some() {
            info!("Viewer {} left ({} remaining)", viewer_id, viewer_count);
        } else {
            warn!("viewer:left for unknown viewer {}", viewer_id);
        }

        if self.viewers.is_empty() {
            debug!("Last viewer left; stopping capture");
            self.teardown_streaming();
        }
        self.emit(ConnectorEvent::ViewerLeft {
            viewer_id,
            viewer_count,
        });
    }

    async fn handle_encryption_init(&mut self, viewer_id: String, public_key: Vec<u8>) {
        if !self.viewers.contains_key(&viewer_id) {
            warn!("encryption:init for unknown viewer {}", viewer_id);
            return;
        }

        // One fresh context per exchange; never reuse a completed one.
        let mut context = EncryptionContext::new();
        let local_public = match context
            .initialize()
            .and_then(|public| context.set_remote_public_key(&public_key).map(|_| public))
        {
            Ok(public) => public,
            Err(e) => {
                warn!("Key agreement with viewer {} failed: {}", viewer_id, e);
                return;
            }
        };

        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.encryption = Some(context);
        }
        info!("End-to-end encryption established with viewer {}", viewer_id);

        self.send(RelayMessage::EncryptionReady {
            viewer_id: viewer_id.clone(),
            public_key: local_public.to_vec(),
        })
        .await;
        self.emit(ConnectorEvent::EncryptionEstablished { viewer_id });
    }

    async fn handle_screen_start(&mut self, fps: u8, quality: u8, display_id: u32) {
        let displays = match self.capture.displays() {
            Ok(displays) => displays,
            Err(e) => {
                // No ack: the viewer sees no frames until screen:started
                warn!("screen:start failed: {}", e);
                return;
            }
        };
        self.send(RelayMessage::ScreenDisplays { displays }).await;

        self.capture.set_quality(quality);
        self.capture.select_display(display_id);

        if self.forward_sub.is_none() {
            let frame_tx = self.frame_tx.clone();
            let sub = self.capture.subscribe(Box::new(move |frame| {
                // Drop the frame when the dispatch path lags; never queue
                // unboundedly behind a slow relay.
                let _ = frame_tx.try_send(frame);
            }));
            self.forward_sub = Some(sub);
        }

        if let Err(e) = self.capture.start_streaming(fps) {
            warn!("Failed to start capture: {}", e);
            return;
        }

        let settings = self.capture.settings();
        self.send(RelayMessage::ScreenStarted {
            fps: settings.fps,
            quality: settings.quality,
            display_id: self.capture.current_display(),
        })
        .await;
        self.emit(ConnectorEvent::StreamingStarted);
    }

    async fn handle_screen_stop(&mut self) {
        self.teardown_streaming();
        self.send(RelayMessage::ScreenStopped).await;
        self.emit(ConnectorEvent::StreamingStopped);
    }

    /// Unsubscribes the relay-forwarding sink and stops capture when no
    /// other subscriber remains
    fn teardown_streaming(&mut self) {
        if let Some(sub) = self.forward_sub.take() {
            self.capture.unsubscribe(sub);
        }
        if self.capture.subscriber_count() == 0 {
            self.capture.stop_streaming();
        }
    }

    /// Forwards one captured frame to the relay, per-viewer encrypted
    ///
    /// Every viewer with a completed key exchange gets its own ciphertext
    /// copy; viewers without one share a single plaintext copy.
    async fn forward_frame(&mut self, frame: &Arc<Frame>) {
        if self.viewers.is_empty() {
            return;
        }

        let mut plaintext_needed = false;
        let mut sealed = Vec::new();
        for (viewer_id, viewer) in &self.viewers {
            match &viewer.encryption {
                Some(context) if context.is_ready() => match context.encrypt_frame(frame) {
                    Ok(payload) => {
                        sealed.push(FramePayload::sealed(viewer_id.clone(), frame, &payload));
                    }
                    Err(e) => warn!(
                        "Failed to encrypt frame {} for viewer {}: {}",
                        frame.frame_number, viewer_id, e
                    ),
                },
                _ => plaintext_needed = true,
            }
        }

        for payload in sealed {
            self.send(RelayMessage::ScreenFrame(payload)).await;
        }
        if plaintext_needed {
            self.send(RelayMessage::ScreenFrame(FramePayload::plaintext(frame)))
                .await;
        }
    }

    /// Dispatches one viewer input event to the host, in arrival order
    fn dispatch_input(&self, message: &RelayMessage) {
        let result = match message {
            RelayMessage::InputMouseMove { x, y } => self.input.move_mouse(*x, *y),
            RelayMessage::InputClick { x, y, button } => match (x, y) {
                (Some(x), Some(y)) => self.input.click_at(*x, *y, *button),
                _ => self.input.click(*button),
            },
            RelayMessage::InputDoubleClick => self.input.double_click(),
            RelayMessage::InputRightClick { x, y } => match (x, y) {
                (Some(x), Some(y)) => {
                    self.input.click_at(*x, *y, crate::input::MouseButton::Right)
                }
                _ => self.input.click(crate::input::MouseButton::Right),
            },
            RelayMessage::InputType { text } => self.input.type_text(text),
            RelayMessage::InputKey { key, modifiers } => {
                if modifiers.is_empty() {
                    self.input.press_key(key)
                } else {
                    self.input.press_combo(modifiers, key)
                }
            }
            RelayMessage::InputScroll { delta_y, delta_x } => {
                self.input.scroll(*delta_y, *delta_x)
            }
            _ => return,
        };

        // Injection failures never crash the dispatch path
        match result {
            Ok(()) => {}
            Err(InjectionError::Disabled) => debug!("Input event ignored: injection disabled"),
            Err(e) => warn!("Input injection failed: {}", e),
        }
    }

    async fn send_registration(&mut self) {
        let register = AgentRegister::for_host(
            &self.config.name,
            vec![Capability::Screen, Capability::Input, Capability::Encryption],
        );
        debug!("Registering as '{}' on {}", register.name, register.platform);
        self.send(RelayMessage::AgentRegister(register)).await;
        self.registration_deadline = Some(Instant::now() + self.config.registration_timeout);
    }

    async fn check_registration_deadline(&mut self) {
        let Some(deadline) = self.registration_deadline else {
            return;
        };
        if self.state.current() != ConnectionState::Connected {
            self.registration_deadline = None;
            return;
        }
        if Instant::now() >= deadline {
            warn!(
                "{}",
                RelayError::RegistrationTimeout(self.config.registration_timeout)
            );
            self.send_registration().await;
        }
    }

    async fn send(&self, message: RelayMessage) {
        if self.outbound.send(message).await.is_err() {
            warn!("{}", RelayError::ChannelClosed);
        }
    }

    fn emit(&self, event: ConnectorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StreamSettings;
    use crate::input::X11Backend;

    fn test_connector() -> (RelayConnector, mpsc::Receiver<RelayMessage>) {
        let (out_tx, out_rx) = mpsc::channel(64);
        let capture = Arc::new(ScreenCapture::new(StreamSettings::default()));
        let input = Arc::new(InputController::with_backend(
            Box::new(X11Backend),
            (1920.0, 1080.0),
            false,
        ));
        let connector = RelayConnector::new(
            ConnectorConfig {
                name: "test-agent".to_string(),
                registration_timeout: Duration::from_millis(50),
            },
            capture,
            input,
            out_tx,
        );
        (connector, out_rx)
    }

    fn synthetic_frame(frame_number: u64) -> Arc<Frame> {
        Arc::new(Frame::new(
            vec![0xFF, 0xD8, 0x10, 0x20, 0x30],
            8,
            8,
            frame_number,
            0,
        ))
    }

    async fn join_viewer(connector: &mut RelayConnector, viewer_id: &str, count: u32) {
        connector
            .handle_message(RelayMessage::ViewerJoined {
                viewer_id: viewer_id.to_string(),
                viewer_count: count,
            })
            .await;
    }

    /// Completes key exchange for a viewer; returns the viewer-side context
    async fn establish_encryption(
        connector: &mut RelayConnector,
        out_rx: &mut mpsc::Receiver<RelayMessage>,
        viewer_id: &str,
    ) -> EncryptionContext {
        let mut viewer_context = EncryptionContext::new();
        let viewer_public = viewer_context.initialize().unwrap();

        connector
            .handle_message(RelayMessage::EncryptionInit {
                viewer_id: viewer_id.to_string(),
                public_key: viewer_public.to_vec(),
            })
            .await;

        match out_rx.recv().await {
            Some(RelayMessage::EncryptionReady {
                viewer_id: id,
                public_key,
            }) => {
                assert_eq!(id, viewer_id);
                viewer_context.set_remote_public_key(&public_key).unwrap();
            }
            other => panic!("expected encryption:ready, got {:?}", other),
        }
        viewer_context
    }

    #[tokio::test]
    async fn test_registration_flow() {
        let (mut connector, mut out_rx) = test_connector();
        assert_eq!(connector.state(), ConnectionState::Disconnected);

        connector
            .handle_transport_event(TransportEvent::Connected)
            .await;
        assert_eq!(connector.state(), ConnectionState::Connected);

        match out_rx.recv().await {
            Some(RelayMessage::AgentRegister(register)) => {
                assert_eq!(register.name, "test-agent");
                assert!(!register.capabilities.is_empty());
            }
            other => panic!("expected agent:register, got {:?}", other),
        }

        connector
            .handle_message(RelayMessage::AgentRegistered {
                agent_id: "agent-1".to_string(),
                pairing_code: "271828".to_string(),
            })
            .await;
        assert_eq!(connector.state(), ConnectionState::Registered);
        assert_eq!(connector.identity().unwrap().agent_id, "agent-1");
        assert_eq!(connector.identity().unwrap().pairing_code, "271828");
    }

    #[tokio::test]
    async fn test_registration_timeout_resends() {
        let (mut connector, mut out_rx) = test_connector();

        connector
            .handle_transport_event(TransportEvent::Connected)
            .await;
        assert!(matches!(
            out_rx.recv().await,
            Some(RelayMessage::AgentRegister(_))
        ));

        // Expire the deadline and run the housekeeping check
        connector.registration_deadline = Some(Instant::now() - Duration::from_millis(1));
        connector.check_registration_deadline().await;

        assert!(matches!(
            out_rx.recv().await,
            Some(RelayMessage::AgentRegister(_))
        ));
    }

    #[tokio::test]
    async fn test_viewer_lifecycle_and_key_exchange() {
        let (mut connector, mut out_rx) = test_connector();

        join_viewer(&mut connector, "viewer-1", 1).await;
        assert_eq!(connector.viewer_count(), 1);
        assert!(!connector.viewer_is_encrypted("viewer-1"));

        let viewer_context =
            establish_encryption(&mut connector, &mut out_rx, "viewer-1").await;
        assert!(connector.viewer_is_encrypted("viewer-1"));
        assert!(viewer_context.is_ready());
    }

    #[tokio::test]
    async fn test_encryption_init_for_unknown_viewer_is_ignored() {
        let (mut connector, mut out_rx) = test_connector();

        connector
            .handle_message(RelayMessage::EncryptionInit {
                viewer_id: "ghost".to_string(),
                public_key: vec![1u8; 32],
            })
            .await;
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_frame_encrypts_per_viewer() {
        let (mut connector, mut out_rx) = test_connector();

        join_viewer(&mut connector, "sealed-viewer", 1).await;
        join_viewer(&mut connector, "plain-viewer", 2).await;
        let viewer_context =
            establish_encryption(&mut connector, &mut out_rx, "sealed-viewer").await;

        let frame = synthetic_frame(9);
        connector.forward_frame(&frame).await;

        let mut sealed_seen = false;
        let mut plaintext_seen = false;
        for _ in 0..2 {
            match out_rx.recv().await {
                Some(RelayMessage::ScreenFrame(payload)) => {
                    assert_eq!(payload.frame_number, 9);
                    if let Some(encrypted) = &payload.encrypted {
                        // Targeted at the viewer that completed key exchange
                        assert_eq!(payload.viewer_id.as_deref(), Some("sealed-viewer"));
                        assert!(payload.image.is_none());
                        let sealed = crate::crypto::EncryptedPayload::try_from(encrypted)
                            .unwrap();
                        assert_eq!(
                            viewer_context.decrypt(&sealed).unwrap(),
                            frame.image_bytes
                        );
                        sealed_seen = true;
                    } else {
                        // Untargeted plaintext copy for the other viewer
                        assert!(payload.viewer_id.is_none());
                        assert_eq!(payload.image.as_ref().unwrap(), &frame.image_bytes);
                        plaintext_seen = true;
                    }
                }
                other => panic!("expected screen:frame, got {:?}", other),
            }
        }
        assert!(sealed_seen && plaintext_seen);
        // Exactly two copies were sent
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_viewer_leave_discards_context() {
        let (mut connector, mut out_rx) = test_connector();

        join_viewer(&mut connector, "viewer-1", 1).await;
        join_viewer(&mut connector, "viewer-2", 2).await;
        establish_encryption(&mut connector, &mut out_rx, "viewer-1").await;

        connector
            .handle_message(RelayMessage::ViewerLeft {
                viewer_id: "viewer-1".to_string(),
                viewer_count: 1,
            })
            .await;
        assert_eq!(connector.viewer_count(), 1);

        // No frame is encrypted under the departed viewer's key
        connector.forward_frame(&synthetic_frame(10)).await;
        match out_rx.recv().await {
            Some(RelayMessage::ScreenFrame(payload)) => {
                assert!(payload.encrypted.is_none());
                assert!(payload.viewer_id.is_none());
            }
            other => panic!("expected screen:frame, got {:?}", other),
        }
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_zero_viewer_idle() {
        let (mut connector, _out_rx) = test_connector();

        join_viewer(&mut connector, "viewer-1", 1).await;
        connector
            .handle_message(RelayMessage::ViewerLeft {
                viewer_id: "viewer-1".to_string(),
                viewer_count: 0,
            })
            .await;

        assert_eq!(connector.viewer_count(), 0);
        assert!(connector.forward_sub.is_none());
        assert!(!connector.capture.is_streaming());

        // With no viewers, frames are not forwarded at all
        connector.forward_frame(&synthetic_frame(0)).await;
    }

    #[tokio::test]
    async fn test_screen_start_acks_when_display_exists() {
        let (mut connector, mut out_rx) = test_connector();

        let has_display = connector.capture.displays().is_ok();
        connector
            .handle_message(RelayMessage::ScreenStart {
                fps: 10,
                quality: 70,
                display_id: 0,
            })
            .await;

        if has_display {
            assert!(matches!(
                out_rx.recv().await,
                Some(RelayMessage::ScreenDisplays { .. })
            ));
            assert!(matches!(
                out_rx.recv().await,
                Some(RelayMessage::ScreenStarted { fps: 10, .. })
            ));
            assert!(connector.capture.is_streaming());

            connector.handle_message(RelayMessage::ScreenStop).await;
            assert!(matches!(
                out_rx.recv().await,
                Some(RelayMessage::ScreenStopped)
            ));
            assert!(!connector.capture.is_streaming());
        } else {
            // Headless: no ack at all, the viewer keeps waiting
            assert!(out_rx.try_recv().is_err());
            assert!(!connector.capture.is_streaming());
        }
    }

    #[tokio::test]
    async fn test_input_dispatch_survives_disabled_controller() {
        let (mut connector, mut out_rx) = test_connector();

        connector
            .handle_message(RelayMessage::InputMouseMove { x: 0.5, y: 0.5 })
            .await;
        connector
            .handle_message(RelayMessage::InputType {
                text: "hello".to_string(),
            })
            .await;
        connector
            .handle_message(RelayMessage::InputKey {
                key: "enter".to_string(),
                modifiers: vec!["ctrl".to_string()],
            })
            .await;
        connector
            .handle_message(RelayMessage::InputScroll {
                delta_y: 3,
                delta_x: 0,
            })
            .await;

        // Input events never produce outbound traffic
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_clears_session_state() {
        let (mut connector, mut out_rx) = test_connector();

        connector
            .handle_transport_event(TransportEvent::Connected)
            .await;
        let _ = out_rx.recv().await; // agent:register
        connector
            .handle_message(RelayMessage::AgentRegistered {
                agent_id: "agent-1".to_string(),
                pairing_code: "123456".to_string(),
            })
            .await;
        join_viewer(&mut connector, "viewer-1", 1).await;

        connector
            .handle_transport_event(TransportEvent::Disconnected {
                reason: "socket closed".to_string(),
            })
            .await;

        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert!(connector.identity().is_none());
        assert_eq!(connector.viewer_count(), 0);

        // Reconnect re-registers
        connector
            .handle_transport_event(TransportEvent::Connected)
            .await;
        assert!(matches!(
            out_rx.recv().await,
            Some(RelayMessage::AgentRegister(_))
        ));
    }

    #[test]
    fn test_identity_debug_redacts_pairing_code() {
        let identity = AgentIdentity {
            agent_id: "agent-1".to_string(),
            pairing_code: "867530".to_string(),
        };
        let debug = format!("{:?}", identity);
        assert!(debug.contains("agent-1"));
        assert!(!debug.contains("867530"));
    }
}
