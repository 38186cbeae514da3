//! Relay connection state machine
//!
//! Tracks the agent's position in the registration lifecycle and validates
//! transitions. Connection loss returns to Disconnected from any state.

use std::fmt;
use std::time::Instant;

use crate::error::RelayError;

/// Connection states for the relay link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport connection
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Transport established, not yet registered
    Connected,
    /// Registration acknowledged; agent id and pairing code assigned
    Registered,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Registered => write!(f, "Registered"),
        }
    }
}

impl ConnectionState {
    /// Returns true if the transport is up
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Registered)
    }

    /// Returns valid transitions from this state
    pub fn valid_transitions(&self) -> &'static [ConnectionState] {
        match self {
            ConnectionState::Disconnected => &[ConnectionState::Connecting],
            ConnectionState::Connecting => {
                &[ConnectionState::Connected, ConnectionState::Disconnected]
            }
            ConnectionState::Connected => {
                &[ConnectionState::Registered, ConnectionState::Disconnected]
            }
            ConnectionState::Registered => &[ConnectionState::Disconnected],
        }
    }
}

/// Record of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// Previous state
    pub from: ConnectionState,
    /// New state
    pub to: ConnectionState,
    /// When the transition occurred
    pub timestamp: Instant,
}

/// State machine for the relay connection lifecycle
#[derive(Debug)]
pub struct ConnectionStateMachine {
    current: ConnectionState,
    state_entered_at: Instant,
    history: Vec<StateTransition>,
    max_history: usize,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    const DEFAULT_MAX_HISTORY: usize = 64;

    /// Creates a new state machine in Disconnected state
    pub fn new() -> Self {
        Self {
            current: ConnectionState::Disconnected,
            state_entered_at: Instant::now(),
            history: Vec::new(),
            max_history: Self::DEFAULT_MAX_HISTORY,
        }
    }

    /// Returns the current state
    pub fn current(&self) -> ConnectionState {
        self.current
    }

    /// Returns true if the transition is valid
    pub fn can_transition(&self, to: ConnectionState) -> bool {
        self.current.valid_transitions().contains(&to)
    }

    /// Attempts to transition to a new state
    pub fn transition(&mut self, to: ConnectionState) -> Result<(), RelayError> {
        if !self.can_transition(to) {
            return Err(RelayError::Protocol(format!(
                "invalid state transition {} -> {}",
                self.current, to
            )));
        }
        self.record(to);
        Ok(())
    }

    /// Force transition to a state, bypassing validation
    ///
    /// Used for connection loss, which is legal from every state.
    pub fn force_transition(&mut self, to: ConnectionState) {
        self.record(to);
    }

    fn record(&mut self, to: ConnectionState) {
        let transition = StateTransition {
            from: self.current,
            to,
            timestamp: Instant::now(),
        };
        self.current = to;
        self.state_entered_at = transition.timestamp;

        self.history.push(transition);
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }
    }

    /// Returns how long we've been in the current state
    pub fn time_in_state(&self) -> std::time::Duration {
        self.state_entered_at.elapsed()
    }

    /// Returns the transition history
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = ConnectionStateMachine::new();
        assert_eq!(sm.current(), ConnectionState::Disconnected);
        assert!(!sm.current().is_connected());
    }

    #[test]
    fn test_registration_path() {
        let mut sm = ConnectionStateMachine::new();

        assert!(sm.transition(ConnectionState::Connecting).is_ok());
        assert!(sm.transition(ConnectionState::Connected).is_ok());
        assert!(sm.transition(ConnectionState::Registered).is_ok());
        assert!(sm.current().is_connected());
        assert_eq!(sm.history().len(), 3);
    }

    #[test]
    fn test_invalid_transition() {
        let mut sm = ConnectionStateMachine::new();

        // Cannot register straight from Disconnected
        assert!(sm.transition(ConnectionState::Registered).is_err());
        assert_eq!(sm.current(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_loss_from_any_state() {
        for start in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Registered,
        ] {
            let mut sm = ConnectionStateMachine::new();
            sm.force_transition(start);
            sm.force_transition(ConnectionState::Disconnected);
            assert_eq!(sm.current(), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn test_reregistration_after_reconnect() {
        let mut sm = ConnectionStateMachine::new();
        sm.transition(ConnectionState::Connecting).unwrap();
        sm.transition(ConnectionState::Connected).unwrap();
        sm.transition(ConnectionState::Registered).unwrap();

        // Drop and reconnect
        sm.force_transition(ConnectionState::Disconnected);
        sm.transition(ConnectionState::Connecting).unwrap();
        sm.transition(ConnectionState::Connected).unwrap();
        assert!(sm.transition(ConnectionState::Registered).is_ok());
    }
}
