//! Communication session management
//!
//! Defines the trait for tunneling messages between the game engine
//! and connected clients (players and the host). The tunnel
//! abstraction keeps the engine transport-agnostic; implementations
//! might use WebSockets, Server-Sent Events, or an in-process channel
//! in tests.

use crate::game::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Update messages notify clients about incremental changes that
    /// affect their current view of the game.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    ///
    /// Sync messages carry the full state a client needs to render
    /// its view from scratch, typically on connect or reconnect.
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    ///
    /// Called when the client is removed or the session ends.
    fn close(self);
}
