//! External collaborator interfaces.
//!
//! The live-chat listener, the admin web-socket API, and per-user HTTP
//! sessions live outside this crate; the host drives them only through
//! these traits.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::HostError;

/// The live-chat protocol listener that produces raffle-class events.
#[async_trait]
pub trait RoomListener: Send + Sync {
    /// Begin listening. Called once at host startup.
    async fn start(&self) -> Result<(), HostError>;

    /// Re-resolve the externally monitored room set.
    async fn refresh_rooms(&self);

    /// Drop the event-dedup caches, once per minute rollover.
    fn clear_dedup_caches(&self);
}

/// The admin web-socket API server.
#[async_trait]
pub trait AdminGateway: Send + Sync {
    /// Begin serving. Called once at host startup.
    async fn start(&self) -> Result<(), HostError>;

    /// Deliver a plugin-originated payload back to the front end.
    async fn deliver(&self, from: &str, payload: Value);
}

/// Result of starting one user's session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Running,
    /// The session cannot continue (bad credentials, banned account, ...)
    Terminated(String),
}

/// Per-user HTTP session management.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Start one user's session from their merged entry.
    async fn start_user(&self, uid: &str, entry: &Map<String, Value>) -> SessionOutcome;

    /// Tear a session down.
    async fn stop_user(&self, uid: &str);
}
