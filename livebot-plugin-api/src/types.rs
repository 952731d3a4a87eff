//! Plugin metadata and capability declarations

use serde::{Deserialize, Serialize};

/// Descriptive metadata about a plugin, logged on activation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginDescriptor {
    /// Plugin name (used as the routing id for admin-targeted messages)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Plugin version (semver)
    pub version: String,
    /// Plugin author
    pub author: String,
}

impl Default for PluginDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            version: "0.0.1".to_string(),
            author: String::new(),
        }
    }
}

/// Optional lifecycle hooks a plugin may implement.
///
/// The host only dispatches a hook to plugins that declare the matching
/// capability; undeclared hooks are silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `on_load` - register config defaults, help metadata, and whitelist keys
    Load,
    /// `on_start` - invoked at startup and once per newly discovered user
    Start,
    /// `on_loop` - invoked once per minute rollover
    Loop,
    /// `on_message` - invoked on each raffle-class external event
    Message,
    /// `on_notify` - invoked on inter-plugin broadcast
    Notify,
    /// `on_interact` - invoked on admin-routed messages addressed to this plugin
    Interact,
}
