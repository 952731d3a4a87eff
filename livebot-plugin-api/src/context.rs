//! Contexts passed to plugin hooks.
//!
//! `LoadContext` is the registration surface a plugin sees exactly once,
//! during load: it exposes the mutable default option tree and the
//! persistence whitelist. `EventContext` is the runtime surface every other
//! hook receives: the shared option tree plus the plugin's outbound channel.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::event::{OutboundEvent, PluginNotify};
use crate::options::{CONFIG, INFO, NEW_USER_DATA, Options, SharedOptions, Whitelist};

/// Help metadata a plugin registers for one of its option keys.
///
/// Rendered by the admin front end; transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpEntry {
    pub description: String,
    pub tip: String,
    #[serde(rename = "type")]
    pub kind: HelpKind,
}

/// Value type hint for a registered option key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpKind {
    Boolean,
    Number,
    String,
}

impl HelpEntry {
    pub fn new(description: impl Into<String>, tip: impl Into<String>, kind: HelpKind) -> Self {
        Self {
            description: description.into(),
            tip: tip.into(),
            kind,
        }
    }
}

/// Registration surface handed to `on_load`.
///
/// Everything registered here lands in the default tree *before* the user
/// document is merged over it, so user overrides win and every merged user
/// entry is guaranteed to carry the registered per-user defaults.
pub struct LoadContext<'a> {
    defaults: &'a mut Options,
    whitelist: &'a mut Whitelist,
}

impl<'a> LoadContext<'a> {
    pub fn new(defaults: &'a mut Options, whitelist: &'a mut Whitelist) -> Self {
        Self { defaults, whitelist }
    }

    /// Read access to the default tree being assembled.
    pub fn defaults(&self) -> &Options {
        self.defaults
    }

    /// Register a runtime option default under the `config` section.
    pub fn config_default(&mut self, key: &str, value: impl Into<Value>) {
        self.defaults
            .section_mut(CONFIG)
            .insert(key.to_string(), value.into());
    }

    /// Register a per-user field default in the new-user template.
    pub fn user_default(&mut self, key: &str, value: impl Into<Value>) {
        self.defaults
            .section_mut(NEW_USER_DATA)
            .insert(key.to_string(), value.into());
    }

    /// Register help metadata for a key this plugin owns.
    pub fn describe(&mut self, key: &str, help: HelpEntry) {
        self.defaults
            .section_mut(INFO)
            .insert(key.to_string(), json!(help));
    }

    /// Mark a key as persisted across save/reload cycles.
    pub fn persist(&mut self, key: &str) {
        self.whitelist.insert(key);
    }

    pub fn whitelist(&self) -> &Whitelist {
        self.whitelist
    }
}

/// Runtime surface passed to every hook after load.
#[derive(Clone)]
pub struct EventContext {
    plugin: String,
    options: SharedOptions,
    outbox: mpsc::UnboundedSender<OutboundEvent>,
}

impl EventContext {
    pub fn new(
        plugin: impl Into<String>,
        options: SharedOptions,
        outbox: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            options,
            outbox,
        }
    }

    /// This plugin's name, as the host routes it.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Handle to the live option tree (which also holds the user table).
    pub fn options(&self) -> &SharedOptions {
        &self.options
    }

    /// Broadcast an inter-plugin notification to all other plugins.
    pub fn notify(&self, cmd: impl Into<String>, data: Value) {
        let event = OutboundEvent::Notify {
            from: self.plugin.clone(),
            notify: PluginNotify {
                cmd: cmd.into(),
                data,
            },
        };
        if self.outbox.send(event).is_err() {
            tracing::debug!(plugin = %self.plugin, "outbound channel closed, notify dropped");
        }
    }

    /// Send a payload to the admin gateway for delivery to the front end.
    pub fn interact(&self, payload: Value) {
        let event = OutboundEvent::Interact {
            from: self.plugin.clone(),
            payload,
        };
        if self.outbox.send(event).is_err() {
            tracing::debug!(plugin = %self.plugin, "outbound channel closed, interact dropped");
        }
    }
}
