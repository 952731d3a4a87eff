//! livebot-plugin-api - Plugin API for the livebot automation daemon
//!
//! This crate provides the trait and types needed to write plugins for
//! livebot. Plugins react to live-stream events, register their own
//! configuration defaults, and talk to each other through host-mediated
//! notifications.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use livebot_plugin_api::{
//!     Capability, LoadContext, Plugin, PluginDescriptor, PluginError,
//! };
//!
//! #[derive(Default)]
//! pub struct MyPlugin {
//!     loaded: AtomicBool,
//! }
//!
//! #[async_trait::async_trait]
//! impl Plugin for MyPlugin {
//!     fn descriptor(&self) -> PluginDescriptor {
//!         PluginDescriptor {
//!             name: "my-plugin".to_string(),
//!             description: "does one thing".to_string(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     fn capabilities(&self) -> &[Capability] {
//!         &[Capability::Load]
//!     }
//!
//!     fn loaded(&self) -> bool {
//!         self.loaded.load(Ordering::Relaxed)
//!     }
//!
//!     async fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), PluginError> {
//!         ctx.config_default("myFlag", false);
//!         ctx.persist("myFlag");
//!         self.loaded.store(true, Ordering::Relaxed);
//!         Ok(())
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod event;
pub mod options;
pub mod types;

pub use context::{EventContext, HelpEntry, HelpKind, LoadContext};
pub use error::PluginError;
pub use event::{
    AdminMessage, BeatStormEvent, LiveEvent, LoopTick, LotteryEvent, OutboundEvent, PluginNotify,
    RaffleEvent,
};
pub use options::{Options, SharedOptions, Whitelist};
pub use types::{Capability, PluginDescriptor};

use async_trait::async_trait;

/// The core plugin trait - implement this to create a livebot plugin.
///
/// All lifecycle hooks have default no-op implementations; a plugin only
/// overrides the hooks it declares in [`Plugin::capabilities`]. The host
/// never dispatches a hook the plugin did not declare.
///
/// Hooks take `&self`: a plugin that carries state uses interior mutability,
/// because the host invokes hooks from concurrently running tasks.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin metadata, logged on activation.
    fn descriptor(&self) -> PluginDescriptor;

    /// The optional hooks this plugin implements.
    fn capabilities(&self) -> &[Capability];

    /// Whether the plugin's own load completed successfully. The registry
    /// activates a plugin only if this reports true after `on_load` returns.
    fn loaded(&self) -> bool;

    /// Register config defaults, per-user defaults, help metadata, and
    /// whitelist keys. Invoked once, before the user document is merged.
    async fn on_load(&self, _ctx: &mut LoadContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked once at startup with the whole user table, and once per newly
    /// discovered user with `is_new_user` set and a single-uid slice.
    async fn on_start(
        &self,
        _users: &[String],
        _is_new_user: bool,
        _ctx: &EventContext,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked once per minute rollover.
    async fn on_loop(&self, _tick: &LoopTick, _ctx: &EventContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked on each raffle-class external event.
    async fn on_message(&self, _event: &LiveEvent, _ctx: &EventContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked on inter-plugin broadcast.
    async fn on_notify(
        &self,
        _notify: &PluginNotify,
        _ctx: &EventContext,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Invoked on an admin-routed message addressed to this plugin.
    async fn on_interact(
        &self,
        _msg: &AdminMessage,
        _ctx: &EventContext,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}
