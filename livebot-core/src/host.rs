//! PluginHost - startup orchestration and event dispatch.
//!
//! Composes the configuration store, the plugin registry, the per-plugin
//! dispatch queues, the outbound pump, and the maintenance scheduler, and
//! exposes the dispatch entry points external collaborators push into.

use std::sync::Arc;
use std::time::Duration;

use livebot_plugin_api::{
    AdminMessage, Capability, EventContext, LiveEvent, OutboundEvent, Plugin,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::collab::{AdminGateway, RoomListener, SessionManager, SessionOutcome};
use crate::dispatch::{Delivery, PluginChannel};
use crate::error::HostError;
use crate::registry::PluginRegistry;
use crate::scheduler;
use crate::store::ConfigStore;

/// Assembles a [`PluginHost`].
pub struct HostBuilder {
    store: Arc<ConfigStore>,
    plugins: Vec<Arc<dyn Plugin>>,
    listener: Option<Arc<dyn RoomListener>>,
    admin: Option<Arc<dyn AdminGateway>>,
    sessions: Option<Arc<dyn SessionManager>>,
    tick_period: Duration,
}

impl HostBuilder {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            plugins: Vec::new(),
            listener: None,
            admin: None,
            sessions: None,
            tick_period: scheduler::TICK_PERIOD,
        }
    }

    /// Register a plugin instance for loading.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn RoomListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn admin_gateway(mut self, admin: Arc<dyn AdminGateway>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn session_manager(mut self, sessions: Arc<dyn SessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Override the maintenance tick period. The rollover debounce keeps
    /// maintenance at one trigger per minute regardless.
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Run the full startup sequence and hand back the running host.
    pub async fn start(self) -> Result<PluginHost, HostError> {
        PluginHost::start(self).await
    }
}

/// The running plugin host.
pub struct PluginHost {
    store: Arc<ConfigStore>,
    channels: Arc<Vec<PluginChannel>>,
}

impl PluginHost {
    async fn start(builder: HostBuilder) -> Result<Self, HostError> {
        let HostBuilder {
            store,
            plugins,
            listener,
            admin,
            sessions,
            tick_period,
        } = builder;

        store.load().await?;

        // Plugins load before merge so their registered defaults and
        // whitelist keys participate in it.
        let mut registry = PluginRegistry::new();
        registry.load_all(plugins, &store).await;

        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let options = store.options();
        let channels: Arc<Vec<PluginChannel>> = Arc::new(
            registry
                .active()
                .iter()
                .map(|plugin| {
                    let ctx = EventContext::new(
                        plugin.descriptor.name.clone(),
                        options.clone(),
                        outbox.clone(),
                    );
                    PluginChannel::spawn(plugin, ctx)
                })
                .collect(),
        );
        drop(outbox);

        // Users discovered by later merges get a scoped start pass.
        let mut new_users = store.subscribe_new_users();
        {
            let channels = channels.clone();
            tokio::spawn(async move {
                while let Some(uid) = new_users.recv().await {
                    broadcast_start(&channels, vec![uid], true);
                }
            });
        }

        store.merge().await;

        if let Some(sessions) = &sessions {
            start_user_sessions(&store, sessions.as_ref()).await;
        }

        let users = {
            let options = options.read().await;
            options.user_ids()
        };
        broadcast_start(&channels, users, false);

        if let Some(listener) = &listener {
            listener.start().await?;
        }
        if let Some(admin) = &admin {
            admin.start().await?;
        }

        tokio::spawn(outbound_pump(outbox_rx, channels.clone(), admin));
        tokio::spawn(scheduler::run(
            store.clone(),
            listener,
            channels.clone(),
            tick_period,
        ));

        Ok(Self { store, channels })
    }

    /// Fan a raffle-class event out to every message-capable plugin.
    ///
    /// Fire-and-forget: deliveries are enqueued without waiting, and
    /// completion order across plugins is unspecified.
    pub fn handle_message(&self, event: LiveEvent) {
        for channel in self
            .channels
            .iter()
            .filter(|c| c.supports(Capability::Message))
        {
            channel.deliver(Delivery::Message(event.clone()));
        }
    }

    /// Route an admin message to the one plugin it addresses. Unknown
    /// targets are silently ignored.
    pub fn interact(&self, msg: AdminMessage) {
        match self
            .channels
            .iter()
            .find(|c| c.name() == msg.plugin && c.supports(Capability::Interact))
        {
            Some(channel) => channel.deliver(Delivery::Interact(msg)),
            None => tracing::debug!(plugin = %msg.plugin, "interact target unknown, ignored"),
        }
    }

    /// The configuration store backing this host.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// How many plugins survived loading.
    pub fn plugin_count(&self) -> usize {
        self.channels.len()
    }

    /// Names of the active plugins, in load order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }
}

/// Start enabled user sessions sequentially; a session reporting a terminal
/// outcome is stopped immediately.
async fn start_user_sessions(store: &Arc<ConfigStore>, sessions: &dyn SessionManager) {
    let entries: Vec<(String, serde_json::Map<String, Value>)> = {
        let shared = store.options();
        let options = shared.read().await;
        options
            .users()
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(uid, entry)| {
                        entry.as_object().map(|obj| (uid.clone(), obj.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    for (uid, entry) in entries {
        let enabled = entry.get("status").and_then(Value::as_bool).unwrap_or(false);
        if !enabled {
            continue;
        }
        match sessions.start_user(&uid, &entry).await {
            SessionOutcome::Running => {
                tracing::info!(uid = %uid, "user session started");
            }
            SessionOutcome::Terminated(reason) => {
                tracing::warn!(uid = %uid, %reason, "user session terminal, stopping");
                sessions.stop_user(&uid).await;
            }
        }
    }
}

fn broadcast_start(channels: &[PluginChannel], users: Vec<String>, is_new_user: bool) {
    for channel in channels.iter().filter(|c| c.supports(Capability::Start)) {
        channel.deliver(Delivery::Start {
            users: users.clone(),
            is_new_user,
        });
    }
}

/// Merge plugin-originated events: notifications re-broadcast to peers,
/// interactions forward to the admin gateway.
async fn outbound_pump(
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
    channels: Arc<Vec<PluginChannel>>,
    admin: Option<Arc<dyn AdminGateway>>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            OutboundEvent::Notify { from, notify } => {
                for channel in channels
                    .iter()
                    .filter(|c| c.supports(Capability::Notify) && c.name() != from)
                {
                    channel.deliver(Delivery::Notify(notify.clone()));
                }
            }
            OutboundEvent::Interact { from, payload } => match &admin {
                Some(gateway) => gateway.deliver(&from, payload).await,
                None => {
                    tracing::debug!(plugin = %from, "no admin gateway configured, interact dropped");
                }
            },
        }
    }
}
