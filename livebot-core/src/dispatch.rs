//! Per-plugin dispatch queues.
//!
//! Every active plugin owns one unbounded inbound queue drained by a
//! dedicated worker task. Enqueueing never blocks, so fan-out across
//! plugins is fire-and-forget and unordered. Each hook invocation runs in
//! its own spawned task: an error or panic is logged against the plugin and
//! dropped without touching the host or the other plugins. A hook that
//! never completes stalls only its own plugin's queue.

use std::sync::Arc;

use livebot_plugin_api::{
    AdminMessage, Capability, EventContext, LiveEvent, LoopTick, Plugin, PluginError, PluginNotify,
};
use tokio::sync::mpsc;

use crate::registry::ActivePlugin;

/// One unit of work for a plugin worker
#[derive(Debug, Clone)]
pub(crate) enum Delivery {
    Start { users: Vec<String>, is_new_user: bool },
    Tick(LoopTick),
    Message(LiveEvent),
    Notify(PluginNotify),
    Interact(AdminMessage),
}

/// Handle to one plugin's inbound queue
pub(crate) struct PluginChannel {
    name: String,
    capabilities: Vec<Capability>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl PluginChannel {
    /// Spawn the worker task for a plugin and return the queue handle.
    pub fn spawn(plugin: &ActivePlugin, ctx: EventContext) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(
            plugin.instance.clone(),
            plugin.descriptor.name.clone(),
            ctx,
            rx,
        ));
        Self {
            name: plugin.descriptor.name.clone(),
            capabilities: plugin.capabilities.clone(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Enqueue without waiting. A closed queue means the worker is gone;
    /// the delivery is dropped.
    pub fn deliver(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            tracing::debug!(plugin = %self.name, "plugin worker gone, delivery dropped");
        }
    }
}

async fn worker(
    instance: Arc<dyn Plugin>,
    name: String,
    ctx: EventContext,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(delivery) = rx.recv().await {
        let instance = instance.clone();
        let ctx = ctx.clone();
        let invocation = tokio::spawn(async move { invoke(instance, delivery, ctx).await });
        match invocation.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(plugin = %name, %error, "plugin hook failed");
            }
            Err(join_error) if join_error.is_panic() => {
                tracing::error!(plugin = %name, "plugin hook panicked");
            }
            Err(_) => {}
        }
    }
}

async fn invoke(
    plugin: Arc<dyn Plugin>,
    delivery: Delivery,
    ctx: EventContext,
) -> Result<(), PluginError> {
    match delivery {
        Delivery::Start { users, is_new_user } => plugin.on_start(&users, is_new_user, &ctx).await,
        Delivery::Tick(tick) => plugin.on_loop(&tick, &ctx).await,
        Delivery::Message(event) => plugin.on_message(&event, &ctx).await,
        Delivery::Notify(notify) => plugin.on_notify(&notify, &ctx).await,
        Delivery::Interact(msg) => plugin.on_interact(&msg, &ctx).await,
    }
}
