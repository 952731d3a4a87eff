//! Plugin registry - runs load hooks and gates activation on success.

use std::sync::Arc;

use livebot_plugin_api::{Capability, LoadContext, Plugin, PluginDescriptor};

use crate::store::ConfigStore;

/// A plugin that survived its load phase and receives dispatch
pub struct ActivePlugin {
    pub descriptor: PluginDescriptor,
    pub capabilities: Vec<Capability>,
    pub instance: Arc<dyn Plugin>,
}

/// Registry of active plugins
#[derive(Default)]
pub struct PluginRegistry {
    active: Vec<ActivePlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every plugin's load hook against the default tree and whitelist,
    /// keeping only plugins that assert their own success.
    ///
    /// A failing load hook excludes that plugin and never aborts loading of
    /// the rest. Must run before the store merges the user document so the
    /// registered defaults participate in the merge.
    pub async fn load_all(&mut self, plugins: Vec<Arc<dyn Plugin>>, store: &ConfigStore) {
        for plugin in plugins {
            let descriptor = plugin.descriptor();
            let capabilities = plugin.capabilities().to_vec();

            if capabilities.contains(&Capability::Load) {
                let shared = store.options();
                let mut defaults = shared.write().await;
                let mut whitelist = store.whitelist().write().await;
                let mut ctx = LoadContext::new(&mut defaults, &mut whitelist);
                if let Err(error) = plugin.on_load(&mut ctx).await {
                    tracing::error!(plugin = %descriptor.name, %error, "plugin load hook failed, dropping");
                    continue;
                }
            }

            if !plugin.loaded() {
                tracing::warn!(plugin = %descriptor.name, "plugin did not report loaded, dropping");
                continue;
            }

            tracing::info!(
                plugin = %descriptor.name,
                description = %descriptor.description,
                version = %descriptor.version,
                author = %descriptor.author,
                "plugin activated"
            );
            self.active.push(ActivePlugin {
                descriptor,
                capabilities,
                instance: plugin,
            });
        }
    }

    pub fn active(&self) -> &[ActivePlugin] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
