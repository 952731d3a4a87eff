//! ConfigStore - single source of truth for configuration.
//!
//! Owns the merged option tree, the retained user-override document, the
//! persistence whitelist, and the room-id mapping. Bootstrap reads a shipped
//! immutable template plus a read-write user document; corruption of the
//! user document is recovered from a byte-identical backup. The in-memory
//! tree is always authoritative: persistence failures are logged, never
//! propagated.

mod filter;
mod rooms;

pub use filter::filter_persisted;
pub use rooms::RoomIdMap;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock as StdRwLock};

use livebot_plugin_api::options::{ADV_CONFIG, CONFIG, NEW_USER_DATA, SERVER, USER};
use livebot_plugin_api::{Options, SharedOptions, Whitelist};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock, mpsc};

/// Errors raised while bootstrapping the store. Everything after a
/// successful `load` is logged instead of surfaced: availability wins over
/// persisted-state strictness.
#[derive(Error, Debug)]
pub enum OptionsError {
    /// The shipped template is missing; the process cannot define correct
    /// behavior without it
    #[error("cannot read default options template {path}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shipped template does not parse
    #[error("cannot parse default options template {path}")]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Any other bootstrap IO failure (user-file creation, read)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Locations of the option documents
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Immutable shipped template
    pub template: PathBuf,
    /// Read-write user-override document
    pub user: PathBuf,
    /// Byte-identical snapshot of the user document
    pub backup: PathBuf,
}

impl ConfigPaths {
    /// Standard layout under one base directory.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            template: base.join("options.default.json"),
            user: base.join("options.json"),
            backup: base.join("options.bak"),
        }
    }
}

/// The configuration store.
pub struct ConfigStore {
    paths: ConfigPaths,
    /// Live merged tree, shared with the host and every plugin hook
    options: SharedOptions,
    /// Retained user-override document, the overlay source for `merge`
    user_doc: RwLock<Options>,
    whitelist: RwLock<Whitelist>,
    rooms: StdRwLock<RoomIdMap>,
    /// Uids seen by the previous merge; `None` until the first merge
    known_users: StdMutex<Option<HashSet<String>>>,
    new_user_subscribers: StdMutex<Vec<mpsc::UnboundedSender<String>>>,
    /// Single-writer discipline for the persisted file
    writer: Mutex<()>,
}

impl ConfigStore {
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            options: Arc::new(RwLock::new(Options::default())),
            user_doc: RwLock::new(Options::default()),
            whitelist: RwLock::new(Whitelist::new()),
            rooms: StdRwLock::new(RoomIdMap::default()),
            known_users: StdMutex::new(None),
            new_user_subscribers: StdMutex::new(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    /// Handle to the live option tree.
    pub fn options(&self) -> SharedOptions {
        self.options.clone()
    }

    /// The persistence whitelist. Mutable only by addition, during plugin
    /// load and merge.
    pub fn whitelist(&self) -> &RwLock<Whitelist> {
        &self.whitelist
    }

    /// Whether a document parses as an option tree. Used to gate recovery
    /// instead of crashing on user-file corruption.
    pub fn validate(text: &str) -> bool {
        Options::from_json(text).is_ok()
    }

    /// Bootstrap: read the template (fatal if missing or malformed), create
    /// the user document from it on first run, read the user document with
    /// backup recovery, and take a bootstrap backup.
    pub async fn load(&self) -> Result<(), OptionsError> {
        let template_text =
            fs::read_to_string(&self.paths.template)
                .await
                .map_err(|source| OptionsError::TemplateRead {
                    path: self.paths.template.clone(),
                    source,
                })?;
        let template =
            Options::from_json(&template_text).map_err(|source| OptionsError::TemplateParse {
                path: self.paths.template.clone(),
                source,
            })?;

        if !self.paths.user.exists() {
            if let Some(parent) = self.paths.user.parent().filter(|p| !p.exists()) {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&self.paths.template, &self.paths.user).await?;
            tracing::info!(path = %self.paths.user.display(), "created user options from template");
        }

        {
            let mut options = self.options.write().await;
            *options = template.clone();
            options.reset_util();
        }
        // Until the user document is read, the defaults double as the
        // override source so a failed recovery still leaves a usable store.
        *self.user_doc.write().await = template;

        let user_text = fs::read_to_string(&self.paths.user).await?;
        match Options::from_json(&user_text) {
            Ok(doc) => *self.user_doc.write().await = doc,
            Err(error) => {
                tracing::warn!(%error, path = %self.paths.user.display(), "user options failed validation");
                self.restore().await;
            }
        }

        self.backup().await;
        Ok(())
    }

    /// Fold the user document into the live tree.
    ///
    /// Shallow-overlays the `server`/`config`/`advConfig` sections, rebuilds
    /// every user entry from the new-user template plus the user's
    /// overrides (so entries predating newer fields still gain them),
    /// whitelists each uid, and reseeds the room-id maps. Idempotent.
    ///
    /// Uids absent from the previous merge are announced to new-user
    /// subscribers; the first merge only seeds the known set.
    pub async fn merge(&self) {
        let user_doc = self.user_doc.read().await.clone();
        let current_users = {
            let mut options = self.options.write().await;
            let mut whitelist = self.whitelist.write().await;

            for name in [SERVER, CONFIG, ADV_CONFIG] {
                if let Some(overrides) = user_doc.section(name) {
                    let merged = options.section_mut(name);
                    for (key, value) in overrides {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }

            let template = options.section(NEW_USER_DATA).cloned().unwrap_or_default();
            if let Some(table) = user_doc.section(USER) {
                for (uid, overrides) in table {
                    whitelist.insert(uid.clone());
                    let mut entry = template.clone();
                    if let Some(overrides) = overrides.as_object() {
                        for (key, value) in overrides {
                            entry.insert(key.clone(), value.clone());
                        }
                    }
                    options
                        .section_mut(USER)
                        .insert(uid.clone(), Value::Object(entry));
                }
            }

            let pairs = options.room_pairs();
            self.rooms
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .rebuild(&pairs);

            options.user_ids().into_iter().collect::<HashSet<_>>()
        };

        let fresh: Vec<String> = {
            let mut known = self
                .known_users
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let fresh = match known.as_ref() {
                Some(previous) => current_users.difference(previous).cloned().collect(),
                None => Vec::new(),
            };
            *known = Some(current_users);
            fresh
        };

        for uid in fresh {
            tracing::info!(uid = %uid, "new user appeared in merged options");
            self.announce_new_user(&uid);
        }
    }

    fn announce_new_user(&self, uid: &str) {
        let mut subscribers = self
            .new_user_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(uid.to_string()).is_ok());
    }

    /// Stream of uids discovered by merges after the first.
    pub fn subscribe_new_users(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.new_user_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// The live tree filtered down to what `save` would write.
    pub async fn persisted_snapshot(&self) -> Value {
        let options = self.options.read().await;
        let whitelist = self.whitelist.read().await;
        filter_persisted(&options.to_value(), &whitelist)
    }

    /// Persist the live tree, filtered by the whitelist-or-digit-key
    /// predicate. Failures are logged; the in-memory tree stays
    /// authoritative and the next save retries naturally.
    pub async fn save(&self) {
        let _writer = self.writer.lock().await;
        let snapshot = self.persisted_snapshot().await;
        let text = match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(%error, "failed to serialize options");
                return;
            }
        };

        if let Err(error) = fs::write(&self.paths.user, text).await {
            tracing::error!(%error, path = %self.paths.user.display(), "failed to persist options");
        }
    }

    /// Copy the persisted user document to the sibling backup file.
    pub async fn backup(&self) {
        let _writer = self.writer.lock().await;
        match fs::copy(&self.paths.user, &self.paths.backup).await {
            Ok(_) => tracing::info!(path = %self.paths.backup.display(), "options backup written"),
            Err(error) => {
                tracing::error!(%error, path = %self.paths.backup.display(), "options backup failed");
            }
        }
    }

    /// Recover the user document from the backup after a failed parse.
    ///
    /// Copies the backup over the user file, re-reads it as the override
    /// document, and re-merges. Without a backup the store keeps running on
    /// defaults only.
    pub async fn restore(&self) {
        tracing::warn!("user options look corrupted, attempting restore from backup");
        if !self.paths.backup.exists() {
            tracing::error!("no options backup found, continuing on defaults");
            return;
        }

        let backup_text = match fs::read_to_string(&self.paths.backup).await {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(%error, "options backup unreadable, continuing on defaults");
                return;
            }
        };
        let doc = match Options::from_json(&backup_text) {
            Ok(doc) => doc,
            Err(error) => {
                tracing::error!(%error, "options backup does not parse, continuing on defaults");
                return;
            }
        };

        {
            let _writer = self.writer.lock().await;
            if let Err(error) = fs::copy(&self.paths.backup, &self.paths.user).await {
                tracing::error!(%error, "failed to copy backup over user options");
            }
        }
        *self.user_doc.write().await = doc;
        self.merge().await;
        tracing::warn!("user options restored from backup");
    }

    /// Apply an edit to the retained user-override document (the admin
    /// write path). Call [`ConfigStore::merge`] afterwards to fold the edit
    /// into the live tree.
    pub async fn edit_user_doc<F: FnOnce(&mut Options)>(&self, edit: F) {
        let mut doc = self.user_doc.write().await;
        edit(&mut doc);
    }

    /// Short id for a room, with identity fallback.
    pub fn short_room_id(&self, room_id: u64) -> u64 {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .short_id(room_id)
    }

    /// Long id for a room, with identity fallback.
    pub fn long_room_id(&self, room_id: u64) -> u64 {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .long_id(room_id)
    }
}
