//! The shared option tree and persistence whitelist.
//!
//! Options are a JSON object with fixed top-level sections plus whatever
//! fields plugins register during their load hook. The tree is deliberately
//! schemaless: plugins own the keys they registered and nothing else.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Admin API server settings
pub const SERVER: &str = "server";
/// Runtime options, including plugin-registered keys
pub const CONFIG: &str = "config";
/// Advanced options
pub const ADV_CONFIG: &str = "advConfig";
/// Per-user default template, deep-fill source for every user entry
pub const NEW_USER_DATA: &str = "newUserData";
/// Help metadata registered by plugins; transient, dropped on save
pub const INFO: &str = "info";
/// Per-user table, uid -> entry object
pub const USER: &str = "user";
/// List of [longId, shortId] room pairs
pub const ROOM_LIST: &str = "roomList";
/// Scratch section, reset at load, never persisted
pub const UTIL: &str = "util";

/// Handle to the live option tree shared between the store, the host, and
/// every plugin hook.
pub type SharedOptions = Arc<RwLock<Options>>;

/// The merged configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    root: Map<String, Value>,
}

impl Options {
    /// Parse an option document. Fails if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// View the whole tree as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Raw access to the underlying object.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// A named top-level section, if present and an object.
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    /// Mutable access to a named top-level section, created empty if absent.
    pub fn section_mut(&mut self, name: &str) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("section was just normalized to an object"),
        }
    }

    /// Replace a top-level section wholesale.
    pub fn set_section(&mut self, name: &str, section: Map<String, Value>) {
        self.root.insert(name.to_string(), Value::Object(section));
    }

    /// A key from the runtime `config` section.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.section(CONFIG).and_then(|c| c.get(key))
    }

    /// A boolean flag from the runtime `config` section; absent counts as false.
    pub fn config_bool(&self, key: &str) -> bool {
        self.config_value(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The per-user table.
    pub fn users(&self) -> Option<&Map<String, Value>> {
        self.section(USER)
    }

    /// One user's entry object.
    pub fn user_entry(&self, uid: &str) -> Option<&Map<String, Value>> {
        self.users().and_then(|u| u.get(uid)).and_then(Value::as_object)
    }

    /// Mutable access to one user's entry object.
    pub fn user_entry_mut(&mut self, uid: &str) -> Option<&mut Map<String, Value>> {
        self.section_mut(USER).get_mut(uid).and_then(Value::as_object_mut)
    }

    /// All uids currently in the user table.
    pub fn user_ids(&self) -> Vec<String> {
        self.users()
            .map(|u| u.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The configured (longId, shortId) room pairs. Malformed entries are
    /// skipped rather than surfaced; the list is advisory.
    pub fn room_pairs(&self) -> Vec<(u64, u64)> {
        let Some(list) = self.root.get(ROOM_LIST).and_then(Value::as_array) else {
            return Vec::new();
        };
        list.iter()
            .filter_map(|pair| {
                let pair = pair.as_array()?;
                Some((pair.first()?.as_u64()?, pair.get(1)?.as_u64()?))
            })
            .collect()
    }

    /// Reset the scratch section to an empty object.
    pub fn reset_util(&mut self) {
        self.root.insert(UTIL.to_string(), Value::Object(Map::new()));
    }
}

/// The set of configuration keys permitted to survive a save/reload cycle.
///
/// Seeded with the core keys at construction; plugins append their own
/// persisted keys during load, and the store appends every uid it merges.
/// Append-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct Whitelist {
    keys: HashSet<String>,
}

const CORE_KEYS: &[&str] = &[
    "server",
    "path",
    "hostname",
    "port",
    "protocol",
    "netkey",
    "config",
    "advConfig",
    "localListener",
    "defaultUserID",
    "serverURL",
    "bakServerURL",
    "eventRooms",
    "user",
    "nickname",
    "userName",
    "passWord",
    "biliUID",
    "accessToken",
    "refreshToken",
    "cookie",
    "status",
];

impl Default for Whitelist {
    fn default() -> Self {
        Self {
            keys: CORE_KEYS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key. There is no removal.
    pub fn insert(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Whether a field under this key survives a save/reload cycle: either an
    /// all-digit key (array indices, uids; the empty root key counts) or a
    /// whitelist member.
    pub fn persists(&self, key: &str) -> bool {
        key.bytes().all(|b| b.is_ascii_digit()) || self.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Options {
        Options::from_json(
            r#"{
                "server": {"hostname": "0.0.0.0", "port": 10080},
                "config": {"localListener": false, "eventRooms": [23058]},
                "advConfig": {},
                "newUserData": {"nickname": "", "status": false},
                "info": {},
                "user": {"123": {"nickname": "a", "status": true}},
                "roomList": [[460688, 23058]],
                "util": {}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_non_object_document() {
        assert!(Options::from_json("[1, 2, 3]").is_err());
        assert!(Options::from_json("not json").is_err());
    }

    #[test]
    fn test_section_access() {
        let options = sample();
        assert_eq!(
            options.section(SERVER).unwrap().get("port"),
            Some(&json!(10080))
        );
        assert!(options.section("missing").is_none());
    }

    #[test]
    fn test_section_mut_creates_missing() {
        let mut options = Options::default();
        options.section_mut(CONFIG).insert("x".into(), json!(1));
        assert_eq!(options.config_value("x"), Some(&json!(1)));
    }

    #[test]
    fn test_config_bool_defaults_false() {
        let options = sample();
        assert!(!options.config_bool("localListener"));
        assert!(!options.config_bool("missing"));
    }

    #[test]
    fn test_user_entries() {
        let options = sample();
        assert_eq!(options.user_ids(), vec!["123".to_string()]);
        let entry = options.user_entry("123").unwrap();
        assert_eq!(entry.get("status"), Some(&json!(true)));
        assert!(options.user_entry("456").is_none());
    }

    #[test]
    fn test_room_pairs() {
        let options = sample();
        assert_eq!(options.room_pairs(), vec![(460688, 23058)]);
    }

    #[test]
    fn test_room_pairs_skips_malformed() {
        let options =
            Options::from_json(r#"{"roomList": [[1, 2], [3], "junk", [4, 5]]}"#).unwrap();
        assert_eq!(options.room_pairs(), vec![(1, 2), (4, 5)]);
    }

    #[test]
    fn test_reset_util() {
        let mut options = sample();
        options.section_mut(UTIL).insert("scratch".into(), json!(1));
        options.reset_util();
        assert!(options.section(UTIL).unwrap().is_empty());
    }

    #[test]
    fn test_whitelist_seed() {
        let whitelist = Whitelist::new();
        assert!(whitelist.contains("localListener"));
        assert!(whitelist.contains("status"));
        assert!(!whitelist.contains("info"));
        assert!(!whitelist.contains("newUserData"));
    }

    #[test]
    fn test_whitelist_persists_digit_keys() {
        let whitelist = Whitelist::new();
        assert!(whitelist.persists("0"));
        assert!(whitelist.persists("12345"));
        // The root key stringify passes down is empty, and must persist.
        assert!(whitelist.persists(""));
        assert!(!whitelist.persists("getStatus"));
    }

    #[test]
    fn test_whitelist_append_only() {
        let mut whitelist = Whitelist::new();
        let before = whitelist.len();
        whitelist.insert("doActTask");
        assert!(whitelist.contains("doActTask"));
        assert_eq!(whitelist.len(), before + 1);
    }
}
