//! End-to-end host behavior: load/merge interplay with plugin registration,
//! capability dispatch, isolation, routing, and outbound events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use livebot_core::collab::{AdminGateway, SessionManager, SessionOutcome};
use livebot_core::{ConfigPaths, ConfigStore, HostBuilder, HostError, PluginHost};
use livebot_plugin_api::{
    AdminMessage, Capability, EventContext, HelpEntry, HelpKind, LiveEvent, LoadContext, Plugin,
    PluginDescriptor, PluginError, PluginNotify, RaffleEvent,
};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

const TEMPLATE: &str = r#"{
    "server": {"path": "/", "hostname": "0.0.0.0", "port": 10080, "protocol": "ws", "netkey": ""},
    "config": {"localListener": false, "defaultUserID": 0, "serverURL": "", "bakServerURL": "", "eventRooms": [23058]},
    "advConfig": {},
    "newUserData": {"nickname": "", "userName": "", "passWord": "", "biliUID": 0, "accessToken": "", "refreshToken": "", "cookie": "", "status": false},
    "info": {},
    "user": {},
    "roomList": [[460688, 23058]],
    "util": {}
}"#;

type CallLog = Arc<Mutex<Vec<String>>>;

/// Configurable fixture plugin recording every hook invocation.
struct TestPlugin {
    name: String,
    caps: Vec<Capability>,
    fail_on_message: bool,
    notify_on_message: bool,
    reply_on_interact: bool,
    calls: CallLog,
    loaded: AtomicBool,
}

impl TestPlugin {
    fn new(name: &str, caps: Vec<Capability>, calls: CallLog) -> Self {
        Self {
            name: name.to_string(),
            caps,
            fail_on_message: false,
            notify_on_message: false,
            reply_on_interact: false,
            calls,
            loaded: AtomicBool::new(false),
        }
    }

    fn failing_messages(mut self) -> Self {
        self.fail_on_message = true;
        self
    }

    fn notifying(mut self) -> Self {
        self.notify_on_message = true;
        self
    }

    fn replying(mut self) -> Self {
        self.reply_on_interact = true;
        self
    }

    fn record(&self, line: String) {
        self.calls.lock().unwrap().push(line);
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            name: self.name.clone(),
            description: "test fixture".to_string(),
            version: "0.0.1".to_string(),
            author: "tests".to_string(),
        }
    }

    fn capabilities(&self) -> &[Capability] {
        &self.caps
    }

    fn loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    async fn on_load(&self, ctx: &mut LoadContext<'_>) -> Result<(), PluginError> {
        ctx.user_default("doActTask", false);
        ctx.describe(
            "doActTask",
            HelpEntry::new("activity tasks", "runs daily tasks", HelpKind::Boolean),
        );
        ctx.persist("doActTask");
        self.loaded.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn on_start(
        &self,
        users: &[String],
        is_new_user: bool,
        _ctx: &EventContext,
    ) -> Result<(), PluginError> {
        let mut users = users.to_vec();
        users.sort();
        self.record(format!("start:{is_new_user}:{}", users.join(",")));
        Ok(())
    }

    async fn on_message(&self, event: &LiveEvent, ctx: &EventContext) -> Result<(), PluginError> {
        if self.notify_on_message {
            ctx.notify("seen", json!({"cmd": event.cmd()}));
        }
        if self.fail_on_message {
            return Err(PluginError::custom("deliberate failure"));
        }
        self.record(format!("message:{}", event.cmd()));
        Ok(())
    }

    async fn on_notify(
        &self,
        notify: &PluginNotify,
        _ctx: &EventContext,
    ) -> Result<(), PluginError> {
        self.record(format!("notify:{}", notify.cmd));
        Ok(())
    }

    async fn on_interact(
        &self,
        msg: &AdminMessage,
        ctx: &EventContext,
    ) -> Result<(), PluginError> {
        if self.reply_on_interact {
            ctx.interact(json!({"echo": msg.cmd}));
        }
        self.record(format!("interact:{}", msg.cmd));
        Ok(())
    }
}

const ALL_CAPS: &[Capability] = &[
    Capability::Load,
    Capability::Start,
    Capability::Message,
    Capability::Notify,
    Capability::Interact,
];

struct FakeSessions {
    calls: CallLog,
    terminal_uid: Option<String>,
}

#[async_trait]
impl SessionManager for FakeSessions {
    async fn start_user(&self, uid: &str, _entry: &Map<String, Value>) -> SessionOutcome {
        self.calls.lock().unwrap().push(format!("start:{uid}"));
        if self.terminal_uid.as_deref() == Some(uid) {
            SessionOutcome::Terminated("credentials expired".to_string())
        } else {
            SessionOutcome::Running
        }
    }

    async fn stop_user(&self, uid: &str) {
        self.calls.lock().unwrap().push(format!("stop:{uid}"));
    }
}

struct FakeAdmin {
    deliveries: CallLog,
}

#[async_trait]
impl AdminGateway for FakeAdmin {
    async fn start(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn deliver(&self, from: &str, payload: Value) {
        self.deliveries.lock().unwrap().push(format!("{from}:{payload}"));
    }
}

fn write_config(dir: &TempDir, user: &str) {
    std::fs::write(dir.path().join("options.default.json"), TEMPLATE).unwrap();
    std::fs::write(dir.path().join("options.json"), user).unwrap();
}

async fn wait_until(log: &CallLog, predicate: impl Fn(&[String]) -> bool) {
    for _ in 0..200 {
        if predicate(&log.lock().unwrap()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never met, calls: {:?}", log.lock().unwrap());
}

fn raffle(cmd: &str) -> LiveEvent {
    LiveEvent::Raffle(RaffleEvent {
        cmd: cmd.to_string(),
        room_id: 460688,
        id: 1,
        kind: "small_tv".to_string(),
        title: "t".to_string(),
        time: 60,
        max_time: 180,
        time_wait: 120,
    })
}

async fn start_host(dir: &TempDir, plugins: Vec<Arc<dyn Plugin>>) -> (Arc<ConfigStore>, PluginHost) {
    let store = Arc::new(ConfigStore::new(ConfigPaths::under(dir.path())));
    let mut builder = HostBuilder::new(store.clone());
    for plugin in plugins {
        builder = builder.plugin(plugin);
    }
    let host = builder.start().await.unwrap();
    (store, host)
}

#[tokio::test]
async fn test_two_plugins_registering_same_user_default() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"{"user": {"123": {"nickname": "alice", "status": true}, "456": {"doActTask": true}}}"#,
    );

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (store, _host) = start_host(
        &dir,
        vec![
            Arc::new(TestPlugin::new("acttask", ALL_CAPS.to_vec(), calls.clone())),
            Arc::new(TestPlugin::new("status", ALL_CAPS.to_vec(), calls.clone())),
        ],
    )
    .await;

    let shared = store.options();
    let options = shared.read().await;
    // Both registered the same default; every entry carries it unless the
    // user document overrides it.
    assert_eq!(
        options.user_entry("123").unwrap().get("doActTask"),
        Some(&json!(false))
    );
    assert_eq!(
        options.user_entry("456").unwrap().get("doActTask"),
        Some(&json!(true))
    );
}

#[tokio::test]
async fn test_whole_table_start_after_merge() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, r#"{"user": {"123": {}, "456": {}}}"#);

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (_store, _host) = start_host(
        &dir,
        vec![Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), calls.clone()))],
    )
    .await;

    wait_until(&calls, |c| c.iter().any(|l| l.starts_with("start:"))).await;
    assert!(calls.lock().unwrap().contains(&"start:false:123,456".to_string()));
}

#[tokio::test]
async fn test_failing_plugin_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "{}");

    let alpha_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let beta_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (_store, host) = start_host(
        &dir,
        vec![
            Arc::new(
                TestPlugin::new("beta", ALL_CAPS.to_vec(), beta_calls.clone()).failing_messages(),
            ),
            Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), alpha_calls.clone())),
        ],
    )
    .await;

    host.handle_message(raffle("smallTV"));
    wait_until(&alpha_calls, |c| {
        c.contains(&"message:smallTV".to_string())
    })
    .await;

    // The host survives and keeps dispatching to the failing plugin too.
    host.handle_message(raffle("raffle"));
    wait_until(&alpha_calls, |c| c.contains(&"message:raffle".to_string())).await;
    assert!(!beta_calls.lock().unwrap().iter().any(|l| l.starts_with("message:")));
}

#[tokio::test]
async fn test_notify_broadcast_excludes_originator() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "{}");

    let alpha_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let beta_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (_store, host) = start_host(
        &dir,
        vec![
            Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), alpha_calls.clone()).notifying()),
            Arc::new(TestPlugin::new("beta", ALL_CAPS.to_vec(), beta_calls.clone())),
        ],
    )
    .await;

    host.handle_message(raffle("lottery"));

    wait_until(&beta_calls, |c| c.contains(&"notify:seen".to_string())).await;
    assert!(!alpha_calls.lock().unwrap().contains(&"notify:seen".to_string()));
}

#[tokio::test]
async fn test_interact_routes_to_exactly_one_plugin() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "{}");

    let alpha_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let beta_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (_store, host) = start_host(
        &dir,
        vec![
            Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), alpha_calls.clone())),
            Arc::new(TestPlugin::new("beta", ALL_CAPS.to_vec(), beta_calls.clone())),
        ],
    )
    .await;

    host.interact(AdminMessage {
        plugin: "alpha".to_string(),
        cmd: "hello".to_string(),
        data: json!({}),
    });
    // Unknown target: silently ignored.
    host.interact(AdminMessage {
        plugin: "nobody".to_string(),
        cmd: "lost".to_string(),
        data: json!({}),
    });

    wait_until(&alpha_calls, |c| c.contains(&"interact:hello".to_string())).await;
    assert!(!beta_calls.lock().unwrap().iter().any(|l| l.starts_with("interact:")));
}

#[tokio::test]
async fn test_interact_reply_reaches_admin_gateway() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "{}");

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let deliveries: CallLog = Arc::new(Mutex::new(Vec::new()));

    let store = Arc::new(ConfigStore::new(ConfigPaths::under(dir.path())));
    let host = HostBuilder::new(store)
        .plugin(Arc::new(
            TestPlugin::new("alpha", ALL_CAPS.to_vec(), calls.clone()).replying(),
        ))
        .admin_gateway(Arc::new(FakeAdmin {
            deliveries: deliveries.clone(),
        }))
        .start()
        .await
        .unwrap();

    host.interact(AdminMessage {
        plugin: "alpha".to_string(),
        cmd: "ping".to_string(),
        data: json!({}),
    });

    wait_until(&deliveries, |d| !d.is_empty()).await;
    let delivered = deliveries.lock().unwrap();
    assert!(delivered[0].starts_with("alpha:"));
    assert!(delivered[0].contains("\"echo\":\"ping\""));
}

#[tokio::test]
async fn test_new_user_triggers_scoped_start() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, r#"{"user": {"123": {}}}"#);

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (store, _host) = start_host(
        &dir,
        vec![Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), calls.clone()))],
    )
    .await;
    wait_until(&calls, |c| c.contains(&"start:false:123".to_string())).await;

    store
        .edit_user_doc(|doc| {
            doc.section_mut(livebot_plugin_api::options::USER)
                .insert("456".to_string(), json!({"nickname": "bob"}));
        })
        .await;
    store.merge().await;

    wait_until(&calls, |c| c.contains(&"start:true:456".to_string())).await;
}

#[tokio::test]
async fn test_terminal_session_is_stopped() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"{"user": {
            "123": {"status": true},
            "456": {"status": true},
            "789": {"status": false}
        }}"#,
    );

    let session_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(ConfigStore::new(ConfigPaths::under(dir.path())));
    let _host = HostBuilder::new(store)
        .session_manager(Arc::new(FakeSessions {
            calls: session_calls.clone(),
            terminal_uid: Some("456".to_string()),
        }))
        .start()
        .await
        .unwrap();

    let calls = session_calls.lock().unwrap();
    // Disabled users never start; terminal sessions are stopped immediately.
    assert!(calls.contains(&"start:123".to_string()));
    assert!(calls.contains(&"start:456".to_string()));
    assert!(calls.contains(&"stop:456".to_string()));
    assert!(!calls.iter().any(|c| c.ends_with(":789")));
}

#[tokio::test]
async fn test_local_listener_override_survives_save_reload() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, r#"{"config": {"localListener": true}}"#);

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (store, _host) = start_host(
        &dir,
        vec![Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), calls.clone()))],
    )
    .await;

    {
        let shared = store.options();
        let options = shared.read().await;
        assert!(options.config_bool("localListener"));
    }
    store.save().await;

    // The persisted document still shows the override after a reload.
    let reloaded = ConfigStore::new(ConfigPaths::under(dir.path()));
    reloaded.load().await.unwrap();
    reloaded.merge().await;
    let shared = reloaded.options();
    let options = shared.read().await;
    assert!(options.config_bool("localListener"));
}

#[tokio::test]
async fn test_plugin_names_and_count() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "{}");

    let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let (_store, host) = start_host(
        &dir,
        vec![
            Arc::new(TestPlugin::new("alpha", ALL_CAPS.to_vec(), calls.clone())),
            Arc::new(TestPlugin::new("beta", ALL_CAPS.to_vec(), calls.clone())),
        ],
    )
    .await;

    assert_eq!(host.plugin_count(), 2);
    assert_eq!(host.plugin_names(), vec!["alpha", "beta"]);
}
