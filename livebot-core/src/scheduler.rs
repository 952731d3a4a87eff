//! Maintenance scheduler.
//!
//! One periodic tick, deliberately not minute-aligned, recomputes the
//! timezone-shifted wall clock and formats it to minute granularity. The
//! formatted string is compared against the previous tick's value; only on
//! change does maintenance run. Because the tick period does not evenly
//! divide a minute, naive per-tick triggering would fire zero or two times
//! in some minutes; the string comparison guarantees exactly one trigger
//! per minute boundary regardless of tick jitter.
//!
//! There is no cancellation path: the scheduler runs until the process
//! terminates.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use livebot_plugin_api::{Capability, LoopTick};
use tokio::time::MissedTickBehavior;

use crate::collab::RoomListener;
use crate::dispatch::{Delivery, PluginChannel};
use crate::store::ConfigStore;

/// Tick period, intentionally above and not a divisor of one minute
pub const TICK_PERIOD: Duration = Duration::from_secs(55);

/// The scheduler's wall clock runs in CST (UTC+8)
const WALL_CLOCK_OFFSET_SECS: i32 = 8 * 3600;

/// The timezone-shifted wall clock driving rollover decisions.
pub fn wall_now() -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(WALL_CLOCK_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset),
        None => Utc::now().fixed_offset(),
    }
}

/// Debounces a sub-minute tick stream into one trigger per minute rollover.
///
/// The very first observation always triggers: the gate starts with no
/// recorded minute.
#[derive(Debug, Default)]
pub struct MinuteGate {
    last: String,
}

impl MinuteGate {
    /// Record a formatted `HH:MM` stamp; true exactly when it differs from
    /// the previous observation.
    pub fn observe(&mut self, stamp: &str) -> bool {
        if self.last == stamp {
            return false;
        }
        self.last = stamp.to_string();
        true
    }
}

/// What one rollover must do besides broadcasting the loop hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickActions {
    /// Refresh the externally monitored room set
    pub refresh_rooms: bool,
    /// Take a full configuration backup
    pub backup: bool,
}

/// Decide the rollover actions for a wall-clock minute.
///
/// Backups run at minute 0 of every 12th hour, twice per day. Room
/// refreshes run every rollover while local listening is enabled.
pub fn actions_for(hour: u32, minute: u32, local_listener: bool) -> TickActions {
    TickActions {
        refresh_rooms: local_listener,
        backup: minute == 0 && hour % 12 == 0,
    }
}

pub(crate) async fn run(
    store: Arc<ConfigStore>,
    listener: Option<Arc<dyn RoomListener>>,
    channels: Arc<Vec<PluginChannel>>,
    period: Duration,
) {
    let mut gate = MinuteGate::default();
    // First tick one full period after startup, not immediately.
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let now = wall_now();
        let stamp = now.format("%H:%M").to_string();
        if !gate.observe(&stamp) {
            continue;
        }

        let (hour, minute) = (now.hour(), now.minute());
        let local_listener = {
            let shared = store.options();
            let options = shared.read().await;
            options.config_bool("localListener")
        };
        let actions = actions_for(hour, minute, local_listener);

        if let Some(listener) = &listener {
            if actions.refresh_rooms {
                listener.refresh_rooms().await;
            }
        }
        if actions.backup {
            store.backup().await;
        }
        if let Some(listener) = &listener {
            listener.clear_dedup_caches();
        }

        let tick = LoopTick {
            now,
            hour,
            minute,
            time: stamp,
        };
        for channel in channels.iter().filter(|c| c.supports(Capability::Loop)) {
            channel.deliver(Delivery::Tick(tick.clone()));
        }
    }
}
