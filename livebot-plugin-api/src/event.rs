//! Event payloads crossing the host/plugin boundary.
//!
//! Raffle-class events are produced by the external listener collaborator
//! and fanned out to every message-capable plugin. All events here are
//! transient: created by producers, consumed by zero or more plugins,
//! never persisted.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A promotional giveaway announced in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleEvent {
    /// Raw listener command tag (`smallTV` or `raffle`)
    pub cmd: String,
    #[serde(rename = "roomID")]
    pub room_id: u64,
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub time: u32,
    pub max_time: u32,
    pub time_wait: u32,
}

/// A guard/pk lottery announced in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryEvent {
    /// Raw listener command tag (`lottery` or `pklottery`)
    pub cmd: String,
    #[serde(rename = "roomID")]
    pub room_id: u64,
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub time: u32,
}

/// A beat-storm burst announced in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatStormEvent {
    pub cmd: String,
    #[serde(rename = "roomID")]
    pub room_id: u64,
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub time: u32,
}

/// A raffle-class event from the external listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum LiveEvent {
    Raffle(RaffleEvent),
    Lottery(LotteryEvent),
    BeatStorm(BeatStormEvent),
}

impl LiveEvent {
    /// The raw listener command tag carried by the payload
    pub fn cmd(&self) -> &str {
        match self {
            Self::Raffle(e) => &e.cmd,
            Self::Lottery(e) => &e.cmd,
            Self::BeatStorm(e) => &e.cmd,
        }
    }

    /// The room the event was announced in
    pub fn room_id(&self) -> u64 {
        match self {
            Self::Raffle(e) => e.room_id,
            Self::Lottery(e) => e.room_id,
            Self::BeatStorm(e) => e.room_id,
        }
    }
}

/// An inter-plugin broadcast message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginNotify {
    pub cmd: String,
    pub data: Value,
}

/// An admin-routed message addressed to a single plugin by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminMessage {
    /// Target plugin id; unknown targets are silently ignored by the host
    pub plugin: String,
    pub cmd: String,
    pub data: Value,
}

/// One minute rollover, passed to every loop-capable plugin
#[derive(Debug, Clone, PartialEq)]
pub struct LoopTick {
    /// Timezone-shifted wall clock at the rollover
    pub now: DateTime<FixedOffset>,
    pub hour: u32,
    pub minute: u32,
    /// `HH:MM`, the debounce key the scheduler compared
    pub time: String,
}

/// Plugin-originated events, merged onto one shared host channel
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Re-broadcast to every other notify-capable plugin
    Notify {
        from: String,
        notify: PluginNotify,
    },
    /// Forwarded to the admin gateway for delivery to the front end
    Interact {
        from: String,
        payload: Value,
    },
}
