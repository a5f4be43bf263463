//! Response DTOs for the Rooms resource.
//!
//! # Design
//! These mirror the service's JSON but are defined independently from the
//! mock-server crate; integration tests catch schema drift between the two.
//! Fields the service may send as `null` are `Option`s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rooms created with this type allow at most this many participants.
pub const PEER_TO_PEER_MAX_PARTICIPANTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatus {
    InProgress,
    Completed,
    Failed,
}

/// Topology of a room.
///
/// Room kinds this crate does not know about decode into `Other`, which also
/// lets callers send arbitrary values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomType {
    PeerToPeer,
    Group,
    #[serde(untagged)]
    Other(String),
}

/// HTTP method the service uses for status callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackMethod {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLinks {
    #[serde(default)]
    pub participants: Option<String>,
    #[serde(default)]
    pub recordings: Option<String>,
}

/// A video room as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub sid: String,
    pub status: RoomStatus,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(default)]
    pub account_sid: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub enable_turn: bool,
    pub unique_name: String,
    pub status_callback: Option<String>,
    pub status_callback_method: CallbackMethod,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between creation and completion; absent while in progress.
    #[serde(default)]
    pub duration: Option<u64>,
    pub max_participants: u32,
    pub record_participants_on_connect: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub links: RoomLinks,
}

/// Pagination metadata attached to a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub first_page_url: String,
    pub previous_page_url: Option<String>,
    pub next_page_url: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
}

/// One page of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPage {
    pub rooms: Vec<Room>,
    pub meta: PageMeta,
}

/// Structured failure payload the service returns with non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServiceError {
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub more_info: String,
    pub status: u16,
}
