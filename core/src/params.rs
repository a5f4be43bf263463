//! Request parameters for creating and listing rooms.
//!
//! Both types serialize with `serde_urlencoded` using the service's
//! PascalCase parameter names: `CreateRoom` as the form body of a create call,
//! `ListRooms` as the query string of a list call.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::types::{CallbackMethod, RoomStatus, RoomType};

/// Service default for `MaxParticipants`.
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 50;

/// Parameters for `RoomClient::create_room`.
///
/// `Default` mirrors the service defaults. Unset optional fields are not sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRoom {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
    pub enable_turn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_callback: Option<String>,
    pub status_callback_method: CallbackMethod,
    pub record_participants_on_connect: bool,
    pub max_participants: u32,
}

impl Default for CreateRoom {
    fn default() -> Self {
        Self {
            room_type: None,
            enable_turn: true,
            unique_name: None,
            status_callback: None,
            status_callback_method: CallbackMethod::Post,
            record_participants_on_connect: false,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

/// Filter for `RoomClient::list_rooms`. Empty fields are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRooms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
    #[serde(skip_serializing_if = "is_blank")]
    pub unique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_date")]
    pub date_created_after: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_date")]
    pub date_created_before: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn serialize_date<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
        None => serializer.serialize_none(),
    }
}
