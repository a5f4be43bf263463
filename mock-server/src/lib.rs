//! In-memory implementation of the Rooms resource for tests and local runs.
//!
//! Every route requires HTTP basic auth with `TEST_API_KEY`/`TEST_API_SECRET`
//! and answers failures with the service's JSON error shape.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Path, Query, RawQuery, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const TEST_API_KEY: &str = "SKtest";
pub const TEST_API_SECRET: &str = "test-secret";
pub const TEST_ACCOUNT_SID: &str = "AC00000000000000000000000000000000";

// Kept in step with rooms-core by hand; the two crates share no types.
const DEFAULT_MAX_PARTICIPANTS: u32 = 50;
const PEER_TO_PEER_MAX_PARTICIPANTS: u32 = 10;
const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Links {
    pub participants: String,
    pub recordings: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub sid: String,
    pub status: String,
    pub date_created: String,
    pub date_updated: String,
    pub account_sid: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub enable_turn: bool,
    pub unique_name: String,
    pub status_callback: Option<String>,
    pub status_callback_method: String,
    pub end_time: Option<String>,
    pub duration: Option<u64>,
    pub max_participants: u32,
    pub record_participants_on_connect: bool,
    pub url: String,
    pub links: Links,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub page_size: u32,
    pub first_page_url: String,
    pub previous_page_url: Option<String>,
    pub next_page_url: Option<String>,
    pub url: String,
    pub key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<Room>,
    pub meta: Meta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
    pub more_info: String,
    pub status: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRoom {
    #[serde(rename = "Type")]
    pub room_type: Option<String>,
    pub enable_turn: Option<bool>,
    pub unique_name: Option<String>,
    pub status_callback: Option<String>,
    pub status_callback_method: Option<String>,
    pub record_participants_on_connect: Option<bool>,
    pub max_participants: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRoom {
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub unique_name: Option<String>,
    pub date_created_after: Option<NaiveDate>,
    pub date_created_before: Option<NaiveDate>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

struct StoredRoom {
    created: DateTime<Utc>,
    room: Room,
}

#[derive(Clone, Default)]
pub struct Db(Arc<RwLock<Vec<StoredRoom>>>);

/// A failed call, rendered as `(status, Json(ErrorBody))`.
#[derive(Debug)]
pub struct ApiFailure(StatusCode, ErrorBody);

impl ApiFailure {
    fn new(status: StatusCode, code: u32, message: impl Into<String>) -> Self {
        Self(
            status,
            ErrorBody {
                code,
                message: message.into(),
                more_info: format!("https://www.twilio.com/docs/errors/{code}"),
                status: status.as_u16(),
            },
        )
    }

    fn bad_request(code: u32, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    fn not_found(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            20404,
            format!("The requested resource /Rooms/{name} was not found"),
        )
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/v1/Rooms", get(list_rooms).post(create_room))
        .route("/v1/Rooms/{name}", get(get_room).post(update_room))
        .with_state(Db::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiFailure> {
    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{TEST_API_KEY}:{TEST_API_SECRET}"))
    );
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth != Some(expected.as_str()) {
        tracing::debug!("rejected request with bad credentials");
        return Err(ApiFailure::new(StatusCode::UNAUTHORIZED, 20003, "Authenticate"));
    }
    Ok(())
}

fn rooms_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}/v1/Rooms")
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Index of a room by SID, or by unique name preferring the in-progress room.
fn find(rooms: &[StoredRoom], name: &str) -> Option<usize> {
    rooms
        .iter()
        .position(|r| r.room.sid == name)
        .or_else(|| {
            rooms
                .iter()
                .rposition(|r| r.room.unique_name == name && r.room.status == "in-progress")
        })
        .or_else(|| rooms.iter().rposition(|r| r.room.unique_name == name))
}

/// Authorizes first so bad credentials win over a malformed body or query.
fn accept<T, E: std::fmt::Display>(
    headers: &HeaderMap,
    extracted: Result<T, E>,
) -> Result<T, ApiFailure> {
    authorize(headers)?;
    extracted.map_err(|rejection| ApiFailure::bad_request(20001, rejection.to_string()))
}

async fn create_room(
    State(db): State<Db>,
    headers: HeaderMap,
    form: Result<Form<CreateRoom>, FormRejection>,
) -> Result<(StatusCode, Json<Room>), ApiFailure> {
    let Form(input) = accept(&headers, form)?;

    let room_type = match input.room_type.as_deref() {
        None | Some("") => "group",
        Some(t @ ("peer-to-peer" | "group")) => t,
        Some(other) => {
            return Err(ApiFailure::bad_request(
                53105,
                format!("Invalid Type: {other}"),
            ))
        }
    };
    let max_participants = input.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
    if room_type == "peer-to-peer" && max_participants > PEER_TO_PEER_MAX_PARTICIPANTS {
        return Err(ApiFailure::bad_request(
            53106,
            format!("MaxParticipants must be at most {PEER_TO_PEER_MAX_PARTICIPANTS} for peer-to-peer rooms"),
        ));
    }
    let status_callback_method = match input.status_callback_method.as_deref() {
        None | Some("") => "POST",
        Some(m @ ("GET" | "POST")) => m,
        Some(other) => {
            return Err(ApiFailure::bad_request(
                53107,
                format!("Invalid StatusCallbackMethod: {other}"),
            ))
        }
    };

    let sid = format!("RM{}", Uuid::new_v4().simple());
    let unique_name = input
        .unique_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| sid.clone());

    let mut rooms = db.0.write().await;
    if rooms
        .iter()
        .any(|r| r.room.unique_name == unique_name && r.room.status == "in-progress")
    {
        return Err(ApiFailure::bad_request(53113, "Room exists"));
    }

    let now = Utc::now();
    let url = format!("{}/{sid}", rooms_url(&headers));
    let room = Room {
        sid: sid.clone(),
        status: "in-progress".to_string(),
        date_created: timestamp(now),
        date_updated: timestamp(now),
        account_sid: TEST_ACCOUNT_SID.to_string(),
        room_type: room_type.to_string(),
        enable_turn: input.enable_turn.unwrap_or(true),
        unique_name,
        status_callback: input.status_callback.filter(|c| !c.is_empty()),
        status_callback_method: status_callback_method.to_string(),
        end_time: None,
        duration: None,
        max_participants,
        record_participants_on_connect: input.record_participants_on_connect.unwrap_or(false),
        links: Links {
            participants: format!("{url}/Participants"),
            recordings: format!("{url}/Recordings"),
        },
        url,
    };
    rooms.push(StoredRoom {
        created: now,
        room: room.clone(),
    });
    tracing::info!(%sid, unique_name = %room.unique_name, "room created");
    Ok((StatusCode::CREATED, Json(room)))
}

async fn get_room(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<Room>, ApiFailure> {
    authorize(&headers)?;
    let rooms = db.0.read().await;
    let index = find(&rooms, &name).ok_or_else(|| ApiFailure::not_found(&name))?;
    Ok(Json(rooms[index].room.clone()))
}

/// Completing an already completed room returns it unchanged.
async fn update_room(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<UpdateRoom>, FormRejection>,
) -> Result<Json<Room>, ApiFailure> {
    let Form(input) = accept(&headers, form)?;
    if input.status != "completed" {
        return Err(ApiFailure::bad_request(
            53118,
            format!("Invalid Status: {}", input.status),
        ));
    }

    let mut rooms = db.0.write().await;
    let index = find(&rooms, &name).ok_or_else(|| ApiFailure::not_found(&name))?;
    let stored = &mut rooms[index];
    if stored.room.status == "in-progress" {
        let now = Utc::now();
        let elapsed = (now - stored.created).num_seconds().max(0) as u64;
        stored.room.status = "completed".to_string();
        stored.room.end_time = Some(timestamp(now));
        stored.room.date_updated = timestamp(now);
        stored.room.duration = Some(elapsed);
        tracing::info!(sid = %stored.room.sid, "room completed");
    }
    Ok(Json(stored.room.clone()))
}

async fn list_rooms(
    State(db): State<Db>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
    RawQuery(raw): RawQuery,
) -> Result<Json<RoomList>, ApiFailure> {
    let Query(query) = accept(&headers, query)?;

    let rooms = db.0.read().await;
    let matching: Vec<&Room> = rooms
        .iter()
        .filter(|r| query.status.as_deref().map_or(true, |s| r.room.status == s))
        .filter(|r| query.unique_name.as_deref().map_or(true, |n| r.room.unique_name == n))
        .filter(|r| query.date_created_after.map_or(true, |d| r.created.date_naive() >= d))
        .filter(|r| query.date_created_before.map_or(true, |d| r.created.date_naive() < d))
        .map(|r| &r.room)
        .collect();

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(0);
    let start = (page as usize).saturating_mul(page_size as usize);
    let page_rooms: Vec<Room> = matching
        .iter()
        .skip(start)
        .take(page_size as usize)
        .map(|r| (*r).clone())
        .collect();
    let has_next = start + page_rooms.len() < matching.len();

    // Keep the caller's filters verbatim and replace the paging parameters.
    let filters: Vec<&str> = raw
        .as_deref()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("Page=") && !p.starts_with("PageSize="))
        .collect();
    let base = rooms_url(&headers);
    let page_url = |n: u32| {
        let mut params = filters.clone();
        let paging = format!("PageSize={page_size}&Page={n}");
        params.push(&paging);
        format!("{base}?{}", params.join("&"))
    };

    Ok(Json(RoomList {
        rooms: page_rooms,
        meta: Meta {
            page,
            page_size,
            first_page_url: page_url(0),
            previous_page_url: (page > 0).then(|| page_url(page - 1)),
            next_page_url: has_next.then(|| page_url(page + 1)),
            url: page_url(page),
            key: "rooms".to_string(),
        },
    }))
}
