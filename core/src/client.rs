//! Request builder, response classifier and executor for the Rooms resource.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, so
//! both halves are testable without a network. The executing methods
//! (`create_room`, `get_room`, ...) glue the two halves together through the
//! `Transport` the client was built with.
//!
//! Classification is the same for every operation: a status inside the
//! operation's accepted set decodes as the success type, anything else decodes
//! as a `ServiceError`. A body that fits neither shape is a decode error.

use std::fmt::Display;

use percent_encoding::AsciiSet;
use serde::de::DeserializeOwned;

use crate::config::{AcceptedStatuses, ClientBuilder, Credentials, Operation};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::params::{CreateRoom, ListRooms};
use crate::types::{Room, RoomPage, ServiceError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const COMPLETE_BODY: &str = "Status=completed";

const PATH_ENCODING: AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode_path_segment(segment: &str) -> impl Display + '_ {
    percent_encoding::utf8_percent_encode(segment, &PATH_ENCODING)
}

/// Client for the Rooms resource.
///
/// Holds credentials, configuration and a transport; carries no other state
/// between calls, so one value can be shared by any number of callers.
#[derive(Debug, Clone)]
pub struct RoomClient<T = UreqTransport> {
    credentials: Credentials,
    base_url: String,
    debug: bool,
    accepted: AcceptedStatuses,
    transport: T,
}

impl RoomClient<UreqTransport> {
    /// Client for the hosted service using a default `UreqTransport`.
    pub fn new(credentials: Credentials) -> Self {
        ClientBuilder::new(credentials).build(UreqTransport::default())
    }

    pub fn builder(credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(credentials)
    }
}

impl<T: Transport> RoomClient<T> {
    pub(crate) fn from_parts(
        credentials: Credentials,
        base_url: &str,
        debug: bool,
        accepted: AcceptedStatuses,
        transport: T,
    ) -> Self {
        Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            debug,
            accepted,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn accepted_statuses(&self) -> &AcceptedStatuses {
        &self.accepted
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn create_room(&self, params: &CreateRoom) -> Result<Room, ApiError> {
        let request = self.build_create_room(params)?;
        let response = self.send(Operation::Create, &request)?;
        self.parse_create_room(response)
    }

    /// Fetches a room by SID or unique name.
    pub fn get_room(&self, name: &str) -> Result<Room, ApiError> {
        let request = self.build_get_room(name);
        let response = self.send(Operation::Get, &request)?;
        self.parse_get_room(response)
    }

    pub fn list_rooms(&self, filter: &ListRooms) -> Result<RoomPage, ApiError> {
        let request = self.build_list_rooms(filter)?;
        let response = self.send(Operation::List, &request)?;
        self.parse_list_rooms(response)
    }

    /// Ends a room, disconnecting every participant.
    ///
    /// Completing a room that is already completed returns whatever the
    /// service answers for that room; nothing is cached locally.
    pub fn complete_room(&self, name: &str) -> Result<Room, ApiError> {
        let request = self.build_complete_room(name);
        let response = self.send(Operation::Complete, &request)?;
        self.parse_complete_room(response)
    }

    /// Follows `meta.next_page_url`. Returns `Ok(None)` on the last page.
    pub fn next_page(&self, page: &RoomPage) -> Result<Option<RoomPage>, ApiError> {
        self.follow(page.meta.next_page_url.as_deref())
    }

    /// Follows `meta.previous_page_url`. Returns `Ok(None)` on the first page.
    pub fn previous_page(&self, page: &RoomPage) -> Result<Option<RoomPage>, ApiError> {
        self.follow(page.meta.previous_page_url.as_deref())
    }

    fn follow(&self, url: Option<&str>) -> Result<Option<RoomPage>, ApiError> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let request = self.build_page_request(url)?;
        let response = self.send(Operation::List, &request)?;
        self.parse_list_rooms(response).map(Some)
    }

    // -----------------------------------------------------------------------
    // Request building
    // -----------------------------------------------------------------------

    pub fn build_create_room(&self, params: &CreateRoom) -> Result<HttpRequest, ApiError> {
        let body = serde_urlencoded::to_string(params)?;
        Ok(self.form_post(format!("{}/Rooms", self.base_url), body))
    }

    pub fn build_get_room(&self, name: &str) -> HttpRequest {
        self.get(self.room_url(name))
    }

    pub fn build_list_rooms(&self, filter: &ListRooms) -> Result<HttpRequest, ApiError> {
        let query = serde_urlencoded::to_string(filter)?;
        let url = if query.is_empty() {
            format!("{}/Rooms", self.base_url)
        } else {
            format!("{}/Rooms?{query}", self.base_url)
        };
        Ok(self.get(url))
    }

    pub fn build_complete_room(&self, name: &str) -> HttpRequest {
        self.form_post(self.room_url(name), COMPLETE_BODY.to_string())
    }

    /// GET on an absolute page URL taken from `PageMeta`.
    ///
    /// The URL must live under the client's base URL; credentials are never
    /// sent anywhere else.
    pub fn build_page_request(&self, url: &str) -> Result<HttpRequest, ApiError> {
        let under_base = url
            .strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));
        if !under_base {
            return Err(ApiError::ForeignUrl {
                url: url.to_string(),
            });
        }
        Ok(self.get(url.to_string()))
    }

    fn room_url(&self, name: &str) -> String {
        format!("{}/Rooms/{}", self.base_url, encode_path_segment(name))
    }

    fn get(&self, url: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: vec![("authorization".to_string(), self.credentials.to_header())],
            body: None,
        }
    }

    fn form_post(&self, url: String, body: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: vec![
                ("authorization".to_string(), self.credentials.to_header()),
                ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
            ],
            body: Some(body),
        }
    }

    // -----------------------------------------------------------------------
    // Response parsing
    // -----------------------------------------------------------------------

    pub fn parse_create_room(&self, response: HttpResponse) -> Result<Room, ApiError> {
        self.classify(Operation::Create, &response, "room")
    }

    pub fn parse_get_room(&self, response: HttpResponse) -> Result<Room, ApiError> {
        self.classify(Operation::Get, &response, "room")
    }

    pub fn parse_list_rooms(&self, response: HttpResponse) -> Result<RoomPage, ApiError> {
        self.classify(Operation::List, &response, "room page")
    }

    pub fn parse_complete_room(&self, response: HttpResponse) -> Result<Room, ApiError> {
        self.classify(Operation::Complete, &response, "room")
    }

    fn classify<R: DeserializeOwned>(
        &self,
        operation: Operation,
        response: &HttpResponse,
        target: &'static str,
    ) -> Result<R, ApiError> {
        if self.accepted.accepts(operation, response.status) {
            return decode(response, target);
        }
        let error: ServiceError = decode(response, "service error")?;
        Err(ApiError::Service(error))
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    fn send(&self, operation: Operation, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if self.debug {
            tracing::debug!(
                ?operation,
                method = request.method.as_str(),
                url = %request.url,
                headers = ?redacted(&request.headers),
                body = request.body.as_deref().unwrap_or_default(),
                "sending request"
            );
        }

        let response = self.transport.execute(request)?;

        if self.debug {
            tracing::debug!(
                ?operation,
                status = response.status,
                headers = ?response.headers,
                body = %response.body,
                "received response"
            );
        }
        Ok(response)
    }
}

fn decode<R: DeserializeOwned>(response: &HttpResponse, target: &'static str) -> Result<R, ApiError> {
    serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
        status: response.status,
        target,
        source,
    })
}

fn redacted(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            if name.eq_ignore_ascii_case("authorization") {
                (name.as_str(), "<redacted>")
            } else {
                (name.as_str(), value.as_str())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::TransportError;
    use crate::types::{RoomStatus, RoomType};

    const BASE_URL: &str = "http://localhost:3000/v1";
    const AUTH: &str = "Basic U0trZXk6czNjcmV0";

    const ROOM_JSON: &str = r#"{
        "sid": "RM00000000000000000000000000000001",
        "status": "in-progress",
        "date_created": "2024-01-02T03:04:05Z",
        "date_updated": "2024-01-02T03:04:05Z",
        "account_sid": "AC00000000000000000000000000000000",
        "type": "group",
        "enable_turn": true,
        "unique_name": "Standup",
        "status_callback": null,
        "status_callback_method": "POST",
        "end_time": null,
        "duration": null,
        "max_participants": 50,
        "record_participants_on_connect": false,
        "url": "http://localhost:3000/v1/Rooms/RM00000000000000000000000000000001",
        "links": {}
    }"#;

    const NOT_FOUND_JSON: &str = r#"{"code":20404,"message":"The requested resource /Rooms/nope was not found","more_info":"https://www.twilio.com/docs/errors/20404","status":404}"#;

    /// Answers every request with the same response and records what it saw.
    struct Canned {
        response: Result<HttpResponse, String>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.response.clone().map_err(TransportError::new)
        }
    }

    fn client<T: Transport>(transport: T) -> RoomClient<T> {
        RoomClient::builder(Credentials::new("SKkey", "s3cret"))
            .base_url(BASE_URL)
            .build(transport)
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_get_room_produces_correct_request() {
        let req = client(Canned::new(200, "")).build_get_room("Standup");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/v1/Rooms/Standup");
        assert_eq!(req.header("Authorization"), Some(AUTH));
        assert!(req.body.is_none());
    }

    #[test]
    fn room_names_are_escaped_as_one_segment() {
        let req = client(Canned::new(200, "")).build_get_room("team a/b?");
        assert_eq!(req.url, "http://localhost:3000/v1/Rooms/team%20a%2Fb%3F");
    }

    #[test]
    fn build_create_room_produces_form_post() {
        let params = CreateRoom {
            room_type: Some(RoomType::Group),
            unique_name: Some("Standup".to_string()),
            max_participants: 4,
            ..CreateRoom::default()
        };
        let req = client(Canned::new(200, "")).build_create_room(&params).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/v1/Rooms");
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.header("authorization"), Some(AUTH));
        assert_eq!(
            req.body.as_deref(),
            Some(
                "Type=group&EnableTurn=true&UniqueName=Standup&StatusCallbackMethod=POST\
                 &RecordParticipantsOnConnect=false&MaxParticipants=4"
            )
        );
    }

    #[test]
    fn build_list_rooms_encodes_only_set_filters() {
        let filter = ListRooms {
            unique_name: Some("Foo".to_string()),
            date_created_after: NaiveDate::from_ymd_opt(2024, 1, 2),
            ..ListRooms::default()
        };
        let req = client(Canned::new(200, "")).build_list_rooms(&filter).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://localhost:3000/v1/Rooms?UniqueName=Foo&DateCreatedAfter=2024-01-02"
        );
        assert!(!req.url.contains("Status"));
    }

    #[test]
    fn build_list_rooms_without_filters_has_no_query() {
        let req = client(Canned::new(200, ""))
            .build_list_rooms(&ListRooms::default())
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/v1/Rooms");
    }

    #[test]
    fn build_complete_room_posts_status() {
        let req = client(Canned::new(200, "")).build_complete_room("RM1");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/v1/Rooms/RM1");
        assert_eq!(req.body.as_deref(), Some("Status=completed"));
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = RoomClient::builder(Credentials::new("k", "s"))
            .base_url("http://localhost:3000/v1/")
            .build(Canned::new(200, ""));
        assert_eq!(client.build_get_room("x").url, "http://localhost:3000/v1/Rooms/x");
    }

    #[test]
    fn default_client_targets_hosted_service() {
        let client = RoomClient::new(Credentials::new("k", "s"));
        assert_eq!(client.base_url(), "https://video.twilio.com/v1");
    }

    #[test]
    fn parse_get_room_success() {
        let room = client(Canned::new(200, "")).parse_get_room(response(200, ROOM_JSON)).unwrap();
        assert_eq!(room.unique_name, "Standup");
        assert_eq!(room.status, RoomStatus::InProgress);
        assert_eq!(room.room_type, RoomType::Group);
    }

    #[test]
    fn parse_get_room_not_found_is_service_error() {
        let err = client(Canned::new(200, ""))
            .parse_get_room(response(404, NOT_FOUND_JSON))
            .unwrap_err();
        match err {
            ApiError::Service(error) => {
                assert_eq!(error.status, 404);
                assert_eq!(error.code, 20404);
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn status_outside_accepted_set_never_decodes_success() {
        // A room-shaped body with an unexpected status must not pass as a room.
        let err = client(Canned::new(200, ""))
            .parse_create_room(response(204, ROOM_JSON))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 204, target: "service error", .. }));
    }

    #[test]
    fn accepted_set_is_configurable_per_operation() {
        let strict = RoomClient::builder(Credentials::new("k", "s"))
            .base_url(BASE_URL)
            .accepted_statuses(Operation::Get, [200])
            .build(Canned::new(200, ""));

        let err = strict.parse_get_room(response(202, ROOM_JSON)).unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 202, .. }));
        assert!(strict.parse_complete_room(response(202, ROOM_JSON)).is_ok());
    }

    #[test]
    fn create_accepts_async_statuses() {
        let c = client(Canned::new(200, ""));
        for status in [200, 201, 202] {
            assert!(c.parse_create_room(response(status, ROOM_JSON)).is_ok(), "{status}");
        }
    }

    #[test]
    fn bad_json_is_decode_error() {
        let err = client(Canned::new(200, ""))
            .parse_list_rooms(response(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 200, target: "room page", .. }));
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let transport = Canned::failing("connection refused");
        let err = client(&transport).get_room("Standup").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn get_room_round_trip() {
        let transport = Canned::new(200, ROOM_JSON);
        let room = client(&transport).get_room("Standup").unwrap();
        assert_eq!(room.sid, "RM00000000000000000000000000000001");
        let seen = transport.requests();
        assert_eq!(seen[0].url, "http://localhost:3000/v1/Rooms/Standup");
    }

    #[test]
    fn next_page_stops_without_url() {
        let transport = Canned::new(200, "");
        let page: RoomPage = serde_json::from_str(
            r#"{"rooms":[],"meta":{"page":0,"page_size":50,"first_page_url":"x","previous_page_url":null,"next_page_url":null,"url":"x","key":"rooms"}}"#,
        )
        .unwrap();
        assert!(client(&transport).next_page(&page).unwrap().is_none());
        assert!(client(&transport).previous_page(&page).unwrap().is_none());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn next_page_requests_absolute_url() {
        let body = r#"{"rooms":[],"meta":{"page":1,"page_size":1,"first_page_url":"http://localhost:3000/v1/Rooms?PageSize=1&Page=0","previous_page_url":"http://localhost:3000/v1/Rooms?PageSize=1&Page=0","next_page_url":null,"url":"http://localhost:3000/v1/Rooms?PageSize=1&Page=1","key":"rooms"}}"#;
        let transport = Canned::new(200, body);
        let first: RoomPage = serde_json::from_str(&body.replace(
            r#""next_page_url":null"#,
            r#""next_page_url":"http://localhost:3000/v1/Rooms?PageSize=1&Page=1""#,
        ))
        .unwrap();
        let second = client(&transport).next_page(&first).unwrap().unwrap();
        assert_eq!(second.meta.page, 1);
        let seen = transport.requests();
        assert_eq!(seen[0].url, "http://localhost:3000/v1/Rooms?PageSize=1&Page=1");
        assert_eq!(seen[0].header("authorization"), Some(AUTH));
    }

    #[test]
    fn page_urls_outside_base_are_refused() {
        let transport = Canned::new(200, "");
        let body = r#"{"rooms":[],"meta":{"page":0,"page_size":1,"first_page_url":"http://localhost:3000/v1/Rooms?Page=0","previous_page_url":"http://localhost:3000/v1.evil/Rooms?Page=0","next_page_url":"http://evil.example/steal","url":"x","key":"rooms"}}"#;
        let page: RoomPage = serde_json::from_str(body).unwrap();

        let err = client(&transport).next_page(&page).unwrap_err();
        assert!(matches!(&err, ApiError::ForeignUrl { url } if url == "http://evil.example/steal"));
        let err = client(&transport).previous_page(&page).unwrap_err();
        assert!(matches!(err, ApiError::ForeignUrl { .. }));
        assert_eq!(err.status(), None);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn client_exposes_its_configuration() {
        let c = RoomClient::builder(Credentials::new("SKkey", "s3cret"))
            .accepted_statuses(Operation::List, [200])
            .build(Canned::new(200, ""));
        assert_eq!(c.accepted_statuses().get(Operation::List), &[200]);
        assert_eq!(c.accepted_statuses().get(Operation::Create), &[200, 201, 202]);
    }

    #[traced_test]
    #[test]
    fn debug_dumps_wire_traffic_without_credentials() {
        let client = RoomClient::builder(Credentials::new("SKkey", "s3cret"))
            .base_url(BASE_URL)
            .debug(true)
            .build(Canned::new(404, NOT_FOUND_JSON));
        let err = client.get_room("nope").unwrap_err();
        assert_eq!(err.status(), Some(404));

        assert!(logs_contain("sending request"));
        assert!(logs_contain("received response"));
        assert!(logs_contain("http://localhost:3000/v1/Rooms/nope"));
        assert!(logs_contain("<redacted>"));
        assert!(!logs_contain("U0trZXk6czNjcmV0"));
    }

    #[traced_test]
    #[test]
    fn no_dump_when_debug_is_off() {
        let client = client(Canned::new(200, ROOM_JSON));
        client.get_room("Standup").unwrap();
        assert!(!logs_contain("sending request"));
        assert!(!logs_contain("received response"));
    }
}
