//! Blocking client for the video Rooms REST API.
//!
//! # Overview
//! `RoomClient` turns four operations (create, get, list, complete) into
//! authenticated HTTP requests and decodes the responses into typed values or
//! a typed error.
//!
//! # Design
//! - Each operation is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_*` (consumes an `HttpResponse`); the executing methods run the
//!   round trip through an injected `Transport`.
//! - There is no process-wide HTTP handle. `UreqTransport` is the default
//!   transport and owns pooling and timeouts.
//! - Which status codes count as success is configured per operation.
//! - Failures are `ApiError::{Transport, Service, Decode}`; nothing is retried.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod types;

pub use client::RoomClient;
pub use config::{AcceptedStatuses, ClientBuilder, Credentials, Operation, DEFAULT_BASE_URL};
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use params::{CreateRoom, ListRooms};
pub use types::{CallbackMethod, PageMeta, Room, RoomLinks, RoomPage, RoomStatus, RoomType, ServiceError};
