//! Client configuration: credentials, per-operation success codes, builder.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::client::RoomClient;
use crate::http::Transport;

/// Base URL of the hosted Rooms API.
pub const DEFAULT_BASE_URL: &str = "https://video.twilio.com/v1";

pub const API_KEY_ENV: &str = "ROOMS_API_KEY";
pub const API_SECRET_ENV: &str = "ROOMS_API_SECRET";

/// API key and secret sent as HTTP basic auth on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Reads `ROOMS_API_KEY` and `ROOMS_API_SECRET`. Returns `None` unless both
    /// are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty())?;
        let secret = std::env::var(API_SECRET_ENV).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(key, secret))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn to_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.key, self.secret));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The logical operations a `RoomClient` performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    List,
    Complete,
}

/// Status codes treated as success, one set per operation.
///
/// The service answers synchronous and asynchronous completions with different
/// 2xx codes, so every operation accepts 200, 201 and 202 unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedStatuses {
    create: Vec<u16>,
    get: Vec<u16>,
    list: Vec<u16>,
    complete: Vec<u16>,
}

const DEFAULT_ACCEPTED: [u16; 3] = [200, 201, 202];

impl Default for AcceptedStatuses {
    fn default() -> Self {
        Self {
            create: DEFAULT_ACCEPTED.to_vec(),
            get: DEFAULT_ACCEPTED.to_vec(),
            list: DEFAULT_ACCEPTED.to_vec(),
            complete: DEFAULT_ACCEPTED.to_vec(),
        }
    }
}

impl AcceptedStatuses {
    pub fn get(&self, operation: Operation) -> &[u16] {
        match operation {
            Operation::Create => &self.create,
            Operation::Get => &self.get,
            Operation::List => &self.list,
            Operation::Complete => &self.complete,
        }
    }

    pub fn set(&mut self, operation: Operation, codes: impl IntoIterator<Item = u16>) {
        let slot = match operation {
            Operation::Create => &mut self.create,
            Operation::Get => &mut self.get,
            Operation::List => &mut self.list,
            Operation::Complete => &mut self.complete,
        };
        *slot = codes.into_iter().collect();
    }

    pub fn accepts(&self, operation: Operation, status: u16) -> bool {
        self.get(operation).contains(&status)
    }
}

/// Builder for `RoomClient`.
///
/// ```no_run
/// use rooms_core::{Credentials, Operation, RoomClient, UreqTransport};
///
/// let client = RoomClient::builder(Credentials::new("SKxxxx", "secret"))
///     .accepted_statuses(Operation::Get, [200])
///     .debug(true)
///     .build(UreqTransport::default());
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    credentials: Credentials,
    base_url: String,
    debug: bool,
    accepted: AcceptedStatuses,
}

impl ClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
            accepted: AcceptedStatuses::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Dumps every request and response as `tracing` debug events.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn accepted_statuses(
        mut self,
        operation: Operation,
        codes: impl IntoIterator<Item = u16>,
    ) -> Self {
        self.accepted.set(operation, codes);
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> RoomClient<T> {
        RoomClient::from_parts(
            self.credentials,
            &self.base_url,
            self.debug,
            self.accepted,
            transport,
        )
    }
}
