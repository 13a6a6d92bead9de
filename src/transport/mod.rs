// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transport seam between the dispatcher and the protocol stack.
//!
//! The dispatcher never touches the wire. It hands an [`OutboundRequest`] to a
//! [`Transport`], receives an [`ExchangeToken`] back, and later learns about
//! progress through the [`TransportEvent`]s returned from [`Transport::pump`].
//!
//! All three calls are serialized by the dispatcher behind one lock, so an
//! implementation can keep plain mutable state.
//!
//! # Implementations
//!
//! - [`MemoryTransport`]: scripted in-memory transport for tests and tooling

mod memory;

pub use memory::{MemoryTransport, SubmittedRequest};

use std::fmt;

use serde::de::DeserializeOwned;

use crate::types::{Connectivity, DeviceAddress, HeaderOption, QualityOfService, StackResult};

/// Protocol stack driven by the dispatcher.
pub trait Transport: Send {
    /// Starts an exchange and returns the token that identifies it.
    ///
    /// # Errors
    ///
    /// Returns the stack result if the request is refused synchronously.
    fn submit(&mut self, request: OutboundRequest) -> Result<ExchangeToken, StackResult>;

    /// Requests cancellation of a long-lived exchange.
    ///
    /// # Errors
    ///
    /// Returns the stack result if the token is unknown or the cancel could
    /// not be sent.
    fn cancel(
        &mut self,
        token: ExchangeToken,
        qos: QualityOfService,
        header_options: &[HeaderOption],
    ) -> Result<(), StackResult>;

    /// Advances the stack and returns the events that became available.
    fn pump(&mut self) -> Vec<TransportEvent>;
}

/// Method of an outbound exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Retrieve a representation.
    Get,
    /// Replace a representation.
    Put,
    /// Create or update.
    Post,
    /// Delete the resource.
    Delete,
    /// Register for notifications, server picks the observer slot.
    Observe,
    /// Register for notifications on every matching resource.
    ObserveAll,
    /// Resource, device or platform discovery.
    Discover,
    /// Presence subscription.
    Presence,
}

impl Verb {
    /// Returns the verb name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Observe => "OBSERVE",
            Self::ObserveAll => "OBSERVE_ALL",
            Self::Discover => "DISCOVER",
            Self::Presence => "PRESENCE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one exchange, issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeToken(u64);

impl ExchangeToken {
    /// Creates a token from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

/// Opaque representation bytes, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Wraps raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the payload as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Parses the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid JSON for `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

/// A fully resolved request ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Method.
    pub verb: Verb,
    /// Destination; `None` means multicast.
    pub address: Option<DeviceAddress>,
    /// Resource URI including any assembled query.
    pub uri: String,
    /// Request body.
    pub payload: Option<Payload>,
    /// Delivery hint.
    pub qos: QualityOfService,
    /// Vendor header options.
    pub header_options: Vec<HeaderOption>,
    /// Adapter and flags to use when `address` is `None`.
    pub connectivity: Connectivity,
}

/// Progress class of a [`TransportEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Final response of a one-shot exchange, or the first response of a
    /// long-lived one.
    Completed,
    /// A further response on a long-lived exchange.
    Notification,
    /// The exchange has ended; no more events follow for the token.
    Terminal,
}

/// One event surfaced by [`Transport::pump`].
///
/// `sequence` carries the observe sequence number or the presence nonce.
/// For observe responses, `None` is the "no option" control value: the
/// server answered without registering the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// Exchange the event belongs to.
    pub token: ExchangeToken,
    /// Progress class.
    pub kind: EventKind,
    /// Stack result of the response.
    pub status: StackResult,
    /// Observe sequence number or presence nonce.
    pub sequence: Option<u32>,
    /// Response body.
    pub payload: Option<Payload>,
    /// Vendor header options on the response.
    pub header_options: Vec<HeaderOption>,
    /// Responding endpoint.
    pub source: Option<DeviceAddress>,
}

impl TransportEvent {
    fn new(token: ExchangeToken, kind: EventKind, status: StackResult) -> Self {
        Self {
            token,
            kind,
            status,
            sequence: None,
            payload: None,
            header_options: Vec::new(),
            source: None,
        }
    }

    /// Creates a [`EventKind::Completed`] event.
    #[must_use]
    pub fn completed(token: ExchangeToken, status: StackResult) -> Self {
        Self::new(token, EventKind::Completed, status)
    }

    /// Creates a [`EventKind::Notification`] event with a sequence number.
    #[must_use]
    pub fn notification(token: ExchangeToken, status: StackResult, sequence: u32) -> Self {
        Self::new(token, EventKind::Notification, status).with_sequence(sequence)
    }

    /// Creates a [`EventKind::Terminal`] event.
    #[must_use]
    pub fn terminal(token: ExchangeToken, status: StackResult) -> Self {
        Self::new(token, EventKind::Terminal, status)
    }

    /// Sets the sequence number or nonce.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the header options.
    #[must_use]
    pub fn with_header_options(mut self, header_options: Vec<HeaderOption>) -> Self {
        self.header_options = header_options;
        self
    }

    /// Sets the responding endpoint.
    #[must_use]
    pub fn with_source(mut self, source: DeviceAddress) -> Self {
        self.source = Some(source);
        self
    }
}
