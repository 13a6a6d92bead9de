// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback signatures and the values delivered through them.
//!
//! - [`ResponseCallback`] - One-shot completion of get/put/post/delete
//! - [`ObserveCallback`] - Every event of an observation session
//! - [`FindCallback`] - One call per discovered resource
//! - [`InfoCallback`] - Device and platform information responses
//! - [`PresenceListener`] - Presence events, deduplicated by listener identity

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::resource::RemoteResource;
use crate::session::PresenceHandle;
use crate::transport::{Payload, TransportEvent};
use crate::types::{DeviceAddress, HeaderOption, StackResult};

/// Global counter for listener identities.
static LISTENER_KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Completion callback of a one-shot exchange. Invoked exactly once.
pub type ResponseCallback = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

/// Callback of an observation session.
pub type ObserveCallback = Arc<dyn Fn(ObserveEvent) + Send + Sync + 'static>;

/// Callback invoked once per discovered resource.
pub type FindCallback = Arc<dyn Fn(Result<RemoteResource>) + Send + Sync + 'static>;

/// Callback invoked for each device or platform information response.
pub type InfoCallback = Arc<dyn Fn(Result<Response>) + Send + Sync + 'static>;

type PresenceCallback = Arc<dyn Fn(PresenceEvent) + Send + Sync + 'static>;

/// A response delivered to a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StackResult,
    header_options: Vec<HeaderOption>,
    payload: Option<Payload>,
    source: Option<DeviceAddress>,
}

impl Response {
    pub(crate) fn from_event(event: TransportEvent) -> Self {
        Self {
            status: event.status,
            header_options: event.header_options,
            payload: event.payload,
            source: event.source,
        }
    }

    /// Returns the stack result.
    #[must_use]
    pub fn status(&self) -> StackResult {
        self.status
    }

    /// Returns the vendor header options.
    #[must_use]
    pub fn header_options(&self) -> &[HeaderOption] {
        &self.header_options
    }

    /// Returns the representation, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Returns the responding endpoint, if known.
    #[must_use]
    pub fn source(&self) -> Option<&DeviceAddress> {
        self.source.as_ref()
    }
}

/// An observe notification together with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The response carried by the notification.
    pub response: Response,
    /// Sequence number, strictly increasing within one session.
    pub sequence: u32,
}

/// Event delivered to an [`ObserveCallback`].
#[derive(Debug)]
pub enum ObserveEvent {
    /// A new notification.
    Notification(Notification),
    /// The server answered without registering the observer.
    RegistrationRejected(Response),
    /// The server ended the session. Final event.
    Stopped(StackResult),
    /// The session failed or was torn down. Final event.
    Failed(Error),
}

impl ObserveEvent {
    /// Returns `true` if no further events follow.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Stopped(_) | Self::Failed(_))
    }
}

/// Liveness reported by a presence notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceStatus {
    /// The host is announcing presence.
    Ok,
    /// The host stopped announcing. Final event.
    Stopped,
    /// No announcement arrived in time. Final event.
    Timeout,
    /// The subscription failed. Final event.
    Error(StackResult),
}

impl PresenceStatus {
    /// Returns `true` if no further events follow.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Ok)
    }
}

/// Event delivered to a [`PresenceListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    /// Subscription that produced the event.
    pub handle: PresenceHandle,
    /// Liveness.
    pub status: PresenceStatus,
    /// Server-assigned announcement counter.
    pub nonce: u32,
    /// Announcing host as `scheme://addr:port`.
    pub host: String,
}

/// Identity of a [`PresenceListener`].
///
/// Listeners are deduplicated by this key, never by comparing callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(u64);

impl ListenerKey {
    fn next() -> Self {
        Self(LISTENER_KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw key value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// A caller-supplied presence listener.
///
/// Each call to [`PresenceListener::new`] creates a distinct identity. Clones
/// share the identity, so subscribing several hosts with clones of one
/// listener creates a single internal handler.
///
/// # Examples
///
/// ```
/// use oic_client::subscription::PresenceListener;
///
/// let listener = PresenceListener::new(|event| println!("{event:?}"));
/// let same = listener.clone();
/// let other = PresenceListener::new(|_| {});
///
/// assert_eq!(listener.key(), same.key());
/// assert_ne!(listener.key(), other.key());
/// ```
#[derive(Clone)]
pub struct PresenceListener {
    key: ListenerKey,
    callback: PresenceCallback,
}

impl PresenceListener {
    /// Creates a listener with a fresh identity.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(PresenceEvent) + Send + Sync + 'static,
    {
        Self {
            key: ListenerKey::next(),
            callback: Arc::new(callback),
        }
    }

    /// Returns the listener identity.
    #[must_use]
    pub fn key(&self) -> ListenerKey {
        self.key
    }

    pub(crate) fn callback(&self) -> PresenceCallback {
        Arc::clone(&self.callback)
    }
}

impl fmt::Debug for PresenceListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceListener")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Internal handler shared by every presence subscription of one listener.
pub(crate) struct PresenceHandler {
    callback: PresenceCallback,
}

impl PresenceHandler {
    pub(crate) fn new(listener: &PresenceListener) -> Self {
        Self {
            callback: listener.callback(),
        }
    }

    pub(crate) fn deliver(&self, event: PresenceEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for PresenceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ExchangeToken;

    #[test]
    fn listener_keys_are_unique_per_listener() {
        let a = PresenceListener::new(|_| {});
        let b = PresenceListener::new(|_| {});
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), a.clone().key());
    }

    #[test]
    fn response_from_event_keeps_fields() {
        let event = TransportEvent::completed(ExchangeToken::new(1), StackResult::ResourceCreated)
            .with_payload("{}")
            .with_header_options(vec![HeaderOption::new(2048, "x")]);
        let response = Response::from_event(event);
        assert_eq!(response.status(), StackResult::ResourceCreated);
        assert_eq!(response.payload(), Some(&Payload::from("{}")));
        assert_eq!(response.header_options()[0].option_id(), 2048);
        assert!(response.source().is_none());
    }

    #[test]
    fn final_events() {
        assert!(ObserveEvent::Stopped(StackResult::NoObservers).is_final());
        assert!(ObserveEvent::Failed(Error::Cancelled).is_final());
        assert!(!PresenceStatus::Ok.is_final());
        assert!(PresenceStatus::Timeout.is_final());
    }

    #[test]
    fn handler_forwards_to_listener() {
        let (tx, rx) = std::sync::mpsc::channel();
        let listener = PresenceListener::new(move |event| {
            let _ = tx.send(event.nonce);
        });
        let handler = PresenceHandler::new(&listener);
        handler.deliver(PresenceEvent {
            handle: PresenceHandle::new(ExchangeToken::new(3)),
            status: PresenceStatus::Ok,
            nonce: 9,
            host: "coap://10.0.0.1:5683".to_string(),
        });
        assert_eq!(rx.recv().unwrap(), 9);
    }
}
