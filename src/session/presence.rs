// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Presence subscriptions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Routed;
use crate::error::{Error, Result};
use crate::subscription::{
    CallbackRegistry, ListenerKey, PresenceEvent, PresenceHandler, PresenceListener,
    PresenceStatus,
};
use crate::transport::{EventKind, ExchangeToken, OutboundRequest, Transport, TransportEvent};
use crate::types::{QualityOfService, StackResult};

/// URI presence requests are sent to.
pub const PRESENCE_URI: &str = "/oic/ad";

/// Handle of a presence subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PresenceHandle(ExchangeToken);

impl PresenceHandle {
    pub(crate) const fn new(token: ExchangeToken) -> Self {
        Self(token)
    }

    /// Returns the underlying exchange token.
    #[must_use]
    pub fn token(&self) -> ExchangeToken {
        self.0
    }
}

impl fmt::Display for PresenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Presence({})", self.0.value())
    }
}

struct PresenceSubscription {
    host: String,
    resource_type: Option<String>,
    key: ListenerKey,
    handler: Arc<PresenceHandler>,
    last_nonce: Option<u32>,
}

/// Live presence subscriptions plus the registry of their listeners.
///
/// Lock order: subscriptions, then registry.
#[derive(Default)]
pub(crate) struct PresenceTable {
    subscriptions: Mutex<HashMap<PresenceHandle, PresenceSubscription>>,
    registry: CallbackRegistry<PresenceHandler>,
}

impl PresenceTable {
    /// Submits a presence request and attaches `listener` to it.
    pub(crate) fn subscribe(
        &self,
        transport: &mut dyn Transport,
        host: String,
        resource_type: Option<String>,
        request: OutboundRequest,
        listener: &PresenceListener,
    ) -> Result<PresenceHandle> {
        let mut subscriptions = self.subscriptions.lock();
        let token = transport.submit(request).map_err(Error::SubmissionFailed)?;
        let handle = PresenceHandle::new(token);
        let key = listener.key();
        let handler = self
            .registry
            .acquire(key, || PresenceHandler::new(listener));
        tracing::debug!(
            handle = %handle,
            host = %host,
            resource_type = ?resource_type,
            listener = %key,
            "Presence subscribed"
        );
        subscriptions.insert(
            handle,
            PresenceSubscription {
                host,
                resource_type,
                key,
                handler,
                last_nonce: None,
            },
        );
        Ok(handle)
    }

    /// Cancels the subscription and releases its listener.
    ///
    /// The subscription is finalized as soon as the transport accepts the
    /// cancel; presence has no confirming event.
    pub(crate) fn unsubscribe(
        &self,
        transport: &mut dyn Transport,
        handle: PresenceHandle,
    ) -> Result<()> {
        let removed = {
            let mut subscriptions = self.subscriptions.lock();
            if !subscriptions.contains_key(&handle) {
                return Err(Error::NotSubscribed(handle));
            }
            transport
                .cancel(handle.token(), QualityOfService::Low, &[])
                .map_err(Error::SubmissionFailed)?;
            subscriptions.remove(&handle)
        };
        if let Some(subscription) = removed {
            tracing::debug!(handle = %handle, host = %subscription.host, "Presence unsubscribed");
            self.release(subscription);
        }
        Ok(())
    }

    /// Feeds an event to the subscription owning its token.
    pub(crate) fn route(
        &self,
        event: TransportEvent,
    ) -> Routed<Option<(Arc<PresenceHandler>, PresenceEvent)>> {
        let handle = PresenceHandle::new(event.token);
        let mut subscriptions = self.subscriptions.lock();
        let Some(subscription) = subscriptions.get_mut(&handle) else {
            return Routed::Unmatched(event);
        };

        let status = classify(event.kind, event.status);
        let nonce = event.sequence.unwrap_or(0);
        let host = event
            .source
            .as_ref()
            .map_or_else(|| subscription.host.clone(), ToString::to_string);
        let presence = PresenceEvent {
            handle,
            status,
            nonce,
            host,
        };

        if !status.is_final() {
            if subscription.last_nonce == Some(nonce) {
                tracing::trace!(handle = %handle, nonce, "Presence unchanged");
                return Routed::Handled(None);
            }
            subscription.last_nonce = Some(nonce);
            return Routed::Handled(Some((Arc::clone(&subscription.handler), presence)));
        }

        let removed = subscriptions.remove(&handle);
        drop(subscriptions);
        let Some(subscription) = removed else {
            return Routed::Handled(None);
        };
        tracing::debug!(
            handle = %handle,
            host = %subscription.host,
            resource_type = ?subscription.resource_type,
            status = ?status,
            "Presence ended"
        );
        let handler = Arc::clone(&subscription.handler);
        self.release(subscription);
        Routed::Handled(Some((handler, presence)))
    }

    /// Removes every subscription, releasing their listeners.
    pub(crate) fn drain(&self) -> Vec<PresenceHandle> {
        let drained: Vec<_> = self.subscriptions.lock().drain().collect();
        drained
            .into_iter()
            .map(|(handle, subscription)| {
                self.release(subscription);
                handle
            })
            .collect()
    }

    pub(crate) fn listener_refs(&self, key: ListenerKey) -> Option<usize> {
        self.registry.ref_count(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn release(&self, subscription: PresenceSubscription) {
        let key = subscription.key;
        drop(subscription);
        if let Err(e) = self.registry.release(key) {
            tracing::warn!(listener = %key, error = %e, "Presence listener already released");
        }
    }
}

fn classify(kind: EventKind, status: StackResult) -> PresenceStatus {
    match status {
        StackResult::PresenceStopped => PresenceStatus::Stopped,
        StackResult::PresenceTimeout => PresenceStatus::Timeout,
        s if s.is_success() && kind == EventKind::Terminal => PresenceStatus::Stopped,
        s if s.is_success() => PresenceStatus::Ok,
        s => PresenceStatus::Error(s),
    }
}

impl fmt::Debug for PresenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceTable")
            .field("subscriptions", &self.len())
            .field("registry", &self.registry)
            .finish()
    }
}
