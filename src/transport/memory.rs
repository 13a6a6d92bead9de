// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ExchangeToken, OutboundRequest, Transport, TransportEvent};
use crate::types::{HeaderOption, QualityOfService, StackResult};

/// A request accepted by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRequest {
    /// Token issued for the request.
    pub token: ExchangeToken,
    /// The request as submitted.
    pub request: OutboundRequest,
}

/// An in-memory [`Transport`] driven by the caller.
///
/// Clones share state: hand one clone to the dispatcher and keep another to
/// inject events and inspect what was submitted. Tokens are issued from 1
/// upwards.
///
/// # Examples
///
/// ```
/// use oic_client::transport::{ExchangeToken, MemoryTransport, TransportEvent};
/// use oic_client::types::StackResult;
///
/// let transport = MemoryTransport::new();
/// transport.push_event(TransportEvent::completed(ExchangeToken::new(1), StackResult::Ok));
/// assert_eq!(transport.queued_events(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    next_token: u64,
    submitted: Vec<SubmittedRequest>,
    cancelled: Vec<ExchangeToken>,
    queued: VecDeque<TransportEvent>,
    fail_submit: Option<StackResult>,
    fail_cancel: Option<StackResult>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event for the next pump.
    pub fn push_event(&self, event: TransportEvent) {
        self.state.lock().queued.push_back(event);
    }

    /// Makes the next `submit` fail with `status`.
    pub fn fail_next_submit(&self, status: StackResult) {
        self.state.lock().fail_submit = Some(status);
    }

    /// Makes the next `cancel` fail with `status`.
    pub fn fail_next_cancel(&self, status: StackResult) {
        self.state.lock().fail_cancel = Some(status);
    }

    /// Returns every accepted request in submission order.
    #[must_use]
    pub fn submitted(&self) -> Vec<SubmittedRequest> {
        self.state.lock().submitted.clone()
    }

    /// Returns the number of accepted requests.
    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.state.lock().submitted.len()
    }

    /// Returns the token of the most recently accepted request.
    #[must_use]
    pub fn last_token(&self) -> Option<ExchangeToken> {
        self.state.lock().submitted.last().map(|s| s.token)
    }

    /// Returns every token passed to a successful `cancel`.
    #[must_use]
    pub fn cancelled(&self) -> Vec<ExchangeToken> {
        self.state.lock().cancelled.clone()
    }

    /// Returns the number of events waiting for a pump.
    #[must_use]
    pub fn queued_events(&self) -> usize {
        self.state.lock().queued.len()
    }
}

impl Transport for MemoryTransport {
    fn submit(&mut self, request: OutboundRequest) -> Result<ExchangeToken, StackResult> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_submit.take() {
            return Err(status);
        }
        state.next_token += 1;
        let token = ExchangeToken::new(state.next_token);
        state.submitted.push(SubmittedRequest { token, request });
        Ok(token)
    }

    fn cancel(
        &mut self,
        token: ExchangeToken,
        _qos: QualityOfService,
        _header_options: &[HeaderOption],
    ) -> Result<(), StackResult> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_cancel.take() {
            return Err(status);
        }
        state.cancelled.push(token);
        Ok(())
    }

    fn pump(&mut self) -> Vec<TransportEvent> {
        self.state.lock().queued.drain(..).collect()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryTransport")
            .field("submitted", &state.submitted.len())
            .field("cancelled", &state.cancelled.len())
            .field("queued", &state.queued.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Verb;
    use crate::types::Connectivity;

    fn request(uri: &str) -> OutboundRequest {
        OutboundRequest {
            verb: Verb::Get,
            address: None,
            uri: uri.to_string(),
            payload: None,
            qos: QualityOfService::Low,
            header_options: Vec::new(),
            connectivity: Connectivity::default(),
        }
    }

    #[test]
    fn tokens_increase_and_clones_share_state() {
        let observer = MemoryTransport::new();
        let mut transport = observer.clone();

        let first = transport.submit(request("/a")).unwrap();
        let second = transport.submit(request("/b")).unwrap();

        assert_eq!(first, ExchangeToken::new(1));
        assert_eq!(second, ExchangeToken::new(2));
        assert_eq!(observer.submit_count(), 2);
        assert_eq!(observer.last_token(), Some(second));
        assert_eq!(observer.submitted()[0].request.uri, "/a");
    }

    #[test]
    fn injected_failure_applies_once() {
        let mut transport = MemoryTransport::new();
        transport.fail_next_submit(StackResult::CommError);

        assert_eq!(transport.submit(request("/a")), Err(StackResult::CommError));
        assert!(transport.submit(request("/a")).is_ok());
        assert_eq!(transport.submit_count(), 1);

        transport.fail_next_cancel(StackResult::InvalidParam);
        let token = ExchangeToken::new(1);
        assert_eq!(
            transport.cancel(token, QualityOfService::Low, &[]),
            Err(StackResult::InvalidParam)
        );
        assert!(transport.cancel(token, QualityOfService::Low, &[]).is_ok());
        assert_eq!(transport.cancelled(), vec![token]);
    }

    #[test]
    fn pump_drains_in_order() {
        let mut transport = MemoryTransport::new();
        let token = ExchangeToken::new(1);
        transport.push_event(TransportEvent::notification(token, StackResult::Ok, 1));
        transport.push_event(TransportEvent::notification(token, StackResult::Ok, 2));

        let events = transport.pump();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, Some(1));
        assert_eq!(events[1].sequence, Some(2));
        assert!(transport.pump().is_empty());
    }
}
