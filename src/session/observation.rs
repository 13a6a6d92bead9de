// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observation sessions and the table that owns them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use parking_lot::Mutex;

use super::Routed;
use crate::error::{Error, Result};
use crate::subscription::{Notification, ObserveCallback, ObserveEvent, Response};
use crate::transport::{EventKind, ExchangeToken, OutboundRequest, Transport, TransportEvent, Verb};
use crate::types::{HeaderOption, QualityOfService, ResourceIdentifier, StackResult};

/// Kind of observe registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObserveType {
    /// Standard observe.
    #[default]
    Observe,
    /// Observe every resource matching the request.
    ObserveAll,
}

impl ObserveType {
    pub(crate) const fn verb(self) -> Verb {
        match self {
            Self::Observe => Verb::Observe,
            Self::ObserveAll => Verb::ObserveAll,
        }
    }
}

/// Lifecycle state of an observation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Submitted, waiting for the first notification.
    Registering,
    /// Receiving notifications.
    Active,
    /// Cancel requested, waiting for confirmation.
    Cancelling,
    /// Ended. The session is removed from its table.
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Registering => "registering",
            Self::Active => "active",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What to do with an event after the session has seen it.
#[derive(Debug)]
pub(crate) enum Step {
    /// Hand the event to the callback; the session continues.
    Deliver(ObserveEvent),
    /// Drop the event.
    Ignore,
    /// Remove the session, delivering the final event if there is one.
    Finish(Option<ObserveEvent>),
}

/// One observe relationship with a resource.
pub(crate) struct ObservationSession {
    id: ResourceIdentifier,
    token: ExchangeToken,
    state: SessionState,
    last_sequence: Option<u32>,
    rejection_reported: bool,
    callback: ObserveCallback,
}

impl ObservationSession {
    pub(crate) fn new(
        id: ResourceIdentifier,
        token: ExchangeToken,
        callback: ObserveCallback,
    ) -> Self {
        Self {
            id,
            token,
            state: SessionState::Registering,
            last_sequence: None,
            rejection_reported: false,
            callback,
        }
    }

    pub(crate) fn id(&self) -> &ResourceIdentifier {
        &self.id
    }

    pub(crate) fn token(&self) -> ExchangeToken {
        self.token
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn callback(&self) -> ObserveCallback {
        ObserveCallback::clone(&self.callback)
    }

    pub(crate) fn begin_cancel(&mut self) {
        self.state = SessionState::Cancelling;
    }

    /// Advances the state machine with one transport event.
    pub(crate) fn on_event(&mut self, event: TransportEvent) -> Step {
        let ends = event.kind == EventKind::Terminal
            || event.status == StackResult::NoObservers
            || !event.status.is_success();
        if ends {
            return self.finish(event.status, event.kind);
        }

        let Some(sequence) = event.sequence else {
            if self.rejection_reported {
                return Step::Ignore;
            }
            self.rejection_reported = true;
            return Step::Deliver(ObserveEvent::RegistrationRejected(Response::from_event(
                event,
            )));
        };

        if self.last_sequence.is_some_and(|last| sequence <= last) {
            tracing::trace!(
                resource = %self.id,
                sequence,
                last = ?self.last_sequence,
                "Stale notification dropped"
            );
            return Step::Ignore;
        }

        self.last_sequence = Some(sequence);
        if self.state == SessionState::Registering {
            self.state = SessionState::Active;
            tracing::debug!(resource = %self.id, token = %self.token, "Observation active");
        }
        Step::Deliver(ObserveEvent::Notification(Notification {
            response: Response::from_event(event),
            sequence,
        }))
    }

    fn finish(&mut self, status: StackResult, kind: EventKind) -> Step {
        let previous = std::mem::replace(&mut self.state, SessionState::Cancelled);
        tracing::debug!(
            resource = %self.id,
            token = %self.token,
            status = ?status,
            from = %previous,
            "Observation ended"
        );
        // Only a confirming status ends a cancel silently
        let confirmed = status.is_success() || status == StackResult::NoObservers;
        if previous == SessionState::Cancelling && confirmed {
            return Step::Finish(None);
        }
        let stopped = status == StackResult::NoObservers
            || (kind == EventKind::Terminal && status.is_success());
        if stopped {
            Step::Finish(Some(ObserveEvent::Stopped(status)))
        } else {
            Step::Finish(Some(ObserveEvent::Failed(Error::Transport(status))))
        }
    }
}

#[derive(Default)]
struct Sessions {
    by_resource: BTreeMap<ResourceIdentifier, ObservationSession>,
    by_token: HashMap<ExchangeToken, ResourceIdentifier>,
}

impl Sessions {
    fn remove(&mut self, id: &ResourceIdentifier) -> Option<ObservationSession> {
        let session = self.by_resource.remove(id)?;
        self.by_token.remove(&session.token);
        Some(session)
    }
}

/// Observation sessions keyed by resource, at most one per resource.
#[derive(Default)]
pub(crate) struct ObservationTable {
    sessions: Mutex<Sessions>,
}

impl ObservationTable {
    /// Submits an observe request and records the session.
    ///
    /// The duplicate check, the submission and the insert happen under one
    /// lock, so two racing callers cannot both start a session.
    pub(crate) fn begin(
        &self,
        transport: &mut dyn Transport,
        id: ResourceIdentifier,
        request: OutboundRequest,
        callback: ObserveCallback,
    ) -> Result<ExchangeToken> {
        let mut sessions = self.sessions.lock();
        if sessions.by_resource.contains_key(&id) {
            return Err(Error::AlreadyObserving(id));
        }
        let token = transport.submit(request).map_err(Error::SubmissionFailed)?;
        tracing::debug!(resource = %id, token = %token, "Observation registering");
        sessions.by_token.insert(token, id.clone());
        sessions
            .by_resource
            .insert(id.clone(), ObservationSession::new(id, token, callback));
        Ok(token)
    }

    /// Asks the transport to cancel the session for `id`.
    ///
    /// With `immediate` the session is removed as soon as the transport
    /// accepts the cancel; otherwise it stays `Cancelling` until a terminal
    /// event arrives.
    pub(crate) fn request_cancel(
        &self,
        transport: &mut dyn Transport,
        id: &ResourceIdentifier,
        qos: QualityOfService,
        header_options: &[HeaderOption],
        immediate: bool,
    ) -> Result<ExchangeToken> {
        let removed = {
            let mut sessions = self.sessions.lock();
            let session = match sessions.by_resource.get_mut(id) {
                Some(s) if s.state != SessionState::Cancelling => s,
                _ => return Err(Error::NotObserving(id.clone())),
            };
            let token = session.token;
            transport
                .cancel(token, qos, header_options)
                .map_err(Error::SubmissionFailed)?;
            session.begin_cancel();
            tracing::debug!(resource = %id, token = %token, "Observation cancelling");
            if !immediate {
                return Ok(token);
            }
            sessions.remove(id)
        };
        let Some(mut session) = removed else {
            return Err(Error::NotObserving(id.clone()));
        };
        session.state = SessionState::Cancelled;
        tracing::debug!(resource = %id, token = %session.token, "Observation cancelled");
        Ok(session.token)
    }

    /// Feeds an event to the session owning its token.
    pub(crate) fn route(
        &self,
        event: TransportEvent,
    ) -> Routed<Option<(ObserveCallback, ObserveEvent)>> {
        let mut sessions = self.sessions.lock();
        let Some(id) = sessions.by_token.get(&event.token).cloned() else {
            return Routed::Unmatched(event);
        };
        let Some(session) = sessions.by_resource.get_mut(&id) else {
            sessions.by_token.remove(&event.token);
            return Routed::Unmatched(event);
        };
        let callback = session.callback();
        match session.on_event(event) {
            Step::Deliver(observed) => Routed::Handled(Some((callback, observed))),
            Step::Ignore => Routed::Handled(None),
            Step::Finish(last) => {
                sessions.remove(&id);
                Routed::Handled(last.map(|observed| (callback, observed)))
            }
        }
    }

    /// Returns the state of the session for `id`.
    pub(crate) fn state(&self, id: &ResourceIdentifier) -> Option<SessionState> {
        self.sessions.lock().by_resource.get(id).map(ObservationSession::state)
    }

    /// Removes every session.
    pub(crate) fn drain(&self) -> Vec<ObservationSession> {
        let mut sessions = self.sessions.lock();
        sessions.by_token.clear();
        std::mem::take(&mut sessions.by_resource).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().by_resource.len()
    }
}

impl fmt::Debug for ObservationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationTable")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::MemoryTransport;
    use crate::types::Connectivity;

    fn session() -> ObservationSession {
        ObservationSession::new(
            ResourceIdentifier::new("s", "/a/light"),
            ExchangeToken::new(1),
            Arc::new(|_| {}),
        )
    }

    fn notify(sequence: u32) -> TransportEvent {
        TransportEvent::notification(ExchangeToken::new(1), StackResult::Ok, sequence)
    }

    fn delivered_sequence(step: Step) -> Option<u32> {
        match step {
            Step::Deliver(ObserveEvent::Notification(n)) => Some(n.sequence),
            _ => None,
        }
    }

    fn request() -> OutboundRequest {
        OutboundRequest {
            verb: Verb::Observe,
            address: None,
            uri: "/a/light".to_string(),
            payload: None,
            qos: QualityOfService::Low,
            header_options: Vec::new(),
            connectivity: Connectivity::default(),
        }
    }

    // ========================================================================
    // State machine
    // ========================================================================

    mod state_machine {
        use super::*;

        #[test]
        fn first_notification_activates() {
            let mut s = session();
            assert_eq!(s.state(), SessionState::Registering);
            assert_eq!(delivered_sequence(s.on_event(notify(1))), Some(1));
            assert_eq!(s.state(), SessionState::Active);
        }

        #[test]
        fn duplicates_and_stale_sequences_are_dropped() {
            let mut s = session();
            assert_eq!(delivered_sequence(s.on_event(notify(1))), Some(1));
            assert!(matches!(s.on_event(notify(1)), Step::Ignore));
            assert_eq!(delivered_sequence(s.on_event(notify(3))), Some(3));
            assert!(matches!(s.on_event(notify(2)), Step::Ignore));
            assert_eq!(delivered_sequence(s.on_event(notify(4))), Some(4));
        }

        #[test]
        fn no_option_forwarded_once_without_advancing() {
            let mut s = session();
            let rejected = TransportEvent::completed(ExchangeToken::new(1), StackResult::Ok);

            assert!(matches!(
                s.on_event(rejected.clone()),
                Step::Deliver(ObserveEvent::RegistrationRejected(_))
            ));
            assert!(matches!(s.on_event(rejected), Step::Ignore));
            assert_eq!(s.state(), SessionState::Registering);
            assert_eq!(delivered_sequence(s.on_event(notify(0))), Some(0));
        }

        #[test]
        fn no_observers_stops_active_session() {
            let mut s = session();
            s.on_event(notify(1));
            let step = s.on_event(TransportEvent::terminal(
                ExchangeToken::new(1),
                StackResult::NoObservers,
            ));
            assert!(matches!(
                step,
                Step::Finish(Some(ObserveEvent::Stopped(StackResult::NoObservers)))
            ));
            assert_eq!(s.state(), SessionState::Cancelled);
        }

        #[test]
        fn transport_error_fails_session() {
            let mut s = session();
            let step = s.on_event(TransportEvent::notification(
                ExchangeToken::new(1),
                StackResult::CommError,
                1,
            ));
            assert!(matches!(
                step,
                Step::Finish(Some(ObserveEvent::Failed(Error::Transport(StackResult::CommError))))
            ));
        }

        #[test]
        fn cancelling_keeps_delivering_then_finishes_silently() {
            let mut s = session();
            s.on_event(notify(1));
            s.begin_cancel();
            assert_eq!(delivered_sequence(s.on_event(notify(2))), Some(2));
            assert_eq!(s.state(), SessionState::Cancelling);
            let step = s.on_event(TransportEvent::terminal(ExchangeToken::new(1), StackResult::Ok));
            assert!(matches!(step, Step::Finish(None)));
        }

        #[test]
        fn transport_error_while_cancelling_is_reported() {
            let mut s = session();
            s.on_event(notify(1));
            s.begin_cancel();
            let step = s.on_event(TransportEvent::terminal(
                ExchangeToken::new(1),
                StackResult::CommError,
            ));
            assert!(matches!(
                step,
                Step::Finish(Some(ObserveEvent::Failed(Error::Transport(StackResult::CommError))))
            ));
            assert_eq!(s.state(), SessionState::Cancelled);
        }
    }

    // ========================================================================
    // Table
    // ========================================================================

    mod table {
        use super::*;

        #[test]
        fn second_begin_is_rejected() {
            let table = ObservationTable::default();
            let mut transport = MemoryTransport::new();
            let id = ResourceIdentifier::new("s", "/a/light");

            table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap();
            let err = table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap_err();

            assert!(matches!(err, Error::AlreadyObserving(found) if found == id));
            assert_eq!(transport.submit_count(), 1);
        }

        #[test]
        fn submit_failure_leaves_no_session() {
            let table = ObservationTable::default();
            let mut transport = MemoryTransport::new();
            transport.fail_next_submit(StackResult::AdapterNotEnabled);
            let id = ResourceIdentifier::new("s", "/a/light");

            let err = table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap_err();
            assert!(matches!(err, Error::SubmissionFailed(StackResult::AdapterNotEnabled)));
            assert_eq!(table.state(&id), None);
        }

        #[test]
        fn double_cancel_reports_not_observing() {
            let table = ObservationTable::default();
            let mut transport = MemoryTransport::new();
            let id = ResourceIdentifier::new("s", "/a/light");
            table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap();

            table
                .request_cancel(&mut transport, &id, QualityOfService::Low, &[], false)
                .unwrap();
            assert_eq!(table.state(&id), Some(SessionState::Cancelling));

            let err = table
                .request_cancel(&mut transport, &id, QualityOfService::Low, &[], false)
                .unwrap_err();
            assert!(matches!(err, Error::NotObserving(_)));
            assert_eq!(transport.cancelled().len(), 1);
        }

        #[test]
        fn immediate_cancel_frees_the_resource() {
            let table = ObservationTable::default();
            let mut transport = MemoryTransport::new();
            let id = ResourceIdentifier::new("s", "/a/light");
            let token = table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap();

            table
                .request_cancel(&mut transport, &id, QualityOfService::Low, &[], true)
                .unwrap();
            assert_eq!(table.state(&id), None);
            assert!(matches!(
                table.route(TransportEvent::notification(token, StackResult::Ok, 1)),
                Routed::Unmatched(_)
            ));
        }

        #[test]
        fn terminal_event_removes_session() {
            let table = ObservationTable::default();
            let mut transport = MemoryTransport::new();
            let id = ResourceIdentifier::new("s", "/a/light");
            let token = table
                .begin(&mut transport, id.clone(), request(), Arc::new(|_| {}))
                .unwrap();

            let routed = table.route(TransportEvent::terminal(token, StackResult::NoObservers));
            assert!(matches!(routed, Routed::Handled(Some(_))));
            assert_eq!(table.state(&id), None);
            assert_eq!(table.len(), 0);
        }
    }
}
