// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The request dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;

use super::executor::CallbackExecutor;
use super::pump::BackgroundPump;
use super::request::Request;
use crate::config::{CancelConfirmation, DispatcherBuilder, DispatcherConfig, PumpMode};
use crate::error::{ArgumentError, Error, Result};
use crate::resource::RemoteResource;
use crate::session::{
    DEVICE_URI, DiscoveryDelivery, DiscoveryHandle, DiscoveryKind, DiscoveryTable,
    ObservationTable, ObserveType, PLATFORM_URI, PRESENCE_URI, PresenceHandle, PresenceTable,
    RESOURCE_DISCOVERY_URI, Routed, SessionState,
};
use crate::subscription::{
    FindCallback, InfoCallback, ObserveCallback, ObserveEvent, OperationInfo, PendingOperation,
    PendingOperationTable, PresenceListener, Response, ResponseCallback,
};
use crate::transport::{ExchangeToken, OutboundRequest, Transport, TransportEvent, Verb};
use crate::types::{
    Connectivity, DeviceAddress, HeaderOption, QualityOfService, QueryParams, RESOURCE_TYPE_KEY,
    ResourceDescriptor, ResourceIdentifier, StackResult, validate_uri,
};

/// Client-side dispatcher for resource operations.
///
/// Every verb validates its arguments, submits the exchange to the transport
/// and returns as soon as the transport has accepted it. Completion arrives
/// later through the callback, on a callback worker thread. Argument and
/// state errors are returned directly and never reach the callback.
///
/// `Dispatcher` is cheaply cloneable (via `Arc`). Call
/// [`shutdown`](Self::shutdown) to stop the pump and fail everything still
/// in flight with [`Error::Cancelled`].
///
/// # Examples
///
/// ```
/// use oic_client::{Dispatcher, PumpMode, Request};
/// use oic_client::transport::{MemoryTransport, TransportEvent};
/// use oic_client::types::StackResult;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> oic_client::Result<()> {
/// let transport = MemoryTransport::new();
/// let dispatcher = Dispatcher::builder()
///     .pump_mode(PumpMode::Manual)
///     .build(transport.clone())?;
///
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let token = dispatcher.get(
///     Request::new("coap://192.168.1.20:5683", "/a/light"),
///     Some(Box::new(move |result| {
///         let _ = tx.send(result.map(|r| r.status()));
///     })),
/// )?;
///
/// transport.push_event(TransportEvent::completed(token, StackResult::Ok));
/// dispatcher.pump_once().await;
/// assert_eq!(rx.recv().await.unwrap()?, StackResult::Ok);
///
/// dispatcher.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

pub(crate) struct DispatcherInner {
    config: DispatcherConfig,
    /// Serializes submit, cancel and pump. Table locks are taken after it.
    transport: Mutex<Box<dyn Transport>>,
    pending: PendingOperationTable,
    observations: ObservationTable,
    presence: PresenceTable,
    discovery: DiscoveryTable,
    executor: CallbackExecutor,
    pump: Mutex<Option<BackgroundPump>>,
    /// Held shared by each `pump_once`, exclusively by `shutdown` before the
    /// executor closes.
    pumping: RwLock<()>,
    /// Only set while holding `transport`.
    shut_down: AtomicBool,
}

impl Dispatcher {
    /// Creates a new builder for configuring a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub(crate) fn start(config: DispatcherConfig, transport: Box<dyn Transport>) -> Result<Self> {
        let executor =
            CallbackExecutor::start(config.callback_workers(), config.callback_queue_capacity())?;
        let pump_mode = config.pump_mode();
        let inner = Arc::new(DispatcherInner {
            config,
            transport: Mutex::new(transport),
            pending: PendingOperationTable::new(),
            observations: ObservationTable::default(),
            presence: PresenceTable::default(),
            discovery: DiscoveryTable::default(),
            executor,
            pump: Mutex::new(None),
            pumping: RwLock::new(()),
            shut_down: AtomicBool::new(false),
        });
        if let PumpMode::Background { interval } = pump_mode {
            *inner.pump.lock() = Some(BackgroundPump::start(Arc::downgrade(&inner), interval));
        }
        tracing::info!(
            workers = inner.config.callback_workers(),
            pump = ?pump_mode,
            "Dispatcher started"
        );
        Ok(Self { inner })
    }

    pub(crate) fn from_inner(inner: Arc<DispatcherInner>) -> Self {
        Self { inner }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns the QoS used when a request does not carry one.
    #[must_use]
    pub fn default_qos(&self) -> QualityOfService {
        self.inner.config.default_qos()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    /// Locks the transport for a submission or cancel.
    ///
    /// The flag is checked again under the lock: anything registered while
    /// the guard is held is either refused here or drained by `shutdown`.
    fn running_transport(&self) -> Result<MutexGuard<'_, Box<dyn Transport>>> {
        let transport = self.inner.transport.lock();
        self.ensure_running()?;
        Ok(transport)
    }

    // =========================================================================
    // One-shot verbs
    // =========================================================================

    /// Retrieves a representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the callback is missing or the
    /// request is malformed, [`Error::SubmissionFailed`] if the transport
    /// refuses it, or [`Error::ShutDown`].
    pub fn get(
        &self,
        request: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.exchange(Verb::Get, request, callback)
    }

    /// Replaces a representation.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn put(
        &self,
        request: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.exchange(Verb::Put, request, callback)
    }

    /// Creates or updates a resource.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn post(
        &self,
        request: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.exchange(Verb::Post, request, callback)
    }

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn delete(
        &self,
        request: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.exchange(Verb::Delete, request, callback)
    }

    fn exchange(
        &self,
        verb: Verb,
        request: Request,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        let callback = callback.ok_or(ArgumentError::MissingCallback)?;
        self.ensure_running()?;
        let (_, outbound) = request.resolve(verb, self.default_qos())?;
        let uri = outbound.uri.clone();
        let qos = outbound.qos;
        let deadline = self
            .inner
            .config
            .exchange_timeout()
            .map(|timeout| Instant::now() + timeout);

        let mut transport = self.running_transport()?;
        let token = transport.submit(outbound).map_err(Error::SubmissionFailed)?;
        let operation = PendingOperation::new(token, verb, uri, qos, deadline, callback);
        if let Err(rejected) = self.inner.pending.register(operation) {
            drop(transport);
            tracing::warn!(token = %rejected.token(), "Transport reused a live token");
            return Err(Error::SubmissionFailed(StackResult::DuplicateRequest));
        }
        drop(transport);

        tracing::debug!(token = %token, verb = %verb, qos = %qos, "Exchange submitted");
        Ok(token)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Starts observing a resource.
    ///
    /// Returns the identity the session is keyed on, which is what
    /// [`cancel_observe`](Self::cancel_observe) takes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyObserving`] if the resource has a live
    /// session, plus the errors of [`get`](Self::get).
    pub fn observe(
        &self,
        request: Request,
        observe_type: ObserveType,
        callback: Option<ObserveCallback>,
    ) -> Result<ResourceIdentifier> {
        let callback = callback.ok_or(ArgumentError::MissingCallback)?;
        self.ensure_running()?;
        let (id, outbound) = request.resolve(observe_type.verb(), self.default_qos())?;
        let mut transport = self.running_transport()?;
        self.inner
            .observations
            .begin(&mut **transport, id.clone(), outbound, callback)?;
        Ok(id)
    }

    /// Requests cancellation of the observation of `id`.
    ///
    /// With [`CancelConfirmation::AwaitTransport`] the session keeps
    /// delivering notifications until the transport confirms.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotObserving`] if there is no session or it is
    /// already cancelling, or [`Error::SubmissionFailed`] if the transport
    /// refuses the cancel.
    pub fn cancel_observe(
        &self,
        id: &ResourceIdentifier,
        qos: Option<QualityOfService>,
    ) -> Result<()> {
        self.cancel_observe_with(id, qos, &[])
    }

    pub(crate) fn cancel_observe_with(
        &self,
        id: &ResourceIdentifier,
        qos: Option<QualityOfService>,
        header_options: &[HeaderOption],
    ) -> Result<()> {
        self.ensure_running()?;
        let immediate = self.inner.config.cancel_confirmation() == CancelConfirmation::Immediate;
        let qos = qos.unwrap_or_else(|| self.default_qos());
        let mut transport = self.running_transport()?;
        self.inner
            .observations
            .request_cancel(&mut **transport, id, qos, header_options, immediate)?;
        Ok(())
    }

    /// Returns the state of the observation of `id`, if one exists.
    #[must_use]
    pub fn observation_state(&self, id: &ResourceIdentifier) -> Option<SessionState> {
        self.inner.observations.state(id)
    }

    // =========================================================================
    // Presence
    // =========================================================================

    /// Subscribes `listener` to presence announcements of `host`.
    ///
    /// Subscribing clones of one listener several times shares one internal
    /// handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a malformed host,
    /// [`Error::SubmissionFailed`] or [`Error::ShutDown`].
    pub fn subscribe_presence(
        &self,
        host: &str,
        resource_type: Option<&str>,
        connectivity: Connectivity,
        listener: &PresenceListener,
    ) -> Result<PresenceHandle> {
        self.ensure_running()?;
        let address = DeviceAddress::parse_with(host, connectivity)?;
        let resource_type = resource_type.filter(|rt| !rt.is_empty());
        let mut query = QueryParams::new();
        if let Some(rt) = resource_type {
            query.insert(RESOURCE_TYPE_KEY, rt);
        }
        let outbound = OutboundRequest {
            verb: Verb::Presence,
            uri: query.assemble_uri(PRESENCE_URI),
            connectivity: address.connectivity(),
            address: Some(address.clone()),
            payload: None,
            qos: QualityOfService::Low,
            header_options: Vec::new(),
        };
        let mut transport = self.running_transport()?;
        self.inner.presence.subscribe(
            &mut **transport,
            address.to_string(),
            resource_type.map(str::to_string),
            outbound,
            listener,
        )
    }

    /// Ends a presence subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSubscribed`] for an unknown handle, or
    /// [`Error::SubmissionFailed`] if the transport refuses the cancel.
    pub fn unsubscribe_presence(&self, handle: PresenceHandle) -> Result<()> {
        self.ensure_running()?;
        let mut transport = self.running_transport()?;
        self.inner.presence.unsubscribe(&mut **transport, handle)
    }

    /// Returns how many live subscriptions use `listener`.
    #[must_use]
    pub fn presence_listener_refs(&self, listener: &PresenceListener) -> Option<usize> {
        self.inner.presence.listener_refs(listener.key())
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Discovers resources.
    ///
    /// An empty `host` multicasts; an empty `resource_uri` uses `/oic/res`.
    /// The callback runs once per advertised resource, in payload order, until
    /// [`cancel_find`](Self::cancel_find) or shutdown. Results are not
    /// deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a missing callback, a malformed
    /// host or a relative URI, [`Error::SubmissionFailed`] or
    /// [`Error::ShutDown`].
    pub fn find(
        &self,
        host: &str,
        resource_uri: &str,
        connectivity: Connectivity,
        callback: Option<FindCallback>,
    ) -> Result<DiscoveryHandle> {
        let callback = callback.ok_or(ArgumentError::MissingCallback)?;
        self.discover(
            host,
            resource_uri,
            RESOURCE_DISCOVERY_URI,
            connectivity,
            DiscoveryKind::Resources(callback),
        )
    }

    /// Discovers resources, delivering them through a channel.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn find_stream(
        &self,
        host: &str,
        resource_uri: &str,
        connectivity: Connectivity,
    ) -> Result<(DiscoveryHandle, mpsc::UnboundedReceiver<Result<RemoteResource>>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: FindCallback = Arc::new(move |result| {
            let _ = tx.send(result);
        });
        let handle = self.find(host, resource_uri, connectivity, Some(callback))?;
        Ok((handle, rx))
    }

    /// Ends a discovery exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryNotFound`] for an unknown handle, or
    /// [`Error::SubmissionFailed`] if the transport refuses the cancel.
    pub fn cancel_find(&self, handle: DiscoveryHandle) -> Result<()> {
        self.ensure_running()?;
        let qos = self.default_qos();
        let mut transport = self.running_transport()?;
        self.inner
            .discovery
            .cancel(&mut **transport, handle, qos, &[])
    }

    /// Requests device information; an empty `uri` uses `/oic/d`.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn device_info(
        &self,
        host: &str,
        uri: &str,
        connectivity: Connectivity,
        callback: Option<InfoCallback>,
    ) -> Result<DiscoveryHandle> {
        let callback = callback.ok_or(ArgumentError::MissingCallback)?;
        self.discover(host, uri, DEVICE_URI, connectivity, DiscoveryKind::Info(callback))
    }

    /// Requests platform information; an empty `uri` uses `/oic/p`.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub fn platform_info(
        &self,
        host: &str,
        uri: &str,
        connectivity: Connectivity,
        callback: Option<InfoCallback>,
    ) -> Result<DiscoveryHandle> {
        let callback = callback.ok_or(ArgumentError::MissingCallback)?;
        self.discover(host, uri, PLATFORM_URI, connectivity, DiscoveryKind::Info(callback))
    }

    fn discover(
        &self,
        host: &str,
        uri: &str,
        default_uri: &str,
        connectivity: Connectivity,
        kind: DiscoveryKind,
    ) -> Result<DiscoveryHandle> {
        self.ensure_running()?;
        let uri = if uri.is_empty() { default_uri } else { uri };
        validate_uri(uri)?;
        let address = if host.is_empty() {
            None
        } else {
            Some(DeviceAddress::parse_with(host, connectivity)?)
        };
        let connectivity = address
            .as_ref()
            .map_or(connectivity, DeviceAddress::connectivity);
        let outbound = OutboundRequest {
            verb: Verb::Discover,
            address,
            uri: uri.to_string(),
            payload: None,
            qos: self.default_qos(),
            header_options: Vec::new(),
            connectivity,
        };
        let mut transport = self.running_transport()?;
        self.inner.discovery.begin(&mut **transport, outbound, kind)
    }

    /// Builds a proxy for a resource that was not discovered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the URI is empty, relative or
    /// `/`, the host is malformed, or the type or interface list is empty.
    pub fn construct_resource(
        &self,
        host: &str,
        uri: &str,
        connectivity: Connectivity,
        observable: bool,
        resource_types: Vec<String>,
        interfaces: Vec<String>,
    ) -> Result<RemoteResource> {
        if uri == "/" {
            return Err(ArgumentError::RootUri.into());
        }
        let address = DeviceAddress::parse_with(host, connectivity)?;
        let descriptor = ResourceDescriptor::new(
            address.to_string(),
            uri,
            resource_types,
            interfaces,
            observable,
        )?;
        Ok(RemoteResource::new(self.clone(), descriptor, address))
    }

    // =========================================================================
    // Pump and delivery
    // =========================================================================

    /// Pumps the transport once and routes every event it yields.
    ///
    /// Also fails one-shot exchanges past their timeout. Returns the number
    /// of transport events processed. Called by the background pump; call it
    /// directly in [`PumpMode::Manual`].
    pub async fn pump_once(&self) -> usize {
        let _pumping = self.inner.pumping.read().await;
        if self.is_shut_down() {
            return 0;
        }
        let events = self.inner.transport.lock().pump();
        let count = events.len();
        for event in events {
            self.route(event).await;
        }
        self.expire_operations().await;
        count
    }

    /// Waits until every callback routed so far has returned.
    pub async fn flush_callbacks(&self) {
        self.inner.executor.flush().await;
    }

    async fn route(&self, event: TransportEvent) {
        let token = event.token;
        let lane = token.value();

        if let Some(operation) = self.inner.pending.take_and_remove(token) {
            let result = if event.status.is_success() {
                Ok(Response::from_event(event))
            } else {
                Err(Error::Transport(event.status))
            };
            tracing::trace!(token = %token, ok = result.is_ok(), "Exchange completed");
            let callback = operation.into_callback();
            self.inner.executor.dispatch(lane, move || callback(result)).await;
            return;
        }

        let event = match self.inner.observations.route(event) {
            Routed::Handled(Some((callback, observed))) => {
                self.inner.executor.dispatch(lane, move || callback(observed)).await;
                return;
            }
            Routed::Handled(None) => return,
            Routed::Unmatched(event) => event,
        };

        let event = match self.inner.presence.route(event) {
            Routed::Handled(Some((handler, presence))) => {
                self.inner
                    .executor
                    .dispatch(lane, move || handler.deliver(presence))
                    .await;
                return;
            }
            Routed::Handled(None) => return,
            Routed::Unmatched(event) => event,
        };

        match self.inner.discovery.route(event) {
            Routed::Handled(Some(delivery)) => self.deliver_discovery(lane, delivery).await,
            Routed::Handled(None) => {}
            Routed::Unmatched(event) => {
                tracing::trace!(
                    token = %event.token,
                    kind = ?event.kind,
                    "Event for unknown exchange dropped"
                );
            }
        }
    }

    async fn deliver_discovery(&self, lane: u64, delivery: DiscoveryDelivery) {
        match delivery {
            DiscoveryDelivery::Resources { callback, results } => {
                for result in results {
                    let result =
                        result.map(|found| RemoteResource::discovered(self.clone(), found));
                    let callback = FindCallback::clone(&callback);
                    self.inner.executor.dispatch(lane, move || callback(result)).await;
                }
            }
            DiscoveryDelivery::Info { callback, result } => {
                self.inner.executor.dispatch(lane, move || callback(result)).await;
            }
        }
    }

    async fn expire_operations(&self) {
        if self.inner.config.exchange_timeout().is_none() {
            return;
        }
        for operation in self.inner.pending.take_expired(Instant::now()) {
            let token = operation.token();
            self.cancel_quietly(token, operation.qos());
            tracing::debug!(token = %token, "Exchange timed out");
            let callback = operation.into_callback();
            self.inner
                .executor
                .dispatch(token.value(), move || {
                    callback(Err(Error::Transport(StackResult::Timeout)));
                })
                .await;
        }
    }

    fn cancel_quietly(&self, token: ExchangeToken, qos: QualityOfService) {
        let result = self.inner.transport.lock().cancel(token, qos, &[]);
        if let Err(status) = result {
            tracing::warn!(token = %token, status = ?status, "Best-effort cancel failed");
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Returns metadata for every one-shot exchange still in flight.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<OperationInfo> {
        self.inner.pending.snapshot()
    }

    /// Returns the number of one-shot exchanges still in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops the pump and fails everything still in flight.
    ///
    /// Pending one-shot callbacks receive [`Error::Cancelled`], observation
    /// callbacks receive [`ObserveEvent::Failed`] and discovery callbacks an
    /// error. Presence subscriptions are released without an event. Returns
    /// once every callback has run. Later calls return immediately.
    pub async fn shutdown(&self) {
        let transport = self.inner.transport.lock();
        let already = self.inner.shut_down.swap(true, Ordering::AcqRel);
        drop(transport);
        if already {
            return;
        }
        tracing::info!("Dispatcher shutting down");

        let pump = self.inner.pump.lock().take();
        if let Some(pump) = pump {
            pump.stop().await;
        }
        // Waits out a `pump_once` still handing jobs to the executor.
        let _pumping = self.inner.pumping.write().await;

        let qos = self.default_qos();
        for operation in self.inner.pending.drain() {
            let token = operation.token();
            let callback = operation.into_callback();
            self.inner
                .executor
                .dispatch(token.value(), move || callback(Err(Error::Cancelled)))
                .await;
        }

        for session in self.inner.observations.drain() {
            let token = session.token();
            self.cancel_quietly(token, qos);
            tracing::debug!(resource = %session.id(), token = %token, "Observation drained");
            let callback = session.callback();
            self.inner
                .executor
                .dispatch(token.value(), move || {
                    callback(ObserveEvent::Failed(Error::Cancelled));
                })
                .await;
        }

        for handle in self.inner.presence.drain() {
            self.cancel_quietly(handle.token(), QualityOfService::Low);
        }

        for (handle, session) in self.inner.discovery.drain() {
            self.cancel_quietly(handle.token(), qos);
            self.deliver_discovery(handle.token().value(), session.into_failure(Error::Cancelled))
                .await;
        }

        self.inner.executor.shutdown().await;
        tracing::info!("Dispatcher shut down");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.inner.pending.len())
            .field("observations", &self.inner.observations.len())
            .field("presence", &self.inner.presence.len())
            .field("discovery", &self.inner.discovery.len())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn manual(transport: &MemoryTransport) -> Dispatcher {
        Dispatcher::builder()
            .pump_mode(PumpMode::Manual)
            .callback_workers(2)
            .build(transport.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_callback_is_rejected_before_submission() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);

        let err = dispatcher
            .put(Request::new("coap://10.0.0.1:5683", "/a/light"), None)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(ArgumentError::MissingCallback)));
        assert_eq!(transport.submit_count(), 0);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn submission_failure_is_synchronous() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);
        transport.fail_next_submit(StackResult::CommError);

        let err = dispatcher
            .get(Request::new("coap://10.0.0.1:5683", "/a"), Some(Box::new(|_| {})))
            .unwrap_err();

        assert!(matches!(err, Error::SubmissionFailed(StackResult::CommError)));
        assert_eq!(dispatcher.pending_count(), 0);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn verbs_after_shutdown_fail() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);
        dispatcher.shutdown().await;
        dispatcher.shutdown().await;

        let err = dispatcher
            .get(Request::new("coap://10.0.0.1:5683", "/a"), Some(Box::new(|_| {})))
            .unwrap_err();
        assert!(matches!(err, Error::ShutDown));
        assert!(dispatcher.is_shut_down());
        assert_eq!(dispatcher.pump_once().await, 0);
    }

    #[tokio::test]
    async fn construct_resource_validates() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);
        let types = vec!["core.light".to_string()];
        let ifaces = vec!["oic.if.baseline".to_string()];

        let err = dispatcher
            .construct_resource(
                "coap://10.0.0.1:5683",
                "/",
                Connectivity::default(),
                true,
                types.clone(),
                ifaces.clone(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ArgumentError::RootUri)));

        let err = dispatcher
            .construct_resource(
                "coap://10.0.0.1:5683",
                "/a",
                Connectivity::default(),
                true,
                Vec::new(),
                ifaces.clone(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ArgumentError::EmptyResourceTypes)));

        let resource = dispatcher
            .construct_resource(
                "coap://10.0.0.1:5683",
                "/a/light",
                Connectivity::default(),
                true,
                types,
                ifaces,
            )
            .unwrap();
        assert_eq!(resource.host(), "coap://10.0.0.1:5683");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn presence_uri_carries_type_filter() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);
        let listener = PresenceListener::new(|_| {});

        dispatcher
            .subscribe_presence(
                "coap://10.0.0.1:5683",
                Some("core.light"),
                Connectivity::default(),
                &listener,
            )
            .unwrap();
        dispatcher
            .subscribe_presence("coap://10.0.0.1:5683", None, Connectivity::default(), &listener)
            .unwrap();

        let submitted = transport.submitted();
        assert_eq!(submitted[0].request.uri, "/oic/ad?rt=core.light");
        assert_eq!(submitted[1].request.uri, "/oic/ad");
        assert_eq!(submitted[0].request.qos, QualityOfService::Low);
        assert_eq!(dispatcher.presence_listener_refs(&listener), Some(2));
        dispatcher.shutdown().await;
        assert_eq!(dispatcher.presence_listener_refs(&listener), None);
    }

    #[tokio::test]
    async fn discovery_defaults_to_multicast_well_known_uri() {
        let transport = MemoryTransport::new();
        let dispatcher = manual(&transport);

        dispatcher
            .find("", "", Connectivity::default(), Some(Arc::new(|_| {})))
            .unwrap();
        dispatcher
            .device_info(
                "coap://10.0.0.1:5683",
                "",
                Connectivity::default(),
                Some(Arc::new(|_| {})),
            )
            .unwrap();

        let submitted = transport.submitted();
        assert_eq!(submitted[0].request.uri, "/oic/res");
        assert!(submitted[0].request.address.is_none());
        assert_eq!(submitted[1].request.uri, "/oic/d");
        assert_eq!(submitted[1].request.verb, Verb::Discover);
        dispatcher.shutdown().await;
    }
}
