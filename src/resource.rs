// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side proxy for a remote resource.

use std::cmp::Ordering;
use std::fmt;

use crate::dispatch::{Dispatcher, Request};
use crate::error::Result;
use crate::session::{DiscoveredResource, ObserveType};
use crate::subscription::{ObserveCallback, ResponseCallback};
use crate::transport::{ExchangeToken, Payload};
use crate::types::{
    Connectivity, DeviceAddress, HeaderOption, QualityOfService, QueryParams, ResourceDescriptor,
    ResourceIdentifier,
};

/// A remote resource bound to a dispatcher.
///
/// Obtained from discovery or from [`Dispatcher::construct_resource`]. The
/// verbs build a [`Request`] for the resource's address and hand it to the
/// dispatcher, adding the proxy's header options and QoS.
///
/// Two proxies compare equal when they identify the same resource, that is
/// the same server id and URI.
#[derive(Clone)]
pub struct RemoteResource {
    dispatcher: Dispatcher,
    descriptor: ResourceDescriptor,
    address: DeviceAddress,
    header_options: Vec<HeaderOption>,
    qos: Option<QualityOfService>,
}

impl RemoteResource {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        descriptor: ResourceDescriptor,
        address: DeviceAddress,
    ) -> Self {
        Self {
            dispatcher,
            descriptor,
            address,
            header_options: Vec::new(),
            qos: None,
        }
    }

    pub(crate) fn discovered(dispatcher: Dispatcher, found: DiscoveredResource) -> Self {
        Self::new(dispatcher, found.descriptor, found.address)
    }

    /// Returns the host as `scheme://addr:port`.
    #[must_use]
    pub fn host(&self) -> String {
        self.address.to_string()
    }

    /// Returns the resource URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.descriptor.uri()
    }

    /// Returns the identity used to key observations.
    #[must_use]
    pub fn identifier(&self) -> &ResourceIdentifier {
        self.descriptor.identifier()
    }

    /// Returns the server id.
    ///
    /// For discovered resources this is the device's UUID; for constructed
    /// ones it is the host string.
    #[must_use]
    pub fn sid(&self) -> &str {
        self.descriptor.identifier().server_id()
    }

    #[must_use]
    pub fn is_observable(&self) -> bool {
        self.descriptor.is_observable()
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.descriptor.is_collection()
    }

    #[must_use]
    pub fn resource_types(&self) -> &[String] {
        self.descriptor.resource_types()
    }

    #[must_use]
    pub fn interfaces(&self) -> &[String] {
        self.descriptor.interfaces()
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.address.connectivity()
    }

    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Returns the header options sent with every request.
    #[must_use]
    pub fn header_options(&self) -> &[HeaderOption] {
        &self.header_options
    }

    /// Sets header options sent with every request from this proxy.
    pub fn set_header_options(&mut self, options: Vec<HeaderOption>) {
        self.header_options = options;
    }

    /// Clears the header options.
    pub fn unset_header_options(&mut self) {
        self.header_options.clear();
    }

    /// Sets the QoS for requests from this proxy; `None` uses the
    /// dispatcher default.
    pub fn set_qos(&mut self, qos: Option<QualityOfService>) {
        self.qos = qos;
    }

    fn request(&self, query: &QueryParams) -> Request {
        let mut request = Request::for_address(self.address.clone(), self.uri())
            .query(query.clone())
            .server_id(self.sid())
            .header_options(self.header_options.clone());
        if let Some(qos) = self.qos {
            request = request.qos(qos);
        }
        request
    }

    /// Retrieves the representation.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::get`].
    pub fn get(&self, callback: Option<ResponseCallback>) -> Result<ExchangeToken> {
        self.get_with(&QueryParams::new(), callback)
    }

    /// Retrieves the representation with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::get`].
    pub fn get_with(
        &self,
        query: &QueryParams,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.dispatcher.get(self.request(query), callback)
    }

    /// Replaces the representation.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::put`].
    pub fn put(
        &self,
        payload: impl Into<Payload>,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.put_with(&QueryParams::new(), payload, callback)
    }

    /// Replaces the representation, with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::put`].
    pub fn put_with(
        &self,
        query: &QueryParams,
        payload: impl Into<Payload>,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.dispatcher
            .put(self.request(query).payload(payload), callback)
    }

    /// Posts to the resource.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::post`].
    pub fn post(
        &self,
        payload: impl Into<Payload>,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.post_with(&QueryParams::new(), payload, callback)
    }

    /// Posts to the resource, with query parameters.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::post`].
    pub fn post_with(
        &self,
        query: &QueryParams,
        payload: impl Into<Payload>,
        callback: Option<ResponseCallback>,
    ) -> Result<ExchangeToken> {
        self.dispatcher
            .post(self.request(query).payload(payload), callback)
    }

    /// Deletes the resource.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::delete`].
    pub fn delete(&self, callback: Option<ResponseCallback>) -> Result<ExchangeToken> {
        self.dispatcher
            .delete(self.request(&QueryParams::new()), callback)
    }

    /// Starts observing the resource.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::observe`].
    pub fn observe(
        &self,
        observe_type: ObserveType,
        query: &QueryParams,
        callback: Option<ObserveCallback>,
    ) -> Result<()> {
        self.dispatcher
            .observe(self.request(query), observe_type, callback)
            .map(|_| ())
    }

    /// Cancels the observation started with [`observe`](Self::observe).
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::cancel_observe`].
    pub fn cancel_observe(&self, qos: Option<QualityOfService>) -> Result<()> {
        self.dispatcher
            .cancel_observe_with(self.identifier(), qos.or(self.qos), &self.header_options)
    }
}

impl PartialEq for RemoteResource {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier()
    }
}

impl Eq for RemoteResource {}

impl PartialOrd for RemoteResource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RemoteResource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier().cmp(other.identifier())
    }
}

impl fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResource")
            .field("sid", &self.sid())
            .field("uri", &self.uri())
            .field("address", &self.address)
            .field("types", &self.resource_types())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PumpMode;
    use crate::transport::{MemoryTransport, Verb};

    fn light(dispatcher: &Dispatcher) -> RemoteResource {
        dispatcher
            .construct_resource(
                "coap://10.0.0.7:5683",
                "/a/light",
                Connectivity::default(),
                true,
                vec!["core.light".to_string()],
                vec!["oic.if.baseline".to_string()],
            )
            .unwrap()
    }

    #[tokio::test]
    async fn verbs_carry_proxy_options() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::builder()
            .pump_mode(PumpMode::Manual)
            .build(transport.clone())
            .unwrap();
        let mut resource = light(&dispatcher);
        resource.set_header_options(vec![HeaderOption::new(2048, "v1")]);
        resource.set_qos(Some(QualityOfService::High));

        resource
            .put_with(
                &QueryParams::new().with("if", "oic.if.baseline"),
                r#"{"state":true}"#,
                Some(Box::new(|_| {})),
            )
            .unwrap();
        resource.unset_header_options();
        resource.delete(Some(Box::new(|_| {}))).unwrap();

        let submitted = transport.submitted();
        assert_eq!(submitted[0].request.verb, Verb::Put);
        assert_eq!(submitted[0].request.uri, "/a/light?if=oic.if.baseline");
        assert_eq!(submitted[0].request.qos, QualityOfService::High);
        assert_eq!(submitted[0].request.header_options.len(), 1);
        assert_eq!(
            submitted[0].request.payload.as_ref().and_then(Payload::as_str),
            Some(r#"{"state":true}"#)
        );
        assert_eq!(submitted[1].request.verb, Verb::Delete);
        assert!(submitted[1].request.header_options.is_empty());
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn observe_keys_on_identifier() {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::builder()
            .pump_mode(PumpMode::Manual)
            .build(transport.clone())
            .unwrap();
        let resource = light(&dispatcher);

        resource
            .observe(ObserveType::Observe, &QueryParams::new(), Some(std::sync::Arc::new(|_| {})))
            .unwrap();
        assert!(dispatcher.observation_state(resource.identifier()).is_some());
        assert_eq!(resource.sid(), "coap://10.0.0.7:5683");

        resource.cancel_observe(None).unwrap();
        assert_eq!(transport.cancelled().len(), 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn equality_follows_identity() {
        let dispatcher = Dispatcher::builder()
            .pump_mode(PumpMode::Manual)
            .build(MemoryTransport::new())
            .unwrap();
        let a = light(&dispatcher);
        let mut b = a.clone();
        b.set_qos(Some(QualityOfService::High));
        assert_eq!(a, b);
        assert!(a.is_observable());
        assert!(!a.is_collection());
        dispatcher.shutdown().await;
    }
}
