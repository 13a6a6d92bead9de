// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Caller-side description of a request.

use crate::error::Result;
use crate::transport::{OutboundRequest, Payload, Verb};
use crate::types::{
    Connectivity, DeviceAddress, HeaderOption, QualityOfService, QueryParams, ResourceIdentifier,
    validate_uri,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Host(String),
    Address(DeviceAddress),
}

/// Target and parameters of a request, validated when it is dispatched.
///
/// # Examples
///
/// ```
/// use oic_client::Request;
/// use oic_client::types::QualityOfService;
///
/// let request = Request::new("coap://192.168.1.20:5683", "/a/light")
///     .param("power", "on")
///     .payload(r#"{"state": true}"#)
///     .qos(QualityOfService::High);
/// assert_eq!(request.uri(), "/a/light");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    target: Target,
    uri: String,
    query: QueryParams,
    payload: Option<Payload>,
    qos: Option<QualityOfService>,
    header_options: Vec<HeaderOption>,
    connectivity: Connectivity,
    server_id: Option<String>,
}

impl Request {
    /// Creates a request for `uri` on `host` (`scheme://addr:port`).
    #[must_use]
    pub fn new(host: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::with_target(Target::Host(host.into()), uri.into())
    }

    /// Creates a request for `uri` on an already parsed address.
    #[must_use]
    pub fn for_address(address: DeviceAddress, uri: impl Into<String>) -> Self {
        Self::with_target(Target::Address(address), uri.into())
    }

    fn with_target(target: Target, uri: String) -> Self {
        Self {
            target,
            uri,
            query: QueryParams::new(),
            payload: None,
            qos: None,
            header_options: Vec::new(),
            connectivity: Connectivity::default(),
            server_id: None,
        }
    }

    /// Replaces the query parameters.
    #[must_use]
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Adds one query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the QoS; the dispatcher default applies otherwise.
    #[must_use]
    pub fn qos(mut self, qos: QualityOfService) -> Self {
        self.qos = Some(qos);
        self
    }

    /// Adds a vendor header option.
    #[must_use]
    pub fn header_option(mut self, option: HeaderOption) -> Self {
        self.header_options.push(option);
        self
    }

    /// Replaces the vendor header options.
    #[must_use]
    pub fn header_options(mut self, options: Vec<HeaderOption>) -> Self {
        self.header_options = options;
        self
    }

    /// Sets the adapter and flags used to reach the host.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets the server id used to identify the resource for observation.
    ///
    /// Defaults to the host string.
    #[must_use]
    pub fn server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Returns the resource URI without the query.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Validates the request and resolves it for the transport.
    pub(crate) fn resolve(
        self,
        verb: Verb,
        default_qos: QualityOfService,
    ) -> Result<(ResourceIdentifier, OutboundRequest)> {
        validate_uri(&self.uri)?;
        let address = match self.target {
            Target::Host(host) => DeviceAddress::parse_with(&host, self.connectivity)?,
            Target::Address(address) => address,
        };
        let server_id = self.server_id.unwrap_or_else(|| address.to_string());
        let id = ResourceIdentifier::new(server_id, self.uri.clone());
        let connectivity = address.connectivity();
        let outbound = OutboundRequest {
            verb,
            uri: self.query.assemble_uri(&self.uri),
            address: Some(address),
            payload: self.payload,
            qos: self.qos.unwrap_or(default_qos),
            header_options: self.header_options,
            connectivity,
        };
        Ok((id, outbound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AddressError, ArgumentError, Error};

    #[test]
    fn resolve_assembles_query_and_defaults() {
        let (id, outbound) = Request::new("coap://10.0.0.2:5683", "/a/light/")
            .param("rt", "core.light")
            .resolve(Verb::Get, QualityOfService::Medium)
            .unwrap();

        assert_eq!(outbound.uri, "/a/light?rt=core.light");
        assert_eq!(outbound.qos, QualityOfService::Medium);
        assert_eq!(outbound.address.unwrap().port(), 5683);
        assert_eq!(id.server_id(), "coap://10.0.0.2:5683");
        assert_eq!(id.uri(), "/a/light/");
    }

    #[test]
    fn resolve_rejects_bad_input() {
        let err = Request::new("coap://10.0.0.2:5683", "")
            .resolve(Verb::Get, QualityOfService::Low)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ArgumentError::EmptyUri)));

        let err = Request::new("http://10.0.0.2", "/a")
            .resolve(Verb::Get, QualityOfService::Low)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArgument(ArgumentError::Address(AddressError::UnsupportedScheme(_)))
        ));
    }

    #[test]
    fn explicit_server_id_wins() {
        let (id, _) = Request::new("coap://10.0.0.2:5683", "/a")
            .server_id("sid-1")
            .resolve(Verb::Observe, QualityOfService::Low)
            .unwrap();
        assert_eq!(id.server_id(), "sid-1");
    }
}
