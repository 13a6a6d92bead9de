// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery exchanges and advertisement parsing.
//!
//! A discovery exchange stays open until it is cancelled or the transport
//! ends it, since any number of servers may answer. Each response payload
//! has the form:
//!
//! ```json
//! {
//!   "sid": "0685b960-736f-46f7-bead-3e3bf9e1e1c5",
//!   "resources": [
//!     { "href": "/a/light", "rt": ["core.light"], "if": ["oic.if.baseline"], "obs": true }
//!   ]
//! }
//! ```
//!
//! Entries that do not parse or do not describe a valid resource are skipped;
//! the remaining entries are still delivered.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::Deserialize;
use uuid::Uuid;

use super::Routed;
use crate::error::{Error, Result};
use crate::subscription::{FindCallback, InfoCallback, Response};
use crate::transport::{
    EventKind, ExchangeToken, OutboundRequest, Payload, Transport, TransportEvent,
};
use crate::types::{
    DeviceAddress, HeaderOption, QualityOfService, ResourceDescriptor, StackResult,
    TransportFlags,
};

/// Default resource discovery URI.
pub const RESOURCE_DISCOVERY_URI: &str = "/oic/res";

/// Default device information URI.
pub const DEVICE_URI: &str = "/oic/d";

/// Default platform information URI.
pub const PLATFORM_URI: &str = "/oic/p";

/// Handle of an open discovery exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscoveryHandle(ExchangeToken);

impl DiscoveryHandle {
    pub(crate) const fn new(token: ExchangeToken) -> Self {
        Self(token)
    }

    /// Returns the underlying exchange token.
    #[must_use]
    pub fn token(&self) -> ExchangeToken {
        self.0
    }
}

impl fmt::Display for DiscoveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discovery({})", self.0.value())
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryPayload {
    sid: String,
    #[serde(default)]
    resources: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Advertisement {
    href: String,
    #[serde(default)]
    rt: Vec<String>,
    #[serde(rename = "if", default)]
    interfaces: Vec<String>,
    #[serde(default)]
    obs: bool,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    port: Option<u16>,
}

/// A resource parsed from an advertisement, not yet bound to a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DiscoveredResource {
    pub(crate) descriptor: ResourceDescriptor,
    pub(crate) address: DeviceAddress,
}

/// Parses one discovery response.
///
/// Fails only when the payload as a whole is unusable. Individual entries
/// that are malformed are logged and skipped.
pub(crate) fn parse_advertisements(
    payload: Option<&Payload>,
    origin: Option<&DeviceAddress>,
) -> std::result::Result<Vec<DiscoveredResource>, StackResult> {
    let Some(payload) = payload else {
        return Ok(Vec::new());
    };
    let parsed: DiscoveryPayload = payload.parse().map_err(|e| {
        tracing::warn!(error = %e, "Discovery payload is not valid");
        StackResult::MalformedResponse
    })?;
    let sid = Uuid::parse_str(&parsed.sid)
        .map_err(|e| {
            tracing::warn!(sid = %parsed.sid, error = %e, "Discovery payload has invalid sid");
            StackResult::MalformedResponse
        })?
        .hyphenated()
        .to_string();
    let Some(origin) = origin else {
        tracing::warn!(sid = %sid, "Discovery response has no source address");
        return Err(StackResult::InvalidIp);
    };

    let mut discovered = Vec::with_capacity(parsed.resources.len());
    for (index, entry) in parsed.resources.into_iter().enumerate() {
        let advertisement: Advertisement = match serde_json::from_value(entry) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(sid = %sid, index, error = %e, "Skipping malformed advertisement");
                continue;
            }
        };
        let descriptor = match ResourceDescriptor::new(
            sid.clone(),
            advertisement.href,
            advertisement.rt,
            advertisement.interfaces,
            advertisement.obs,
        ) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(sid = %sid, index, error = %e, "Skipping invalid advertisement");
                continue;
            }
        };
        let mut flags = origin.flags();
        if advertisement.secure {
            flags |= TransportFlags::SECURE;
        }
        let port = advertisement.port.unwrap_or(origin.port());
        let address =
            match DeviceAddress::from_parts(origin.adapter(), flags, origin.address(), port) {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!(
                        sid = %sid,
                        index,
                        error = %e,
                        "Skipping unaddressable advertisement"
                    );
                    continue;
                }
            };
        discovered.push(DiscoveredResource {
            descriptor,
            address,
        });
    }
    Ok(discovered)
}

pub(crate) enum DiscoveryKind {
    Resources(FindCallback),
    Info(InfoCallback),
}

/// What the pump should deliver for one discovery event.
pub(crate) enum DiscoveryDelivery {
    Resources {
        callback: FindCallback,
        results: Vec<Result<DiscoveredResource>>,
    },
    Info {
        callback: InfoCallback,
        result: Result<Response>,
    },
}

pub(crate) struct DiscoverySession {
    kind: DiscoveryKind,
    address: Option<DeviceAddress>,
}

impl DiscoverySession {
    /// Builds the delivery used to fail this session at shutdown.
    pub(crate) fn into_failure(self, error: Error) -> DiscoveryDelivery {
        match self.kind {
            DiscoveryKind::Resources(callback) => DiscoveryDelivery::Resources {
                callback,
                results: vec![Err(error)],
            },
            DiscoveryKind::Info(callback) => DiscoveryDelivery::Info {
                callback,
                result: Err(error),
            },
        }
    }
}

/// Open discovery exchanges keyed by handle.
#[derive(Default)]
pub(crate) struct DiscoveryTable {
    sessions: Mutex<HashMap<DiscoveryHandle, DiscoverySession>>,
}

impl DiscoveryTable {
    pub(crate) fn begin(
        &self,
        transport: &mut dyn Transport,
        request: OutboundRequest,
        kind: DiscoveryKind,
    ) -> Result<DiscoveryHandle> {
        let mut sessions = self.sessions.lock();
        let address = request.address.clone();
        let uri = request.uri.clone();
        let token = transport.submit(request).map_err(Error::SubmissionFailed)?;
        let handle = DiscoveryHandle::new(token);
        tracing::debug!(handle = %handle, uri = %uri, "Discovery started");
        sessions.insert(handle, DiscoverySession { kind, address });
        Ok(handle)
    }

    pub(crate) fn cancel(
        &self,
        transport: &mut dyn Transport,
        handle: DiscoveryHandle,
        qos: QualityOfService,
        header_options: &[HeaderOption],
    ) -> Result<()> {
        let removed = {
            let mut sessions = self.sessions.lock();
            if !sessions.contains_key(&handle) {
                return Err(Error::DiscoveryNotFound(handle));
            }
            transport
                .cancel(handle.token(), qos, header_options)
                .map_err(Error::SubmissionFailed)?;
            sessions.remove(&handle)
        };
        drop(removed);
        tracing::debug!(handle = %handle, "Discovery cancelled");
        Ok(())
    }

    pub(crate) fn route(&self, event: TransportEvent) -> Routed<Option<DiscoveryDelivery>> {
        let handle = DiscoveryHandle::new(event.token);
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get(&handle) else {
            return Routed::Unmatched(event);
        };

        if event.kind == EventKind::Terminal {
            let Some(session) = sessions.remove(&handle) else {
                return Routed::Handled(None);
            };
            drop(sessions);
            tracing::debug!(handle = %handle, status = ?event.status, "Discovery ended");
            if event.status.is_success() {
                return Routed::Handled(None);
            }
            return Routed::Handled(Some(session.into_failure(Error::Transport(event.status))));
        }

        let delivery = match &session.kind {
            DiscoveryKind::Info(callback) => {
                let result = if event.status.is_success() {
                    Ok(Response::from_event(event))
                } else {
                    Err(Error::Transport(event.status))
                };
                DiscoveryDelivery::Info {
                    callback: InfoCallback::clone(callback),
                    result,
                }
            }
            DiscoveryKind::Resources(callback) => {
                let results = if event.status.is_success() {
                    let origin = event.source.as_ref().or(session.address.as_ref());
                    match parse_advertisements(event.payload.as_ref(), origin) {
                        Ok(found) => found.into_iter().map(Ok).collect(),
                        Err(status) => vec![Err(Error::Transport(status))],
                    }
                } else {
                    vec![Err(Error::Transport(event.status))]
                };
                DiscoveryDelivery::Resources {
                    callback: FindCallback::clone(callback),
                    results,
                }
            }
        };
        Routed::Handled(Some(delivery))
    }

    pub(crate) fn drain(&self) -> Vec<(DiscoveryHandle, DiscoverySession)> {
        self.sessions.lock().drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl fmt::Debug for DiscoveryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryTable")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::{MemoryTransport, Verb};
    use crate::types::Connectivity;

    const SID: &str = "0685b960-736f-46f7-bead-3e3bf9e1e1c5";

    fn origin() -> DeviceAddress {
        DeviceAddress::parse("coap://192.168.1.20:5683").unwrap()
    }

    fn payload(resources: &str) -> Payload {
        Payload::from(format!(r#"{{"sid":"{SID}","resources":[{resources}]}}"#))
    }

    #[test]
    fn parses_entries_in_order() {
        let payload = payload(
            r#"{"href":"/a/light","rt":["core.light"],"if":["oic.if.baseline"],"obs":true},
               {"href":"/a/fan","rt":["core.fan"],"if":["oic.if.baseline"]},
               {"href":"/a/door","rt":["core.door"],"if":["oic.if.baseline"],
                "secure":true,"port":5684}"#,
        );
        let found = parse_advertisements(Some(&payload), Some(&origin())).unwrap();

        let uris: Vec<_> = found.iter().map(|r| r.descriptor.uri()).collect();
        assert_eq!(uris, ["/a/light", "/a/fan", "/a/door"]);
        assert!(found[0].descriptor.is_observable());
        assert!(!found[1].descriptor.is_observable());
        assert_eq!(found[0].descriptor.identifier().server_id(), SID);
        assert_eq!(found[2].address.to_string(), "coaps://192.168.1.20:5684");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let payload = payload(
            r#"{"href":"/a/light","rt":["core.light"],"if":["oic.if.baseline"]},
               {"rt":["core.fan"]},
               {"href":"relative","rt":["core.x"],"if":["oic.if.baseline"]},
               {"href":"/a/empty","rt":[],"if":["oic.if.baseline"]},
               {"href":"/a/door","rt":["core.door"],"if":["oic.if.baseline"]}"#,
        );
        let found = parse_advertisements(Some(&payload), Some(&origin())).unwrap();
        let uris: Vec<_> = found.iter().map(|r| r.descriptor.uri()).collect();
        assert_eq!(uris, ["/a/light", "/a/door"]);
    }

    #[test]
    fn unusable_payloads_fail_as_a_whole() {
        let garbage = Payload::from("not json");
        assert_eq!(
            parse_advertisements(Some(&garbage), Some(&origin())),
            Err(StackResult::MalformedResponse)
        );

        let bad_sid = Payload::from(r#"{"sid":"nope","resources":[]}"#);
        assert_eq!(
            parse_advertisements(Some(&bad_sid), Some(&origin())),
            Err(StackResult::MalformedResponse)
        );

        assert_eq!(parse_advertisements(Some(&payload("")), None), Err(StackResult::InvalidIp));
        assert_eq!(parse_advertisements(None, None), Ok(Vec::new()));
    }

    #[test]
    fn cancel_unknown_handle() {
        let table = DiscoveryTable::default();
        let mut transport = MemoryTransport::new();
        let handle = DiscoveryHandle::new(ExchangeToken::new(4));
        assert!(matches!(
            table.cancel(&mut transport, handle, QualityOfService::Low, &[]),
            Err(Error::DiscoveryNotFound(h)) if h == handle
        ));
    }

    #[test]
    fn terminal_error_ends_session_with_failure() {
        let table = DiscoveryTable::default();
        let mut transport = MemoryTransport::new();
        let request = OutboundRequest {
            verb: Verb::Discover,
            address: None,
            uri: RESOURCE_DISCOVERY_URI.to_string(),
            payload: None,
            qos: QualityOfService::Low,
            header_options: Vec::new(),
            connectivity: Connectivity::default(),
        };
        let handle = table
            .begin(&mut transport, request, DiscoveryKind::Resources(Arc::new(|_| {})))
            .unwrap();

        let routed = table.route(TransportEvent::terminal(handle.token(), StackResult::CommError));
        assert!(matches!(
            routed,
            Routed::Handled(Some(DiscoveryDelivery::Resources { ref results, .. }))
                if matches!(results[..], [Err(Error::Transport(StackResult::CommError))])
        ));
        assert_eq!(table.len(), 0);
    }
}
