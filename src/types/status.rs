// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol stack result codes.

use std::fmt;

/// Result code reported by the protocol stack for an exchange.
///
/// Codes below 20 are successes; everything else is a failure. The numeric
/// values match the wire-level stack codes so that transports can convert
/// with [`StackResult::from_code`].
///
/// # Examples
///
/// ```
/// use oic_client::types::StackResult;
///
/// assert!(StackResult::ResourceCreated.is_success());
/// assert!(!StackResult::NoObservers.is_success());
/// assert_eq!(StackResult::from_code(128), StackResult::PresenceStopped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackResult {
    /// The request succeeded.
    Ok,
    /// The resource was created.
    ResourceCreated,
    /// The resource was deleted.
    ResourceDeleted,
    /// More data follows.
    Continue,
    /// The URI was rejected.
    InvalidUri,
    /// The query was rejected.
    InvalidQuery,
    /// The IP address was rejected.
    InvalidIp,
    /// The port was rejected.
    InvalidPort,
    /// The callback was rejected.
    InvalidCallback,
    /// The method was rejected.
    InvalidMethod,
    /// A parameter was rejected.
    InvalidParam,
    /// The observe parameter was rejected.
    InvalidObserveParam,
    /// The stack ran out of memory.
    NoMemory,
    /// Communication with the peer failed.
    CommError,
    /// The exchange timed out.
    Timeout,
    /// The transport adapter is not enabled.
    AdapterNotEnabled,
    /// The operation is not implemented by the peer.
    NotImplemented,
    /// The resource does not exist.
    NoResource,
    /// The resource refused the method or interface.
    ResourceError,
    /// The resource is slow to respond.
    SlowResource,
    /// The request duplicates one already in flight.
    DuplicateRequest,
    /// The server has no more observers for the resource.
    NoObservers,
    /// The observer is unknown to the server.
    ObserverNotFound,
    /// The option was rejected.
    InvalidOption,
    /// The reply was malformed.
    MalformedResponse,
    /// The request handle is unknown.
    InvalidRequestHandle,
    /// The request was not authorized by the server.
    UnauthorizedRequest,
    /// The remote host stopped announcing presence.
    PresenceStopped,
    /// The remote host's presence announcements timed out.
    PresenceTimeout,
    /// Unclassified stack error.
    Error,
}

impl StackResult {
    /// Returns the numeric stack code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ResourceCreated => 1,
            Self::ResourceDeleted => 2,
            Self::Continue => 3,
            Self::InvalidUri => 20,
            Self::InvalidQuery => 21,
            Self::InvalidIp => 22,
            Self::InvalidPort => 23,
            Self::InvalidCallback => 24,
            Self::InvalidMethod => 25,
            Self::InvalidParam => 26,
            Self::InvalidObserveParam => 27,
            Self::NoMemory => 28,
            Self::CommError => 29,
            Self::Timeout => 30,
            Self::AdapterNotEnabled => 31,
            Self::NotImplemented => 32,
            Self::NoResource => 33,
            Self::ResourceError => 34,
            Self::SlowResource => 35,
            Self::DuplicateRequest => 36,
            Self::NoObservers => 37,
            Self::ObserverNotFound => 38,
            Self::InvalidOption => 40,
            Self::MalformedResponse => 41,
            Self::InvalidRequestHandle => 43,
            Self::UnauthorizedRequest => 46,
            Self::PresenceStopped => 128,
            Self::PresenceTimeout => 129,
            Self::Error => 255,
        }
    }

    /// Converts a numeric stack code. Unknown codes map to [`StackResult::Error`].
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::ResourceCreated,
            2 => Self::ResourceDeleted,
            3 => Self::Continue,
            20 => Self::InvalidUri,
            21 => Self::InvalidQuery,
            22 => Self::InvalidIp,
            23 => Self::InvalidPort,
            24 => Self::InvalidCallback,
            25 => Self::InvalidMethod,
            26 => Self::InvalidParam,
            27 => Self::InvalidObserveParam,
            28 => Self::NoMemory,
            29 => Self::CommError,
            30 => Self::Timeout,
            31 => Self::AdapterNotEnabled,
            32 => Self::NotImplemented,
            33 => Self::NoResource,
            34 => Self::ResourceError,
            35 => Self::SlowResource,
            36 => Self::DuplicateRequest,
            37 => Self::NoObservers,
            38 => Self::ObserverNotFound,
            40 => Self::InvalidOption,
            41 => Self::MalformedResponse,
            43 => Self::InvalidRequestHandle,
            46 => Self::UnauthorizedRequest,
            128 => Self::PresenceStopped,
            129 => Self::PresenceTimeout,
            _ => Self::Error,
        }
    }

    /// Returns `true` for the success codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::ResourceCreated | Self::ResourceDeleted | Self::Continue
        )
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ResourceCreated => "RESOURCE_CREATED",
            Self::ResourceDeleted => "RESOURCE_DELETED",
            Self::Continue => "CONTINUE",
            Self::InvalidUri => "INVALID_URI",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::InvalidIp => "INVALID_IP",
            Self::InvalidPort => "INVALID_PORT",
            Self::InvalidCallback => "INVALID_CALLBACK",
            Self::InvalidMethod => "INVALID_METHOD",
            Self::InvalidParam => "INVALID_PARAM",
            Self::InvalidObserveParam => "INVALID_OBSERVE_PARAM",
            Self::NoMemory => "NO_MEMORY",
            Self::CommError => "COMM_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::AdapterNotEnabled => "ADAPTER_NOT_ENABLED",
            Self::NotImplemented => "NOTIMPL",
            Self::NoResource => "NO_RESOURCE",
            Self::ResourceError => "RESOURCE_ERROR",
            Self::SlowResource => "SLOW_RESOURCE",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::NoObservers => "NO_OBSERVERS",
            Self::ObserverNotFound => "OBSERVER_NOT_FOUND",
            Self::InvalidOption => "INVALID_OPTION",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::InvalidRequestHandle => "INVALID_REQUEST_HANDLE",
            Self::UnauthorizedRequest => "UNAUTHORIZED_REQ",
            Self::PresenceStopped => "PRESENCE_STOPPED",
            Self::PresenceTimeout => "PRESENCE_TIMEOUT",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for StackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
