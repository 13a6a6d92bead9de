// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the dispatcher.
//!
//! Errors fall in two groups:
//!
//! - **Synchronous** errors are returned directly from the public API and never
//!   reach a callback: argument validation ([`ArgumentError`]), transport
//!   rejection at submission, and session misuse (`AlreadyObserving`,
//!   `NotObserving`, `NotSubscribed`, `ListenerNotFound`).
//! - **Asynchronous** errors ([`Error::Transport`], [`Error::Cancelled`]) are
//!   delivered exactly once through the callback of the affected exchange.

use thiserror::Error;

use crate::session::{DiscoveryHandle, PresenceHandle};
use crate::subscription::ListenerKey;
use crate::types::{ResourceIdentifier, StackResult};

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument failed validation; nothing was submitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    /// The transport refused the request synchronously.
    #[error("transport rejected submission: {0}")]
    SubmissionFailed(StackResult),

    /// The resource already has a live observation session.
    #[error("resource {0} is already observed")]
    AlreadyObserving(ResourceIdentifier),

    /// The resource has no observation session that can be cancelled.
    #[error("resource {0} is not observed")]
    NotObserving(ResourceIdentifier),

    /// No presence subscription exists for the handle.
    #[error("no presence subscription for {0}")]
    NotSubscribed(PresenceHandle),

    /// No discovery exchange exists for the handle.
    #[error("no discovery exchange for {0}")]
    DiscoveryNotFound(DiscoveryHandle),

    /// The listener is not present in the callback registry.
    #[error("listener {0} is not registered")]
    ListenerNotFound(ListenerKey),

    /// The remote side or the protocol stack reported a failure.
    #[error("transport error: {0}")]
    Transport(StackResult),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The dispatcher has been shut down.
    #[error("dispatcher is shut down")]
    ShutDown,

    /// A callback worker thread could not be started.
    #[error("failed to start callback worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl From<AddressError> for Error {
    fn from(err: AddressError) -> Self {
        Self::InvalidArgument(ArgumentError::Address(err))
    }
}

/// Errors raised while validating caller input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// The completion callback is missing.
    #[error("completion callback is required")]
    MissingCallback,

    /// The resource URI is empty.
    #[error("resource URI is empty")]
    EmptyUri,

    /// The resource URI does not start with `/`.
    #[error("resource URI must start with '/': {0}")]
    RelativeUri(String),

    /// The resource URI is just `/`.
    #[error("resource URI must name a resource, not the root")]
    RootUri,

    /// A resource proxy needs at least one resource type.
    #[error("at least one resource type is required")]
    EmptyResourceTypes,

    /// A resource proxy needs at least one interface.
    #[error("at least one interface is required")]
    EmptyInterfaces,

    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The host address could not be parsed.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
}

/// Errors related to parsing `scheme://host:port` strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The scheme is not one of `coap://`, `coaps://` or `coap+tcp://`.
    #[error("unsupported scheme in {0:?}")]
    UnsupportedScheme(String),

    /// Nothing follows the scheme.
    #[error("host is empty")]
    EmptyHost,

    /// An IPv6 literal is missing its closing bracket.
    #[error("unterminated IPv6 literal in {0:?}")]
    UnterminatedIpv6(String),

    /// The `:port` suffix is missing.
    #[error("missing port in {0:?}")]
    MissingPort(String),

    /// The port is not a number in `0..=65535`.
    #[error("invalid port {0:?}")]
    InvalidPort(String),

    /// The address does not fit the transport's address buffer.
    #[error("address is {actual} bytes, maximum is {max}")]
    TooLong {
        /// Maximum allowed length in bytes.
        max: usize,
        /// Actual length in bytes.
        actual: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_error_display() {
        let err = AddressError::TooLong { max: 40, actual: 52 };
        assert_eq!(err.to_string(), "address is 52 bytes, maximum is 40");
    }

    #[test]
    fn error_from_address_error_is_invalid_argument() {
        let err: Error = AddressError::EmptyHost.into();
        assert!(matches!(
            err,
            Error::InvalidArgument(ArgumentError::Address(AddressError::EmptyHost))
        ));
    }

    #[test]
    fn argument_error_display() {
        let err = ArgumentError::RelativeUri("a/light".to_string());
        assert_eq!(err.to_string(), "resource URI must start with '/': a/light");
    }

    #[test]
    fn transport_error_display() {
        let err = Error::Transport(StackResult::Timeout);
        assert_eq!(err.to_string(), "transport error: TIMEOUT");
    }
}
