// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resource identity and description.

use std::cmp::Ordering;
use std::fmt;

use crate::error::ArgumentError;

/// Interface name marking a collection resource.
pub const LINK_INTERFACE: &str = "oic.if.ll";

/// Baseline interface implemented by every resource.
pub const DEFAULT_INTERFACE: &str = "oic.if.baseline";

/// Identity of a resource: the hosting server plus the resource URI.
///
/// Used as the key for observation sessions. Ordering compares the URI
/// first and the server id second, so resources sort by path across servers.
///
/// # Examples
///
/// ```
/// use oic_client::types::ResourceIdentifier;
///
/// let a = ResourceIdentifier::new("server-b", "/a/light");
/// let b = ResourceIdentifier::new("server-a", "/b/door");
/// assert!(a < b);
/// assert_eq!(a.to_string(), "server-b/a/light");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
    server_id: String,
    uri: String,
}

impl ResourceIdentifier {
    /// Creates an identifier.
    #[must_use]
    pub fn new(server_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            uri: uri.into(),
        }
    }

    /// Returns the server identifier.
    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Returns the resource URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Ord for ResourceIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.server_id.cmp(&other.server_id))
    }
}

impl PartialOrd for ResourceIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.server_id, self.uri)
    }
}

/// Description of a remote resource as advertised or constructed by the client.
///
/// Immutable once built; [`ResourceDescriptor::new`] enforces the invariants
/// (absolute URI, at least one resource type and one interface).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    id: ResourceIdentifier,
    resource_types: Vec<String>,
    interfaces: Vec<String>,
    observable: bool,
}

impl ResourceDescriptor {
    /// Creates a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError`] if the URI is empty or relative, or if the
    /// type or interface lists are empty.
    pub fn new(
        server_id: impl Into<String>,
        uri: impl Into<String>,
        resource_types: Vec<String>,
        interfaces: Vec<String>,
        observable: bool,
    ) -> Result<Self, ArgumentError> {
        let uri = uri.into();
        validate_uri(&uri)?;
        if resource_types.is_empty() {
            return Err(ArgumentError::EmptyResourceTypes);
        }
        if interfaces.is_empty() {
            return Err(ArgumentError::EmptyInterfaces);
        }
        Ok(Self {
            id: ResourceIdentifier::new(server_id, uri),
            resource_types,
            interfaces,
            observable,
        })
    }

    /// Returns the resource identity.
    #[must_use]
    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.id
    }

    /// Returns the resource URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.id.uri()
    }

    /// Returns the resource types.
    #[must_use]
    pub fn resource_types(&self) -> &[String] {
        &self.resource_types
    }

    /// Returns the supported interfaces.
    #[must_use]
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Returns `true` if the resource accepts observe requests.
    #[must_use]
    pub fn is_observable(&self) -> bool {
        self.observable
    }

    /// Returns `true` if the resource exposes the link-list interface.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.interfaces.iter().any(|i| i == LINK_INTERFACE)
    }
}

/// Checks that a URI is non-empty and absolute.
pub(crate) fn validate_uri(uri: &str) -> Result<(), ArgumentError> {
    if uri.is_empty() {
        return Err(ArgumentError::EmptyUri);
    }
    if !uri.starts_with('/') {
        return Err(ArgumentError::RelativeUri(uri.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn identifier_orders_by_uri_then_server() {
        let a1 = ResourceIdentifier::new("a", "/x");
        let b1 = ResourceIdentifier::new("b", "/x");
        let a2 = ResourceIdentifier::new("a", "/y");
        assert!(a1 < b1);
        assert!(b1 < a2);
        assert_eq!(a1, ResourceIdentifier::new("a", "/x"));
    }

    #[test]
    fn descriptor_validates_uri() {
        let err = ResourceDescriptor::new("s", "", strings(&["t"]), strings(&["i"]), true);
        assert_eq!(err, Err(ArgumentError::EmptyUri));
        let err = ResourceDescriptor::new("s", "light", strings(&["t"]), strings(&["i"]), true);
        assert_eq!(err, Err(ArgumentError::RelativeUri("light".to_string())));
    }

    #[test]
    fn descriptor_requires_types_and_interfaces() {
        let err = ResourceDescriptor::new("s", "/l", vec![], strings(&["i"]), false);
        assert_eq!(err, Err(ArgumentError::EmptyResourceTypes));
        let err = ResourceDescriptor::new("s", "/l", strings(&["t"]), vec![], false);
        assert_eq!(err, Err(ArgumentError::EmptyInterfaces));
    }

    #[test]
    fn descriptor_collection_detection() {
        let plain = ResourceDescriptor::new(
            "s",
            "/a/room",
            strings(&["core.room"]),
            strings(&[DEFAULT_INTERFACE]),
            false,
        )
        .unwrap();
        assert!(!plain.is_collection());

        let collection = ResourceDescriptor::new(
            "s",
            "/a/room",
            strings(&["core.room"]),
            strings(&[DEFAULT_INTERFACE, LINK_INTERFACE]),
            false,
        )
        .unwrap();
        assert!(collection.is_collection());
        assert_eq!(collection.identifier().to_string(), "s/a/room");
    }
}
