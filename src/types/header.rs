// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor-specific header options and query parameters.

use std::collections::BTreeMap;

/// Query key selecting a resource type.
pub const RESOURCE_TYPE_KEY: &str = "rt";

/// Query key selecting an interface.
pub const INTERFACE_KEY: &str = "if";

/// A vendor-specific header option carried alongside a request or response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderOption {
    option_id: u16,
    data: String,
}

impl HeaderOption {
    /// Creates a header option.
    #[must_use]
    pub fn new(option_id: u16, data: impl Into<String>) -> Self {
        Self {
            option_id,
            data: data.into(),
        }
    }

    /// Returns the option number.
    #[must_use]
    pub fn option_id(&self) -> u16 {
        self.option_id
    }

    /// Returns the option value.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Query parameters appended to a resource URI.
///
/// Keys are kept sorted so the assembled URI is deterministic.
///
/// # Examples
///
/// ```
/// use oic_client::types::QueryParams;
///
/// let query = QueryParams::new().with("rt", "core.light").with("power", "on");
/// assert_eq!(query.assemble_uri("/a/light/"), "/a/light?power=on;rt=core.light");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, String>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a parameter in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns a copy with `rt` and `if` set from the non-empty arguments.
    #[must_use]
    pub fn with_type_and_interface(&self, resource_type: &str, interface: &str) -> Self {
        let mut params = self.clone();
        if !resource_type.is_empty() {
            params.insert(RESOURCE_TYPE_KEY, resource_type);
        }
        if !interface.is_empty() {
            params.insert(INTERFACE_KEY, interface);
        }
        params
    }

    /// Appends the parameters to `uri` as `?k=v;k2=v2`.
    ///
    /// A single trailing `/` on the URI is removed first. Keys and values are
    /// percent-encoded.
    #[must_use]
    pub fn assemble_uri(&self, uri: &str) -> String {
        let uri = uri.strip_suffix('/').unwrap_or(uri);
        if self.params.is_empty() {
            return uri.to_string();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join(";");
        format!("{uri}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_without_params_trims_slash() {
        assert_eq!(QueryParams::new().assemble_uri("/a/light/"), "/a/light");
        assert_eq!(QueryParams::new().assemble_uri("/a/light"), "/a/light");
    }

    #[test]
    fn assemble_encodes_values() {
        let query = QueryParams::new().with("name", "living room");
        assert_eq!(query.assemble_uri("/a/room"), "/a/room?name=living%20room");
    }

    #[test]
    fn type_and_interface_skip_empty() {
        let base = QueryParams::new().with("x", "1");
        let q = base.with_type_and_interface("core.light", "");
        assert_eq!(q.get(RESOURCE_TYPE_KEY), Some("core.light"));
        assert_eq!(q.get(INTERFACE_KEY), None);
        assert_eq!(base.get(RESOURCE_TYPE_KEY), None);
    }
}
