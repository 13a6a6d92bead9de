// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the dispatcher and its transport.
//!
//! Each type validates at construction time, so malformed input is reported
//! when it is built rather than when a request is in flight.
//!
//! # Types
//!
//! - [`DeviceAddress`] - Endpoint parsed from `scheme://host:port`
//! - [`ResourceIdentifier`] - Server id plus URI, the observation key
//! - [`ResourceDescriptor`] - URI, resource types, interfaces, observable flag
//! - [`QualityOfService`] - Delivery hint
//! - [`StackResult`] - Protocol stack result code
//! - [`HeaderOption`] / [`QueryParams`] - Request decorations

mod address;
mod header;
mod qos;
mod resource;
mod status;

pub use address::{
    Connectivity, DeviceAddress, MAX_ADDRESS_LEN, TransportAdapter, TransportFlags,
};
pub use header::{HeaderOption, INTERFACE_KEY, QueryParams, RESOURCE_TYPE_KEY};
pub use qos::QualityOfService;
pub use resource::{DEFAULT_INTERFACE, LINK_INTERFACE, ResourceDescriptor, ResourceIdentifier};
pub use status::StackResult;

pub(crate) use resource::validate_uri;
