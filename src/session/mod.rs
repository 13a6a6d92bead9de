// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-lived exchanges: observation, presence and discovery.
//!
//! Each kind has a table that owns its sessions. A table routes transport
//! events for the tokens it owns and hands back what should be delivered;
//! it never calls user code itself.

mod discovery;
mod observation;
mod presence;

pub use discovery::{DEVICE_URI, DiscoveryHandle, PLATFORM_URI, RESOURCE_DISCOVERY_URI};
pub use observation::{ObserveType, SessionState};
pub use presence::{PRESENCE_URI, PresenceHandle};

pub(crate) use discovery::{
    DiscoveredResource, DiscoveryDelivery, DiscoveryKind, DiscoveryTable,
};
pub(crate) use observation::ObservationTable;
pub(crate) use presence::PresenceTable;

use crate::transport::TransportEvent;

/// Result of offering an event to a session table.
pub(crate) enum Routed<T> {
    /// The table owns the token.
    Handled(T),
    /// The token is not in the table; the event is handed back.
    Unmatched(TransportEvent),
}
