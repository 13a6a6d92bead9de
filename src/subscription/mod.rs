// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback bookkeeping shared by the dispatcher and the pump.
//!
//! # Overview
//!
//! - [`PendingOperationTable`] - One-shot exchanges keyed by token; each
//!   token resolves at most once
//! - [`CallbackRegistry`] - Reference-counted handlers keyed by listener
//!   identity, so one listener attached to many subscriptions has one handler
//! - Callback aliases and the event values they receive
//!
//! Both tables hold their own lock and never call user code while holding it.

mod callback;
mod pending;
mod registry;

pub use callback::{
    FindCallback, InfoCallback, ListenerKey, Notification, ObserveCallback, ObserveEvent,
    PresenceEvent, PresenceListener, PresenceStatus, Response, ResponseCallback,
};
pub use pending::{OperationInfo, PendingOperation, PendingOperationTable};
pub use registry::{CallbackRegistry, Released};

pub(crate) use callback::PresenceHandler;
