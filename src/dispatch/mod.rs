// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The dispatcher and the machinery that drives it.
//!
//! # Overview
//!
//! The [`Dispatcher`] is the entry point for every client operation. It
//! validates arguments, submits exchanges to the [`Transport`], and keeps
//! the tables that map exchange tokens to callbacks.
//!
//! Completion is asynchronous:
//!
//! - **Pump**: transport events are collected by [`Dispatcher::pump_once`],
//!   either from a background task or from the caller in manual mode
//! - **Routing**: each event resolves one pending operation or feeds the
//!   observation, presence or discovery session that owns its token
//! - **Callbacks**: user code runs on a bounded pool of worker threads, never
//!   on the pump and never under a dispatcher lock. Callbacks of one exchange
//!   run in order.
//!
//! [`Transport`]: crate::transport::Transport

mod dispatcher;
mod executor;
mod pump;
mod request;

pub use dispatcher::Dispatcher;
pub use request::Request;
