// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `oic_client` - An asynchronous client dispatcher for OIC resources.
//!
//! This library issues REST-like operations against resources on
//! constrained devices and routes the replies back to caller callbacks.
//! Every operation returns as soon as it is submitted; results arrive later,
//! on a pool of callback worker threads.
//!
//! # Supported Operations
//!
//! - **One-shot verbs**: get, put, post and delete, each completing exactly once
//! - **Observation**: a stream of notifications per resource until cancelled
//! - **Presence**: announcements from hosts, shared by listener across subscriptions
//! - **Discovery**: resource discovery plus device and platform information
//!
//! The network itself is behind the [`Transport`](transport::Transport)
//! trait. [`MemoryTransport`](transport::MemoryTransport) is an in-memory
//! implementation for tests and demos.
//!
//! # Quick Start
//!
//! ## One-shot request
//!
//! ```
//! use oic_client::{Dispatcher, PumpMode, Request};
//! use oic_client::transport::{MemoryTransport, TransportEvent};
//! use oic_client::types::StackResult;
//!
//! #[tokio::main]
//! async fn main() -> oic_client::Result<()> {
//!     let transport = MemoryTransport::new();
//!     let dispatcher = Dispatcher::builder()
//!         .pump_mode(PumpMode::Manual)
//!         .build(transport.clone())?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let token = dispatcher.put(
//!         Request::new("coap://192.168.1.20:5683", "/a/light").payload(r#"{"state":true}"#),
//!         Some(Box::new(move |result| {
//!             let _ = tx.send(result.map(|response| response.status()));
//!         })),
//!     )?;
//!
//!     // A real transport would produce this event from the network
//!     transport.push_event(TransportEvent::completed(token, StackResult::Ok));
//!     dispatcher.pump_once().await;
//!
//!     assert_eq!(rx.recv().await.unwrap()?, StackResult::Ok);
//!     dispatcher.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Observation
//!
//! ```no_run
//! use std::sync::Arc;
//! use oic_client::{Dispatcher, Request};
//! use oic_client::session::ObserveType;
//! use oic_client::subscription::ObserveEvent;
//! # use oic_client::transport::MemoryTransport;
//!
//! #[tokio::main]
//! async fn main() -> oic_client::Result<()> {
//!     # let transport = MemoryTransport::new();
//!     let dispatcher = Dispatcher::builder().build(transport)?;
//!
//!     let id = dispatcher.observe(
//!         Request::new("coap://192.168.1.20:5683", "/a/temperature"),
//!         ObserveType::Observe,
//!         Some(Arc::new(|event| match event {
//!             ObserveEvent::Notification(n) => {
//!                 println!("#{}: {:?}", n.sequence, n.response.payload());
//!             }
//!             other => println!("{other:?}"),
//!         })),
//!     )?;
//!
//!     dispatcher.cancel_observe(&id, None)?;
//!     dispatcher.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Discovery
//!
//! ```no_run
//! use oic_client::Dispatcher;
//! use oic_client::types::Connectivity;
//! # use oic_client::transport::MemoryTransport;
//!
//! #[tokio::main]
//! async fn main() -> oic_client::Result<()> {
//!     # let transport = MemoryTransport::new();
//!     let dispatcher = Dispatcher::builder().build(transport)?;
//!
//!     // Empty host multicasts, empty URI means /oic/res
//!     let (handle, mut found) = dispatcher.find_stream("", "", Connectivity::default())?;
//!     while let Some(Ok(resource)) = found.recv().await {
//!         println!("{} {} {:?}", resource.host(), resource.uri(), resource.resource_types());
//!     }
//!     dispatcher.cancel_find(handle)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod resource;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod types;

pub use config::{CancelConfirmation, DispatcherBuilder, DispatcherConfig, PumpMode};
pub use dispatch::{Dispatcher, Request};
pub use error::{AddressError, ArgumentError, Error, Result};
pub use resource::RemoteResource;
pub use session::{DiscoveryHandle, ObserveType, PresenceHandle, SessionState};
pub use subscription::{
    ObserveEvent, PresenceEvent, PresenceListener, PresenceStatus, Response,
};
pub use transport::{ExchangeToken, Transport};
pub use types::{DeviceAddress, QualityOfService, StackResult};
