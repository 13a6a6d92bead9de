// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background task that keeps the transport moving.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::dispatcher::{Dispatcher, DispatcherInner};

/// Drives [`Dispatcher::pump_once`] on a fixed interval until stopped.
///
/// The task holds only a weak reference, so dropping every dispatcher
/// handle also ends the loop.
pub(crate) struct BackgroundPump {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackgroundPump {
    pub(crate) fn start(inner: Weak<DispatcherInner>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                Dispatcher::from_inner(inner).pump_once().await;
            }
            tracing::debug!("Background pump stopped");
        });
        tracing::debug!(interval_ms = interval.as_millis(), "Background pump started");
        Self { stop_tx, handle }
    }

    /// Stops the loop and waits for the current iteration to finish.
    pub(crate) async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Background pump ended abnormally");
        }
    }
}

impl std::fmt::Debug for BackgroundPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundPump")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
