// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatcher configuration and builder.

use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::error::{ArgumentError, Result};
use crate::transport::Transport;
use crate::types::QualityOfService;

/// Default interval between background pump iterations.
pub const DEFAULT_PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// How the transport is pumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    /// A background task pumps every `interval`. Requires a tokio runtime.
    Background {
        /// Idle sleep between iterations.
        interval: Duration,
    },
    /// No background task; the caller drives [`Dispatcher::pump_once`].
    Manual,
}

impl Default for PumpMode {
    fn default() -> Self {
        Self::Background {
            interval: DEFAULT_PUMP_INTERVAL,
        }
    }
}

/// When a cancelled observation is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelConfirmation {
    /// Stay `Cancelling` until the transport reports a terminal event.
    #[default]
    AwaitTransport,
    /// Finalize as soon as the transport accepts the cancel.
    Immediate,
}

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    default_qos: QualityOfService,
    pump_mode: PumpMode,
    callback_workers: usize,
    callback_queue_capacity: usize,
    exchange_timeout: Option<Duration>,
    cancel_confirmation: CancelConfirmation,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_qos: QualityOfService::Low,
            pump_mode: PumpMode::default(),
            callback_workers: 4,
            callback_queue_capacity: 256,
            exchange_timeout: None,
            cancel_confirmation: CancelConfirmation::default(),
        }
    }
}

impl DispatcherConfig {
    /// QoS used when a request does not carry one.
    #[must_use]
    pub fn default_qos(&self) -> QualityOfService {
        self.default_qos
    }

    /// Pump mode.
    #[must_use]
    pub fn pump_mode(&self) -> PumpMode {
        self.pump_mode
    }

    /// Number of callback worker threads.
    #[must_use]
    pub fn callback_workers(&self) -> usize {
        self.callback_workers
    }

    /// Queued callbacks per worker before the pump waits.
    #[must_use]
    pub fn callback_queue_capacity(&self) -> usize {
        self.callback_queue_capacity
    }

    /// Age after which one-shot exchanges fail with a timeout.
    #[must_use]
    pub fn exchange_timeout(&self) -> Option<Duration> {
        self.exchange_timeout
    }

    /// Cancel confirmation policy for observations.
    #[must_use]
    pub fn cancel_confirmation(&self) -> CancelConfirmation {
        self.cancel_confirmation
    }

    fn validate(&self) -> std::result::Result<(), ArgumentError> {
        if self.callback_workers == 0 {
            return Err(ArgumentError::InvalidConfig(
                "callback_workers must be at least 1".to_string(),
            ));
        }
        if self.callback_queue_capacity == 0 {
            return Err(ArgumentError::InvalidConfig(
                "callback_queue_capacity must be at least 1".to_string(),
            ));
        }
        if let PumpMode::Background { interval } = self.pump_mode
            && interval.is_zero()
        {
            return Err(ArgumentError::InvalidConfig(
                "pump interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for a [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use oic_client::{Dispatcher, PumpMode};
/// use oic_client::transport::MemoryTransport;
/// use oic_client::types::QualityOfService;
///
/// let dispatcher = Dispatcher::builder()
///     .pump_mode(PumpMode::Manual)
///     .default_qos(QualityOfService::High)
///     .callback_workers(2)
///     .exchange_timeout(Duration::from_secs(5))
///     .build(MemoryTransport::new())?;
///
/// assert_eq!(dispatcher.default_qos(), QualityOfService::High);
/// # Ok::<(), oic_client::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Sets the QoS used when a request does not carry one (default: low).
    #[must_use]
    pub fn default_qos(mut self, qos: QualityOfService) -> Self {
        self.config.default_qos = qos;
        self
    }

    /// Sets the pump mode (default: background, every 10 ms).
    #[must_use]
    pub fn pump_mode(mut self, mode: PumpMode) -> Self {
        self.config.pump_mode = mode;
        self
    }

    /// Sets the number of callback worker threads (default: 4).
    #[must_use]
    pub fn callback_workers(mut self, workers: usize) -> Self {
        self.config.callback_workers = workers;
        self
    }

    /// Sets the per-worker callback queue capacity (default: 256).
    #[must_use]
    pub fn callback_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.callback_queue_capacity = capacity;
        self
    }

    /// Fails one-shot exchanges that get no response within `timeout`.
    #[must_use]
    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.config.exchange_timeout = Some(timeout);
        self
    }

    /// Sets the observation cancel policy (default: await the transport).
    #[must_use]
    pub fn cancel_confirmation(mut self, policy: CancelConfirmation) -> Self {
        self.config.cancel_confirmation = policy;
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Builds the dispatcher over `transport`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A configuration value is out of range
    /// - The pump mode is background and no tokio runtime is running
    /// - A callback worker thread cannot be started
    pub fn build<T>(self, transport: T) -> Result<Dispatcher>
    where
        T: Transport + 'static,
    {
        self.config.validate()?;
        if matches!(self.config.pump_mode, PumpMode::Background { .. })
            && tokio::runtime::Handle::try_current().is_err()
        {
            return Err(ArgumentError::InvalidConfig(
                "background pump requires a tokio runtime".to_string(),
            )
            .into());
        }
        Dispatcher::start(self.config, Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::MemoryTransport;

    #[test]
    fn config_default() {
        let config = DispatcherConfig::default();
        assert_eq!(config.default_qos(), QualityOfService::Low);
        assert_eq!(
            config.pump_mode(),
            PumpMode::Background {
                interval: Duration::from_millis(10)
            }
        );
        assert_eq!(config.callback_workers(), 4);
        assert_eq!(config.callback_queue_capacity(), 256);
        assert_eq!(config.exchange_timeout(), None);
        assert_eq!(config.cancel_confirmation(), CancelConfirmation::AwaitTransport);
    }

    #[test]
    fn builder_chain() {
        let builder = DispatcherBuilder::default()
            .default_qos(QualityOfService::High)
            .pump_mode(PumpMode::Manual)
            .callback_workers(1)
            .callback_queue_capacity(8)
            .exchange_timeout(Duration::from_secs(2))
            .cancel_confirmation(CancelConfirmation::Immediate);

        let config = builder.config();
        assert_eq!(config.default_qos(), QualityOfService::High);
        assert_eq!(config.pump_mode(), PumpMode::Manual);
        assert_eq!(config.callback_workers(), 1);
        assert_eq!(config.callback_queue_capacity(), 8);
        assert_eq!(config.exchange_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.cancel_confirmation(), CancelConfirmation::Immediate);
    }

    #[test]
    fn zero_workers_rejected() {
        let result = DispatcherBuilder::default()
            .pump_mode(PumpMode::Manual)
            .callback_workers(0)
            .build(MemoryTransport::new());
        assert!(matches!(
            result,
            Err(Error::InvalidArgument(ArgumentError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn zero_interval_rejected() {
        let result = DispatcherBuilder::default()
            .pump_mode(PumpMode::Background {
                interval: Duration::ZERO,
            })
            .build(MemoryTransport::new());
        assert!(result.is_err());
    }

    #[test]
    fn background_without_runtime_rejected() {
        let result = DispatcherBuilder::default().build(MemoryTransport::new());
        assert!(matches!(
            result,
            Err(Error::InvalidArgument(ArgumentError::InvalidConfig(msg)))
                if msg.contains("runtime")
        ));
    }
}
