// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table of one-shot exchanges awaiting completion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::ResponseCallback;
use crate::transport::{ExchangeToken, Verb};
use crate::types::QualityOfService;

/// A one-shot exchange and the callback waiting for it.
pub struct PendingOperation {
    token: ExchangeToken,
    verb: Verb,
    uri: String,
    qos: QualityOfService,
    created_at: DateTime<Utc>,
    deadline: Option<Instant>,
    callback: ResponseCallback,
}

impl PendingOperation {
    /// Creates an operation. `deadline` is when it should time out, if ever.
    #[must_use]
    pub fn new(
        token: ExchangeToken,
        verb: Verb,
        uri: impl Into<String>,
        qos: QualityOfService,
        deadline: Option<Instant>,
        callback: ResponseCallback,
    ) -> Self {
        Self {
            token,
            verb,
            uri: uri.into(),
            qos,
            created_at: Utc::now(),
            deadline,
            callback,
        }
    }

    /// Returns the exchange token.
    #[must_use]
    pub fn token(&self) -> ExchangeToken {
        self.token
    }

    /// Returns the QoS the request was sent with.
    #[must_use]
    pub fn qos(&self) -> QualityOfService {
        self.qos
    }

    /// Returns a snapshot of the operation metadata.
    #[must_use]
    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            token: self.token,
            verb: self.verb,
            uri: self.uri.clone(),
            qos: self.qos,
            created_at: self.created_at,
        }
    }

    /// Consumes the operation, returning its callback.
    #[must_use]
    pub fn into_callback(self) -> ResponseCallback {
        self.callback
    }
}

impl std::fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperation")
            .field("token", &self.token)
            .field("verb", &self.verb)
            .field("uri", &self.uri)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Metadata of an in-flight operation, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    /// Exchange token.
    pub token: ExchangeToken,
    /// Method.
    pub verb: Verb,
    /// Target URI including the query.
    pub uri: String,
    /// Delivery hint.
    pub qos: QualityOfService,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

/// Thread-safe map from exchange token to its pending operation.
///
/// [`take_and_remove`](Self::take_and_remove) is the only way to get at a
/// callback, so every token resolves at most once.
#[derive(Default)]
pub struct PendingOperationTable {
    operations: Mutex<HashMap<ExchangeToken, PendingOperation>>,
}

impl PendingOperationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation.
    ///
    /// # Errors
    ///
    /// Returns the operation back if its token is already registered.
    pub fn register(&self, operation: PendingOperation) -> Result<(), PendingOperation> {
        let mut operations = self.operations.lock();
        if operations.contains_key(&operation.token) {
            return Err(operation);
        }
        operations.insert(operation.token, operation);
        Ok(())
    }

    /// Removes and returns the operation for `token`.
    pub fn take_and_remove(&self, token: ExchangeToken) -> Option<PendingOperation> {
        self.operations.lock().remove(&token)
    }

    /// Removes and returns every operation whose deadline is at or before `now`.
    pub fn take_expired(&self, now: Instant) -> Vec<PendingOperation> {
        let mut operations = self.operations.lock();
        let expired: Vec<ExchangeToken> = operations
            .values()
            .filter(|op| op.deadline.is_some_and(|d| d <= now))
            .map(|op| op.token)
            .collect();
        expired
            .into_iter()
            .filter_map(|token| operations.remove(&token))
            .collect()
    }

    /// Removes and returns every operation.
    pub fn drain(&self) -> Vec<PendingOperation> {
        self.operations.lock().drain().map(|(_, op)| op).collect()
    }

    /// Returns `true` if `token` is pending.
    #[must_use]
    pub fn contains(&self, token: ExchangeToken) -> bool {
        self.operations.lock().contains_key(&token)
    }

    /// Returns the number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.lock().is_empty()
    }

    /// Returns metadata for every pending operation, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OperationInfo> {
        let mut infos: Vec<_> = self
            .operations
            .lock()
            .values()
            .map(PendingOperation::info)
            .collect();
        infos.sort_by_key(|i| (i.created_at, i.token));
        infos
    }
}

impl std::fmt::Debug for PendingOperationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperationTable")
            .field("pending", &self.len())
            .finish()
    }
}
