// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Quality-of-service hint attached to requests.

use std::fmt;

/// Delivery hint forwarded to the transport.
///
/// `Low` maps to non-confirmable messages, `High` to confirmable ones.
/// `NotApplicable` lets the transport pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityOfService {
    /// Best effort.
    #[default]
    Low,
    /// Transport-defined middle ground.
    Medium,
    /// Acknowledged delivery.
    High,
    /// No preference.
    NotApplicable,
}

impl QualityOfService {
    /// Returns the QoS name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::NotApplicable => "na",
        }
    }
}

impl fmt::Display for QualityOfService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
