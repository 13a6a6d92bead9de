// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endpoint addressing.
//!
//! A [`DeviceAddress`] can only be obtained from a well-formed
//! `scheme://host:port` string (or from a transport event), so every address
//! that reaches the dispatcher has already been validated.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::AddressError;

/// Maximum length of the host part, in bytes.
pub const MAX_ADDRESS_LEN: usize = 39;

const COAP: &str = "coap://";
const COAPS: &str = "coaps://";
const COAP_TCP: &str = "coap+tcp://";

/// Transport adapter carrying the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportAdapter {
    /// UDP over IPv4/IPv6.
    #[default]
    Ip,
    /// Bluetooth LE GATT.
    Gatt,
    /// Bluetooth RFCOMM.
    Rfcomm,
    /// CoAP over TCP.
    Tcp,
}

impl TransportAdapter {
    /// Returns the adapter name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Gatt => "gatt",
            Self::Rfcomm => "rfcomm",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag set qualifying an address (security, IP family, scope).
///
/// # Examples
///
/// ```
/// use oic_client::types::TransportFlags;
///
/// let flags = TransportFlags::SECURE | TransportFlags::IPV6;
/// assert!(flags.contains(TransportFlags::SECURE));
/// assert!(!flags.contains(TransportFlags::IPV4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransportFlags(u16);

impl TransportFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Secure (DTLS/TLS) transport.
    pub const SECURE: Self = Self(1 << 4);
    /// IPv6 addressing.
    pub const IPV6: Self = Self(1 << 5);
    /// IPv4 addressing.
    pub const IPV4: Self = Self(1 << 6);
    /// Multicast scope restricted to the link.
    pub const SCOPE_LINK: Self = Self(0x2);

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TransportFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TransportFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Adapter and flag filter used when submitting discovery and presence requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Connectivity {
    /// Transport adapter.
    pub adapter: TransportAdapter,
    /// Transport flags.
    pub flags: TransportFlags,
}

impl Connectivity {
    /// Creates a connectivity filter.
    #[must_use]
    pub const fn new(adapter: TransportAdapter, flags: TransportFlags) -> Self {
        Self { adapter, flags }
    }
}

/// A remote endpoint: adapter, flags, network address and port.
///
/// # Examples
///
/// ```
/// use oic_client::types::{DeviceAddress, TransportFlags};
///
/// let addr: DeviceAddress = "coaps://[fe80::1]:5684".parse()?;
/// assert_eq!(addr.address(), "fe80::1");
/// assert_eq!(addr.port(), 5684);
/// assert!(addr.flags().contains(TransportFlags::SECURE | TransportFlags::IPV6));
/// assert_eq!(addr.to_string(), "coaps://[fe80::1]:5684");
/// # Ok::<(), oic_client::error::AddressError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    adapter: TransportAdapter,
    flags: TransportFlags,
    address: String,
    port: u16,
}

impl DeviceAddress {
    /// Parses a `scheme://host:port` string.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the scheme is unsupported, the host is empty
    /// or too long, an IPv6 literal is unterminated, or the port is missing or
    /// out of range.
    pub fn parse(host: &str) -> Result<Self, AddressError> {
        Self::parse_with(host, Connectivity::default())
    }

    /// Parses a `scheme://host:port` string, starting from the given connectivity.
    ///
    /// The scheme adds to the flags (`coaps://` marks the address secure) or
    /// overrides the adapter (`coap+tcp://`).
    ///
    /// # Errors
    ///
    /// See [`DeviceAddress::parse`].
    pub fn parse_with(host: &str, connectivity: Connectivity) -> Result<Self, AddressError> {
        let mut adapter = connectivity.adapter;
        let mut flags = connectivity.flags;

        let rest = if let Some(rest) = host.strip_prefix(COAPS) {
            flags |= TransportFlags::SECURE;
            rest
        } else if let Some(rest) = host.strip_prefix(COAP_TCP) {
            adapter = TransportAdapter::Tcp;
            rest
        } else if let Some(rest) = host.strip_prefix(COAP) {
            rest
        } else {
            return Err(AddressError::UnsupportedScheme(host.to_string()));
        };

        if rest.is_empty() {
            return Err(AddressError::EmptyHost);
        }

        let (address, port) = if let Some(v6) = rest.strip_prefix('[') {
            let Some(end) = v6.find(']') else {
                return Err(AddressError::UnterminatedIpv6(host.to_string()));
            };
            if end == 0 {
                return Err(AddressError::EmptyHost);
            }
            flags |= TransportFlags::IPV6;
            let port = v6[end + 1..]
                .strip_prefix(':')
                .ok_or_else(|| AddressError::MissingPort(host.to_string()))?;
            (&v6[..end], port)
        } else {
            let Some((address, port)) = rest.split_once(':') else {
                return Err(AddressError::MissingPort(host.to_string()));
            };
            if address.is_empty() {
                return Err(AddressError::EmptyHost);
            }
            (address, port)
        };

        if address.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong {
                max: MAX_ADDRESS_LEN,
                actual: address.len(),
            });
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;

        Ok(Self {
            adapter,
            flags,
            address: address.to_string(),
            port,
        })
    }

    /// Builds an address from parts reported by a transport.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::EmptyHost`] or [`AddressError::TooLong`] if the
    /// network address is unusable.
    pub fn from_parts(
        adapter: TransportAdapter,
        flags: TransportFlags,
        address: impl Into<String>,
        port: u16,
    ) -> Result<Self, AddressError> {
        let address = address.into();
        if address.is_empty() {
            return Err(AddressError::EmptyHost);
        }
        if address.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong {
                max: MAX_ADDRESS_LEN,
                actual: address.len(),
            });
        }
        Ok(Self {
            adapter,
            flags,
            address,
            port,
        })
    }

    /// Returns the transport adapter.
    #[must_use]
    pub fn adapter(&self) -> TransportAdapter {
        self.adapter
    }

    /// Returns the transport flags.
    #[must_use]
    pub fn flags(&self) -> TransportFlags {
        self.flags
    }

    /// Returns the network address without brackets or port.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if the address uses a secure transport.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.flags.contains(TransportFlags::SECURE)
    }

    /// Returns the adapter and flags as a connectivity filter.
    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        Connectivity::new(self.adapter, self.flags)
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_secure() {
            f.write_str(COAPS)?;
        } else if self.adapter == TransportAdapter::Tcp {
            f.write_str(COAP_TCP)?;
        } else {
            f.write_str(COAP)?;
        }
        if self.flags.contains(TransportFlags::IPV6) {
            write!(f, "[{}]", self.address)?;
        } else {
            f.write_str(&self.address)?;
        }
        if self.port != 0 {
            write!(f, ":{}", self.port)?;
        }
        Ok(())
    }
}
