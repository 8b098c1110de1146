// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet hardware address type and logic.

use arrayvec::ArrayVec;
use std::fmt;
use std::str::FromStr;

/// A 6-byte Ethernet hardware address.
///
/// `EtherAddr` is a transparent wrapper around `[u8; 6]` which provides
/// colon-hex parsing and the lowercase rendering OVS expects in flow text.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EtherAddr(pub [u8; 6]);

impl From<[u8; 6]> for EtherAddr {
    fn from(value: [u8; 6]) -> Self {
        EtherAddr(value)
    }
}

impl From<EtherAddr> for [u8; 6] {
    fn from(value: EtherAddr) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for EtherAddr {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to an [`EtherAddr`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacError {
    /// Invalid string representation of a hardware address.
    #[error("invalid string representation of hardware address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for EtherAddr {
    type Error = MacError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let mut octets_strs = value.split(':');
        let octets_parsed =
            octets_strs.try_fold(ArrayVec::<_, MAX_OCTETS>::new(), |mut acc, octet_str| {
                if octet_str.len() != 2 {
                    return Err(MacError::Invalid(value.to_string()));
                }
                if octet_str.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return Err(MacError::Invalid(value.to_string()));
                }
                let parsed = u8::from_str_radix(octet_str, 16)
                    .map_err(|_| MacError::Invalid(value.to_string()))?;
                acc.try_push(parsed)
                    .map_err(|_| MacError::Invalid(value.to_string()))?;
                Ok(acc)
            })?;

        let octets = match octets_parsed.as_slice() {
            [o0, o1, o2, o3, o4, o5] => [*o0, *o1, *o2, *o3, *o4, *o5],
            _ => return Err(MacError::Invalid(value.to_string())),
        };

        Ok(EtherAddr(octets))
    }
}

impl FromStr for EtherAddr {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EtherAddr::try_from(s)
    }
}

impl fmt::Display for EtherAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl EtherAddr {
    /// The broadcast address.
    pub const BROADCAST: EtherAddr = EtherAddr([u8::MAX; 6]);
    /// The all-zero address.
    pub const ZERO: EtherAddr = EtherAddr([0; 6]);

    /// Returns true iff the binary representation is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &EtherAddr::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the binary representation is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &EtherAddr::ZERO
    }
}

/// Parses an `addr` or `addr/mask` hardware address pair, as accepted by the
/// `dl_src`/`dl_dst` match fields.
pub(crate) fn parse_mac_pair(s: &str) -> Result<(EtherAddr, Option<EtherAddr>), MacError> {
    match s.split_once('/') {
        None => Ok((EtherAddr::try_from(s)?, None)),
        Some((addr, mask)) => Ok((
            EtherAddr::try_from(addr)?,
            Some(EtherAddr::try_from(mask)?),
        )),
    }
}
