// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transport-port range to bitwise-match decomposition.
//!
//! The flow language has no native range matcher on transport ports; an
//! inclusive range is covered by a minimum-length list of `value/mask`
//! pairs instead.

use crate::matches::Match;

/// Errors produced by [`PortRange::bitwise_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PortRangeError {
    /// The range is empty, reversed, or starts at zero.
    #[error("invalid port range")]
    InvalidPortRange,
}

/// An inclusive transport-port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortRange {
    /// First port of the range; must be at least one.
    pub start: u16,
    /// Last port of the range, inclusive.
    pub end: u16,
}

/// One `value/mask` pair of a range cover. A port `p` is covered iff
/// `p & mask == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    /// Matched value bits.
    pub value: u16,
    /// Mask selecting the significant bits.
    pub mask: u16,
}

impl PortRange {
    /// Decomposes the range into the minimal ascending list of
    /// power-of-two-aligned `value/mask` pairs whose union is exactly the
    /// range.
    ///
    /// At each step the largest `2^k`-aligned block starting at the current
    /// position and fitting below the end is emitted, with the mask
    /// `!((1 << k) - 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`PortRangeError::InvalidPortRange`] for a zero start or a
    /// reversed range.
    pub fn bitwise_match(&self) -> Result<Vec<BitRange>, PortRangeError> {
        if self.start == 0 || self.end == 0 || self.start > self.end {
            return Err(PortRangeError::InvalidPortRange);
        }

        let end = u32::from(self.end);
        let mut cur = u32::from(self.start);
        let mut out = Vec::new();

        while cur <= end {
            let mut k = 0u32;
            // Largest aligned block which starts at cur and stays in range.
            while cur % (1 << (k + 1)) == 0 && cur + (1 << (k + 1)) - 1 <= end {
                k += 1;
            }

            let mask = !((1u32 << k) - 1) & 0xffff;
            #[allow(clippy::cast_possible_truncation)]
            out.push(BitRange {
                value: cur as u16,
                mask: mask as u16,
            });

            cur += 1 << k;
        }

        Ok(out)
    }
}

/// A `tp_src` range, expanding to one or more masked source-port matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSourcePortRange(pub PortRange);

/// A `tp_dst` range, expanding to one or more masked destination-port
/// matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportDestinationPortRange(pub PortRange);

impl TransportSourcePortRange {
    /// An inclusive source-port range.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        TransportSourcePortRange(PortRange { start, end })
    }

    /// Expands the range into masked `tp_src` matches.
    ///
    /// # Errors
    ///
    /// Propagates [`PortRangeError`] from the decomposition.
    pub fn masked_ports(&self) -> Result<Vec<Match>, PortRangeError> {
        Ok(self
            .0
            .bitwise_match()?
            .into_iter()
            .map(|b| Match::TransportSourceMaskedPort(b.value, b.mask))
            .collect())
    }
}

impl TransportDestinationPortRange {
    /// An inclusive destination-port range.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        TransportDestinationPortRange(PortRange { start, end })
    }

    /// Expands the range into masked `tp_dst` matches.
    ///
    /// # Errors
    ///
    /// Propagates [`PortRangeError`] from the decomposition.
    pub fn masked_ports(&self) -> Result<Vec<Match>, PortRangeError> {
        Ok(self
            .0
            .bitwise_match()?
            .into_iter()
            .map(|b| Match::TransportDestinationMaskedPort(b.value, b.mask))
            .collect())
    }
}
