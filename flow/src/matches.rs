// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Single-field match predicates of a flow rule.
//!
//! Each [`Match`] owns its textual key and renders itself as one
//! `key=value` token. Validation is deferred to [`Match::marshal`] so that
//! values captured from untrusted text surface their errors with the
//! offending input attached.

use std::fmt::Write;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::mac::{parse_mac_pair, EtherAddr, MacError};
use crate::{PORT_LOCAL, VLAN_NONE};

/// Errors produced when rendering or parsing a [`Match`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// A hardware address failed to parse.
    #[error(transparent)]
    Mac(#[from] MacError),
    /// A value was not a valid IPv4 address or CIDR block.
    #[error("invalid IPv4 address: {0}")]
    InvalidIpv4(String),
    /// A value was not a valid IPv6 address or CIDR block.
    #[error("invalid IPv6 address: {0}")]
    InvalidIpv6(String),
    /// A VLAN id outside 0..=4095 (and not the none sentinel).
    #[error("VLAN id out of range: {0}")]
    VlanOutOfRange(u16),
    /// A VLAN priority code point outside 0..=7.
    #[error("VLAN PCP out of range: {0}")]
    PcpOutOfRange(u8),
    /// An IPv6 flow label value or mask beyond the lower 20 bits.
    #[error("IPv6 label beyond lower 20 bits: {value:#x}/{mask:#x}")]
    LabelOutOfRange {
        /// Offending label value.
        value: u32,
        /// Offending label mask.
        mask: u32,
    },
    /// An ARP opcode other than request (1) or reply (2).
    #[error("ARP opcode out of range: {0}")]
    ArpOpOutOfRange(u16),
    /// An unknown connection-tracking state flag token.
    #[error("unknown ct_state flag: {0:?}")]
    UnknownStateFlag(String),
    /// An unknown TCP flag token.
    #[error("unknown tcp_flags flag: {0:?}")]
    UnknownTcpFlag(String),
    /// A match key this codec does not recognize.
    #[error("no match field matched for {key}={value}")]
    UnknownField {
        /// Offending key.
        key: String,
        /// Offending value.
        value: String,
    },
    /// A value failed to parse for an otherwise known key.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Field key the value belonged to.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// A connection-tracking state flag, as tracked by the Linux conntrack
/// integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtState {
    New,
    Established,
    Related,
    Reply,
    Invalid,
    Tracked,
    SrcNat,
    DstNat,
}

impl CtState {
    /// The wire token for this state flag.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            CtState::New => "new",
            CtState::Established => "est",
            CtState::Related => "rel",
            CtState::Reply => "rpl",
            CtState::Invalid => "inv",
            CtState::Tracked => "trk",
            CtState::SrcNat => "snat",
            CtState::DstNat => "dnat",
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        Some(match s {
            "new" => CtState::New,
            "est" => CtState::Established,
            "rel" => CtState::Related,
            "rpl" => CtState::Reply,
            "inv" => CtState::Invalid,
            "trk" => CtState::Tracked,
            "snat" => CtState::SrcNat,
            "dnat" => CtState::DstNat,
            _ => return None,
        })
    }
}

/// A set or unset connection-tracking state flag (`+new`, `-trk`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateFlag {
    /// The flag in question.
    pub flag: CtState,
    /// Whether the flag must be set (`+`) or unset (`-`).
    pub set: bool,
}

impl StateFlag {
    /// A flag which must be set.
    #[must_use]
    pub const fn set(flag: CtState) -> Self {
        StateFlag { flag, set: true }
    }

    /// A flag which must be unset.
    #[must_use]
    pub const fn unset(flag: CtState) -> Self {
        StateFlag { flag, set: false }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, MatchError> {
        let invalid = || MatchError::UnknownStateFlag(s.to_string());
        let set = match s.as_bytes().first() {
            Some(b'+') => true,
            Some(b'-') => false,
            _ => return Err(invalid()),
        };
        let flag = CtState::from_token(&s[1..]).ok_or_else(invalid)?;
        Ok(StateFlag { flag, set })
    }
}

/// A TCP flag, per the ovs-fields(7) vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpFlag {
    Fin,
    Syn,
    Rst,
    Psh,
    Ack,
    Urg,
    Ece,
    Cwr,
    Ns,
}

impl TcpFlag {
    /// The wire token for this flag.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            TcpFlag::Fin => "fin",
            TcpFlag::Syn => "syn",
            TcpFlag::Rst => "rst",
            TcpFlag::Psh => "psh",
            TcpFlag::Ack => "ack",
            TcpFlag::Urg => "urg",
            TcpFlag::Ece => "ece",
            TcpFlag::Cwr => "cwr",
            TcpFlag::Ns => "ns",
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        Some(match s {
            "fin" => TcpFlag::Fin,
            "syn" => TcpFlag::Syn,
            "rst" => TcpFlag::Rst,
            "psh" => TcpFlag::Psh,
            "ack" => TcpFlag::Ack,
            "urg" => TcpFlag::Urg,
            "ece" => TcpFlag::Ece,
            "cwr" => TcpFlag::Cwr,
            "ns" => TcpFlag::Ns,
            _ => return None,
        })
    }
}

/// A set or unset TCP flag (`+syn`, `-ack`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpFlagMatch {
    /// The flag in question.
    pub flag: TcpFlag,
    /// Whether the flag must be set (`+`) or unset (`-`).
    pub set: bool,
}

impl TcpFlagMatch {
    /// A flag which must be set.
    #[must_use]
    pub const fn set(flag: TcpFlag) -> Self {
        TcpFlagMatch { flag, set: true }
    }

    /// A flag which must be unset.
    #[must_use]
    pub const fn unset(flag: TcpFlag) -> Self {
        TcpFlagMatch { flag, set: false }
    }

    pub(crate) fn parse(s: &str) -> Result<Self, MatchError> {
        let invalid = || MatchError::UnknownTcpFlag(s.to_string());
        let set = match s.as_bytes().first() {
            Some(b'+') => true,
            Some(b'-') => false,
            _ => return Err(invalid()),
        };
        let flag = TcpFlag::from_token(&s[1..]).ok_or_else(invalid)?;
        Ok(TcpFlagMatch { flag, set })
    }
}

/// A single `field=value` predicate of a flow rule.
///
/// String-typed payloads (addresses, CIDR blocks) are kept verbatim and
/// validated when the match is rendered, so a value captured from flow text
/// emits exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// `dl_src`, optionally with a `/mask` wildcard.
    DataLinkSource(String),
    /// `dl_dst`, optionally with a `/mask` wildcard.
    DataLinkDestination(String),
    /// `dl_type` ethertype.
    DataLinkType(u16),
    /// `dl_vlan` id; [`VLAN_NONE`] matches untagged frames.
    DataLinkVlan(u16),
    /// `dl_vlan_pcp` priority code point.
    DataLinkVlanPcp(u8),
    /// `nw_src` IPv4 address or CIDR block.
    NetworkSource(String),
    /// `nw_dst` IPv4 address or CIDR block.
    NetworkDestination(String),
    /// `nw_proto` IP protocol number.
    NetworkProtocol(u8),
    /// `ipv6_src` IPv6 address or CIDR block.
    Ipv6Source(String),
    /// `ipv6_dst` IPv6 address or CIDR block.
    Ipv6Destination(String),
    /// `ipv6_label` flow label with mask, both within the lower 20 bits.
    Ipv6Label(u32, u32),
    /// `icmp_type`.
    IcmpType(u8),
    /// `icmp_code`.
    IcmpCode(u8),
    /// `icmpv6_type`.
    Icmp6Type(u8),
    /// `icmpv6_code`.
    Icmp6Code(u8),
    /// `nd_target` IPv6 neighbor discovery target.
    NeighborDiscoveryTarget(String),
    /// `nd_sll` source link-layer address.
    NeighborDiscoverySourceLinkLayer(EtherAddr),
    /// `nd_tll` target link-layer address.
    NeighborDiscoveryTargetLinkLayer(EtherAddr),
    /// `arp_sha` sender hardware address.
    ArpSourceHardwareAddress(EtherAddr),
    /// `arp_tha` target hardware address.
    ArpTargetHardwareAddress(EtherAddr),
    /// `arp_spa` sender protocol address (IPv4, CIDR allowed).
    ArpSourceProtocolAddress(String),
    /// `arp_tpa` target protocol address (IPv4, CIDR allowed).
    ArpTargetProtocolAddress(String),
    /// `arp_op` opcode, request (1) or reply (2).
    ArpOperation(u16),
    /// `tp_src` transport source port.
    TransportSourcePort(u16),
    /// `tp_dst` transport destination port.
    TransportDestinationPort(u16),
    /// `tp_src` with a bit mask, as produced by port-range expansion.
    TransportSourceMaskedPort(u16, u16),
    /// `tp_dst` with a bit mask, as produced by port-range expansion.
    TransportDestinationMaskedPort(u16, u16),
    /// `vlan_tci` with mask; a zero mask emits the value alone.
    VlanTci(u16, u16),
    /// `vlan_tci1` (outer QinQ tag) with mask.
    VlanTci1(u16, u16),
    /// `ct_state` flag sequence, emitted in caller-given order.
    ConnectionTrackingState(Vec<StateFlag>),
    /// `ct_mark` with mask; a zero mask emits the value alone.
    ConnectionTrackingMark(u32, u32),
    /// `ct_zone`.
    ConnectionTrackingZone(u16),
    /// `tcp_flags` flag sequence, emitted in caller-given order.
    TcpFlags(Vec<TcpFlagMatch>),
    /// `tun_id` without a mask.
    TunnelId(u64),
    /// `tun_id` with a 64-bit mask.
    TunnelIdWithMask(u64, u64),
    /// `metadata`.
    Metadata(u64),
    /// `conj_id` conjunction id.
    ConjunctionId(u32),
    /// `in_port`, as it appears in protocol traces.
    InPort(u32),
}

/// Match field keys.
mod key {
    pub(super) const DL_SRC: &str = "dl_src";
    pub(super) const DL_DST: &str = "dl_dst";
    pub(super) const DL_TYPE: &str = "dl_type";
    pub(super) const DL_VLAN: &str = "dl_vlan";
    pub(super) const DL_VLAN_PCP: &str = "dl_vlan_pcp";
    pub(super) const NW_SRC: &str = "nw_src";
    pub(super) const NW_DST: &str = "nw_dst";
    pub(super) const NW_PROTO: &str = "nw_proto";
    pub(super) const IPV6_SRC: &str = "ipv6_src";
    pub(super) const IPV6_DST: &str = "ipv6_dst";
    pub(super) const IPV6_LABEL: &str = "ipv6_label";
    pub(super) const ICMP_TYPE: &str = "icmp_type";
    pub(super) const ICMP_CODE: &str = "icmp_code";
    pub(super) const ICMPV6_TYPE: &str = "icmpv6_type";
    pub(super) const ICMPV6_CODE: &str = "icmpv6_code";
    pub(super) const ND_TARGET: &str = "nd_target";
    pub(super) const ND_SLL: &str = "nd_sll";
    pub(super) const ND_TLL: &str = "nd_tll";
    pub(super) const ARP_SHA: &str = "arp_sha";
    pub(super) const ARP_THA: &str = "arp_tha";
    pub(super) const ARP_SPA: &str = "arp_spa";
    pub(super) const ARP_TPA: &str = "arp_tpa";
    pub(super) const ARP_OP: &str = "arp_op";
    pub(super) const TP_SRC: &str = "tp_src";
    pub(super) const TP_DST: &str = "tp_dst";
    pub(super) const VLAN_TCI: &str = "vlan_tci";
    pub(super) const VLAN_TCI1: &str = "vlan_tci1";
    pub(super) const CT_STATE: &str = "ct_state";
    pub(super) const CT_MARK: &str = "ct_mark";
    pub(super) const CT_ZONE: &str = "ct_zone";
    pub(super) const TCP_FLAGS: &str = "tcp_flags";
    pub(super) const TUN_ID: &str = "tun_id";
    pub(super) const METADATA: &str = "metadata";
    pub(super) const CONJ_ID: &str = "conj_id";
    pub(super) const IN_PORT: &str = "in_port";
}

impl Match {
    /// The textual key this match renders under.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Match::DataLinkSource(_) => key::DL_SRC,
            Match::DataLinkDestination(_) => key::DL_DST,
            Match::DataLinkType(_) => key::DL_TYPE,
            Match::DataLinkVlan(_) => key::DL_VLAN,
            Match::DataLinkVlanPcp(_) => key::DL_VLAN_PCP,
            Match::NetworkSource(_) => key::NW_SRC,
            Match::NetworkDestination(_) => key::NW_DST,
            Match::NetworkProtocol(_) => key::NW_PROTO,
            Match::Ipv6Source(_) => key::IPV6_SRC,
            Match::Ipv6Destination(_) => key::IPV6_DST,
            Match::Ipv6Label(..) => key::IPV6_LABEL,
            Match::IcmpType(_) => key::ICMP_TYPE,
            Match::IcmpCode(_) => key::ICMP_CODE,
            Match::Icmp6Type(_) => key::ICMPV6_TYPE,
            Match::Icmp6Code(_) => key::ICMPV6_CODE,
            Match::NeighborDiscoveryTarget(_) => key::ND_TARGET,
            Match::NeighborDiscoverySourceLinkLayer(_) => key::ND_SLL,
            Match::NeighborDiscoveryTargetLinkLayer(_) => key::ND_TLL,
            Match::ArpSourceHardwareAddress(_) => key::ARP_SHA,
            Match::ArpTargetHardwareAddress(_) => key::ARP_THA,
            Match::ArpSourceProtocolAddress(_) => key::ARP_SPA,
            Match::ArpTargetProtocolAddress(_) => key::ARP_TPA,
            Match::ArpOperation(_) => key::ARP_OP,
            Match::TransportSourcePort(_) | Match::TransportSourceMaskedPort(..) => key::TP_SRC,
            Match::TransportDestinationPort(_) | Match::TransportDestinationMaskedPort(..) => {
                key::TP_DST
            }
            Match::VlanTci(..) => key::VLAN_TCI,
            Match::VlanTci1(..) => key::VLAN_TCI1,
            Match::ConnectionTrackingState(_) => key::CT_STATE,
            Match::ConnectionTrackingMark(..) => key::CT_MARK,
            Match::ConnectionTrackingZone(_) => key::CT_ZONE,
            Match::TcpFlags(_) => key::TCP_FLAGS,
            Match::TunnelId(_) | Match::TunnelIdWithMask(..) => key::TUN_ID,
            Match::Metadata(_) => key::METADATA,
            Match::ConjunctionId(_) => key::CONJ_ID,
            Match::InPort(_) => key::IN_PORT,
        }
    }

    /// Renders the match as a single `key=value` token.
    ///
    /// # Errors
    ///
    /// Returns a [`MatchError`] carrying the offending input when the stored
    /// value violates the field's constraints.
    pub fn marshal(&self) -> Result<String, MatchError> {
        match self {
            Match::DataLinkSource(addr) | Match::DataLinkDestination(addr) => {
                let (mac, mask) = parse_mac_pair(addr)?;
                match mask {
                    Some(mask) => Ok(format!("{}={mac}/{mask}", self.key())),
                    None => Ok(format!("{}={mac}", self.key())),
                }
            }
            Match::DataLinkType(ethertype) => Ok(format!("{}={ethertype:#06x}", self.key())),
            Match::DataLinkVlan(vlan) => {
                if *vlan == VLAN_NONE {
                    return Ok(format!("{}=0xffff", self.key()));
                }
                if *vlan > 4095 {
                    return Err(MatchError::VlanOutOfRange(*vlan));
                }
                Ok(format!("{}={vlan}", self.key()))
            }
            Match::DataLinkVlanPcp(pcp) => {
                if *pcp > 7 {
                    return Err(MatchError::PcpOutOfRange(*pcp));
                }
                Ok(format!("{}={pcp}", self.key()))
            }
            Match::NetworkSource(value)
            | Match::NetworkDestination(value)
            | Match::ArpSourceProtocolAddress(value)
            | Match::ArpTargetProtocolAddress(value) => {
                validate_ipv4(value)?;
                Ok(format!("{}={value}", self.key()))
            }
            Match::NetworkProtocol(proto) => Ok(format!("{}={proto}", self.key())),
            Match::Ipv6Source(value)
            | Match::Ipv6Destination(value)
            | Match::NeighborDiscoveryTarget(value) => {
                validate_ipv6(value)?;
                Ok(format!("{}={value}", self.key()))
            }
            Match::Ipv6Label(label, mask) => {
                if *label > 0x000f_ffff || *mask > 0x000f_ffff {
                    return Err(MatchError::LabelOutOfRange {
                        value: *label,
                        mask: *mask,
                    });
                }
                if *mask == 0 {
                    Ok(format!("{}={label:#07x}", self.key()))
                } else {
                    Ok(format!("{}={label:#07x}/{mask:#07x}", self.key()))
                }
            }
            Match::IcmpType(v) | Match::IcmpCode(v) | Match::Icmp6Type(v) | Match::Icmp6Code(v) => {
                Ok(format!("{}={v}", self.key()))
            }
            Match::NeighborDiscoverySourceLinkLayer(mac)
            | Match::NeighborDiscoveryTargetLinkLayer(mac)
            | Match::ArpSourceHardwareAddress(mac)
            | Match::ArpTargetHardwareAddress(mac) => Ok(format!("{}={mac}", self.key())),
            Match::ArpOperation(op) => {
                if *op != 1 && *op != 2 {
                    return Err(MatchError::ArpOpOutOfRange(*op));
                }
                Ok(format!("{}={op}", self.key()))
            }
            Match::TransportSourcePort(port) | Match::TransportDestinationPort(port) => {
                Ok(format!("{}={port}", self.key()))
            }
            Match::TransportSourceMaskedPort(port, mask)
            | Match::TransportDestinationMaskedPort(port, mask) => {
                Ok(format!("{}={port:#06x}/{mask:#06x}", self.key()))
            }
            Match::VlanTci(tci, mask) | Match::VlanTci1(tci, mask) => {
                if *mask == 0 {
                    Ok(format!("{}={tci:#06x}", self.key()))
                } else {
                    Ok(format!("{}={tci:#06x}/{mask:#06x}", self.key()))
                }
            }
            Match::ConnectionTrackingState(flags) => {
                let mut out = format!("{}=", self.key());
                for flag in flags {
                    let sign = if flag.set { '+' } else { '-' };
                    let _ = write!(out, "{sign}{}", flag.flag.token());
                }
                Ok(out)
            }
            Match::ConnectionTrackingMark(mark, mask) => {
                if *mask == 0 {
                    Ok(format!("{}={mark:#010x}", self.key()))
                } else {
                    Ok(format!("{}={mark:#010x}/{mask:#010x}", self.key()))
                }
            }
            Match::ConnectionTrackingZone(zone) => Ok(format!("{}={zone}", self.key())),
            Match::TcpFlags(flags) => {
                let mut out = format!("{}=", self.key());
                for flag in flags {
                    let sign = if flag.set { '+' } else { '-' };
                    let _ = write!(out, "{sign}{}", flag.flag.token());
                }
                Ok(out)
            }
            Match::TunnelId(id) => Ok(format!("{}={id:#x}", self.key())),
            Match::TunnelIdWithMask(id, mask) => Ok(format!("{}={id:#x}/{mask:#x}", self.key())),
            Match::Metadata(v) => Ok(format!("{}={v:#x}", self.key())),
            Match::ConjunctionId(id) => Ok(format!("{}={id}", self.key())),
            Match::InPort(port) => {
                if *port == PORT_LOCAL {
                    Ok(format!("{}=LOCAL", self.key()))
                } else {
                    Ok(format!("{}={port}", self.key()))
                }
            }
        }
    }
}

/// Validates a bare IPv4 address or `addr/len` CIDR block.
fn validate_ipv4(value: &str) -> Result<(), MatchError> {
    let invalid = || MatchError::InvalidIpv4(value.to_string());
    let (addr, prefix) = match value.split_once('/') {
        None => (value, None),
        Some((addr, len)) => (addr, Some(len)),
    };
    addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
    if let Some(len) = prefix {
        let len: u8 = len.parse().map_err(|_| invalid())?;
        if len > 32 {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Validates a bare IPv6 address or `addr/len` CIDR block.
fn validate_ipv6(value: &str) -> Result<(), MatchError> {
    let invalid = || MatchError::InvalidIpv6(value.to_string());
    let (addr, prefix) = match value.split_once('/') {
        None => (value, None),
        Some((addr, len)) => (addr, Some(len)),
    };
    addr.parse::<Ipv6Addr>().map_err(|_| invalid())?;
    if let Some(len) = prefix {
        let len: u8 = len.parse().map_err(|_| invalid())?;
        if len > 128 {
            return Err(invalid());
        }
    }
    Ok(())
}
