// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow protocol class tags.

use std::fmt;
use std::str::FromStr;

/// The protocol class of a flow rule.
///
/// The presence of a protocol tag implies `dl_type`/`nw_proto` constraints
/// which the OVS tools expand server-side; the codec emits the bare token
/// and does not re-validate the implied constraints on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Arp,
    Icmpv4,
    Icmpv6,
    Ipv4,
    Ipv6,
    Tcpv4,
    Tcpv6,
    Udpv4,
    Udpv6,
    Sctp,
}

impl Protocol {
    /// The wire token for this protocol class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Protocol::Arp => "arp",
            Protocol::Icmpv4 => "icmp",
            Protocol::Icmpv6 => "icmp6",
            Protocol::Ipv4 => "ip",
            Protocol::Ipv6 => "ipv6",
            Protocol::Tcpv4 => "tcp",
            Protocol::Tcpv6 => "tcp6",
            Protocol::Udpv4 => "udp",
            Protocol::Udpv6 => "udp6",
            Protocol::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token is not a known protocol class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol: {0:?}")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arp" => Ok(Protocol::Arp),
            "icmp" => Ok(Protocol::Icmpv4),
            "icmp6" => Ok(Protocol::Icmpv6),
            "ip" => Ok(Protocol::Ipv4),
            "ipv6" => Ok(Protocol::Ipv6),
            "tcp" => Ok(Protocol::Tcpv4),
            "tcp6" => Ok(Protocol::Tcpv6),
            "udp" => Ok(Protocol::Udpv4),
            "udp6" => Ok(Protocol::Udpv6),
            "sctp" => Ok(Protocol::Sctp),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Protocol;

    #[test]
    fn tokens_round_trip() {
        for p in [
            Protocol::Arp,
            Protocol::Icmpv4,
            Protocol::Icmpv6,
            Protocol::Ipv4,
            Protocol::Ipv6,
            Protocol::Tcpv4,
            Protocol::Tcpv6,
            Protocol::Udpv4,
            Protocol::Udpv6,
            Protocol::Sctp,
        ] {
            assert_eq!(p.as_str().parse::<Protocol>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_token_rejected() {
        assert!("gre".parse::<Protocol>().is_err());
    }
}
