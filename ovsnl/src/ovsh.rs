// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel ABI constants and fixed-layout structures for the OVS generic
//! netlink families, from `include/uapi/linux/openvswitch.h`.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::Error;

/// Generic netlink family names registered by the openvswitch module.
pub const DATAPATH_FAMILY: &str = "ovs_datapath";
pub const VPORT_FAMILY: &str = "ovs_vport";
pub const FLOW_FAMILY: &str = "ovs_flow";
pub const METER_FAMILY: &str = "ovs_meter";
pub const PACKET_FAMILY: &str = "ovs_packet";

/// `ovs_datapath_cmd`.
pub const DP_CMD_GET: u8 = 3;

/// `ovs_datapath_attr`.
pub const DP_ATTR_NAME: u16 = 1;
pub const DP_ATTR_UPCALL_PID: u16 = 2;
pub const DP_ATTR_STATS: u16 = 3;
pub const DP_ATTR_MEGAFLOW_STATS: u16 = 4;
pub const DP_ATTR_USER_FEATURES: u16 = 5;

/// `ovs_datapath_attr::OVS_DP_F_*` feature bits.
pub const DP_F_UNALIGNED: u32 = 1 << 0;
pub const DP_F_VPORT_PIDS: u32 = 1 << 1;

/// `ovs_vport_cmd`.
pub const VPORT_CMD_GET: u8 = 3;

/// `ovs_vport_attr`.
pub const VPORT_ATTR_PORT_NO: u16 = 1;
pub const VPORT_ATTR_TYPE: u16 = 2;
pub const VPORT_ATTR_NAME: u16 = 3;
pub const VPORT_ATTR_OPTIONS: u16 = 4;
pub const VPORT_ATTR_UPCALL_PID: u16 = 5;
pub const VPORT_ATTR_STATS: u16 = 6;
pub const VPORT_ATTR_IFINDEX: u16 = 8;
pub const VPORT_ATTR_NETNSID: u16 = 9;

/// `ovs_vport_type`.
pub const VPORT_TYPE_NETDEV: u32 = 1;
pub const VPORT_TYPE_INTERNAL: u32 = 2;
pub const VPORT_TYPE_GRE: u32 = 3;
pub const VPORT_TYPE_VXLAN: u32 = 4;
pub const VPORT_TYPE_GENEVE: u32 = 5;

/// `ovs_tunnel_attr`, nested inside `OVS_VPORT_ATTR_OPTIONS`.
pub const TUNNEL_ATTR_DST_PORT: u16 = 1;

/// `ovs_flow_cmd`.
pub const FLOW_CMD_GET: u8 = 3;

/// `ovs_flow_attr`.
pub const FLOW_ATTR_KEY: u16 = 1;
pub const FLOW_ATTR_ACTIONS: u16 = 2;
pub const FLOW_ATTR_STATS: u16 = 3;

/// `ovs_key_attr`.
pub const KEY_ATTR_ENCAP: u16 = 1;
pub const KEY_ATTR_ETHERTYPE: u16 = 6;
pub const KEY_ATTR_IPV4: u16 = 7;
pub const KEY_ATTR_IPV6: u16 = 8;

/// The fixed header at the start of every OVS request and reply payload:
/// `struct ovs_header { int dp_ifindex; }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    /// The datapath's interface index; zero addresses all datapaths.
    pub ifindex: i32,
}

impl Header {
    pub const SIZE: usize = 4;

    /// The header's native-endian wire form.
    #[must_use]
    pub fn bytes(self) -> [u8; Header::SIZE] {
        self.ifindex.to_ne_bytes()
    }

    /// Peels the header off the front of a payload, returning it and the
    /// attribute run which follows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortHeader`] when fewer than four bytes remain.
    pub fn parse(payload: &[u8]) -> Result<(Header, &[u8]), Error> {
        if payload.len() < Header::SIZE {
            return Err(Error::ShortHeader(payload.len()));
        }
        let ifindex = NativeEndian::read_i32(&payload[..Header::SIZE]);
        Ok((Header { ifindex }, &payload[Header::SIZE..]))
    }
}

/// `struct ovs_dp_stats`: 32 bytes of packet counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpStats {
    pub hit: u64,
    pub missed: u64,
    pub lost: u64,
    pub flows: u64,
}

impl DpStats {
    pub const SIZE: usize = 32;

    /// Parses the fixed struct, insisting on the exact kernel size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadLength`] for any other attribute length.
    pub fn parse(b: &[u8]) -> Result<DpStats, Error> {
        if b.len() != DpStats::SIZE {
            return Err(Error::BadLength {
                what: "datapath stats",
                want: DpStats::SIZE,
                got: b.len(),
            });
        }
        Ok(DpStats {
            hit: NativeEndian::read_u64(&b[0..8]),
            missed: NativeEndian::read_u64(&b[8..16]),
            lost: NativeEndian::read_u64(&b[16..24]),
            flows: NativeEndian::read_u64(&b[24..32]),
        })
    }
}

/// `struct ovs_dp_megaflow_stats`: mask cache counters plus padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpMegaflowStats {
    pub mask_hits: u64,
    pub masks: u32,
}

impl DpMegaflowStats {
    pub const SIZE: usize = 32;

    /// Parses the fixed struct, insisting on the exact kernel size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadLength`] for any other attribute length.
    pub fn parse(b: &[u8]) -> Result<DpMegaflowStats, Error> {
        if b.len() != DpMegaflowStats::SIZE {
            return Err(Error::BadLength {
                what: "datapath megaflow stats",
                want: DpMegaflowStats::SIZE,
                got: b.len(),
            });
        }
        Ok(DpMegaflowStats {
            mask_hits: NativeEndian::read_u64(&b[0..8]),
            masks: NativeEndian::read_u32(&b[8..12]),
        })
    }
}

/// `struct ovs_vport_stats`: 64 bytes of interface counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VportStats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

impl VportStats {
    pub const SIZE: usize = 64;

    /// Parses the fixed struct, insisting on the exact kernel size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadLength`] for any other attribute length.
    pub fn parse(b: &[u8]) -> Result<VportStats, Error> {
        if b.len() != VportStats::SIZE {
            return Err(Error::BadLength {
                what: "vport stats",
                want: VportStats::SIZE,
                got: b.len(),
            });
        }
        Ok(VportStats {
            rx_packets: NativeEndian::read_u64(&b[0..8]),
            tx_packets: NativeEndian::read_u64(&b[8..16]),
            rx_bytes: NativeEndian::read_u64(&b[16..24]),
            tx_bytes: NativeEndian::read_u64(&b[24..32]),
            rx_errors: NativeEndian::read_u64(&b[32..40]),
            tx_errors: NativeEndian::read_u64(&b[40..48]),
            rx_dropped: NativeEndian::read_u64(&b[48..56]),
            tx_dropped: NativeEndian::read_u64(&b[56..64]),
        })
    }
}

/// `struct ovs_flow_stats`: packet and byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub packets: u64,
    pub bytes: u64,
}

impl FlowStats {
    pub const SIZE: usize = 16;

    /// Parses the fixed struct, insisting on the exact kernel size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadLength`] for any other attribute length.
    pub fn parse(b: &[u8]) -> Result<FlowStats, Error> {
        if b.len() != FlowStats::SIZE {
            return Err(Error::BadLength {
                what: "flow stats",
                want: FlowStats::SIZE,
                got: b.len(),
            });
        }
        Ok(FlowStats {
            packets: NativeEndian::read_u64(&b[0..8]),
            bytes: NativeEndian::read_u64(&b[8..16]),
        })
    }
}

/// Reads a NUL-terminated string attribute.
pub(crate) fn string(b: &[u8]) -> String {
    let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
    String::from_utf8_lossy(&b[..end]).to_string()
}
