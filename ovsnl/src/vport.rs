// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Queries against the `ovs_vport` family.

use netlink_packet_utils::nla::NlasIterator;

use crate::conn::{put_attr, GenlRequest, NLM_F_DUMP, NLM_F_ECHO, NLM_F_REQUEST};
use crate::datapath::read_u32;
use crate::error::Error;
use crate::ovsh;
use crate::{Client, Family};

/// The typed specification of a vport. The spec carries the port's name and
/// any type-specific payload; it has no behavior of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VportSpec {
    /// An existing network device attached to the datapath.
    Netdev(String),
    /// A simulated device internal to the datapath.
    Internal(String),
    /// A GRE tunnel endpoint.
    Gre(String),
    /// A VXLAN tunnel endpoint with its UDP destination port.
    Vxlan {
        /// Interface name.
        name: String,
        /// UDP destination port; zero when the kernel omits options.
        port: u16,
    },
    /// A Geneve tunnel endpoint with its UDP destination port.
    Geneve {
        /// Interface name.
        name: String,
        /// UDP destination port; zero when the kernel omits options.
        port: u16,
    },
}

impl VportSpec {
    /// The vport's interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            VportSpec::Netdev(name) | VportSpec::Internal(name) | VportSpec::Gre(name) => name,
            VportSpec::Vxlan { name, .. } | VportSpec::Geneve { name, .. } => name,
        }
    }

    /// The vport type's string name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            VportSpec::Netdev(_) => "netdev",
            VportSpec::Internal(_) => "internal",
            VportSpec::Gre(_) => "gre",
            VportSpec::Vxlan { .. } => "vxlan",
            VportSpec::Geneve { .. } => "geneve",
        }
    }
}

/// An Open vSwitch in-kernel vport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vport {
    /// The datapath the port belongs to.
    pub datapath_id: i32,
    /// Port number, scoped to the datapath.
    pub id: u32,
    /// Typed port specification.
    pub spec: VportSpec,
    /// Interface counters.
    pub stats: ovsh::VportStats,
    /// Interface index of the backing device.
    pub if_index: u32,
    /// Network namespace id.
    pub net_ns_id: u32,
}

/// Operations on the `ovs_vport` family.
pub struct VportService<'a> {
    client: &'a Client,
    family: Family,
}

impl std::fmt::Debug for VportService<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VportService")
            .field("family", &self.family)
            .finish()
    }
}

impl<'a> VportService<'a> {
    pub(crate) fn new(client: &'a Client, family: Family) -> Self {
        VportService { client, family }
    }

    /// Lists every vport of the datapath identified by `dpid`.
    ///
    /// # Errors
    ///
    /// Returns a transport, kernel, or decode error.
    pub fn list(&self, dpid: i32) -> Result<Vec<Vport>, Error> {
        let req = self.request(dpid, NLM_F_REQUEST | NLM_F_DUMP, &[]);
        let msgs = self.client.execute(&req)?;
        msgs.iter().map(|m| parse_vport(m)).collect()
    }

    /// Fetches one vport by its port number. A port which does not exist
    /// yields `None`.
    ///
    /// # Errors
    ///
    /// Returns a transport, kernel, or decode error.
    pub fn get_by_id(&self, dpid: i32, vport_id: u32) -> Result<Option<Vport>, Error> {
        let mut attrs = Vec::new();
        put_attr(&mut attrs, ovsh::VPORT_ATTR_PORT_NO, &vport_id.to_ne_bytes());

        let req = self.request(dpid, NLM_F_REQUEST | NLM_F_ECHO, &attrs);
        let msgs = self.client.execute(&req)?;
        msgs.first().map(|m| parse_vport(m)).transpose()
    }

    /// Fetches one vport by its interface name. A port which does not
    /// exist yields `None`.
    ///
    /// # Errors
    ///
    /// Returns a transport, kernel, or decode error.
    pub fn get_by_name(&self, dpid: i32, name: &str) -> Result<Option<Vport>, Error> {
        let mut name_z = name.as_bytes().to_vec();
        name_z.push(0);
        let mut attrs = Vec::new();
        put_attr(&mut attrs, ovsh::VPORT_ATTR_NAME, &name_z);

        let req = self.request(dpid, NLM_F_REQUEST | NLM_F_ECHO, &attrs);
        let msgs = self.client.execute(&req)?;
        msgs.first().map(|m| parse_vport(m)).transpose()
    }

    fn request(&self, dpid: i32, flags: u16, attrs: &[u8]) -> GenlRequest {
        let mut payload = ovsh::Header { ifindex: dpid }.bytes().to_vec();
        payload.extend_from_slice(attrs);
        GenlRequest {
            family: self.family.id,
            command: ovsh::VPORT_CMD_GET,
            version: self.family.version,
            flags,
            payload,
        }
    }
}

/// Parses one vport reply message.
fn parse_vport(payload: &[u8]) -> Result<Vport, Error> {
    let (header, attrs) = ovsh::Header::parse(payload)?;

    let mut id = 0u32;
    let mut typ = 0u32;
    let mut name = String::new();
    let mut options: Option<Vec<u8>> = None;
    let mut stats = ovsh::VportStats::default();
    let mut if_index = 0u32;
    let mut net_ns_id = 0u32;

    for nla in NlasIterator::new(attrs) {
        let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
        match nla.kind() {
            ovsh::VPORT_ATTR_PORT_NO => id = read_u32(nla.value())?,
            ovsh::VPORT_ATTR_TYPE => typ = read_u32(nla.value())?,
            ovsh::VPORT_ATTR_NAME => name = ovsh::string(nla.value()),
            ovsh::VPORT_ATTR_OPTIONS => options = Some(nla.value().to_vec()),
            ovsh::VPORT_ATTR_STATS => stats = ovsh::VportStats::parse(nla.value())?,
            ovsh::VPORT_ATTR_IFINDEX => if_index = read_u32(nla.value())?,
            ovsh::VPORT_ATTR_NETNSID => net_ns_id = read_u32(nla.value())?,
            _ => {}
        }
    }

    let spec = match typ {
        ovsh::VPORT_TYPE_NETDEV => VportSpec::Netdev(name),
        ovsh::VPORT_TYPE_INTERNAL => VportSpec::Internal(name),
        ovsh::VPORT_TYPE_GRE => VportSpec::Gre(name),
        ovsh::VPORT_TYPE_VXLAN => VportSpec::Vxlan {
            name,
            port: tunnel_dst_port(options.as_deref())?,
        },
        ovsh::VPORT_TYPE_GENEVE => VportSpec::Geneve {
            name,
            port: tunnel_dst_port(options.as_deref())?,
        },
        other => return Err(Error::UnsupportedVportType(other)),
    };

    Ok(Vport {
        datapath_id: header.ifindex,
        id,
        spec,
        stats,
        if_index,
        net_ns_id,
    })
}

/// Extracts the UDP destination port from nested tunnel options.
fn tunnel_dst_port(options: Option<&[u8]>) -> Result<u16, Error> {
    let Some(options) = options else {
        return Ok(0);
    };
    for nla in NlasIterator::new(options) {
        let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
        if nla.kind() == ovsh::TUNNEL_ATTR_DST_PORT {
            let value = nla.value();
            let bytes: [u8; 2] = value.try_into().map_err(|_| Error::BadLength {
                what: "tunnel destination port",
                want: 2,
                got: value.len(),
            })?;
            return Ok(u16::from_ne_bytes(bytes));
        }
    }
    Ok(0)
}
