// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Queries against the `ovs_flow` family.

use byteorder::{BigEndian, ByteOrder};
use netlink_packet_utils::nla::NlasIterator;

use crate::conn::{GenlRequest, NLM_F_DUMP, NLM_F_REQUEST};
use crate::error::Error;
use crate::ovsh;
use crate::{Client, Family};

/// One key of an in-kernel flow's match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowKey {
    /// Ethertype of the matched frames.
    EtherType(u16),
    /// Keys of an encapsulated (VLAN) frame.
    Encap(Vec<FlowKey>),
    /// IPv4 header match; only the protocol is modeled.
    Ipv4 {
        /// IP protocol number.
        proto: u8,
    },
    /// IPv6 header match; only the protocol is modeled.
    Ipv6 {
        /// IP protocol number.
        proto: u8,
    },
}

/// An Open vSwitch in-kernel flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flow {
    /// The keys this flow matches on.
    pub keys: Vec<FlowKey>,
    /// Packet and byte counters.
    pub stats: ovsh::FlowStats,
}

/// `struct ovs_key_ipv4` and `ovs_key_ipv6` layouts; only the proto octet
/// is consumed.
const KEY_IPV4_SIZE: usize = 12;
const KEY_IPV4_PROTO_OFFSET: usize = 8;
const KEY_IPV6_SIZE: usize = 40;
const KEY_IPV6_PROTO_OFFSET: usize = 36;

/// Operations on the `ovs_flow` family.
pub struct FlowService<'a> {
    client: &'a Client,
    family: Family,
}

impl<'a> FlowService<'a> {
    pub(crate) fn new(client: &'a Client, family: Family) -> Self {
        FlowService { client, family }
    }

    /// Lists the active flows of the datapath identified by `dpid`. Flows
    /// with no modeled keys or no traffic are skipped.
    ///
    /// # Errors
    ///
    /// Returns a transport, kernel, or decode error.
    pub fn list(&self, dpid: i32) -> Result<Vec<Flow>, Error> {
        let req = GenlRequest {
            family: self.family.id,
            command: ovsh::FLOW_CMD_GET,
            version: self.family.version,
            flags: NLM_F_REQUEST | NLM_F_DUMP,
            payload: ovsh::Header { ifindex: dpid }.bytes().to_vec(),
        };

        let msgs = self.client.execute(&req)?;

        let mut flows = Vec::new();
        for msg in &msgs {
            let (_, attrs) = ovsh::Header::parse(msg)?;

            let mut flow = Flow::default();
            for nla in NlasIterator::new(attrs) {
                let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
                match nla.kind() {
                    ovsh::FLOW_ATTR_KEY => flow.keys = parse_flow_keys(nla.value())?,
                    ovsh::FLOW_ATTR_STATS => flow.stats = ovsh::FlowStats::parse(nla.value())?,
                    _ => {}
                }
            }

            if flow.keys.is_empty() {
                continue;
            }
            if flow.stats.packets == 0 && flow.stats.bytes == 0 {
                continue;
            }
            flows.push(flow);
        }

        Ok(flows)
    }
}

/// Walks a flow key attribute run, keeping the keys this client models.
fn parse_flow_keys(b: &[u8]) -> Result<Vec<FlowKey>, Error> {
    let mut keys = Vec::new();

    for nla in NlasIterator::new(b) {
        let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
        match nla.kind() {
            ovsh::KEY_ATTR_ETHERTYPE => {
                let value = nla.value();
                if value.len() < 2 {
                    return Err(Error::BadLength {
                        what: "ethertype key",
                        want: 2,
                        got: value.len(),
                    });
                }
                // The ethertype rides in network byte order.
                keys.push(FlowKey::EtherType(BigEndian::read_u16(value)));
            }
            ovsh::KEY_ATTR_ENCAP => {
                let encap = parse_flow_keys(nla.value())?;
                if encap.is_empty() {
                    continue;
                }
                keys.push(FlowKey::Encap(encap));
            }
            ovsh::KEY_ATTR_IPV4 => {
                let value = nla.value();
                if value.len() != KEY_IPV4_SIZE {
                    return Err(Error::BadLength {
                        what: "IPv4 key",
                        want: KEY_IPV4_SIZE,
                        got: value.len(),
                    });
                }
                let proto = value[KEY_IPV4_PROTO_OFFSET];
                if proto == 0 {
                    continue;
                }
                keys.push(FlowKey::Ipv4 { proto });
            }
            ovsh::KEY_ATTR_IPV6 => {
                let value = nla.value();
                if value.len() != KEY_IPV6_SIZE {
                    return Err(Error::BadLength {
                        what: "IPv6 key",
                        want: KEY_IPV6_SIZE,
                        got: value.len(),
                    });
                }
                let proto = value[KEY_IPV6_PROTO_OFFSET];
                if proto == 0 {
                    continue;
                }
                keys.push(FlowKey::Ipv6 { proto });
            }
            _ => {}
        }
    }

    Ok(keys)
}
