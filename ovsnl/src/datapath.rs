// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Queries against the `ovs_datapath` family.

use std::fmt;

use netlink_packet_utils::nla::NlasIterator;

use crate::conn::{GenlRequest, NLM_F_DUMP, NLM_F_REQUEST};
use crate::error::Error;
use crate::ovsh;
use crate::{Client, Family};

/// Feature bits of a datapath.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatapathFeatures(pub u32);

impl DatapathFeatures {
    /// The datapath accepts unaligned netlink attributes.
    #[must_use]
    pub fn unaligned(self) -> bool {
        self.0 & ovsh::DP_F_UNALIGNED != 0
    }

    /// One upcall PID per vport.
    #[must_use]
    pub fn vport_pids(self) -> bool {
        self.0 & ovsh::DP_F_VPORT_PIDS != 0
    }
}

impl fmt::Display for DatapathFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (ovsh::DP_F_UNALIGNED, "unaligned"),
            (ovsh::DP_F_VPORT_PIDS, "vportpids"),
        ];

        let mut first = true;
        for (bit, name) in names {
            if self.0 & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("0")?;
        }
        Ok(())
    }
}

/// An Open vSwitch in-kernel datapath.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datapath {
    /// Interface index identifying the datapath.
    pub index: i32,
    /// Datapath name, e.g. `ovs-system`.
    pub name: String,
    /// Feature bits.
    pub features: DatapathFeatures,
    /// Packet statistics.
    pub stats: ovsh::DpStats,
    /// Megaflow mask statistics.
    pub megaflow_stats: ovsh::DpMegaflowStats,
}

/// Operations on the `ovs_datapath` family.
pub struct DatapathService<'a> {
    client: &'a Client,
    family: Family,
}

impl<'a> DatapathService<'a> {
    pub(crate) fn new(client: &'a Client, family: Family) -> Self {
        DatapathService { client, family }
    }

    /// Lists every datapath in the kernel.
    ///
    /// # Errors
    ///
    /// Returns a transport, kernel, or decode error.
    pub fn list(&self) -> Result<Vec<Datapath>, Error> {
        let req = GenlRequest {
            family: self.family.id,
            command: ovsh::DP_CMD_GET,
            version: self.family.version,
            flags: NLM_F_REQUEST | NLM_F_DUMP,
            // Query all datapaths.
            payload: ovsh::Header { ifindex: 0 }.bytes().to_vec(),
        };

        let msgs = self.client.execute(&req)?;
        msgs.iter().map(|m| parse_datapath(m)).collect()
    }
}

/// Parses one datapath reply message.
fn parse_datapath(payload: &[u8]) -> Result<Datapath, Error> {
    let (header, attrs) = ovsh::Header::parse(payload)?;

    let mut dp = Datapath {
        index: header.ifindex,
        ..Default::default()
    };

    for nla in NlasIterator::new(attrs) {
        let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
        match nla.kind() {
            ovsh::DP_ATTR_NAME => dp.name = ovsh::string(nla.value()),
            ovsh::DP_ATTR_USER_FEATURES => {
                dp.features = DatapathFeatures(read_u32(nla.value())?);
            }
            ovsh::DP_ATTR_STATS => dp.stats = ovsh::DpStats::parse(nla.value())?,
            ovsh::DP_ATTR_MEGAFLOW_STATS => {
                dp.megaflow_stats = ovsh::DpMegaflowStats::parse(nla.value())?;
            }
            _ => {}
        }
    }

    Ok(dp)
}

pub(crate) fn read_u32(b: &[u8]) -> Result<u32, Error> {
    let bytes: [u8; 4] = b.try_into().map_err(|_| Error::BadLength {
        what: "u32 attribute",
        want: 4,
        got: b.len(),
    })?;
    Ok(u32::from_ne_bytes(bytes))
}
