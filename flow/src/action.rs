// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow rule actions and their textual rendering.

use std::net::Ipv4Addr;

use crate::learn::LearnedFlow;
use crate::mac::{EtherAddr, MacError};

/// The highest port number accepted by `resubmit:<port>`.
pub const MAX_RESUBMIT_PORT: u32 = 0xffff_feff;

/// Errors produced when rendering or parsing an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// No recognizer accepted the action token.
    #[error("no action matched for {0:?}")]
    NoMatch(String),
    /// An action token with unbalanced parentheses.
    #[error("invalid action: {0:?}")]
    Invalid(String),
    /// `ct()` with an empty argument list.
    #[error("ct action requires arguments")]
    CtNoArguments,
    /// `conjunction` with `dimension > total`.
    #[error("conjunction dimension number is larger than dimension size")]
    DimensionTooLarge,
    /// `resubmit(,)` with neither port nor table.
    #[error("resubmit action requires port or table")]
    ResubmitPortTableZero,
    /// `resubmit:<port>` beyond [`MAX_RESUBMIT_PORT`].
    #[error("resubmit port out of range")]
    ResubmitPortInvalid,
    /// `load`/`set_field` with an empty value or field.
    #[error("load or set_field action requires value and field")]
    LoadSetFieldZero,
    /// `move` with an empty source or destination.
    #[error("move action requires source and destination")]
    MoveEmpty,
    /// `output:<field>` with an empty field.
    #[error("output action requires a field")]
    OutputFieldEmpty,
    /// `mod_vlan_vid` beyond 4095.
    #[error("VLAN VID out of range")]
    InvalidVlanVid,
    /// A learned flow carrying an action outside the learn whitelist.
    #[error("invalid actions in learned flow")]
    InvalidLearnedActions,
    /// A hardware address failed to parse.
    #[error(transparent)]
    Mac(#[from] MacError),
    /// A value was not a valid IPv4 address.
    #[error("invalid IPv4 address: {0}")]
    InvalidIpv4(String),
    /// An integer parameter failed to parse.
    #[error("invalid integer in action: {0:?}")]
    InvalidInteger(String),
}

/// A single action of a flow rule.
///
/// The compound actions (`ct`, `learn`, …) keep their inner argument list
/// opaque at this level; the codec treats it as a brace-balanced string for
/// emission and re-parses it only on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `all` — output to every port except the ingress port.
    All,
    /// `drop` — discard the packet. Only valid as the sole action.
    Drop,
    /// `flood`.
    Flood,
    /// `in_port` — output back to the ingress port.
    InPort,
    /// `local` — output to the bridge's local port.
    Local,
    /// `normal` — L2 learning-switch processing.
    Normal,
    /// `strip_vlan`.
    StripVlan,
    /// `dec_ttl`, optionally with controller ids (`dec_ttl(1,2)`).
    DecTtl(Vec<u32>),
    /// `ct_clear`.
    CtClear,
    /// `ct(<args>)` with an opaque, brace-balanced argument list.
    ConnectionTracking(String),
    /// `conjunction(<id>,<dimension>/<total>)`.
    Conjunction {
        /// Conjunction id, referenced by `conj_id` matches.
        id: u32,
        /// Dimension number, 1-based.
        dimension: u32,
        /// Total number of dimensions.
        total: u32,
    },
    /// `multipath(<fields>,<basis>,<algorithm>,<n_links>,<arg>,<dst>)`.
    Multipath {
        /// Hashed fields, e.g. `symmetric_l3l4+udp`.
        fields: String,
        /// Universal hash parameter.
        basis: u16,
        /// Link choice algorithm, e.g. `hrw`.
        algorithm: String,
        /// Number of links.
        n_links: u32,
        /// Algorithm-specific argument.
        arg: u32,
        /// Destination field for the selected link.
        dst: String,
    },
    /// `bundle(<fields>,<basis>,<algorithm>,ofport,members:<p>[,<p>…])`.
    Bundle {
        /// Hashed fields.
        fields: String,
        /// Universal hash parameter.
        basis: u16,
        /// Member choice algorithm, e.g. `active_backup`.
        algorithm: String,
        /// Member port list.
        members: Vec<u32>,
    },
    /// `controller`, `controller:<max_len>` or `controller(userdata=<hex>)`.
    Controller {
        /// Maximum bytes of packet to send; zero means default.
        max_len: u16,
        /// Dotted-hex opaque userdata; empty means absent.
        userdata: String,
    },
    /// `mod_dl_src:<mac>`.
    ModDataLinkSource(EtherAddr),
    /// `mod_dl_dst:<mac>`.
    ModDataLinkDestination(EtherAddr),
    /// `mod_nw_src:<ipv4>`.
    ModNetworkSource(Ipv4Addr),
    /// `mod_nw_dst:<ipv4>`.
    ModNetworkDestination(Ipv4Addr),
    /// `mod_tp_src:<port>`.
    ModTransportSourcePort(u16),
    /// `mod_tp_dst:<port>`.
    ModTransportDestinationPort(u16),
    /// `mod_vlan_vid:<vid>`.
    ModVlanVid(u16),
    /// `output:<port>`.
    Output(u32),
    /// `output:<field>`, e.g. `output:in_port`.
    OutputField(String),
    /// `resubmit(<port>,<table>)`; zero means the slot is omitted.
    Resubmit {
        /// Ingress port override, zero to omit.
        port: u32,
        /// Table to resume at, zero to omit.
        table: u8,
    },
    /// `resubmit:<port>`.
    ResubmitPort(u32),
    /// `group:<id>`.
    Group(u32),
    /// `load:<value>-><field>`.
    Load {
        /// Literal value to load.
        value: String,
        /// Destination field specifier.
        field: String,
    },
    /// `set_field:<value>-><field>`.
    SetField {
        /// Literal value to set.
        value: String,
        /// Destination field name.
        field: String,
    },
    /// `move:<src>-><dst>`.
    Move {
        /// Source field specifier.
        src: String,
        /// Destination field specifier.
        dst: String,
    },
    /// `set_tunnel:<id>`.
    SetTunnel(u64),
    /// `push:<field>`.
    Push(String),
    /// `pop:<field>`.
    Pop(String),
    /// `learn(<template>)` with a nested flow template.
    Learn(Box<LearnedFlow>),
}

impl Action {
    /// Renders the action in OVS flow syntax.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] when the stored parameters violate the
    /// action's constraints.
    pub fn marshal(&self) -> Result<String, ActionError> {
        match self {
            Action::All => Ok("all".to_string()),
            Action::Drop => Ok("drop".to_string()),
            Action::Flood => Ok("flood".to_string()),
            Action::InPort => Ok("in_port".to_string()),
            Action::Local => Ok("local".to_string()),
            Action::Normal => Ok("normal".to_string()),
            Action::StripVlan => Ok("strip_vlan".to_string()),
            Action::DecTtl(ids) => {
                if ids.is_empty() {
                    Ok("dec_ttl".to_string())
                } else {
                    Ok(format!("dec_ttl({})", join_u32(ids)))
                }
            }
            Action::CtClear => Ok("ct_clear".to_string()),
            Action::ConnectionTracking(args) => {
                if args.is_empty() {
                    return Err(ActionError::CtNoArguments);
                }
                Ok(format!("ct({args})"))
            }
            Action::Conjunction {
                id,
                dimension,
                total,
            } => {
                if dimension > total {
                    return Err(ActionError::DimensionTooLarge);
                }
                Ok(format!("conjunction({id},{dimension}/{total})"))
            }
            Action::Multipath {
                fields,
                basis,
                algorithm,
                n_links,
                arg,
                dst,
            } => Ok(format!(
                "multipath({fields},{basis},{algorithm},{n_links},{arg},{dst})"
            )),
            Action::Bundle {
                fields,
                basis,
                algorithm,
                members,
            } => Ok(format!(
                "bundle({fields},{basis},{algorithm},ofport,members:{})",
                join_u32(members)
            )),
            Action::Controller { max_len, userdata } => {
                if !userdata.is_empty() {
                    Ok(format!("controller(userdata={userdata})"))
                } else if *max_len > 0 {
                    Ok(format!("controller:{max_len}"))
                } else {
                    Ok("controller".to_string())
                }
            }
            Action::ModDataLinkSource(mac) => Ok(format!("mod_dl_src:{mac}")),
            Action::ModDataLinkDestination(mac) => Ok(format!("mod_dl_dst:{mac}")),
            Action::ModNetworkSource(ip) => Ok(format!("mod_nw_src:{ip}")),
            Action::ModNetworkDestination(ip) => Ok(format!("mod_nw_dst:{ip}")),
            Action::ModTransportSourcePort(port) => Ok(format!("mod_tp_src:{port}")),
            Action::ModTransportDestinationPort(port) => Ok(format!("mod_tp_dst:{port}")),
            Action::ModVlanVid(vid) => {
                if *vid > 4095 {
                    return Err(ActionError::InvalidVlanVid);
                }
                Ok(format!("mod_vlan_vid:{vid}"))
            }
            Action::Output(port) => Ok(format!("output:{port}")),
            Action::OutputField(field) => {
                if field.is_empty() {
                    return Err(ActionError::OutputFieldEmpty);
                }
                Ok(format!("output:{field}"))
            }
            Action::Resubmit { port, table } => {
                if *port == 0 && *table == 0 {
                    return Err(ActionError::ResubmitPortTableZero);
                }
                let port = if *port == 0 {
                    String::new()
                } else {
                    port.to_string()
                };
                let table = if *table == 0 {
                    String::new()
                } else {
                    table.to_string()
                };
                Ok(format!("resubmit({port},{table})"))
            }
            Action::ResubmitPort(port) => {
                if *port > MAX_RESUBMIT_PORT {
                    return Err(ActionError::ResubmitPortInvalid);
                }
                Ok(format!("resubmit:{port}"))
            }
            Action::Group(group) => Ok(format!("group:{group}")),
            Action::Load { value, field } => {
                if value.is_empty() || field.is_empty() {
                    return Err(ActionError::LoadSetFieldZero);
                }
                Ok(format!("load:{value}->{field}"))
            }
            Action::SetField { value, field } => {
                if value.is_empty() || field.is_empty() {
                    return Err(ActionError::LoadSetFieldZero);
                }
                Ok(format!("set_field:{value}->{field}"))
            }
            Action::Move { src, dst } => {
                if src.is_empty() || dst.is_empty() {
                    return Err(ActionError::MoveEmpty);
                }
                Ok(format!("move:{src}->{dst}"))
            }
            Action::SetTunnel(id) => Ok(format!("set_tunnel:{id:#x}")),
            Action::Push(field) => Ok(format!("push:{field}")),
            Action::Pop(field) => Ok(format!("pop:{field}")),
            Action::Learn(learned) => learned.marshal(),
        }
    }

    /// Convenience constructor for `ct(<args>)`.
    #[must_use]
    pub fn ct(args: impl Into<String>) -> Self {
        Action::ConnectionTracking(args.into())
    }

    /// Convenience constructor for `resubmit(<port>,<table>)`.
    #[must_use]
    pub const fn resubmit(port: u32, table: u8) -> Self {
        Action::Resubmit { port, table }
    }
}

fn join_u32(values: &[u32]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        let cases = [
            (Action::All, "all"),
            (Action::Drop, "drop"),
            (Action::Flood, "flood"),
            (Action::InPort, "in_port"),
            (Action::Local, "local"),
            (Action::Normal, "normal"),
            (Action::StripVlan, "strip_vlan"),
            (Action::CtClear, "ct_clear"),
        ];
        for (a, want) in cases {
            assert_eq!(a.marshal().unwrap(), want);
        }
    }

    #[test]
    fn connection_tracking() {
        assert_eq!(
            Action::ct("commit,exec(set_field:1->ct_label,set_field:1->ct_mark)")
                .marshal()
                .unwrap(),
            "ct(commit,exec(set_field:1->ct_label,set_field:1->ct_mark))"
        );
        assert_eq!(
            Action::ct("").marshal(),
            Err(ActionError::CtNoArguments)
        );
    }

    #[test]
    fn mod_actions() {
        let mac = EtherAddr([0xde, 0xad, 0xbe, 0xef, 0xde, 0xad]);
        assert_eq!(
            Action::ModDataLinkDestination(mac).marshal().unwrap(),
            "mod_dl_dst:de:ad:be:ef:de:ad"
        );
        assert_eq!(
            Action::ModDataLinkSource(mac).marshal().unwrap(),
            "mod_dl_src:de:ad:be:ef:de:ad"
        );
        assert_eq!(
            Action::ModNetworkDestination(Ipv4Addr::new(192, 168, 1, 1))
                .marshal()
                .unwrap(),
            "mod_nw_dst:192.168.1.1"
        );
        assert_eq!(
            Action::ModNetworkSource(Ipv4Addr::new(192, 168, 1, 1))
                .marshal()
                .unwrap(),
            "mod_nw_src:192.168.1.1"
        );
        assert_eq!(
            Action::ModTransportDestinationPort(65535).marshal().unwrap(),
            "mod_tp_dst:65535"
        );
        assert_eq!(
            Action::ModTransportSourcePort(65535).marshal().unwrap(),
            "mod_tp_src:65535"
        );
        assert_eq!(Action::ModVlanVid(10).marshal().unwrap(), "mod_vlan_vid:10");
        assert_eq!(
            Action::ModVlanVid(4096).marshal(),
            Err(ActionError::InvalidVlanVid)
        );
    }

    #[test]
    fn output_and_resubmit() {
        assert_eq!(Action::Output(10).marshal().unwrap(), "output:10");
        assert_eq!(
            Action::OutputField("in_port".to_string()).marshal().unwrap(),
            "output:in_port"
        );
        assert_eq!(
            Action::OutputField(String::new()).marshal(),
            Err(ActionError::OutputFieldEmpty)
        );

        assert_eq!(
            Action::resubmit(0, 0).marshal(),
            Err(ActionError::ResubmitPortTableZero)
        );
        assert_eq!(Action::resubmit(0, 1).marshal().unwrap(), "resubmit(,1)");
        assert_eq!(Action::resubmit(1, 0).marshal().unwrap(), "resubmit(1,)");
        assert_eq!(Action::resubmit(1, 2).marshal().unwrap(), "resubmit(1,2)");

        assert_eq!(Action::ResubmitPort(0).marshal().unwrap(), "resubmit:0");
        assert_eq!(
            Action::ResubmitPort(MAX_RESUBMIT_PORT).marshal().unwrap(),
            "resubmit:4294967039"
        );
        assert_eq!(
            Action::ResubmitPort(MAX_RESUBMIT_PORT + 1).marshal(),
            Err(ActionError::ResubmitPortInvalid)
        );
    }

    #[test]
    fn load_set_field_move() {
        assert_eq!(
            Action::Load {
                value: "0x2".to_string(),
                field: "NXM_OF_ARP_OP[]".to_string(),
            }
            .marshal()
            .unwrap(),
            "load:0x2->NXM_OF_ARP_OP[]"
        );
        assert_eq!(
            Action::SetField {
                value: "192.168.1.1".to_string(),
                field: "arp_spa".to_string(),
            }
            .marshal()
            .unwrap(),
            "set_field:192.168.1.1->arp_spa"
        );
        for (value, field) in [("", ""), ("", "arp_spa"), ("192.168.1.1", "")] {
            assert_eq!(
                Action::SetField {
                    value: value.to_string(),
                    field: field.to_string(),
                }
                .marshal(),
                Err(ActionError::LoadSetFieldZero)
            );
            assert_eq!(
                Action::Load {
                    value: value.to_string(),
                    field: field.to_string(),
                }
                .marshal(),
                Err(ActionError::LoadSetFieldZero)
            );
        }

        assert_eq!(
            Action::Move {
                src: "nw_src".to_string(),
                dst: "nw_dst".to_string(),
            }
            .marshal()
            .unwrap(),
            "move:nw_src->nw_dst"
        );
        assert_eq!(
            Action::Move {
                src: String::new(),
                dst: "nw_dst".to_string(),
            }
            .marshal(),
            Err(ActionError::MoveEmpty)
        );
    }

    #[test]
    fn compound_actions() {
        assert_eq!(
            Action::SetTunnel(0xa).marshal().unwrap(),
            "set_tunnel:0xa"
        );
        assert_eq!(
            Action::Multipath {
                fields: "symmetric_l3l4+udp".to_string(),
                basis: 1024,
                algorithm: "hrw".to_string(),
                n_links: 2,
                arg: 0,
                dst: "reg0".to_string(),
            }
            .marshal()
            .unwrap(),
            "multipath(symmetric_l3l4+udp,1024,hrw,2,0,reg0)"
        );
        assert_eq!(
            Action::Conjunction {
                id: 123,
                dimension: 1,
                total: 2,
            }
            .marshal()
            .unwrap(),
            "conjunction(123,1/2)"
        );
        assert_eq!(
            Action::Conjunction {
                id: 123,
                dimension: 3,
                total: 2,
            }
            .marshal(),
            Err(ActionError::DimensionTooLarge)
        );
        assert_eq!(
            Action::Bundle {
                fields: "eth_src".to_string(),
                basis: 0,
                algorithm: "active_backup".to_string(),
                members: vec![149],
            }
            .marshal()
            .unwrap(),
            "bundle(eth_src,0,active_backup,ofport,members:149)"
        );
        assert_eq!(Action::Group(1).marshal().unwrap(), "group:1");
        assert_eq!(
            Action::Push("NXM_NX_REG0[]".to_string()).marshal().unwrap(),
            "push:NXM_NX_REG0[]"
        );
        assert_eq!(
            Action::Pop("NXM_OF_IN_PORT[]".to_string()).marshal().unwrap(),
            "pop:NXM_OF_IN_PORT[]"
        );
    }

    #[test]
    fn dec_ttl() {
        assert_eq!(Action::DecTtl(vec![]).marshal().unwrap(), "dec_ttl");
        assert_eq!(Action::DecTtl(vec![1]).marshal().unwrap(), "dec_ttl(1)");
        assert_eq!(
            Action::DecTtl(vec![1, 2]).marshal().unwrap(),
            "dec_ttl(1,2)"
        );
    }

    #[test]
    fn controller() {
        assert_eq!(
            Action::Controller {
                max_len: 0,
                userdata: String::new(),
            }
            .marshal()
            .unwrap(),
            "controller"
        );
        assert_eq!(
            Action::Controller {
                max_len: 0,
                userdata: "00.00.00.04.00.00.00.00".to_string(),
            }
            .marshal()
            .unwrap(),
            "controller(userdata=00.00.00.04.00.00.00.00)"
        );
        assert_eq!(
            Action::Controller {
                max_len: 10,
                userdata: String::new(),
            }
            .marshal()
            .unwrap(),
            "controller:10"
        );
    }
}
