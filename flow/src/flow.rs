// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Install-time flow rules and delete/query predicates.

use std::fmt::Write;
use std::str::FromStr;

use crate::action::{Action, ActionError};
use crate::matches::{Match, MatchError};
use crate::parse::{parse_actions, parse_match, parse_u64_any};
use crate::protocol::Protocol;
use crate::{ANY_TABLE, PORT_LOCAL};

/// Errors produced when rendering or parsing a [`Flow`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The action list is empty.
    #[error("flow has no actions")]
    NoActions,
    /// `drop` combined with other actions.
    #[error("flow has drop action combined with other actions")]
    ActionsWithDrop,
    /// The `actions=` segment failed to parse.
    #[error("invalid actions in flow: {0:?}")]
    InvalidActions(String),
    /// A scalar flow field failed to parse.
    #[error("invalid value for {field}: {value:?}")]
    InvalidField {
        /// Name of the flow field.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A match failed to render or parse.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// An action failed to render.
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// An installable match-action flow rule.
///
/// Emission order is fixed to keep rendered output diff-stable: priority,
/// protocol tag, ingress port, matches, table, timeouts, cookie, actions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Flow {
    /// Rule priority; higher wins.
    pub priority: u16,
    /// Protocol class tag, omitted when `None`.
    pub protocol: Option<Protocol>,
    /// Ingress port, zero to omit. [`PORT_LOCAL`] renders as `LOCAL`.
    pub in_port: u32,
    /// Ordered match predicates.
    pub matches: Vec<Match>,
    /// OpenFlow table the rule lives in.
    pub table: u8,
    /// Idle timeout in seconds; always emitted.
    pub idle_timeout: u16,
    /// Hard timeout in seconds, zero to omit.
    pub hard_timeout: u16,
    /// Opaque 64-bit cookie, zero to omit.
    pub cookie: u64,
    /// Ordered, non-empty action list.
    pub actions: Vec<Action>,
}

impl Flow {
    /// Renders the flow as the single line `ovs-ofctl add-flow` consumes.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NoActions`] for an empty action list,
    /// [`FlowError::ActionsWithDrop`] when `drop` is combined with other
    /// actions, or the underlying error when a match or action fails to
    /// render.
    pub fn marshal(&self) -> Result<String, FlowError> {
        let actions = self.marshal_actions()?;

        let mut out = format!("priority={}", self.priority);
        if let Some(protocol) = self.protocol {
            let _ = write!(out, ",{protocol}");
        }
        if self.in_port != 0 {
            out.push(',');
            push_in_port(&mut out, self.in_port);
        }
        for m in &self.matches {
            let _ = write!(out, ",{}", m.marshal()?);
        }
        let _ = write!(out, ",table={},idle_timeout={}", self.table, self.idle_timeout);
        if self.hard_timeout != 0 {
            let _ = write!(out, ",hard_timeout={}", self.hard_timeout);
        }
        if self.cookie != 0 {
            let _ = write!(out, ",cookie={:#018x}", self.cookie);
        }
        let _ = write!(out, ",actions={actions}");

        Ok(out)
    }

    /// Parses a flow from its textual form, accepting both this codec's own
    /// output and `ovs-ofctl dump-flows` lines (whose statistics fields are
    /// skipped).
    ///
    /// # Errors
    ///
    /// Returns a [`FlowError`] describing the first offending segment.
    pub fn unmarshal(s: &str) -> Result<Flow, FlowError> {
        let Some((match_seg, action_seg)) = s.split_once("actions=") else {
            return Err(FlowError::NoActions);
        };
        if action_seg.is_empty() {
            return Err(FlowError::NoActions);
        }

        let actions = parse_actions(action_seg)
            .map_err(|_| FlowError::InvalidActions(action_seg.to_string()))?;

        let mut flow = Flow {
            actions,
            ..Default::default()
        };

        for field in match_seg.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }

            let Some((key, value)) = field.split_once('=') else {
                // A bare token is the protocol class tag.
                flow.protocol = Some(Protocol::from_str(field).map_err(|_| {
                    FlowError::InvalidField {
                        field: "protocol",
                        value: field.to_string(),
                    }
                })?);
                continue;
            };

            match key {
                "priority" => {
                    flow.priority = value.parse().map_err(|_| FlowError::InvalidField {
                        field: "priority",
                        value: value.to_string(),
                    })?;
                }
                "table" => {
                    flow.table = value.parse().map_err(|_| FlowError::InvalidField {
                        field: "table",
                        value: value.to_string(),
                    })?;
                }
                "idle_timeout" => {
                    flow.idle_timeout = value.parse().map_err(|_| FlowError::InvalidField {
                        field: "idle_timeout",
                        value: value.to_string(),
                    })?;
                }
                "hard_timeout" => {
                    flow.hard_timeout = value.parse().map_err(|_| FlowError::InvalidField {
                        field: "hard_timeout",
                        value: value.to_string(),
                    })?;
                }
                "cookie" => {
                    flow.cookie = parse_u64_any(value).ok_or_else(|| FlowError::InvalidField {
                        field: "cookie",
                        value: value.to_string(),
                    })?;
                }
                "in_port" => {
                    flow.in_port = parse_in_port(value).ok_or_else(|| FlowError::InvalidField {
                        field: "in_port",
                        value: value.to_string(),
                    })?;
                }
                // Statistics attached by dump-flows carry no rule semantics.
                "duration" | "n_packets" | "n_bytes" | "idle_age" | "hard_age" => {}
                _ => flow.matches.push(parse_match(key, value)?),
            }
        }

        flow.check_actions()?;
        Ok(flow)
    }

    /// Derives the predicate which selects exactly this rule for deletion.
    #[must_use]
    pub fn match_flow(&self) -> MatchFlow {
        MatchFlow {
            cookie: self.cookie,
            cookie_mask: 0,
            protocol: self.protocol,
            in_port: self.in_port,
            matches: self.matches.clone(),
            table: i32::from(self.table),
        }
    }

    fn marshal_actions(&self) -> Result<String, FlowError> {
        self.check_actions()?;

        let mut out = String::new();
        for (i, a) in self.actions.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&a.marshal()?);
        }
        Ok(out)
    }

    fn check_actions(&self) -> Result<(), FlowError> {
        if self.actions.is_empty() {
            return Err(FlowError::NoActions);
        }
        if self.actions.len() > 1 && self.actions.contains(&Action::Drop) {
            return Err(FlowError::ActionsWithDrop);
        }
        Ok(())
    }
}

/// Errors produced when rendering or parsing a [`MatchFlow`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchFlowError {
    /// Every distinguishing field has its zero value.
    #[error("empty match flow")]
    Empty,
    /// A scalar field failed to parse.
    #[error("invalid value for {field}: {value:?}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A match failed to render or parse.
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// A predicate selecting existing flows for query or deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFlow {
    /// Cookie to match, zero to omit.
    pub cookie: u64,
    /// Cookie mask; zero renders as the all-ones shorthand `-1` when a
    /// cookie is present.
    pub cookie_mask: u64,
    /// Protocol class tag, omitted when `None`.
    pub protocol: Option<Protocol>,
    /// Ingress port, zero to omit.
    pub in_port: u32,
    /// Ordered match predicates.
    pub matches: Vec<Match>,
    /// Table to search; [`ANY_TABLE`] searches all tables.
    pub table: i32,
}

impl Default for MatchFlow {
    fn default() -> Self {
        MatchFlow {
            cookie: 0,
            cookie_mask: 0,
            protocol: None,
            in_port: 0,
            matches: Vec::new(),
            table: 0,
        }
    }
}

impl MatchFlow {
    /// Renders the predicate as `ovs-ofctl del-flows` expects.
    ///
    /// # Errors
    ///
    /// Returns [`MatchFlowError::Empty`] when no distinguishing field is
    /// set, or the underlying error when a match fails to render.
    pub fn marshal(&self) -> Result<String, MatchFlowError> {
        if self.is_empty() {
            return Err(MatchFlowError::Empty);
        }

        let mut segments = Vec::new();
        if self.cookie != 0 || self.cookie_mask != 0 {
            let mask = if self.cookie_mask != 0 {
                format!("{:#018x}", self.cookie_mask)
            } else {
                "-1".to_string()
            };
            segments.push(format!("cookie={:#018x}/{mask}", self.cookie));
        }
        if let Some(protocol) = self.protocol {
            segments.push(protocol.to_string());
        }
        if self.in_port != 0 {
            let mut s = String::new();
            push_in_port(&mut s, self.in_port);
            segments.push(s);
        }
        for m in &self.matches {
            segments.push(m.marshal()?);
        }
        if self.table != ANY_TABLE {
            segments.push(format!("table={}", self.table));
        }

        Ok(segments.join(","))
    }

    /// Parses a predicate from its textual form. A missing `table=` token
    /// leaves the predicate searching all tables.
    ///
    /// # Errors
    ///
    /// Returns a [`MatchFlowError`] describing the first offending segment,
    /// or [`MatchFlowError::Empty`] when nothing distinguishing was parsed.
    pub fn unmarshal(s: &str) -> Result<MatchFlow, MatchFlowError> {
        let mut mf = MatchFlow {
            table: ANY_TABLE,
            ..Default::default()
        };

        for field in s.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }

            let Some((key, value)) = field.split_once('=') else {
                mf.protocol =
                    Some(
                        Protocol::from_str(field).map_err(|_| MatchFlowError::InvalidField {
                            field: "protocol",
                            value: field.to_string(),
                        })?,
                    );
                continue;
            };

            match key {
                "cookie" => {
                    let (cookie, mask) = match value.split_once('/') {
                        Some((cookie, mask)) => (cookie, Some(mask)),
                        None => (value, None),
                    };
                    mf.cookie =
                        parse_u64_any(cookie).ok_or_else(|| MatchFlowError::InvalidField {
                            field: "cookie",
                            value: value.to_string(),
                        })?;
                    // "-1" is the all-ones shorthand, carried as a zero mask.
                    if let Some(mask) = mask.filter(|m| *m != "-1") {
                        mf.cookie_mask =
                            parse_u64_any(mask).ok_or_else(|| MatchFlowError::InvalidField {
                                field: "cookie mask",
                                value: value.to_string(),
                            })?;
                    }
                }
                "table" => {
                    mf.table = value.parse().map_err(|_| MatchFlowError::InvalidField {
                        field: "table",
                        value: value.to_string(),
                    })?;
                }
                "in_port" => {
                    mf.in_port =
                        parse_in_port(value).ok_or_else(|| MatchFlowError::InvalidField {
                            field: "in_port",
                            value: value.to_string(),
                        })?;
                }
                _ => mf.matches.push(parse_match(key, value)?),
            }
        }

        if mf.is_empty() {
            return Err(MatchFlowError::Empty);
        }
        Ok(mf)
    }

    /// Reports whether every distinguishing field has its zero value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookie == 0
            && self.cookie_mask == 0
            && self.protocol.is_none()
            && self.in_port == 0
            && self.matches.is_empty()
    }
}

fn push_in_port(out: &mut String, port: u32) {
    if port == PORT_LOCAL {
        out.push_str("in_port=LOCAL");
    } else {
        let _ = write!(out, "in_port={port}");
    }
}

fn parse_in_port(value: &str) -> Option<u32> {
    if value == "LOCAL" {
        Some(PORT_LOCAL)
    } else {
        value.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::EtherAddr;
    use crate::matches::{CtState, StateFlag, TcpFlag, TcpFlagMatch};

    fn mac(s: &str) -> EtherAddr {
        EtherAddr::try_from(s).unwrap()
    }

    #[test]
    fn marshal_rejects_invalid_action_lists() {
        assert_eq!(Flow::default().marshal(), Err(FlowError::NoActions));
        assert_eq!(
            Flow {
                actions: vec![Action::Drop, Action::Output(1)],
                ..Default::default()
            }
            .marshal(),
            Err(FlowError::ActionsWithDrop)
        );
    }

    #[test]
    fn marshal_fixed_order() {
        let cases = [
            (
                Flow {
                    actions: vec![Action::Drop],
                    ..Default::default()
                },
                "priority=0,table=0,idle_timeout=0,actions=drop",
            ),
            (
                Flow {
                    cookie: 10,
                    actions: vec![Action::Drop],
                    ..Default::default()
                },
                "priority=0,table=0,idle_timeout=0,cookie=0x000000000000000a,actions=drop",
            ),
            (
                Flow {
                    priority: 2005,
                    in_port: crate::PORT_LOCAL,
                    actions: vec![Action::resubmit(0, 1)],
                    ..Default::default()
                },
                "priority=2005,in_port=LOCAL,table=0,idle_timeout=0,actions=resubmit(,1)",
            ),
            (
                Flow {
                    priority: 1005,
                    protocol: Some(Protocol::Arp),
                    matches: vec![
                        Match::ArpTargetHardwareAddress(mac("aa:bb:cc:dd:ee:ff")),
                        Match::ArpTargetProtocolAddress("169.254.0.0/16".to_string()),
                    ],
                    table: 1,
                    actions: vec![Action::Output(64)],
                    ..Default::default()
                },
                "priority=1005,arp,arp_tha=aa:bb:cc:dd:ee:ff,arp_tpa=169.254.0.0/16,table=1,idle_timeout=0,actions=output:64",
            ),
            (
                Flow {
                    priority: 2024,
                    protocol: Some(Protocol::Icmpv6),
                    in_port: 74,
                    matches: vec![
                        Match::Icmp6Type(135),
                        Match::Ipv6Source("fe80:aaaa:bbbb:cccc:dddd::1/124".to_string()),
                        Match::NeighborDiscoverySourceLinkLayer(mac("00:11:22:33:44:55")),
                    ],
                    actions: vec![Action::ModVlanVid(10), Action::resubmit(0, 1)],
                    ..Default::default()
                },
                "priority=2024,icmp6,in_port=74,icmpv6_type=135,ipv6_src=fe80:aaaa:bbbb:cccc:dddd::1/124,nd_sll=00:11:22:33:44:55,table=0,idle_timeout=0,actions=mod_vlan_vid:10,resubmit(,1)",
            ),
            (
                Flow {
                    priority: 4010,
                    protocol: Some(Protocol::Tcpv4),
                    matches: vec![
                        Match::ConnectionTrackingState(vec![
                            StateFlag::set(CtState::Tracked),
                            StateFlag::set(CtState::New),
                        ]),
                        Match::NetworkDestination("192.0.2.1".to_string()),
                        Match::TransportDestinationPort(22),
                    ],
                    table: 45,
                    actions: vec![
                        Action::ct("commit,exec(set_field:1->ct_label,set_field:1->ct_mark)"),
                        Action::resubmit(0, 1),
                    ],
                    ..Default::default()
                },
                "priority=4010,tcp,ct_state=+trk+new,nw_dst=192.0.2.1,tp_dst=22,table=45,idle_timeout=0,actions=ct(commit,exec(set_field:1->ct_label,set_field:1->ct_mark)),resubmit(,1)",
            ),
            (
                Flow {
                    priority: 400,
                    protocol: Some(Protocol::Ipv4),
                    matches: vec![Match::NetworkDestination("192.0.2.1".to_string())],
                    table: 45,
                    actions: vec![Action::Conjunction {
                        id: 123,
                        dimension: 1,
                        total: 2,
                    }],
                    ..Default::default()
                },
                "priority=400,ip,nw_dst=192.0.2.1,table=45,idle_timeout=0,actions=conjunction(123,1/2)",
            ),
            (
                Flow {
                    in_port: 72,
                    matches: vec![
                        Match::TransportSourceMaskedPort(0xea60, 0xffe0),
                        Match::TransportDestinationMaskedPort(60000, 0xffe0),
                    ],
                    table: 55,
                    actions: vec![Action::Drop],
                    ..Default::default()
                },
                "priority=0,in_port=72,tp_src=0xea60/0xffe0,tp_dst=0xea60/0xffe0,table=55,idle_timeout=0,actions=drop",
            ),
        ];

        for (flow, want) in cases {
            assert_eq!(flow.marshal().unwrap(), want);
        }
    }

    #[test]
    fn unmarshal_rejections() {
        assert_eq!(Flow::unmarshal(""), Err(FlowError::NoActions));
        assert_eq!(Flow::unmarshal("priority=10,actions"), Err(FlowError::NoActions));
        assert_eq!(Flow::unmarshal("priority=10,actions="), Err(FlowError::NoActions));
        assert!(matches!(
            Flow::unmarshal("actions=drop,priority=10"),
            Err(FlowError::InvalidActions(_))
        ));
        assert!(matches!(
            Flow::unmarshal("priority=10,actions=resubmit("),
            Err(FlowError::InvalidActions(_))
        ));
        assert!(matches!(
            Flow::unmarshal("priority=10,actions=resubmit(,1"),
            Err(FlowError::InvalidActions(_))
        ));
        assert_eq!(
            Flow::unmarshal("priority=0,table=0,idle_timeout=0,actions=drop,output:1"),
            Err(FlowError::ActionsWithDrop)
        );
        assert!(matches!(
            Flow::unmarshal("priority=foo,actions=drop"),
            Err(FlowError::InvalidField {
                field: "priority",
                ..
            })
        ));
        assert!(matches!(
            Flow::unmarshal("priority=10,table=0,cookie=foo,actions=drop"),
            Err(FlowError::InvalidField { field: "cookie", .. })
        ));
        assert!(matches!(
            Flow::unmarshal("priority=10,in_port=foo,table=0,actions=drop"),
            Err(FlowError::InvalidField {
                field: "in_port",
                ..
            })
        ));
    }

    #[test]
    fn unmarshal_round_trips_own_output() {
        let flows = [
            Flow {
                actions: vec![Action::Drop],
                ..Default::default()
            },
            Flow {
                cookie: 255,
                actions: vec![Action::Drop],
                ..Default::default()
            },
            Flow {
                priority: 2005,
                in_port: crate::PORT_LOCAL,
                actions: vec![Action::resubmit(0, 1)],
                ..Default::default()
            },
            Flow {
                priority: 1005,
                protocol: Some(Protocol::Arp),
                matches: vec![
                    Match::ArpTargetHardwareAddress(mac("aa:bb:cc:dd:ee:ff")),
                    Match::ArpTargetProtocolAddress("169.254.0.0/16".to_string()),
                ],
                table: 1,
                actions: vec![Action::Output(64)],
                ..Default::default()
            },
            Flow {
                priority: 3000,
                protocol: Some(Protocol::Tcpv6),
                in_port: 15,
                matches: vec![Match::TransportDestinationPort(465)],
                actions: vec![Action::Drop],
                ..Default::default()
            },
            Flow {
                priority: 4010,
                protocol: Some(Protocol::Tcpv4),
                matches: vec![
                    Match::ConnectionTrackingState(vec![
                        StateFlag::set(CtState::Tracked),
                        StateFlag::set(CtState::New),
                    ]),
                    Match::NetworkDestination("192.0.2.1".to_string()),
                    Match::TransportDestinationPort(22),
                ],
                table: 45,
                actions: vec![
                    Action::ct("commit,exec(set_field:1->ct_label,set_field:1->ct_mark)"),
                    Action::resubmit(0, 1),
                ],
                ..Default::default()
            },
            Flow {
                priority: 3000,
                protocol: Some(Protocol::Tcpv4),
                in_port: 72,
                matches: vec![
                    Match::TransportSourceMaskedPort(60000, 0xffe0),
                    Match::TransportDestinationMaskedPort(0xea60, 0xffe0),
                ],
                actions: vec![Action::Drop],
                ..Default::default()
            },
        ];

        for flow in flows {
            let text = flow.marshal().unwrap();
            let parsed = Flow::unmarshal(&text).unwrap();
            assert_eq!(parsed, flow, "round trip of {text:?}");
        }
    }

    #[test]
    fn unmarshal_hex_cookies() {
        for (s, cookie) in [
            ("priority=0,table=0,idle_timeout=0,cookie=10,actions=drop", 10),
            ("priority=0,table=0,idle_timeout=0,cookie=0xff,actions=drop", 255),
            (
                "priority=0,table=0,idle_timeout=0,cookie=0x00000000000000ff,actions=drop",
                255,
            ),
            (
                "priority=0,table=0,idle_timeout=0,cookie=0xff00000000000000,actions=drop",
                0xff00_0000_0000_0000,
            ),
        ] {
            assert_eq!(Flow::unmarshal(s).unwrap().cookie, cookie);
        }
    }

    #[test]
    fn unmarshal_dump_flows_lines() {
        let f = Flow::unmarshal(
            " cookie=0x0, duration=9215.748s, table=0, n_packets=6, n_bytes=480, idle_age=9206, hard_age=65535, priority=820,in_port=LOCAL actions=mod_vlan_vid:10,output:1",
        )
        .unwrap();
        assert_eq!(
            f,
            Flow {
                priority: 820,
                in_port: crate::PORT_LOCAL,
                actions: vec![Action::ModVlanVid(10), Action::Output(1)],
                ..Default::default()
            }
        );

        let f = Flow::unmarshal(
            " cookie=0x0, duration=920420.008s, table=55, n_packets=0, n_bytes=0, priority=1010,ct_state=+new+trk,tcp,dl_dst=f1:f2:f3:f4:f5:f6,tp_dst=80 actions=ct(commit,table=65,exec(load:0x1fb5fce->NXM_NX_CT_MARK[]))",
        )
        .unwrap();
        assert_eq!(
            f,
            Flow {
                priority: 1010,
                protocol: Some(Protocol::Tcpv4),
                matches: vec![
                    Match::ConnectionTrackingState(vec![
                        StateFlag::set(CtState::New),
                        StateFlag::set(CtState::Tracked),
                    ]),
                    Match::DataLinkDestination("f1:f2:f3:f4:f5:f6".to_string()),
                    Match::TransportDestinationPort(80),
                ],
                table: 55,
                actions: vec![Action::ct(
                    "commit,table=65,exec(load:0x1fb5fce->NXM_NX_CT_MARK[])"
                )],
                ..Default::default()
            }
        );

        let f = Flow::unmarshal(
            " cookie=0x0, duration=13.265s, table=12, n_packets=0, n_bytes=0, idle_age=13, priority=1010,tcp,tcp_flags=+syn-psh+ack actions=resubmit(,13)",
        )
        .unwrap();
        assert_eq!(
            f.matches,
            vec![Match::TcpFlags(vec![
                TcpFlagMatch::set(TcpFlag::Syn),
                TcpFlagMatch::unset(TcpFlag::Psh),
                TcpFlagMatch::set(TcpFlag::Ack),
            ])]
        );
        assert_eq!(f.table, 12);
    }

    #[test]
    fn match_flow_derivation() {
        let f = Flow {
            priority: 4010,
            protocol: Some(Protocol::Tcpv4),
            matches: vec![
                Match::NetworkDestination("192.0.2.1".to_string()),
                Match::TransportDestinationPort(22),
            ],
            table: 45,
            cookie: 7,
            actions: vec![Action::resubmit(0, 1)],
            ..Default::default()
        };

        let m = f.match_flow();
        assert_eq!(
            m,
            MatchFlow {
                cookie: 7,
                protocol: Some(Protocol::Tcpv4),
                matches: f.matches.clone(),
                table: 45,
                ..Default::default()
            }
        );
    }

    #[test]
    fn match_flow_marshal() {
        assert_eq!(
            MatchFlow {
                table: crate::ANY_TABLE,
                ..Default::default()
            }
            .marshal(),
            Err(MatchFlowError::Empty)
        );

        let cases = [
            (
                MatchFlow {
                    cookie: 10,
                    table: crate::ANY_TABLE,
                    ..Default::default()
                },
                "cookie=0x000000000000000a/-1",
            ),
            (
                MatchFlow {
                    cookie: 0x1,
                    cookie_mask: 0xf,
                    table: crate::ANY_TABLE,
                    ..Default::default()
                },
                "cookie=0x0000000000000001/0x000000000000000f",
            ),
            (
                MatchFlow {
                    in_port: crate::PORT_LOCAL,
                    ..Default::default()
                },
                "in_port=LOCAL,table=0",
            ),
            (
                MatchFlow {
                    protocol: Some(Protocol::Arp),
                    matches: vec![
                        Match::ArpTargetHardwareAddress(mac("aa:bb:cc:dd:ee:ff")),
                        Match::ArpTargetProtocolAddress("169.254.0.0/16".to_string()),
                    ],
                    table: 1,
                    ..Default::default()
                },
                "arp,arp_tha=aa:bb:cc:dd:ee:ff,arp_tpa=169.254.0.0/16,table=1",
            ),
            (
                MatchFlow {
                    protocol: Some(Protocol::Udpv4),
                    in_port: 33,
                    matches: vec![
                        Match::NetworkDestination("192.0.2.1".to_string()),
                        Match::TransportDestinationMaskedPort(0xea60, 0xffe0),
                    ],
                    table: 55,
                    ..Default::default()
                },
                "udp,in_port=33,nw_dst=192.0.2.1,tp_dst=0xea60/0xffe0,table=55",
            ),
        ];

        for (m, want) in cases {
            assert_eq!(m.marshal().unwrap(), want);
        }
    }

    #[test]
    fn match_flow_round_trips_own_output() {
        let flows = [
            MatchFlow {
                cookie: 10,
                table: crate::ANY_TABLE,
                ..Default::default()
            },
            MatchFlow {
                cookie: 0x1,
                cookie_mask: 0xf,
                table: crate::ANY_TABLE,
                ..Default::default()
            },
            MatchFlow {
                in_port: crate::PORT_LOCAL,
                ..Default::default()
            },
            MatchFlow {
                protocol: Some(Protocol::Tcpv4),
                matches: vec![
                    Match::ConnectionTrackingState(vec![
                        StateFlag::set(CtState::Tracked),
                        StateFlag::set(CtState::New),
                    ]),
                    Match::NetworkDestination("192.0.2.1".to_string()),
                    Match::TransportDestinationPort(22),
                ],
                table: 45,
                ..Default::default()
            },
            MatchFlow {
                protocol: Some(Protocol::Udpv4),
                in_port: 33,
                matches: vec![Match::TransportDestinationMaskedPort(0xea60, 0xffe0)],
                table: 55,
                ..Default::default()
            },
        ];

        for mf in flows {
            let text = mf.marshal().unwrap();
            let parsed = MatchFlow::unmarshal(&text).unwrap();
            assert_eq!(parsed, mf, "round trip of {text:?}");
        }
    }

    #[test]
    fn match_flow_unmarshal_rejections() {
        assert_eq!(MatchFlow::unmarshal(""), Err(MatchFlowError::Empty));
        assert_eq!(MatchFlow::unmarshal("table=0"), Err(MatchFlowError::Empty));
        assert!(matches!(
            MatchFlow::unmarshal("cookie=foo/-1"),
            Err(MatchFlowError::InvalidField { field: "cookie", .. })
        ));
        assert!(matches!(
            MatchFlow::unmarshal("bogus,table=1"),
            Err(MatchFlowError::InvalidField {
                field: "protocol",
                ..
            })
        ));
    }
}
