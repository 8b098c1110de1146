// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parsers for textual flow fragments.
//!
//! Action lists are split on commas only at parenthesis depth zero; the
//! grammar is not regular (`ct(commit,exec(set_field:1->ct_label))`), so the
//! tokenizer is a small state machine over characters rather than a regex.

use crate::action::{Action, ActionError};
use crate::learn::LearnedFlow;
use crate::mac::EtherAddr;
use crate::matches::{Match, MatchError, StateFlag, TcpFlagMatch};
use crate::PORT_LOCAL;

/// Splits an action list into top-level tokens, tracking parenthesis depth.
pub(crate) fn tokenize_actions(s: &str) -> Result<Vec<String>, ActionError> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;

    for ch in s.chars() {
        match ch {
            ',' if depth == 0 => {
                tokens.push(std::mem::take(&mut buf));
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ActionError::Invalid(s.to_string()))?;
            }
            _ => {}
        }
        buf.push(ch);
    }

    if depth > 0 {
        return Err(ActionError::Invalid(buf));
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }

    Ok(tokens)
}

/// Parses a comma-separated action list into typed actions.
///
/// # Errors
///
/// Returns an [`ActionError`] for unbalanced parentheses or an unrecognized
/// action token.
pub fn parse_actions(s: &str) -> Result<Vec<Action>, ActionError> {
    tokenize_actions(s)?
        .iter()
        .map(|t| parse_action(t))
        .collect()
}

/// Parses one action token. Recognizers are tried in a fixed order; the
/// first match wins.
pub(crate) fn parse_action(s: &str) -> Result<Action, ActionError> {
    // Keyword constants. The upper-case LOCAL/NORMAL spellings emitted by
    // some OVS versions normalize to lower case on round trip.
    match s.to_lowercase().as_str() {
        "all" => return Ok(Action::All),
        "drop" => return Ok(Action::Drop),
        "flood" => return Ok(Action::Flood),
        "in_port" => return Ok(Action::InPort),
        "local" => return Ok(Action::Local),
        "normal" => return Ok(Action::Normal),
        "strip_vlan" => return Ok(Action::StripVlan),
        "dec_ttl" => return Ok(Action::DecTtl(Vec::new())),
        "ct_clear" => return Ok(Action::CtClear),
        "controller" => {
            return Ok(Action::Controller {
                max_len: 0,
                userdata: String::new(),
            })
        }
        _ => {}
    }

    if let Some(args) = inner_args(s, "ct") {
        if args.is_empty() {
            return Err(ActionError::CtNoArguments);
        }
        return Ok(Action::ConnectionTracking(args.to_string()));
    }

    if let Some(args) = inner_args(s, "conjunction") {
        return parse_conjunction(args).ok_or_else(|| ActionError::NoMatch(s.to_string()));
    }

    if let Some(args) = inner_args(s, "resubmit") {
        return parse_resubmit(args).ok_or_else(|| ActionError::InvalidInteger(s.to_string()));
    }

    if let Some(args) = inner_args(s, "bundle") {
        return parse_bundle(args).ok_or_else(|| ActionError::NoMatch(s.to_string()));
    }

    if let Some(args) = inner_args(s, "multipath") {
        return parse_multipath(args).ok_or_else(|| ActionError::NoMatch(s.to_string()));
    }

    if let Some(args) = inner_args(s, "dec_ttl") {
        let ids = args
            .split(',')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ActionError::InvalidInteger(s.to_string()))?;
        return Ok(Action::DecTtl(ids));
    }

    if let Some(args) = inner_args(s, "controller") {
        let userdata = args
            .strip_prefix("userdata=")
            .ok_or_else(|| ActionError::NoMatch(s.to_string()))?;
        return Ok(Action::Controller {
            max_len: 0,
            userdata: userdata.to_string(),
        });
    }

    if let Some(args) = inner_args(s, "learn") {
        return parse_learned(args).map(|l| Action::Learn(Box::new(l)));
    }

    if let Some(rest) = s.strip_prefix("mod_dl_dst:") {
        return Ok(Action::ModDataLinkDestination(EtherAddr::try_from(rest)?));
    }
    if let Some(rest) = s.strip_prefix("mod_dl_src:") {
        return Ok(Action::ModDataLinkSource(EtherAddr::try_from(rest)?));
    }
    if let Some(rest) = s.strip_prefix("mod_nw_dst:") {
        let ip = rest
            .parse()
            .map_err(|_| ActionError::InvalidIpv4(rest.to_string()))?;
        return Ok(Action::ModNetworkDestination(ip));
    }
    if let Some(rest) = s.strip_prefix("mod_nw_src:") {
        let ip = rest
            .parse()
            .map_err(|_| ActionError::InvalidIpv4(rest.to_string()))?;
        return Ok(Action::ModNetworkSource(ip));
    }
    if let Some(rest) = s.strip_prefix("mod_tp_dst:") {
        let port = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::ModTransportDestinationPort(port));
    }
    if let Some(rest) = s.strip_prefix("mod_tp_src:") {
        let port = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::ModTransportSourcePort(port));
    }
    if let Some(rest) = s.strip_prefix("mod_vlan_vid:") {
        let vid = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::ModVlanVid(vid));
    }
    if let Some(rest) = s.strip_prefix("output:") {
        if rest.is_empty() {
            return Err(ActionError::OutputFieldEmpty);
        }
        if rest.bytes().all(|b| b.is_ascii_digit()) {
            let port = rest
                .parse()
                .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
            return Ok(Action::Output(port));
        }
        return Ok(Action::OutputField(rest.to_string()));
    }
    if let Some(rest) = s.strip_prefix("resubmit:") {
        let port: u32 = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::ResubmitPort(port));
    }
    if let Some(rest) = s.strip_prefix("group:") {
        let group = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::Group(group));
    }
    if let Some(rest) = s.strip_prefix("set_tunnel:") {
        let id =
            parse_u64_any(rest).ok_or_else(|| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::SetTunnel(id));
    }
    if let Some(rest) = s.strip_prefix("load:") {
        let (value, field) = arrow_operands(rest).ok_or(ActionError::LoadSetFieldZero)?;
        return Ok(Action::Load {
            value: value.to_string(),
            field: field.to_string(),
        });
    }
    if let Some(rest) = s.strip_prefix("set_field:") {
        let (value, field) = arrow_operands(rest).ok_or(ActionError::LoadSetFieldZero)?;
        return Ok(Action::SetField {
            value: value.to_string(),
            field: field.to_string(),
        });
    }
    if let Some(rest) = s.strip_prefix("move:") {
        let (src, dst) = arrow_operands(rest).ok_or(ActionError::MoveEmpty)?;
        return Ok(Action::Move {
            src: src.to_string(),
            dst: dst.to_string(),
        });
    }
    if let Some(rest) = s.strip_prefix("push:") {
        if rest.is_empty() {
            return Err(ActionError::NoMatch(s.to_string()));
        }
        return Ok(Action::Push(rest.to_string()));
    }
    if let Some(rest) = s.strip_prefix("pop:") {
        if rest.is_empty() {
            return Err(ActionError::NoMatch(s.to_string()));
        }
        return Ok(Action::Pop(rest.to_string()));
    }
    if let Some(rest) = s.strip_prefix("controller:") {
        let max_len = rest
            .parse()
            .map_err(|_| ActionError::InvalidInteger(rest.to_string()))?;
        return Ok(Action::Controller {
            max_len,
            userdata: String::new(),
        });
    }

    Err(ActionError::NoMatch(s.to_string()))
}

/// Returns the argument list of `<name>(<args>)`, if `s` has that shape.
fn inner_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Splits `value->field`, requiring both operands non-empty.
fn arrow_operands(s: &str) -> Option<(&str, &str)> {
    let (value, field) = s.split_once("->")?;
    if value.is_empty() || field.is_empty() {
        return None;
    }
    Some((value, field))
}

fn parse_conjunction(args: &str) -> Option<Action> {
    let (id, rest) = args.split_once(',')?;
    let (dimension, total) = rest.split_once('/')?;
    Some(Action::Conjunction {
        id: id.parse().ok()?,
        dimension: dimension.parse().ok()?,
        total: total.parse().ok()?,
    })
}

fn parse_resubmit(args: &str) -> Option<Action> {
    let (port, table) = args.split_once(',')?;
    let port = if port.is_empty() { 0 } else { port.parse().ok()? };
    let table = if table.is_empty() {
        0
    } else {
        table.parse().ok()?
    };
    Some(Action::Resubmit { port, table })
}

fn parse_bundle(args: &str) -> Option<Action> {
    let mut parts = args.splitn(5, ',');
    let fields = parts.next()?;
    let basis = parts.next()?.parse().ok()?;
    let algorithm = parts.next()?;
    if parts.next()? != "ofport" {
        return None;
    }
    let members = parts.next()?.strip_prefix("members:")?;
    let members = members
        .split(',')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    Some(Action::Bundle {
        fields: fields.to_string(),
        basis,
        algorithm: algorithm.to_string(),
        members,
    })
}

fn parse_multipath(args: &str) -> Option<Action> {
    let parts: Vec<&str> = args.split(',').collect();
    let [fields, basis, algorithm, n_links, arg, dst] = parts.as_slice() else {
        return None;
    };
    Some(Action::Multipath {
        fields: (*fields).to_string(),
        basis: basis.parse().ok()?,
        algorithm: (*algorithm).to_string(),
        n_links: n_links.parse().ok()?,
        arg: arg.parse().ok()?,
        dst: (*dst).to_string(),
    })
}

/// Parses the inner template of a `learn(...)` action.
fn parse_learned(args: &str) -> Result<LearnedFlow, ActionError> {
    let mut learned = LearnedFlow::default();
    let invalid = || ActionError::InvalidLearnedActions;

    for token in tokenize_actions(args)? {
        if token == "delete_learned" {
            learned.delete_learned = true;
            continue;
        }

        // Actions of the restricted learn grammar.
        if token.starts_with("load:") || token.starts_with("output:") {
            learned.actions.push(parse_action(&token)?);
            continue;
        }

        let Some((key, value)) = token.split_once('=') else {
            return Err(invalid());
        };
        match key {
            "priority" => learned.priority = value.parse().map_err(|_| invalid())?,
            "in_port" => learned.in_port = value.parse().map_err(|_| invalid())?,
            "table" => learned.table = value.parse().map_err(|_| invalid())?,
            "idle_timeout" => learned.idle_timeout = value.parse().map_err(|_| invalid())?,
            "fin_hard_timeout" => {
                learned.fin_hard_timeout = value.parse().map_err(|_| invalid())?;
            }
            "hard_timeout" => learned.hard_timeout = value.parse().map_err(|_| invalid())?,
            "limit" => learned.limit = value.parse().map_err(|_| invalid())?,
            "cookie" => learned.cookie = parse_u64_any(value).ok_or_else(invalid)?,
            _ => learned
                .matches
                .push(parse_match(key, value).map_err(|_| invalid())?),
        }
    }

    Ok(learned)
}

/// Parses one `key=value` match token into a typed [`Match`].
///
/// The dispatch is closed: a new match field requires a new arm here.
///
/// # Errors
///
/// Returns a [`MatchError`] for unknown keys or malformed values.
#[allow(clippy::too_many_lines)]
pub fn parse_match(key: &str, value: &str) -> Result<Match, MatchError> {
    let invalid = || MatchError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match key {
        "dl_src" => Ok(Match::DataLinkSource(value.to_string())),
        "dl_dst" => Ok(Match::DataLinkDestination(value.to_string())),
        "dl_type" => {
            let ethertype = parse_hex_u16_strict(value).ok_or_else(invalid)?;
            Ok(Match::DataLinkType(ethertype))
        }
        "dl_vlan" => {
            let vlan = if value.starts_with("0x") {
                parse_hex_u16_strict(value).ok_or_else(invalid)?
            } else {
                value.parse().map_err(|_| invalid())?
            };
            Ok(Match::DataLinkVlan(vlan))
        }
        "dl_vlan_pcp" => {
            let pcp = value.parse().map_err(|_| invalid())?;
            Ok(Match::DataLinkVlanPcp(pcp))
        }
        "nw_src" => Ok(Match::NetworkSource(value.to_string())),
        "nw_dst" => Ok(Match::NetworkDestination(value.to_string())),
        "nw_proto" => Ok(Match::NetworkProtocol(
            value.parse().map_err(|_| invalid())?,
        )),
        "ipv6_src" => Ok(Match::Ipv6Source(value.to_string())),
        "ipv6_dst" => Ok(Match::Ipv6Destination(value.to_string())),
        "ipv6_label" => {
            let (label, mask) = parse_value_mask(value, 0x000f_ffff).ok_or_else(invalid)?;
            #[allow(clippy::cast_possible_truncation)]
            let (label, mask) = (label as u32, mask.unwrap_or(0) as u32);
            Ok(Match::Ipv6Label(label, mask))
        }
        "icmp_type" => Ok(Match::IcmpType(value.parse().map_err(|_| invalid())?)),
        "icmp_code" => Ok(Match::IcmpCode(value.parse().map_err(|_| invalid())?)),
        "icmpv6_type" => Ok(Match::Icmp6Type(value.parse().map_err(|_| invalid())?)),
        "icmpv6_code" => Ok(Match::Icmp6Code(value.parse().map_err(|_| invalid())?)),
        "nd_target" => Ok(Match::NeighborDiscoveryTarget(value.to_string())),
        "nd_sll" => Ok(Match::NeighborDiscoverySourceLinkLayer(EtherAddr::try_from(
            value,
        )?)),
        "nd_tll" => Ok(Match::NeighborDiscoveryTargetLinkLayer(EtherAddr::try_from(
            value,
        )?)),
        "arp_sha" => Ok(Match::ArpSourceHardwareAddress(EtherAddr::try_from(value)?)),
        "arp_tha" => Ok(Match::ArpTargetHardwareAddress(EtherAddr::try_from(value)?)),
        "arp_spa" => Ok(Match::ArpSourceProtocolAddress(value.to_string())),
        "arp_tpa" => Ok(Match::ArpTargetProtocolAddress(value.to_string())),
        "arp_op" => Ok(Match::ArpOperation(value.parse().map_err(|_| invalid())?)),
        "tp_src" | "tp_dst" => {
            let src = key == "tp_src";
            if let Some((port, mask)) = value.split_once('/') {
                let port = parse_bounded(port, 0xffff).ok_or_else(invalid)?;
                let mask = parse_bounded(mask, 0xffff).ok_or_else(invalid)?;
                #[allow(clippy::cast_possible_truncation)]
                let (port, mask) = (port as u16, mask as u16);
                if src {
                    Ok(Match::TransportSourceMaskedPort(port, mask))
                } else {
                    Ok(Match::TransportDestinationMaskedPort(port, mask))
                }
            } else {
                let port = value.parse().map_err(|_| invalid())?;
                if src {
                    Ok(Match::TransportSourcePort(port))
                } else {
                    Ok(Match::TransportDestinationPort(port))
                }
            }
        }
        "vlan_tci" | "vlan_tci1" => {
            let (tci, mask) = parse_value_mask(value, 0xffff).ok_or_else(invalid)?;
            #[allow(clippy::cast_possible_truncation)]
            let (tci, mask) = (tci as u16, mask.unwrap_or(0) as u16);
            if key == "vlan_tci" {
                Ok(Match::VlanTci(tci, mask))
            } else {
                Ok(Match::VlanTci1(tci, mask))
            }
        }
        "ct_state" => {
            let flags = split_signed_tokens(value)
                .ok_or_else(invalid)?
                .into_iter()
                .map(StateFlag::parse)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Match::ConnectionTrackingState(flags))
        }
        "ct_mark" => {
            let (mark, mask) = parse_value_mask(value, 0xffff_ffff).ok_or_else(invalid)?;
            #[allow(clippy::cast_possible_truncation)]
            let (mark, mask) = (mark as u32, mask.unwrap_or(0) as u32);
            Ok(Match::ConnectionTrackingMark(mark, mask))
        }
        "ct_zone" => Ok(Match::ConnectionTrackingZone(
            value.parse().map_err(|_| invalid())?,
        )),
        "tcp_flags" => {
            let flags = split_signed_tokens(value)
                .ok_or_else(invalid)?
                .into_iter()
                .map(TcpFlagMatch::parse)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Match::TcpFlags(flags))
        }
        "tun_id" => {
            if let Some((id, mask)) = value.split_once('/') {
                let id = parse_u64_any(id).ok_or_else(invalid)?;
                let mask = parse_u64_any(mask).ok_or_else(invalid)?;
                Ok(Match::TunnelIdWithMask(id, mask))
            } else {
                let id = parse_u64_any(value).ok_or_else(invalid)?;
                Ok(Match::TunnelId(id))
            }
        }
        "metadata" => Ok(Match::Metadata(parse_u64_any(value).ok_or_else(invalid)?)),
        "conj_id" => Ok(Match::ConjunctionId(value.parse().map_err(|_| invalid())?)),
        "in_port" => {
            if value == "LOCAL" {
                Ok(Match::InPort(PORT_LOCAL))
            } else {
                Ok(Match::InPort(value.parse().map_err(|_| invalid())?))
            }
        }
        _ => Err(MatchError::UnknownField {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses `value[/mask]` where each side is decimal or `0x`-hex and at most
/// `max`. More than two parts is an error.
fn parse_value_mask(s: &str, max: u64) -> Option<(u64, Option<u64>)> {
    let mut parts = s.split('/');
    let value = parse_bounded(parts.next()?, max)?;
    let mask = match parts.next() {
        Some(m) => Some(parse_bounded(m, max)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((value, mask))
}

fn parse_bounded(s: &str, max: u64) -> Option<u64> {
    let v = parse_u64_any(s)?;
    (v <= max).then_some(v)
}

/// Parses a decimal or `0x`-prefixed hexadecimal u64.
pub(crate) fn parse_u64_any(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Parses a `0x`-prefixed hexadecimal with exactly four digits, as emitted
/// for two-byte fields.
fn parse_hex_u16_strict(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("0x")?;
    if hex.len() != 4 {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// Splits a `±flag` concatenation (`+syn-ack`) at each sign boundary. The
/// value must begin with a sign.
fn split_signed_tokens(value: &str) -> Option<Vec<&str>> {
    if !value.starts_with(['+', '-']) {
        return None;
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices().skip(1) {
        if c == '+' || c == '-' {
            tokens.push(&value[start..i]);
            start = i;
        }
    }
    tokens.push(&value[start..]);
    Some(tokens)
}
