// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parser for `ovs-appctl ofproto/trace` output.

use flow::{parse_match, Match, Protocol};

use crate::error::Error;

/// The port number `ofproto/trace` reports for `in_port=LOCAL`.
const TRACE_LOCAL_PORT: u32 = 65534;

/// The packet headers at one end of a trace, as printed on the `Flow:` and
/// `Final flow:` lines.
///
/// Trace lines interleave fields this codec does not model (`recirc_id`,
/// `nw_tos`, pipe-separated conntrack state); those are kept in `raw` but
/// not materialized as matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPathFlows {
    /// Protocol class, when the leading token names one.
    pub protocol: Option<Protocol>,
    /// The matches this codec recognizes, in line order.
    pub matches: Vec<Match>,
    /// The unparsed line, verbatim.
    pub raw: String,
}

impl DataPathFlows {
    fn unmarshal(s: &str) -> DataPathFlows {
        let mut flow = DataPathFlows {
            raw: s.to_string(),
            ..Default::default()
        };

        for (i, token) in s.split(',').enumerate() {
            let token = token.trim();
            if i == 0 || !token.contains('=') {
                if let Ok(p) = token.parse::<Protocol>() {
                    flow.protocol = Some(p);
                }
                continue;
            }

            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if key == "in_port" && value == "LOCAL" {
                flow.matches.push(Match::InPort(TRACE_LOCAL_PORT));
                continue;
            }
            if let Ok(m) = parse_match(key, value) {
                flow.matches.push(m);
            }
        }

        flow
    }
}

/// The parsed output of one `ofproto/trace` run.
///
/// Flow actions are collected from the indented lines beneath each numeric
/// table step; across `recirc(...)` resumptions the list is appended in
/// occurrence order, with a `recirc` marker at each resumption boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoTrace {
    /// The packet as it entered the pipeline.
    pub input_flow: Option<DataPathFlows>,
    /// The packet as it left the pipeline; `Final flow: unchanged` repeats
    /// the input flow.
    pub final_flow: Option<DataPathFlows>,
    /// Every flow action traversed, in occurrence order.
    pub flow_actions: Vec<String>,
    /// The terminal `Datapath actions:` line.
    pub datapath_actions: String,
}

impl ProtoTrace {
    /// Parses complete `ofproto/trace` output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProtoTrace`] when no `Datapath actions:`
    /// line is present.
    pub fn unmarshal(s: &str) -> Result<ProtoTrace, Error> {
        let mut trace = ProtoTrace::default();
        let mut in_table_block = false;

        for line in s.lines() {
            let trimmed = line.trim();

            if let Some(actions) = trimmed.strip_prefix("Datapath actions: ") {
                trace.datapath_actions = actions.to_string();
                in_table_block = false;
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("Final flow: ") {
                trace.final_flow = if rest == "unchanged" {
                    trace.input_flow.clone()
                } else {
                    Some(DataPathFlows::unmarshal(rest))
                };
                in_table_block = false;
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("Flow: ") {
                if trace.input_flow.is_none() {
                    trace.input_flow = Some(DataPathFlows::unmarshal(rest));
                }
                in_table_block = false;
                continue;
            }
            if trimmed.starts_with("recirc(") && trimmed.contains(" - resume ") {
                trace.flow_actions.push("recirc".to_string());
                in_table_block = false;
                continue;
            }
            if is_table_step(trimmed) {
                in_table_block = true;
                continue;
            }
            if trimmed.starts_with("Megaflow:") || trimmed.starts_with('=') {
                in_table_block = false;
                continue;
            }

            if in_table_block {
                if trimmed.is_empty() || trimmed.starts_with("->") || trimmed.starts_with(">>") {
                    continue;
                }
                trace.flow_actions.push(trimmed.to_string());
            }
        }

        if trace.datapath_actions.is_empty() {
            return Err(Error::InvalidProtoTrace);
        }
        Ok(trace)
    }
}

/// A numeric pipeline step such as `25. ip,dl_vlan=2, priority 2020`.
fn is_table_step(line: &str) -> bool {
    let Some((head, _)) = line.split_once('.') else {
        return false;
    };
    !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit())
}
