// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed model and textual codec for the Open vSwitch flow language.
//!
//! The crate round-trips between typed [`Flow`]/[`MatchFlow`] values and the
//! comma-separated `key=value` lines consumed and emitted by the OVS command
//! line tools. Parsing and emission are pure; nothing in this crate performs
//! I/O.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod flow;
pub mod learn;
pub mod mac;
pub mod matches;
pub mod portrange;
pub mod protocol;

pub(crate) mod parse;

pub use action::{Action, ActionError};
pub use flow::{Flow, FlowError, MatchFlow, MatchFlowError};
pub use learn::LearnedFlow;
pub use mac::{EtherAddr, MacError};
pub use matches::{CtState, Match, MatchError, StateFlag, TcpFlag, TcpFlagMatch};
pub use parse::{parse_actions, parse_match};
pub use portrange::{
    BitRange, PortRange, PortRangeError, TransportDestinationPortRange, TransportSourcePortRange,
};
pub use protocol::Protocol;

/// The OpenFlow port attached to the bridge's local interface, rendered as
/// the literal token `LOCAL`.
pub const PORT_LOCAL: u32 = 0xffff_fffe;

/// Table sentinel for a [`MatchFlow`] that should match flows in any table.
pub const ANY_TABLE: i32 = -1;

/// The `dl_vlan` value which matches packets with no VLAN tag.
pub const VLAN_NONE: u16 = 0xffff;
