// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed adapter for the `ovs-vsctl` and `ovs-ofctl` command line tools.
//!
//! A [`Client`] composes argv vectors from typed requests, runs them through
//! an injectable [`Executor`], and parses the tools' textual replies back
//! into typed values. The external binary is the serialization point, so a
//! `Client` is freely shareable across threads.

#![deny(clippy::all)]

pub mod client;
pub mod error;
pub mod exec;
pub mod openflow;
pub mod stats;
pub mod trace;
pub mod vswitch;

pub use client::{Client, ClientBuilder};
pub use error::{is_port_not_exist, Error};
pub use exec::{Executor, Piper, SystemExecutor, SystemPiper};
pub use openflow::{FlowTransaction, OpenFlow, PortAction};
pub use stats::{FlowStats, PortStats, PortStatsReceive, PortStatsTransmit, Table};
pub use trace::{DataPathFlows, ProtoTrace};
pub use vswitch::{
    BridgeConfig, BridgeOptions, FailMode, InterfaceOptions, InterfaceType, VSwitch, VSwitchGet,
    VSwitchSet, DEFAULT_INGRESS_BURST_POLICING, DEFAULT_INGRESS_RATE_POLICING,
};

/// OpenFlow protocol version identifiers for the `--protocols` flag.
pub const PROTOCOL_OPENFLOW10: &str = "OpenFlow10";
pub const PROTOCOL_OPENFLOW11: &str = "OpenFlow11";
pub const PROTOCOL_OPENFLOW12: &str = "OpenFlow12";
pub const PROTOCOL_OPENFLOW13: &str = "OpenFlow13";
pub const PROTOCOL_OPENFLOW14: &str = "OpenFlow14";
pub const PROTOCOL_OPENFLOW15: &str = "OpenFlow15";

/// Flow formats for the `--flow-format` flag.
pub const FLOW_FORMAT_NXM_TABLE_ID: &str = "NXM+table_id";
pub const FLOW_FORMAT_OXM_OPENFLOW14: &str = "OXM-OpenFlow14";
