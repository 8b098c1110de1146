// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `ovs-vsctl` operations: bridges, ports, interfaces, controllers.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::client::Client;
use crate::error::Error;

const VSCTL: &str = "ovs-vsctl";

/// The failure mode Open vSwitch uses when it cannot contact a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Fall back to standalone L2 switching.
    Standalone,
    /// Drop all traffic until a controller returns.
    Secure,
}

impl FailMode {
    /// The configuration token for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FailMode::Standalone => "standalone",
            FailMode::Secure => "secure",
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(FailMode::Standalone),
            "secure" => Ok(FailMode::Secure),
            other => Err(Error::UnknownFailMode(other.to_string())),
        }
    }
}

/// A network interface type recognized by Open vSwitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Gre,
    Internal,
    Patch,
    Stt,
    Vxlan,
}

impl InterfaceType {
    /// The configuration token for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceType::Gre => "gre",
            InterfaceType::Internal => "internal",
            InterfaceType::Patch => "patch",
            InterfaceType::Stt => "stt",
            InterfaceType::Vxlan => "vxlan",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentinel for [`InterfaceOptions::ingress_rate_policing`] which explicitly
/// resets the rate to zero (disabled) instead of leaving it untouched.
pub const DEFAULT_INGRESS_RATE_POLICING: i64 = -1;

/// Sentinel for [`InterfaceOptions::ingress_burst_policing`] which
/// explicitly resets the burst to zero.
pub const DEFAULT_INGRESS_BURST_POLICING: i64 = -1;

/// Options applied by `ovs-vsctl set interface`.
///
/// Fields render in a fixed order when non-default: type, peer, remote IP,
/// key, ingress rate, ingress burst.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceOptions {
    /// Interface type (`type=<t>`).
    pub r#type: Option<InterfaceType>,
    /// Patch peer (`options:peer=<p>`).
    pub peer: Option<String>,
    /// Tunnel remote endpoint (`options:remote_ip=<r>`); `flow` defers to
    /// the flow table.
    pub remote_ip: Option<String>,
    /// Tunnel key (`options:key=<k>`); `flow` defers to the flow table.
    pub key: Option<String>,
    /// Ingress policing rate in kbps. Zero leaves the rate untouched;
    /// [`DEFAULT_INGRESS_RATE_POLICING`] emits an explicit `=0`.
    pub ingress_rate_policing: i64,
    /// Ingress policing burst in kb. Zero leaves the burst untouched;
    /// [`DEFAULT_INGRESS_BURST_POLICING`] emits an explicit `=0`.
    pub ingress_burst_policing: i64,
}

impl InterfaceOptions {
    /// Renders the options as `ovs-vsctl set interface` arguments.
    #[must_use]
    pub fn slice(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(t) = self.r#type {
            out.push(format!("type={t}"));
        }
        if let Some(peer) = &self.peer {
            out.push(format!("options:peer={peer}"));
        }
        if let Some(remote_ip) = &self.remote_ip {
            out.push(format!("options:remote_ip={remote_ip}"));
        }
        if let Some(key) = &self.key {
            out.push(format!("options:key={key}"));
        }
        match self.ingress_rate_policing {
            DEFAULT_INGRESS_RATE_POLICING => out.push("ingress_policing_rate=0".to_string()),
            rate if rate > 0 => out.push(format!("ingress_policing_rate={rate}")),
            _ => {}
        }
        match self.ingress_burst_policing {
            DEFAULT_INGRESS_BURST_POLICING => out.push("ingress_policing_burst=0".to_string()),
            burst if burst > 0 => out.push(format!("ingress_policing_burst={burst}")),
            _ => {}
        }
        out
    }
}

/// Options applied by `ovs-vsctl set bridge`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// OpenFlow protocol versions the bridge should speak.
    pub protocols: Vec<String>,
}

impl BridgeOptions {
    /// Renders the options as `ovs-vsctl set bridge` arguments.
    #[must_use]
    pub fn slice(&self) -> Vec<String> {
        if self.protocols.is_empty() {
            return Vec::new();
        }
        vec![format!("protocols={}", self.protocols.join(","))]
    }
}

/// Bridge state read back by `ovs-vsctl get bridge`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// OpenFlow protocol versions the bridge speaks.
    pub protocols: Vec<String>,
}

/// `ovs-vsctl` operations on a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct VSwitch<'a> {
    client: &'a Client,
}

impl<'a> VSwitch<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        VSwitch { client }
    }

    /// `ovs-vsctl --may-exist add-br <bridge>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn add_bridge(&self, bridge: &str) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["--may-exist", "add-br", bridge])
            .map(|_| ())
    }

    /// `ovs-vsctl --if-exists del-br <bridge>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn delete_bridge(&self, bridge: &str) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["--if-exists", "del-br", bridge])
            .map(|_| ())
    }

    /// `ovs-vsctl --may-exist add-port <bridge> <port>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn add_port(&self, bridge: &str, port: &str) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["--may-exist", "add-port", bridge, port])
            .map(|_| ())
    }

    /// `ovs-vsctl --if-exists del-port <bridge> <port>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure; check with
    /// [`crate::is_port_not_exist`] for the idempotent case.
    pub fn delete_port(&self, bridge: &str, port: &str) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["--if-exists", "del-port", bridge, port])
            .map(|_| ())
    }

    /// `ovs-vsctl set-controller <bridge> <address>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn set_controller(&self, bridge: &str, address: &str) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["set-controller", bridge, address])
            .map(|_| ())
    }

    /// `ovs-vsctl get-controller <bridge>`, trimmed.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn get_controller(&self, bridge: &str) -> Result<String, Error> {
        let out = self.client.exec(VSCTL, &["get-controller", bridge])?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// `ovs-vsctl set-fail-mode <bridge> <mode>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn set_fail_mode(&self, bridge: &str, mode: FailMode) -> Result<(), Error> {
        self.client
            .exec(VSCTL, &["set-fail-mode", bridge, mode.as_str()])
            .map(|_| ())
    }

    /// `ovs-vsctl get-fail-mode <bridge>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure, or
    /// [`Error::UnknownFailMode`] for an unrecognized reply.
    pub fn get_fail_mode(&self, bridge: &str) -> Result<FailMode, Error> {
        let out = self.client.exec(VSCTL, &["get-fail-mode", bridge])?;
        String::from_utf8_lossy(&out).trim().parse()
    }

    /// `ovs-vsctl list-br`: all bridge names, one per line.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn list_bridges(&self) -> Result<Vec<String>, Error> {
        let out = self.client.exec(VSCTL, &["list-br"])?;
        Ok(lines(&out))
    }

    /// `ovs-vsctl list-ports <bridge>`: all port names on the bridge.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn list_ports(&self, bridge: &str) -> Result<Vec<String>, Error> {
        let out = self.client.exec(VSCTL, &["list-ports", bridge])?;
        Ok(lines(&out))
    }

    /// `ovs-vsctl port-to-br <port>`: the bridge which owns `port`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn port_to_bridge(&self, port: &str) -> Result<String, Error> {
        let out = self.client.exec(VSCTL, &["port-to-br", port])?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// Read operations on the configuration database.
    #[must_use]
    pub fn get(&self) -> VSwitchGet<'a> {
        VSwitchGet {
            client: self.client,
        }
    }

    /// Write operations on the configuration database.
    #[must_use]
    pub fn set(&self) -> VSwitchSet<'a> {
        VSwitchSet {
            client: self.client,
        }
    }
}

/// `ovs-vsctl get` operations.
#[derive(Debug, Clone, Copy)]
pub struct VSwitchGet<'a> {
    client: &'a Client,
}

impl VSwitchGet<'_> {
    /// `ovs-vsctl --format=json get bridge <bridge> protocols`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure, or [`Error::Json`] for an
    /// undecodable reply.
    pub fn bridge(&self, bridge: &str) -> Result<BridgeConfig, Error> {
        let out = self
            .client
            .exec(VSCTL, &["--format=json", "get", "bridge", bridge, "protocols"])?;
        let protocols: Vec<String> = serde_json::from_slice(&out)?;
        Ok(BridgeConfig { protocols })
    }
}

/// `ovs-vsctl set` operations.
#[derive(Debug, Clone, Copy)]
pub struct VSwitchSet<'a> {
    client: &'a Client,
}

impl VSwitchSet<'_> {
    /// `ovs-vsctl set bridge <bridge> <options…>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn bridge(&self, bridge: &str, options: &BridgeOptions) -> Result<(), Error> {
        let mut args = vec!["set".to_string(), "bridge".to_string(), bridge.to_string()];
        args.extend(options.slice());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.client.exec(VSCTL, &refs).map(|_| ())
    }

    /// `ovs-vsctl set interface <interface> <options…>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn interface(&self, interface: &str, options: &InterfaceOptions) -> Result<(), Error> {
        let mut args = vec![
            "set".to_string(),
            "interface".to_string(),
            interface.to_string(),
        ];
        args.extend(options.slice());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.client.exec(VSCTL, &refs).map(|_| ())
    }
}

/// Splits command output into trimmed, non-empty lines.
fn lines(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testutil::{test_client, test_client_result};
    use crate::client::Client;

    #[test]
    fn add_and_delete() {
        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "--may-exist", "add-br", "br0"],
            b"",
        )
        .vswitch()
        .add_bridge("br0")
        .unwrap();

        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "--if-exists", "del-br", "br0"],
            b"",
        )
        .vswitch()
        .delete_bridge("br0")
        .unwrap();

        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "--may-exist", "add-port", "br0", "bond0"],
            b"",
        )
        .vswitch()
        .add_port("br0", "bond0")
        .unwrap();

        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "--if-exists", "del-port", "br0", "bond0"],
            b"",
        )
        .vswitch()
        .delete_port("br0", "bond0")
        .unwrap();
    }

    #[test]
    fn delete_port_surfaces_exec_error() {
        let c = test_client_result(
            |b| b,
            "ovs-vsctl",
            &["--if-exists", "del-port", "foo", "bar"],
            Err(Error::Exec {
                code: 1,
                output: b"ovs-vsctl: no port named bar".to_vec(),
            }),
        );
        let err = c.vswitch().delete_port("foo", "bar").unwrap_err();
        assert!(crate::is_port_not_exist(&err));
    }

    #[test]
    fn controller_round_trip() {
        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "set-controller", "br0", "pssl:6653:127.0.0.1"],
            b"",
        )
        .vswitch()
        .set_controller("br0", "pssl:6653:127.0.0.1")
        .unwrap();

        let addr = test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "get-controller", "br0"],
            b"pssl:6653:127.0.0.1\n",
        )
        .vswitch()
        .get_controller("br0")
        .unwrap();
        assert_eq!(addr, "pssl:6653:127.0.0.1");
    }

    #[test]
    fn fail_mode_round_trip() {
        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "set-fail-mode", "br0", "secure"],
            b"",
        )
        .vswitch()
        .set_fail_mode("br0", FailMode::Secure)
        .unwrap();

        let mode = test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "get-fail-mode", "br0"],
            b"secure\n",
        )
        .vswitch()
        .get_fail_mode("br0")
        .unwrap();
        assert_eq!(mode, FailMode::Secure);
    }

    #[test]
    fn list_ports_splits_lines() {
        let ports = test_client(|b| b, "ovs-vsctl", &["list-ports", "br0"], b"bond0\n")
            .vswitch()
            .list_ports("br0")
            .unwrap();
        assert_eq!(ports, vec!["bond0"]);

        let ports = test_client(
            |b| b,
            "ovs-vsctl",
            &["list-ports", "br0"],
            b"bond0\neth0\neth1",
        )
        .vswitch()
        .list_ports("br0")
        .unwrap();
        assert_eq!(ports, vec!["bond0", "eth0", "eth1"]);
    }

    #[test]
    fn list_bridges_splits_lines() {
        let bridges = test_client(|b| b, "ovs-vsctl", &["list-br"], b"br0\nbr1")
            .vswitch()
            .list_bridges()
            .unwrap();
        assert_eq!(bridges, vec!["br0", "br1"]);
    }

    #[test]
    fn port_to_bridge_trims() {
        let br = test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "port-to-br", "bond0"],
            b"\n\n  br0\t\n ",
        )
        .vswitch()
        .port_to_bridge("bond0")
        .unwrap();
        assert_eq!(br, "br0");
    }

    #[test]
    fn get_bridge_parses_json() {
        let cfg = test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &[
                "--timeout=1",
                "--format=json",
                "get",
                "bridge",
                "br0",
                "protocols",
            ],
            b"[\"OpenFlow10\", \"OpenFlow13\"]\n",
        )
        .vswitch()
        .get()
        .bridge("br0")
        .unwrap();
        assert_eq!(cfg.protocols, vec!["OpenFlow10", "OpenFlow13"]);
    }

    #[test]
    fn set_bridge_protocols() {
        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &[
                "--timeout=1",
                "set",
                "bridge",
                "br0",
                "protocols=OpenFlow10,OpenFlow11,OpenFlow12,OpenFlow13,OpenFlow14,OpenFlow15",
            ],
            b"",
        )
        .vswitch()
        .set()
        .bridge(
            "br0",
            &BridgeOptions {
                protocols: vec![
                    crate::PROTOCOL_OPENFLOW10.to_string(),
                    crate::PROTOCOL_OPENFLOW11.to_string(),
                    crate::PROTOCOL_OPENFLOW12.to_string(),
                    crate::PROTOCOL_OPENFLOW13.to_string(),
                    crate::PROTOCOL_OPENFLOW14.to_string(),
                    crate::PROTOCOL_OPENFLOW15.to_string(),
                ],
            },
        )
        .unwrap();
    }

    #[test]
    fn set_interface_full_ordering() {
        test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &[
                "--timeout=1",
                "set",
                "interface",
                "bond0",
                "type=patch",
                "options:peer=eth0",
                "ingress_policing_rate=0",
                "ingress_policing_burst=0",
            ],
            b"",
        )
        .vswitch()
        .set()
        .interface(
            "bond0",
            &InterfaceOptions {
                r#type: Some(InterfaceType::Patch),
                peer: Some("eth0".to_string()),
                ingress_rate_policing: DEFAULT_INGRESS_RATE_POLICING,
                ingress_burst_policing: DEFAULT_INGRESS_BURST_POLICING,
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn interface_options_slices() {
        let cases: Vec<(InterfaceOptions, Vec<&str>)> = vec![
            (InterfaceOptions::default(), vec![]),
            (
                InterfaceOptions {
                    r#type: Some(InterfaceType::Patch),
                    ..Default::default()
                },
                vec!["type=patch"],
            ),
            (
                InterfaceOptions {
                    peer: Some("bond0".to_string()),
                    ..Default::default()
                },
                vec!["options:peer=bond0"],
            ),
            (
                InterfaceOptions {
                    ingress_rate_policing: 2_000_000,
                    ..Default::default()
                },
                vec!["ingress_policing_rate=2000000"],
            ),
            (
                InterfaceOptions {
                    ingress_rate_policing: DEFAULT_INGRESS_RATE_POLICING,
                    ..Default::default()
                },
                vec!["ingress_policing_rate=0"],
            ),
            (
                InterfaceOptions {
                    ingress_burst_policing: 200_000,
                    ..Default::default()
                },
                vec!["ingress_policing_burst=200000"],
            ),
            (
                InterfaceOptions {
                    ingress_burst_policing: DEFAULT_INGRESS_BURST_POLICING,
                    ..Default::default()
                },
                vec!["ingress_policing_burst=0"],
            ),
            (
                InterfaceOptions {
                    r#type: Some(InterfaceType::Stt),
                    remote_ip: Some("flow".to_string()),
                    key: Some("flow".to_string()),
                    ..Default::default()
                },
                vec!["type=stt", "options:remote_ip=flow", "options:key=flow"],
            ),
            (
                InterfaceOptions {
                    r#type: Some(InterfaceType::Patch),
                    peer: Some("bond0".to_string()),
                    ingress_rate_policing: 2_000_000,
                    ingress_burst_policing: 200_000,
                    ..Default::default()
                },
                vec![
                    "type=patch",
                    "options:peer=bond0",
                    "ingress_policing_rate=2000000",
                    "ingress_policing_burst=200000",
                ],
            ),
        ];

        for (opts, want) in cases {
            assert_eq!(opts.slice(), want);
        }
    }

    #[test]
    fn sudo_applies_to_vsctl() {
        test_client(
            |b| b.sudo(),
            "sudo",
            &["ovs-vsctl", "--may-exist", "add-br", "br0"],
            b"",
        )
        .vswitch()
        .add_bridge("br0")
        .unwrap();
    }

    #[test]
    fn builder_flag_sets() {
        let b = Client::builder().timeout(2);
        assert_eq!(b.build().flags, vec!["--timeout=2"]);

        let b = Client::builder().flow_format(crate::FLOW_FORMAT_NXM_TABLE_ID);
        assert_eq!(b.build().ofctl_flags, vec!["--flow-format=NXM+table_id"]);

        let b = Client::builder().protocols(&[crate::PROTOCOL_OPENFLOW14]);
        assert_eq!(b.build().ofctl_flags, vec!["--protocols=OpenFlow14"]);
    }
}
