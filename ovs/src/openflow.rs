// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `ovs-ofctl` operations: flows, bundles, ports, tables.

use std::fmt::Write;

use flow::{Flow, MatchFlow};

use crate::client::Client;
use crate::error::Error;
use crate::stats::{FlowStats, PortStats, Table};

const OFCTL: &str = "ovs-ofctl";

const DUMP_PORTS_PREFIX: &str = "OFPST_PORT reply";
const DUMP_TABLES_PREFIX: &str = "OFPST_TABLE reply";
const DUMP_FLOWS_PREFIXES: [&str; 2] = ["NXST_FLOW reply", "OFPST_FLOW reply"];

/// A port characteristic toggled by `ovs-ofctl mod-port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAction {
    Up,
    Down,
    Stp,
    NoStp,
    Receive,
    NoReceive,
    ReceiveStp,
    NoReceiveStp,
    Forward,
    NoForward,
    Flood,
    NoFlood,
    PacketIn,
    NoPacketIn,
}

impl PortAction {
    /// The keyword passed to `mod-port`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PortAction::Up => "up",
            PortAction::Down => "down",
            PortAction::Stp => "stp",
            PortAction::NoStp => "no-stp",
            PortAction::Receive => "receive",
            PortAction::NoReceive => "no-receive",
            PortAction::ReceiveStp => "receive-stp",
            PortAction::NoReceiveStp => "no-receive-stp",
            PortAction::Forward => "forward",
            PortAction::NoForward => "no-forward",
            PortAction::Flood => "flood",
            PortAction::NoFlood => "no-flood",
            PortAction::PacketIn => "packet-in",
            PortAction::NoPacketIn => "no-packet-in",
        }
    }
}

/// `ovs-ofctl` operations on a [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct OpenFlow<'a> {
    client: &'a Client,
}

impl<'a> OpenFlow<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        OpenFlow { client }
    }

    /// `ovs-ofctl add-flow <bridge> <flow>`.
    ///
    /// # Errors
    ///
    /// Returns the flow's render error without spawning, or the wrapped
    /// exec error on failure.
    pub fn add_flow(&self, bridge: &str, f: &Flow) -> Result<(), Error> {
        let rendered = f.marshal()?;
        let mut args = vec!["add-flow"];
        args.extend(self.client.ofctl_flags.iter().map(String::as_str));
        args.push(bridge);
        args.push(&rendered);
        self.client.exec(OFCTL, &args).map(|_| ())
    }

    /// `ovs-ofctl del-flows <bridge> [<match>]`; a `None` match flushes
    /// every flow on the bridge.
    ///
    /// # Errors
    ///
    /// Returns the predicate's render error without spawning, or the
    /// wrapped exec error on failure.
    pub fn del_flows(&self, bridge: &str, m: Option<&MatchFlow>) -> Result<(), Error> {
        let rendered = m.map(MatchFlow::marshal).transpose()?;
        let mut args = vec!["del-flows", bridge];
        if let Some(rendered) = &rendered {
            args.push(rendered);
        }
        self.client.exec(OFCTL, &args).map(|_| ())
    }

    /// `ovs-ofctl mod-port <bridge> <port> <action>`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped exec error on failure.
    pub fn mod_port(&self, bridge: &str, port: &str, action: PortAction) -> Result<(), Error> {
        self.client
            .exec(OFCTL, &["mod-port", bridge, port, action.as_str()])
            .map(|_| ())
    }

    /// `ovs-ofctl dump-ports <bridge> <port>`: statistics for one port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultipleValues`] when the tool reports more than
    /// one port, [`Error::UnexpectedEof`] for truncated output.
    pub fn dump_port(&self, bridge: &str, port: &str) -> Result<PortStats, Error> {
        let args = self.ofctl_prefixed(&["dump-ports", bridge, port]);
        let out = self.client.exec(OFCTL, &to_refs(&args))?;
        let mut stats = parse_port_stats(&out)?;
        match stats.len() {
            1 => Ok(stats.remove(0)),
            0 => Err(Error::UnexpectedEof),
            _ => Err(Error::MultipleValues),
        }
    }

    /// `ovs-ofctl dump-ports <bridge>`: statistics for every port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] when the reply header or an rx/tx
    /// pair is missing, or a stats parse error.
    pub fn dump_ports(&self, bridge: &str) -> Result<Vec<PortStats>, Error> {
        let args = self.ofctl_prefixed(&["dump-ports", bridge]);
        let out = self.client.exec(OFCTL, &to_refs(&args))?;
        parse_port_stats(&out)
    }

    /// `ovs-ofctl dump-tables <bridge>`. The phantom trailing table OVS
    /// always reports is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEof`] for truncated output or a table
    /// parse error.
    pub fn dump_tables(&self, bridge: &str) -> Result<Vec<Table>, Error> {
        let args = self.ofctl_prefixed(&["dump-tables", bridge]);
        let out = self.client.exec(OFCTL, &to_refs(&args))?;
        parse_tables(&out)
    }

    /// `ovs-ofctl dump-flows <bridge>`: every flow installed on the bridge.
    ///
    /// # Errors
    ///
    /// Returns a flow parse error for an undecodable line.
    pub fn dump_flows(&self, bridge: &str) -> Result<Vec<Flow>, Error> {
        let args = self.ofctl_prefixed(&["dump-flows", bridge]);
        let out = self.client.exec(OFCTL, &to_refs(&args))?;
        parse_flows(&out)
    }

    /// `ovs-ofctl dump-aggregate <bridge> [<match>]`: aggregate packet and
    /// byte counts for the matching flows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFlowStats`] for an unexpected reply shape.
    pub fn dump_aggregate(&self, bridge: &str, m: Option<&MatchFlow>) -> Result<FlowStats, Error> {
        let rendered = m.map(MatchFlow::marshal).transpose()?;
        let mut args = self.ofctl_prefixed(&["dump-aggregate", bridge]);
        if let Some(rendered) = rendered {
            args.push(rendered);
        }
        let out = self.client.exec(OFCTL, &to_refs(&args))?;
        let text = String::from_utf8_lossy(&out);
        FlowStats::unmarshal(text.trim())
    }

    /// Applies a batch of flow additions and deletions atomically via
    /// `ovs-ofctl --bundle add-flow <bridge> -`, with the bundle text
    /// streamed on stdin.
    ///
    /// The callback must finish with [`FlowTransaction::commit`]; returning
    /// without committing yields [`Error::NotCommitted`]. A flow which
    /// fails to render aborts the transaction before any process spawns.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, a buffered render error surfaced by
    /// commit, or the wrapped exec error on failure.
    pub fn add_flow_bundle<F>(&self, bridge: &str, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut FlowTransaction) -> Result<(), Error>,
    {
        let mut tx = FlowTransaction::default();
        f(&mut tx)?;
        if !tx.committed {
            return Err(Error::NotCommitted);
        }

        let mut args = vec!["--bundle".to_string(), "add-flow".to_string()];
        args.extend(self.client.ofctl_flags.iter().cloned());
        args.push(bridge.to_string());
        args.push("-".to_string());
        self.client
            .pipe(tx.buf.as_bytes(), OFCTL, &to_refs(&args))
            .map(|_| ())
    }

    /// ofctl flags precede the dump subcommands.
    fn ofctl_prefixed(&self, args: &[&str]) -> Vec<String> {
        let mut out = self.client.ofctl_flags.clone();
        out.extend(args.iter().map(|s| (*s).to_string()));
        out
    }
}

fn to_refs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

/// An atomically applied batch of flow operations, buffered as `add`/
/// `delete` directives until committed.
#[derive(Debug, Default)]
pub struct FlowTransaction {
    buf: String,
    err: Option<Error>,
    committed: bool,
}

impl FlowTransaction {
    /// Buffers a flow addition. A render failure is recorded and surfaced
    /// by [`FlowTransaction::commit`]; later operations are ignored.
    pub fn add(&mut self, f: &Flow) {
        if self.err.is_some() {
            return;
        }
        match f.marshal() {
            Ok(rendered) => {
                let _ = writeln!(self.buf, "add {rendered}");
            }
            Err(e) => self.err = Some(e.into()),
        }
    }

    /// Buffers a flow deletion.
    pub fn delete(&mut self, m: &MatchFlow) {
        if self.err.is_some() {
            return;
        }
        match m.marshal() {
            Ok(rendered) => {
                let _ = writeln!(self.buf, "delete {rendered}");
            }
            Err(e) => self.err = Some(e.into()),
        }
    }

    /// Marks the transaction ready to apply, surfacing the first buffered
    /// render error.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by [`FlowTransaction::add`] or
    /// [`FlowTransaction::delete`].
    pub fn commit(&mut self) -> Result<(), Error> {
        self.committed = true;
        match self.err.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Abandons the transaction, wrapping the caller's cause so it is never
    /// silently dropped.
    pub fn discard(&mut self, cause: impl std::fmt::Display) -> Error {
        Error::Discarded(cause.to_string())
    }
}

/// Parses `dump-ports` output: a reply header, then rx/tx line pairs.
fn parse_port_stats(out: &[u8]) -> Result<Vec<PortStats>, Error> {
    let mut lines = non_empty_lines(out);

    let header = lines.next().ok_or(Error::UnexpectedEof)?;
    if !header.starts_with(DUMP_PORTS_PREFIX) {
        return Err(Error::UnexpectedEof);
    }

    let mut stats = Vec::new();
    while let Some(rx) = lines.next() {
        // OpenFlow 1.4 appends a duration line per block.
        if rx.starts_with("duration=") {
            continue;
        }
        if !rx.starts_with("port") {
            return Err(Error::UnexpectedEof);
        }
        let tx = lines.next().ok_or(Error::UnexpectedEof)?;
        stats.push(PortStats::unmarshal(&format!("{rx}\n{tx}"))?);
    }

    Ok(stats)
}

/// Parses `dump-tables` output: a reply header, two-line table blocks, and
/// a phantom trailing table which is dropped.
fn parse_tables(out: &[u8]) -> Result<Vec<Table>, Error> {
    let mut lines = non_empty_lines(out);

    let header = lines.next().ok_or(Error::UnexpectedEof)?;
    if !header.starts_with(DUMP_TABLES_PREFIX) {
        return Err(Error::UnexpectedEof);
    }

    let mut tables = Vec::new();
    while let Some(first) = lines.next() {
        let second = lines.next().ok_or(Error::UnexpectedEof)?;
        tables.push(Table::unmarshal(&format!("{first}\n{second}"))?);
    }

    // OVS prints one table beyond those actually in use.
    tables.pop();
    Ok(tables)
}

/// Parses `dump-flows` output, skipping reply headers which recur
/// mid-stream when the server pages.
fn parse_flows(out: &[u8]) -> Result<Vec<Flow>, Error> {
    let mut flows = Vec::new();
    for line in non_empty_lines(out) {
        if DUMP_FLOWS_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        flows.push(Flow::unmarshal(&line)?);
    }
    Ok(flows)
}

fn non_empty_lines(out: &[u8]) -> impl Iterator<Item = String> + '_ {
    String::from_utf8_lossy(out)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testutil::test_client;
    use crate::stats::{PortStatsReceive, PortStatsTransmit};
    use flow::{Action, Match, Protocol, StateFlag, TcpFlag, TcpFlagMatch};

    #[test]
    fn add_flow_rejects_invalid_flow_without_spawning() {
        let c = crate::Client::builder()
            .exec(|_: &str, _: &[String]| -> Result<Vec<u8>, Error> {
                panic!("must not spawn for an invalid flow")
            })
            .build();

        let err = c
            .open_flow()
            .add_flow("foo", &Flow::default())
            .unwrap_err();
        assert!(matches!(err, Error::Flow(flow::FlowError::NoActions)));
    }

    #[test]
    fn add_flow_argv() {
        let f = Flow {
            priority: 10,
            protocol: Some(Protocol::Ipv4),
            actions: vec![Action::Drop],
            ..Default::default()
        };

        test_client(
            |b| b,
            "ovs-ofctl",
            &[
                "add-flow",
                "br0",
                "priority=10,ip,table=0,idle_timeout=0,actions=drop",
            ],
            b"",
        )
        .open_flow()
        .add_flow("br0", &f)
        .unwrap();

        test_client(
            |b| b.timeout(1).flow_format(crate::FLOW_FORMAT_NXM_TABLE_ID),
            "ovs-ofctl",
            &[
                "--timeout=1",
                "add-flow",
                "--flow-format=NXM+table_id",
                "br0",
                "priority=10,ip,table=0,idle_timeout=0,actions=drop",
            ],
            b"",
        )
        .open_flow()
        .add_flow("br0", &f)
        .unwrap();
    }

    #[test]
    fn del_flows_argv() {
        let m = MatchFlow {
            protocol: Some(Protocol::Ipv4),
            table: flow::ANY_TABLE,
            ..Default::default()
        };
        test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "del-flows", "br0", "ip"],
            b"",
        )
        .open_flow()
        .del_flows("br0", Some(&m))
        .unwrap();

        // A missing predicate flushes the bridge.
        test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "del-flows", "br0"],
            b"",
        )
        .open_flow()
        .del_flows("br0", None)
        .unwrap();
    }

    #[test]
    fn del_flows_sudo() {
        test_client(
            |b| b.sudo(),
            "sudo",
            &["ovs-ofctl", "del-flows", "br0"],
            b"",
        )
        .open_flow()
        .del_flows("br0", None)
        .unwrap();
    }

    #[test]
    fn mod_port_actions() {
        for (action, keyword) in [
            (PortAction::Up, "up"),
            (PortAction::Down, "down"),
            (PortAction::Stp, "stp"),
            (PortAction::NoStp, "no-stp"),
            (PortAction::Receive, "receive"),
            (PortAction::NoReceive, "no-receive"),
            (PortAction::ReceiveStp, "receive-stp"),
            (PortAction::NoReceiveStp, "no-receive-stp"),
            (PortAction::Forward, "forward"),
            (PortAction::NoForward, "no-forward"),
            (PortAction::Flood, "flood"),
            (PortAction::NoFlood, "no-flood"),
            (PortAction::PacketIn, "packet-in"),
            (PortAction::NoPacketIn, "no-packet-in"),
        ] {
            assert_eq!(action.as_str(), keyword);
        }

        test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "mod-port", "br0", "bond0", "up"],
            b"",
        )
        .open_flow()
        .mod_port("br0", "bond0", PortAction::Up)
        .unwrap();
    }

    const PORTS_OUTPUT: &[u8] = b"
    OFPST_PORT reply (xid=0x1): 2 ports
    port  1: rx pkts=1, bytes=1, drop=1, errs=1, frame=1, over=1, crc=1
             tx pkts=1, bytes=1, drop=1, errs=1, coll=1
    port  2: rx pkts=2, bytes=2, drop=2, errs=2, frame=2, over=2, crc=2
             tx pkts=2, bytes=2, drop=2, errs=2, coll=2
    ";

    #[allow(clippy::cast_possible_truncation)]
    fn port_stats(n: u64) -> PortStats {
        PortStats {
            port_id: n as u32,
            received: PortStatsReceive {
                packets: n,
                bytes: n,
                dropped: n,
                errors: n,
                frame: n,
                over: n,
                crc: n,
            },
            transmitted: PortStatsTransmit {
                packets: n,
                bytes: n,
                dropped: n,
                errors: n,
                collisions: n,
            },
        }
    }

    #[test]
    fn dump_port_rejects_multiple_values() {
        let err = test_client(
            |b| b,
            "ovs-ofctl",
            &["dump-ports", "foo", "1"],
            PORTS_OUTPUT,
        )
        .open_flow()
        .dump_port("foo", "1")
        .unwrap_err();
        assert!(matches!(err, Error::MultipleValues));
    }

    #[test]
    fn dump_port_single() {
        let got = test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "dump-ports", "foo", "1"],
            b"
            OFPST_PORT reply (xid=0x1): 1 port
            port  1: rx pkts=1, bytes=1, drop=1, errs=1, frame=1, over=1, crc=1
                     tx pkts=1, bytes=1, drop=1, errs=1, coll=1
            ",
        )
        .open_flow()
        .dump_port("foo", "1")
        .unwrap();
        assert_eq!(got, port_stats(1));
    }

    #[test]
    fn dump_ports_all() {
        let got = test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "dump-ports", "br0"],
            PORTS_OUTPUT,
        )
        .open_flow()
        .dump_ports("br0")
        .unwrap();
        assert_eq!(got, vec![port_stats(1), port_stats(2)]);
    }

    #[test]
    fn dump_ports_openflow14_durations_skipped() {
        let got = test_client(
            |b| {
                b.protocols(&[crate::PROTOCOL_OPENFLOW14])
                    .flow_format(crate::FLOW_FORMAT_OXM_OPENFLOW14)
            },
            "ovs-ofctl",
            &[
                "--protocols=OpenFlow14",
                "--flow-format=OXM-OpenFlow14",
                "dump-ports",
                "br0",
            ],
            b"
            OFPST_PORT reply (OF1.4) (xid=0x1): 2 ports
            port  1: rx pkts=1, bytes=1, drop=1, errs=1, frame=1, over=1, crc=1
                     tx pkts=1, bytes=1, drop=1, errs=1, coll=1
                     duration=1.001s
            port  2: rx pkts=2, bytes=2, drop=2, errs=2, frame=2, over=2, crc=2
                     tx pkts=2, bytes=2, drop=2, errs=2, coll=2
                     duration=2.002s
            ",
        )
        .open_flow()
        .dump_ports("br0")
        .unwrap();
        assert_eq!(got, vec![port_stats(1), port_stats(2)]);
    }

    #[test]
    fn dump_ports_truncated_output() {
        for out in [&b""[..], &b"foo"[..], &b"OFPST_PORT reply\nfoo"[..], &b"OFPST_PORT reply\nport 1: rx"[..]] {
            let err = test_client(|b| b, "ovs-ofctl", &["dump-ports", "foo"], out)
                .open_flow()
                .dump_ports("foo")
                .unwrap_err();
            assert!(
                matches!(err, Error::UnexpectedEof | Error::InvalidPortStats),
                "unexpected error for {out:?}: {err}"
            );
        }
    }

    #[test]
    fn dump_tables_drops_phantom_table() {
        let got = test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "dump-tables", "br0"],
            b"
            OFPST_TABLE reply (xid=0x2): 3 tables
              0: classifier: wild=0x3fffff, max=1000000, active=1
                             lookup=2, matched=3
              1: table1  :   wild=0x3fffff, max=1000000, active=4
                             lookup=5, matched=6
              2: table2  :   wild=0x3fffff, max=1000000, active=0
                             lookup=0, matched=0
            ",
        )
        .open_flow()
        .dump_tables("br0")
        .unwrap();

        assert_eq!(
            got,
            vec![
                Table {
                    id: 0,
                    name: "classifier".to_string(),
                    wild: "0x3fffff".to_string(),
                    max: 1_000_000,
                    active: 1,
                    lookup: 2,
                    matched: 3,
                },
                Table {
                    id: 1,
                    name: "table1".to_string(),
                    wild: "0x3fffff".to_string(),
                    max: 1_000_000,
                    active: 4,
                    lookup: 5,
                    matched: 6,
                },
            ]
        );
    }

    #[test]
    fn dump_tables_invalid_block() {
        let err = test_client(
            |b| b,
            "ovs-ofctl",
            &["dump-tables", "foo"],
            b"OFPST_TABLE reply\n0: classifier\nfoo",
        )
        .open_flow()
        .dump_tables("foo")
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTable));
    }

    #[test]
    fn dump_flows_parses_and_skips_headers() {
        let out = b"NXST_FLOW reply (xid=0x4): flags=[more]
 cookie=0x0, duration=9215.748s, table=0, n_packets=6, n_bytes=480, idle_age=9206, priority=820,in_port=LOCAL actions=mod_vlan_vid:10,output:1
 cookie=0x0, duration=1121991.329s, table=50, n_packets=0, n_bytes=0, priority=110,ip,dl_src=f1:f2:f3:f4:f5:f6 actions=ct(table=51)
NXST_FLOW reply (xid=0x4):
 cookie=0x0, duration=83229.846s, table=51, n_packets=3, n_bytes=234, priority=101,ct_state=+new+rel+trk,ip actions=ct(commit,table=65)
  cookie=0x0, duration=13.265s, table=12, n_packets=0, n_bytes=0, idle_age=13, priority=4321,tcp,tcp_flags=+syn-psh+ack actions=resubmit(,13)
";

        let got = test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "dump-flows", "br0"],
            out,
        )
        .open_flow()
        .dump_flows("br0")
        .unwrap();

        assert_eq!(got.len(), 4);
        assert_eq!(
            got[0],
            Flow {
                priority: 820,
                in_port: flow::PORT_LOCAL,
                actions: vec![Action::ModVlanVid(10), Action::Output(1)],
                ..Default::default()
            }
        );
        assert_eq!(
            got[1].matches,
            vec![Match::DataLinkSource("f1:f2:f3:f4:f5:f6".to_string())]
        );
        assert_eq!(got[1].actions, vec![Action::ct("table=51")]);
        assert_eq!(
            got[2].matches,
            vec![Match::ConnectionTrackingState(vec![
                StateFlag::set(flow::CtState::New),
                StateFlag::set(flow::CtState::Related),
                StateFlag::set(flow::CtState::Tracked),
            ])]
        );
        assert_eq!(
            got[3].matches,
            vec![Match::TcpFlags(vec![
                TcpFlagMatch::set(TcpFlag::Syn),
                TcpFlagMatch::unset(TcpFlag::Psh),
                TcpFlagMatch::set(TcpFlag::Ack),
            ])]
        );
        assert_eq!(got[3].table, 12);
    }

    #[test]
    fn dump_aggregate() {
        let got = test_client(
            |b| b.timeout(1),
            "ovs-ofctl",
            &["--timeout=1", "dump-aggregate", "br0"],
            b"NXST_AGGREGATE reply (xid=0x4): packet_count=642800 byte_count=141379644 flow_count=3\n",
        )
        .open_flow()
        .dump_aggregate("br0", None)
        .unwrap();
        assert_eq!(
            got,
            FlowStats {
                packet_count: 642_800,
                byte_count: 141_379_644,
            }
        );
    }

    #[test]
    fn bundle_streams_directives_on_stdin() {
        let flows = [
            Flow {
                priority: 10,
                protocol: Some(Protocol::Ipv4),
                actions: vec![Action::Drop],
                ..Default::default()
            },
            Flow {
                priority: 20,
                protocol: Some(Protocol::Ipv6),
                actions: vec![Action::Drop],
                ..Default::default()
            },
        ];
        let match_flows = [MatchFlow {
            cookie: 0xdead_beef,
            table: flow::ANY_TABLE,
            ..Default::default()
        }];

        let c = crate::Client::builder()
            .timeout(1)
            .flow_format(crate::FLOW_FORMAT_NXM_TABLE_ID)
            .pipe(BundleAssert)
            .build();

        c.open_flow()
            .add_flow_bundle("br0", |tx| {
                for f in &flows {
                    tx.add(f);
                }
                for m in &match_flows {
                    tx.delete(m);
                }
                tx.commit()
            })
            .unwrap();

        struct BundleAssert;
        impl crate::exec::Piper for BundleAssert {
            fn exec_with_stdin(
                &self,
                stdin: &[u8],
                cmd: &str,
                args: &[String],
            ) -> Result<Vec<u8>, Error> {
                assert_eq!(cmd, "ovs-ofctl");
                assert_eq!(
                    args,
                    &[
                        "--timeout=1",
                        "--bundle",
                        "add-flow",
                        "--flow-format=NXM+table_id",
                        "br0",
                        "-",
                    ][..]
                );
                assert_eq!(
                    String::from_utf8_lossy(stdin),
                    "add priority=10,ip,table=0,idle_timeout=0,actions=drop\n\
                     add priority=20,ipv6,table=0,idle_timeout=0,actions=drop\n\
                     delete cookie=0x00000000deadbeef/-1\n"
                );
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn bundle_requires_commit() {
        let c = crate::Client::new();
        let err = c
            .open_flow()
            .add_flow_bundle("br0", |tx| {
                tx.add(&Flow {
                    priority: 10,
                    protocol: Some(Protocol::Ipv4),
                    actions: vec![Action::Drop],
                    ..Default::default()
                });
                // No commit.
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotCommitted));
    }

    #[test]
    fn bundle_surfaces_render_error_before_spawning() {
        let c = crate::Client::new();
        let err = c
            .open_flow()
            .add_flow_bundle("br0", |tx| {
                tx.add(&Flow {
                    priority: 10,
                    protocol: Some(Protocol::Ipv4),
                    ..Default::default()
                });
                tx.add(&Flow {
                    priority: 20,
                    protocol: Some(Protocol::Ipv6),
                    actions: vec![Action::Drop],
                    ..Default::default()
                });
                tx.commit()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Flow(flow::FlowError::NoActions)));
    }

    #[test]
    fn bundle_discard_keeps_cause() {
        let c = crate::Client::new();
        let err = c
            .open_flow()
            .add_flow_bundle("br0", |tx| {
                tx.add(&Flow {
                    priority: 10,
                    protocol: Some(Protocol::Ipv4),
                    actions: vec![Action::Drop],
                    ..Default::default()
                });
                Err(tx.discard("some error which caused transaction discard"))
            })
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("some error which caused transaction discard"));
    }
}
