// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parsers for the statistics formats emitted by `ovs-ofctl`.

use flow::PORT_LOCAL;

use crate::error::Error;

/// Receive counters of one port, from `dump-ports`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStatsReceive {
    pub packets: u64,
    pub bytes: u64,
    pub dropped: u64,
    pub errors: u64,
    pub frame: u64,
    pub over: u64,
    pub crc: u64,
}

/// Transmit counters of one port, from `dump-ports`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStatsTransmit {
    pub packets: u64,
    pub bytes: u64,
    pub dropped: u64,
    pub errors: u64,
    pub collisions: u64,
}

/// Statistics for one OpenFlow port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    /// OpenFlow port id; [`PORT_LOCAL`] for the bridge's local port.
    pub port_id: u32,
    /// Receive counters.
    pub received: PortStatsReceive,
    /// Transmit counters.
    pub transmitted: PortStatsTransmit,
}

impl PortStats {
    /// Parses the two-line `port N: rx …` / `tx …` block of `dump-ports`
    /// output. Tunnel devices report `?` for counters they do not track;
    /// those parse as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPortStats`] for a malformed block and
    /// [`Error::InvalidInteger`] for an unparseable counter.
    pub fn unmarshal(s: &str) -> Result<PortStats, Error> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 16 || fields[0] != "port" || fields[2] != "rx" || fields[10] != "tx" {
            return Err(Error::InvalidPortStats);
        }

        let id = fields[1].trim_end_matches(':');
        let port_id = if id == "LOCAL" {
            PORT_LOCAL
        } else {
            id.parse()
                .map_err(|_| Error::InvalidInteger(id.to_string()))?
        };

        let rx_names = ["pkts", "bytes", "drop", "errs", "frame", "over", "crc"];
        let mut rx = [0u64; 7];
        for (i, name) in rx_names.iter().enumerate() {
            rx[i] = counter(fields[3 + i], name)?;
        }

        let tx_names = ["pkts", "bytes", "drop", "errs", "coll"];
        let mut tx = [0u64; 5];
        for (i, name) in tx_names.iter().enumerate() {
            tx[i] = counter(fields[11 + i], name)?;
        }

        Ok(PortStats {
            port_id,
            received: PortStatsReceive {
                packets: rx[0],
                bytes: rx[1],
                dropped: rx[2],
                errors: rx[3],
                frame: rx[4],
                over: rx[5],
                crc: rx[6],
            },
            transmitted: PortStatsTransmit {
                packets: tx[0],
                bytes: tx[1],
                dropped: tx[2],
                errors: tx[3],
                collisions: tx[4],
            },
        })
    }
}

/// Parses one `name=value` counter field, tolerating a trailing comma and
/// the `?` placeholder.
fn counter(field: &str, want_name: &str) -> Result<u64, Error> {
    let field = field.trim_end_matches(',');
    let Some((name, value)) = field.split_once('=') else {
        return Err(Error::InvalidPortStats);
    };
    if name != want_name {
        return Err(Error::InvalidPortStats);
    }
    if value == "?" {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| Error::InvalidInteger(value.to_string()))
}

/// One OpenFlow table, from `dump-tables`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub id: u32,
    pub name: String,
    /// Wildcard bits, kept in their hexadecimal form.
    pub wild: String,
    pub max: u64,
    pub active: u32,
    pub lookup: u64,
    pub matched: u64,
}

impl Table {
    /// Parses the two-line table block of `dump-tables` output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTable`] for a malformed block and
    /// [`Error::InvalidInteger`] for an unparseable counter.
    pub fn unmarshal(s: &str) -> Result<Table, Error> {
        let mut fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::InvalidTable);
        }

        let id_field = fields.remove(0);
        let id = id_field
            .strip_suffix(':')
            .ok_or(Error::InvalidTable)?
            .parse()
            .map_err(|_| Error::InvalidInteger(id_field.to_string()))?;

        // The name may carry its own colon or be followed by a lone one.
        let name = fields.remove(0).trim_end_matches(':').to_string();
        if fields.first() == Some(&":") {
            fields.remove(0);
        }

        let [wild, max, active, lookup, matched] = fields.as_slice() else {
            return Err(Error::InvalidTable);
        };

        Ok(Table {
            id,
            name,
            wild: kv(wild, "wild")?.to_string(),
            max: parse_counter(kv(max, "max")?)?,
            active: u32::try_from(parse_counter(kv(active, "active")?)?)
                .map_err(|_| Error::InvalidTable)?,
            lookup: parse_counter(kv(lookup, "lookup")?)?,
            matched: parse_counter(kv(matched, "matched")?)?,
        })
    }
}

/// Extracts the value of a `name=value` field, tolerating a trailing comma.
fn kv<'a>(field: &'a str, want_name: &str) -> Result<&'a str, Error> {
    let field = field.trim_end_matches(',');
    let Some((name, value)) = field.split_once('=') else {
        return Err(Error::InvalidTable);
    };
    if name != want_name {
        return Err(Error::InvalidTable);
    }
    Ok(value)
}

fn parse_counter(value: &str) -> Result<u64, Error> {
    value
        .parse()
        .map_err(|_| Error::InvalidInteger(value.to_string()))
}

/// Aggregate flow statistics, from `dump-aggregate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub packet_count: u64,
    pub byte_count: u64,
}

impl FlowStats {
    /// Parses an `NXST_AGGREGATE reply` line:
    ///
    /// ```text
    /// NXST_AGGREGATE reply (xid=0x4): packet_count=642800 byte_count=141379644 flow_count=3
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFlowStats`] when the line does not match.
    pub fn unmarshal(s: &str) -> Result<FlowStats, Error> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 6 || fields[0] != "NXST_AGGREGATE" {
            return Err(Error::InvalidFlowStats);
        }

        let packet_count = fields[3]
            .strip_prefix("packet_count=")
            .and_then(|v| v.parse().ok())
            .ok_or(Error::InvalidFlowStats)?;
        let byte_count = fields[4]
            .strip_prefix("byte_count=")
            .and_then(|v| v.parse().ok())
            .ok_or(Error::InvalidFlowStats)?;

        Ok(FlowStats {
            packet_count,
            byte_count,
        })
    }
}
