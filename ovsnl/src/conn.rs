// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Generic netlink transport.
//!
//! The OVS services speak through [`GenlConn`]; the default implementation
//! drives a `NETLINK_GENERIC` socket, and tests substitute an in-memory
//! conn. Requests are one round trip each; the kernel serializes access to
//! the datapath.

use byteorder::{ByteOrder, NativeEndian};
use netlink_packet_utils::nla::NlasIterator;
use netlink_sys::{protocols::NETLINK_GENERIC, Socket, SocketAddr};
use tracing::debug;

use crate::error::Error;

/// `NLM_F_*` request flags.
pub const NLM_F_REQUEST: u16 = 0x0001;
/// Echo the request back in the reply.
pub const NLM_F_ECHO: u16 = 0x0008;
/// Return all matching objects as a multipart dump.
pub const NLM_F_DUMP: u16 = 0x0300;

/// `nlmsghdr` length.
const NLMSG_HDRLEN: usize = 16;
/// `genlmsghdr` length (cmd, version, reserved).
const GENL_HDRLEN: usize = 4;

/// `NLMSG_ERROR` / `NLMSG_DONE` message types.
const NLMSG_ERROR: u16 = 0x2;
const NLMSG_DONE: u16 = 0x3;

/// The generic netlink controller's fixed family id and attributes.
const GENL_ID_CTRL: u16 = 0x10;
const CTRL_CMD_GETFAMILY: u8 = 3;
const CTRL_VERSION: u8 = 2;
const CTRL_ATTR_FAMILY_ID: u16 = 1;
const CTRL_ATTR_FAMILY_NAME: u16 = 2;
const CTRL_ATTR_VERSION: u16 = 4;

/// A generic netlink family known to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    /// Message type assigned to the family.
    pub id: u16,
    /// Registered family name.
    pub name: String,
    /// Highest supported family version.
    pub version: u8,
}

/// One typed request against a generic netlink family.
#[derive(Debug, Clone)]
pub struct GenlRequest {
    /// Family message type.
    pub family: u16,
    /// Family command id.
    pub command: u8,
    /// Family version.
    pub version: u8,
    /// `NLM_F_*` flags; [`NLM_F_REQUEST`] plus dump or echo.
    pub flags: u16,
    /// Payload after the genl header: OVS header plus attributes.
    pub payload: Vec<u8>,
}

/// A generic netlink transport: list families, execute one request.
pub trait GenlConn: Send {
    /// Dumps every family registered with the controller.
    ///
    /// # Errors
    ///
    /// Returns a transport or kernel error.
    fn list_families(&mut self) -> Result<Vec<Family>, Error>;

    /// Executes one request, returning each reply message's payload with
    /// the genl header stripped.
    ///
    /// # Errors
    ///
    /// Returns a transport or kernel error.
    fn execute(&mut self, req: &GenlRequest) -> Result<Vec<Vec<u8>>, Error>;
}

/// The system transport over a `NETLINK_GENERIC` socket.
pub struct SocketConn {
    socket: Socket,
    seq: u32,
}

impl SocketConn {
    /// Opens and binds a generic netlink socket.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn new() -> Result<SocketConn, Error> {
        let mut socket = Socket::new(NETLINK_GENERIC)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        Ok(SocketConn { socket, seq: 0 })
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Sends one message and collects the reply messages, following a
    /// multipart dump through to `NLMSG_DONE`.
    fn round_trip(
        &mut self,
        msg_type: u16,
        flags: u16,
        genl: &[u8],
    ) -> Result<Vec<Vec<u8>>, Error> {
        let seq = self.next_seq();

        let total = NLMSG_HDRLEN + genl.len();
        let mut buf = vec![0u8; total];
        NativeEndian::write_u32(&mut buf[0..4], u32::try_from(total).unwrap_or(0));
        NativeEndian::write_u16(&mut buf[4..6], msg_type);
        NativeEndian::write_u16(&mut buf[6..8], flags);
        NativeEndian::write_u32(&mut buf[8..12], seq);
        NativeEndian::write_u32(&mut buf[12..16], 0);
        buf[NLMSG_HDRLEN..].copy_from_slice(genl);

        self.socket.send(&buf, 0)?;

        let dump = flags & NLM_F_DUMP == NLM_F_DUMP;
        let mut replies = Vec::new();
        let mut recv_buf = vec![0u8; 64 * 1024];

        loop {
            let n = self.socket.recv(&mut &mut recv_buf[..], 0)?;
            let mut offset = 0;

            while offset + NLMSG_HDRLEN <= n {
                let msg = &recv_buf[offset..n];
                let len = NativeEndian::read_u32(&msg[0..4]) as usize;
                if len < NLMSG_HDRLEN || len > msg.len() {
                    break;
                }
                let typ = NativeEndian::read_u16(&msg[4..6]);

                match typ {
                    NLMSG_DONE => return Ok(replies),
                    NLMSG_ERROR => {
                        let errno = NativeEndian::read_i32(&msg[NLMSG_HDRLEN..NLMSG_HDRLEN + 4]);
                        if errno != 0 {
                            return Err(Error::Kernel { errno: -errno });
                        }
                        // errno zero is an ACK.
                        return Ok(replies);
                    }
                    _ => {
                        replies.push(msg[NLMSG_HDRLEN..len].to_vec());
                    }
                }

                offset += nlmsg_align(len);
            }

            if !dump {
                return Ok(replies);
            }
        }
    }
}

impl GenlConn for SocketConn {
    fn list_families(&mut self) -> Result<Vec<Family>, Error> {
        // CTRL_CMD_GETFAMILY with no name attribute dumps every family.
        let genl = [CTRL_CMD_GETFAMILY, CTRL_VERSION, 0, 0];
        let msgs = self.round_trip(GENL_ID_CTRL, NLM_F_REQUEST | NLM_F_DUMP, &genl)?;

        let mut families = Vec::with_capacity(msgs.len());
        for msg in msgs {
            if msg.len() < GENL_HDRLEN {
                continue;
            }

            let mut family = Family {
                id: 0,
                name: String::new(),
                version: 0,
            };
            for nla in NlasIterator::new(&msg[GENL_HDRLEN..]) {
                let nla = nla.map_err(|e| Error::Attr(e.to_string()))?;
                match nla.kind() {
                    CTRL_ATTR_FAMILY_ID => family.id = NativeEndian::read_u16(nla.value()),
                    CTRL_ATTR_FAMILY_NAME => family.name = crate::ovsh::string(nla.value()),
                    CTRL_ATTR_VERSION => {
                        family.version =
                            u8::try_from(NativeEndian::read_u32(nla.value())).unwrap_or(0);
                    }
                    _ => {}
                }
            }
            debug!(name = %family.name, id = family.id, "generic netlink family");
            families.push(family);
        }

        Ok(families)
    }

    fn execute(&mut self, req: &GenlRequest) -> Result<Vec<Vec<u8>>, Error> {
        let mut genl = Vec::with_capacity(GENL_HDRLEN + req.payload.len());
        genl.push(req.command);
        genl.push(req.version);
        genl.extend_from_slice(&[0, 0]);
        genl.extend_from_slice(&req.payload);

        let msgs = self.round_trip(req.family, req.flags, &genl)?;
        Ok(msgs
            .into_iter()
            .filter(|m| m.len() >= GENL_HDRLEN)
            .map(|m| m[GENL_HDRLEN..].to_vec())
            .collect())
    }
}

/// Appends one TLV attribute, padded to the 4-byte netlink alignment.
pub(crate) fn put_attr(buf: &mut Vec<u8>, kind: u16, value: &[u8]) {
    let len = 4 + value.len();
    buf.extend_from_slice(&u16::try_from(len).unwrap_or(0).to_ne_bytes());
    buf.extend_from_slice(&kind.to_ne_bytes());
    buf.extend_from_slice(value);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

const fn nlmsg_align(len: usize) -> usize {
    (len + 3) & !3
}
