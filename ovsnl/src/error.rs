// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error surface of the netlink client.

/// Errors produced by the netlink client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No `ovs_*` generic netlink families are registered; the openvswitch
    /// kernel module is not loaded.
    #[error("no Open vSwitch generic netlink families found")]
    NotFound,
    /// A recognized family is not available on this client.
    #[error("generic netlink family {0:?} is not available")]
    MissingFamily(&'static str),
    /// Transport failure on the netlink socket.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The kernel answered with `NLMSG_ERROR`.
    #[error("netlink error: errno {errno}")]
    Kernel {
        /// Positive errno value reported by the kernel.
        errno: i32,
    },
    /// A malformed attribute run.
    #[error("invalid netlink attributes: {0}")]
    Attr(String),
    /// A fixed-layout struct attribute with the wrong length; never
    /// silently truncated.
    #[error("unexpected {what} structure size, want {want}, got {got}")]
    BadLength {
        /// The structure being parsed.
        what: &'static str,
        /// The kernel struct size.
        want: usize,
        /// The attribute length seen.
        got: usize,
    },
    /// A payload too short to carry the OVS header.
    #[error("not enough data for OVS message header: {0} bytes")]
    ShortHeader(usize),
    /// A vport type id this client does not model.
    #[error("unsupported vport type {0}")]
    UnsupportedVportType(u32),
}

impl Error {
    /// Reports whether the error means the OVS kernel interface does not
    /// exist on this machine, as opposed to a transport or decode failure.
    #[must_use]
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Error::NotFound | Error::MissingFamily(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn not_exist_predicate() {
        assert!(Error::NotFound.is_not_exist());
        assert!(Error::MissingFamily("ovs_vport").is_not_exist());
        assert!(!Error::Kernel { errno: 22 }.is_not_exist());
    }
}
