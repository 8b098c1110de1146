// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed client for the Open vSwitch generic netlink families.
//!
//! [`Client::new`] lists the kernel's generic netlink families, keeps those
//! prefixed `ovs_`, and binds a service per family it recognizes. Unknown
//! `ovs_` families are skipped rather than failing initialization; only a
//! machine with no OVS families at all yields [`Error::NotFound`],
//! checkable with [`Error::is_not_exist`].

#![deny(clippy::all)]

pub mod conn;
pub mod datapath;
pub mod error;
pub mod flow;
pub mod ovsh;
pub mod vport;

pub use conn::{Family, GenlConn, GenlRequest, SocketConn};
pub use datapath::{Datapath, DatapathFeatures, DatapathService};
pub use error::Error;
pub use flow::{Flow, FlowKey, FlowService};
pub use vport::{Vport, VportService, VportSpec};

use std::sync::Mutex;

use tracing::debug;

/// A Linux Open vSwitch generic netlink client.
pub struct Client {
    conn: Mutex<Box<dyn GenlConn>>,
    families: Vec<Family>,
    datapath: Option<Family>,
    vport: Option<Family>,
    flow: Option<Family>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("families", &self.families)
            .field("datapath", &self.datapath)
            .field("vport", &self.vport)
            .field("flow", &self.flow)
            .finish()
    }
}

impl Client {
    /// Dials the kernel's generic netlink socket and resolves the OVS
    /// families.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no `ovs_*` family is registered, or
    /// the underlying socket error. The socket is closed before the error
    /// is returned.
    pub fn new() -> Result<Client, Error> {
        Client::with_conn(Box::new(SocketConn::new()?))
    }

    /// Builds a client over any transport; tests substitute an in-memory
    /// conn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no `ovs_*` family is registered.
    pub fn with_conn(mut conn: Box<dyn GenlConn>) -> Result<Client, Error> {
        // The conn drops, closing its socket, if family listing or init
        // fails below.
        let all = conn.list_families()?;

        let mut client = Client {
            conn: Mutex::new(conn),
            families: Vec::new(),
            datapath: None,
            vport: None,
            flow: None,
        };

        for family in all {
            if !family.name.starts_with("ovs_") {
                continue;
            }
            match family.name.as_str() {
                ovsh::DATAPATH_FAMILY => client.datapath = Some(family.clone()),
                ovsh::VPORT_FAMILY => client.vport = Some(family.clone()),
                ovsh::FLOW_FAMILY => client.flow = Some(family.clone()),
                // Families with no service here (meter, packet) still count
                // as a present OVS interface.
                ovsh::METER_FAMILY | ovsh::PACKET_FAMILY => {}
                other => {
                    debug!(family = other, "skipping unknown OVS netlink family");
                    continue;
                }
            }
            client.families.push(family);
        }

        if client.families.is_empty() {
            return Err(Error::NotFound);
        }

        Ok(client)
    }

    /// Every recognized `ovs_*` family on this system.
    #[must_use]
    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Operations on the `ovs_datapath` family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFamily`] when the kernel lacks the family.
    pub fn datapath(&self) -> Result<DatapathService<'_>, Error> {
        let family = self
            .datapath
            .clone()
            .ok_or(Error::MissingFamily(ovsh::DATAPATH_FAMILY))?;
        Ok(DatapathService::new(self, family))
    }

    /// Operations on the `ovs_vport` family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFamily`] when the kernel lacks the family.
    pub fn vport(&self) -> Result<VportService<'_>, Error> {
        let family = self
            .vport
            .clone()
            .ok_or(Error::MissingFamily(ovsh::VPORT_FAMILY))?;
        Ok(VportService::new(self, family))
    }

    /// Operations on the `ovs_flow` family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFamily`] when the kernel lacks the family.
    pub fn flow(&self) -> Result<FlowService<'_>, Error> {
        let family = self
            .flow
            .clone()
            .ok_or(Error::MissingFamily(ovsh::FLOW_FAMILY))?;
        Ok(FlowService::new(self, family))
    }

    pub(crate) fn execute(&self, req: &GenlRequest) -> Result<Vec<Vec<u8>>, Error> {
        self.conn.lock().unwrap().execute(req)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::client_with;
    use super::*;

    fn no_requests(_: &GenlRequest) -> Result<Vec<Vec<u8>>, Error> {
        panic!("no requests expected during init")
    }

    #[test]
    fn no_families_is_not_exist() {
        let err = client_with(&["TASKSTATS", "nl80211"], no_requests).unwrap_err();
        assert!(err.is_not_exist());
    }

    #[test]
    fn unknown_ovs_families_are_skipped() {
        // A lone unknown ovs_ family leaves nothing usable.
        let err = client_with(&["ovs_foo"], no_requests).unwrap_err();
        assert!(err.is_not_exist());

        // But it does not poison an otherwise healthy system.
        let client = client_with(&["ovs_foo", ovsh::DATAPATH_FAMILY], no_requests).unwrap();
        assert_eq!(client.families().len(), 1);
        assert!(client.datapath().is_ok());
        assert!(client.vport().unwrap_err().is_not_exist());
    }

    #[test]
    fn known_families_bind_services() {
        let client = client_with(
            &[
                ovsh::DATAPATH_FAMILY,
                ovsh::VPORT_FAMILY,
                ovsh::FLOW_FAMILY,
                ovsh::PACKET_FAMILY,
                ovsh::METER_FAMILY,
            ],
            no_requests,
        )
        .unwrap();

        assert_eq!(client.families().len(), 5);
        assert!(client.datapath().is_ok());
        assert!(client.vport().is_ok());
        assert!(client.flow().is_ok());
    }
}
