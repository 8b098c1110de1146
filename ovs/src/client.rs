// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The client which composes and runs control-tool invocations.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::exec::{Executor, Piper, SystemExecutor, SystemPiper};
use crate::openflow::OpenFlow;
use crate::vswitch::VSwitch;

/// A client for the Open vSwitch control programs.
///
/// Global flags (`--timeout`, `--db`) are injected immediately after the
/// command; `ovs-ofctl` flags (`--flow-format`, `--protocols`, SSL
/// parameters) are placed per subcommand. With [`ClientBuilder::sudo`] the
/// effective command becomes `sudo <cmd> <args…>`.
pub struct Client {
    pub(crate) flags: Vec<String>,
    pub(crate) ofctl_flags: Vec<String>,
    pub(crate) sudo: bool,
    exec: Arc<dyn Executor>,
    pipe: Arc<dyn Piper>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("flags", &self.flags)
            .field("ofctl_flags", &self.ofctl_flags)
            .field("sudo", &self.sudo)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::builder().build()
    }
}

impl Client {
    /// A client with default options, talking to the system tools.
    #[must_use]
    pub fn new() -> Self {
        Client::default()
    }

    /// Starts building a customized client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Access to `ovs-vsctl` operations.
    #[must_use]
    pub fn vswitch(&self) -> VSwitch<'_> {
        VSwitch::new(self)
    }

    /// Access to `ovs-ofctl` operations.
    #[must_use]
    pub fn open_flow(&self) -> OpenFlow<'_> {
        OpenFlow::new(self)
    }

    /// Runs `cmd` with the global flag set followed by `args`.
    pub(crate) fn exec(&self, cmd: &str, args: &[&str]) -> Result<Vec<u8>, Error> {
        let (cmd, argv) = self.compose(cmd, args);
        debug!(cmd, args = ?argv, "exec");
        self.exec.exec(cmd, &argv)
    }

    /// Runs `cmd` like [`Client::exec`], streaming `stdin` to the child.
    pub(crate) fn pipe(&self, stdin: &[u8], cmd: &str, args: &[&str]) -> Result<Vec<u8>, Error> {
        let (cmd, argv) = self.compose(cmd, args);
        debug!(cmd, args = ?argv, bytes = stdin.len(), "exec with stdin");
        self.pipe.exec_with_stdin(stdin, cmd, &argv)
    }

    /// Builds the effective command and argv, applying global flags and the
    /// optional sudo prefix.
    fn compose<'a>(&self, cmd: &'a str, args: &[&str]) -> (&'a str, Vec<String>) {
        let mut argv: Vec<String> = Vec::with_capacity(self.flags.len() + args.len() + 1);
        argv.extend(self.flags.iter().cloned());
        argv.extend(args.iter().map(|s| (*s).to_string()));

        if self.sudo {
            argv.insert(0, cmd.to_string());
            ("sudo", argv)
        } else {
            (cmd, argv)
        }
    }
}

/// Builder for [`Client`] options.
#[derive(Default)]
pub struct ClientBuilder {
    flags: Vec<String>,
    ofctl_flags: Vec<String>,
    sudo: bool,
    exec: Option<Arc<dyn Executor>>,
    pipe: Option<Arc<dyn Piper>>,
}

impl ClientBuilder {
    /// Applies `--timeout=<secs>` to every invocation.
    #[must_use]
    pub fn timeout(mut self, secs: u32) -> Self {
        self.flags.push(format!("--timeout={secs}"));
        self
    }

    /// Prefixes every invocation with `sudo`.
    #[must_use]
    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    /// Applies `--flow-format=<format>` to `ovs-ofctl` subcommands.
    #[must_use]
    pub fn flow_format(mut self, format: &str) -> Self {
        self.ofctl_flags.push(format!("--flow-format={format}"));
        self
    }

    /// Applies `--protocols=<p1,p2,…>` to `ovs-ofctl` subcommands.
    #[must_use]
    pub fn protocols(mut self, protocols: &[&str]) -> Self {
        self.ofctl_flags
            .push(format!("--protocols={}", protocols.join(",")));
        self
    }

    /// Applies SSL rendezvous parameters to `ovs-ofctl` subcommands.
    #[must_use]
    pub fn ssl(mut self, private_key: &str, certificate: &str, ca_cert: &str) -> Self {
        self.ofctl_flags.push(format!("--private-key={private_key}"));
        self.ofctl_flags.push(format!("--certificate={certificate}"));
        self.ofctl_flags.push(format!("--ca-cert={ca_cert}"));
        self
    }

    /// Points `ovs-vsctl` at a TCP database endpoint via `--db`.
    #[must_use]
    pub fn tcp(mut self, addr: &str) -> Self {
        self.flags.push(format!("--db=tcp:{addr}"));
        self
    }

    /// Substitutes the process executor; used by tests to intercept
    /// invocations.
    #[must_use]
    pub fn exec(mut self, exec: impl Executor + 'static) -> Self {
        self.exec = Some(Arc::new(exec));
        self
    }

    /// Substitutes the stdin-streaming executor used for flow bundles.
    #[must_use]
    pub fn pipe(mut self, pipe: impl Piper + 'static) -> Self {
        self.pipe = Some(Arc::new(pipe));
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> Client {
        Client {
            flags: self.flags,
            ofctl_flags: self.ofctl_flags,
            sudo: self.sudo,
            exec: self.exec.unwrap_or_else(|| Arc::new(SystemExecutor)),
            pipe: self.pipe.unwrap_or_else(|| Arc::new(SystemPiper)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_precede_arguments() {
        let c = testutil::test_client(
            |b| b.timeout(1),
            "ovs-vsctl",
            &["--timeout=1", "--may-exist", "add-br", "br0"],
            b"",
        );
        c.vswitch().add_bridge("br0").unwrap();
    }

    #[test]
    fn sudo_shifts_argv() {
        let c = testutil::test_client(
            ClientBuilder::sudo,
            "sudo",
            &["ovs-vsctl", "--may-exist", "add-br", "br0"],
            b"",
        );
        c.vswitch().add_bridge("br0").unwrap();
    }

    #[test]
    fn tcp_option_is_global() {
        let c = testutil::test_client(
            |b| b.tcp("127.0.0.1:6640"),
            "ovs-vsctl",
            &["--db=tcp:127.0.0.1:6640", "--may-exist", "add-br", "br0"],
            b"",
        );
        c.vswitch().add_bridge("br0").unwrap();
    }

    #[test]
    fn ssl_flags_attach_to_ofctl_subcommands() {
        let b = Client::builder().ssl("privkey.pem", "cert.pem", "cacert.pem");
        assert_eq!(
            b.ofctl_flags,
            vec![
                "--private-key=privkey.pem",
                "--certificate=cert.pem",
                "--ca-cert=cacert.pem",
            ]
        );
    }
}
