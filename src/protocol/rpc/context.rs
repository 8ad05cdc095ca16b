//! Per-request execution context handed to every protocol handler.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::backend::FSBackend;
use crate::exports::ExportOptions;
use crate::protocol::xdr::nfs3::{NFS_MAXDATA_TCP, NFS_MAXDATA_UDP};
use crate::protocol::xdr::rpc::auth_unix;
use crate::server::{Server, ServerConfig};

use super::TransactionTracker;

/// Which transport carried the request; READ and FSINFO size caps depend on
/// it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Everything a handler needs to process one call: who is asking, over what,
/// with which credentials, against which server state.
#[derive(Clone)]
pub struct Context {
    pub local_port: u16,
    pub client_addr: SocketAddr,
    pub transport: Transport,
    /// AUTH_UNIX credentials of the current call; default (nobody) when the
    /// client sent none.
    pub auth: auth_unix,
    /// Program version of the current call, as received.
    pub rq_vers: u32,
    pub server: Arc<Server>,
    pub transaction_tracker: Arc<TransactionTracker>,
}

impl Context {
    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn backend(&self) -> &dyn FSBackend {
        self.server.backend().as_ref()
    }

    pub fn config(&self) -> &ServerConfig {
        self.server.config()
    }

    /// Client address as IPv4; v4-mapped IPv6 peers are unwrapped. Exports
    /// matching is IPv4-only, so anything else matches like 0.0.0.0.
    pub fn client_ip(&self) -> Ipv4Addr {
        match self.client_addr.ip() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
        }
    }

    /// Host string recorded in the mount table and matched by UMNT.
    pub fn client_host(&self) -> String {
        self.client_ip().to_string()
    }

    /// Per-transfer byte cap of the carrying transport.
    pub fn max_data(&self) -> u32 {
        match self.transport {
            Transport::Tcp => NFS_MAXDATA_TCP,
            Transport::Udp => NFS_MAXDATA_UDP,
        }
    }

    /// Effective export options of `path` for this client, against the
    /// current exports generation.
    pub fn exports_options(&self, path: &str) -> Option<ExportOptions> {
        self.server.exports().options(path, self.client_ip())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("transport", &self.transport)
            .field("auth", &self.auth)
            .finish()
    }
}
