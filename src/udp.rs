//! UDP transport: one datagram carries one RPC record, no record marking.

use std::io::{self, Cursor};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::protocol::rpc;
use crate::protocol::xdr;
use crate::server::Server;
use crate::tcp::NfsEndpoint;

const TRANSACTION_RETENTION: Duration = Duration::from_secs(60);

/// Largest datagram we accept; requests are bounded by the UDP transfer cap
/// plus headers.
const MAX_DATAGRAM: usize = 65536;

/// Listening UDP endpoint of the server.
pub struct NfsUdpSocket {
    socket: Arc<UdpSocket>,
    port: u16,
    server: Arc<Server>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
}

impl NfsUdpSocket {
    /// Binds to `ip:port` and serves `server` from it.
    pub async fn bind(ipstr: &str, server: Arc<Server>) -> io::Result<NfsUdpSocket> {
        let socket = UdpSocket::bind(ipstr).await?;
        info!("listening on UDP {}", socket.local_addr()?);
        let port = socket.local_addr()?.port();
        Ok(NfsUdpSocket {
            socket: Arc::new(socket),
            port,
            server,
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(TRANSACTION_RETENTION)),
        })
    }
}

#[async_trait]
impl NfsEndpoint for NfsUdpSocket {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.socket.local_addr().map(|a| a.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }

    async fn handle_forever(&self) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            let record = buf[..len].to_vec();
            let context = rpc::Context {
                local_port: self.port,
                client_addr: peer,
                transport: rpc::Transport::Udp,
                auth: xdr::rpc::auth_unix::default(),
                rq_vers: 0,
                server: self.server.clone(),
                transaction_tracker: self.transaction_tracker.clone(),
            };
            let socket = self.socket.clone();
            tokio::spawn(async move {
                let mut input = Cursor::new(record);
                let mut reply = Vec::with_capacity(8192);
                match rpc::handle_rpc(&mut input, &mut reply, context).await {
                    Ok(true) => {
                        if let Err(e) = socket.send_to(&reply, peer).await {
                            error!("UDP reply to {peer} failed: {e:?}");
                        }
                    }
                    Ok(false) => {}
                    Err(e) => debug!("dropping malformed datagram from {peer}: {e:?}"),
                }
            });
        }
    }
}
