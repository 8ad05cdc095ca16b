//! TCP transport: accepts client connections and pumps record-marked RPC
//! traffic through the dispatch layer.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::protocol::rpc;
use crate::protocol::xdr;
use crate::server::Server;

/// How long a transaction is remembered for retransmission suppression.
const TRANSACTION_RETENTION: Duration = Duration::from_secs(60);

/// Listening TCP endpoint of the server.
pub struct NfsTcpListener {
    listener: TcpListener,
    port: u16,
    server: Arc<Server>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
}

/// Pumps one established connection: socket bytes into the message handler,
/// completed replies back out as record-marked fragments.
async fn process_socket(
    mut socket: tokio::net::TcpStream,
    context: rpc::Context,
) -> Result<(), anyhow::Error> {
    let (mut message_handler, mut socksend, mut msgrecvchan) =
        rpc::SocketMessageHandler::new(&context);
    let _ = socket.set_nodelay(true);

    tokio::spawn(async move {
        loop {
            if let Err(e) = message_handler.read().await {
                debug!("message loop terminated: {e:?}");
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = socket.readable() => {
                let mut buf = [0; 128_000];
                match socket.try_read(&mut buf) {
                    Ok(0) => {
                        return Ok(());
                    }
                    Ok(n) => {
                        let _ = socksend.write_all(&buf[..n]).await;
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("connection closed: {e:?}");
                        return Err(e.into());
                    }
                }
            },
            reply = msgrecvchan.recv() => {
                match reply {
                    Some(Err(e)) => {
                        debug!("connection closed: {e:?}");
                        return Err(e);
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = rpc::write_fragment(&mut socket, &msg).await {
                            error!("write error: {e:?}");
                        }
                    }
                    None => {
                        return Err(anyhow::anyhow!("unexpected socket context termination"));
                    }
                }
            }
        }
    }
}

/// Common surface of the server's listening endpoints.
#[async_trait]
pub trait NfsEndpoint: Send + Sync {
    /// Actual bound port (useful after binding port 0).
    fn get_listen_port(&self) -> u16;

    fn get_listen_ip(&self) -> IpAddr;

    /// Accepts and serves clients until the underlying socket fails.
    async fn handle_forever(&self) -> io::Result<()>;
}

impl NfsTcpListener {
    /// Binds to `ip:port` and serves `server` from it.
    pub async fn bind(ipstr: &str, server: Arc<Server>) -> io::Result<NfsTcpListener> {
        let addr: SocketAddr = ipstr.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address must be of form ip:port")
        })?;
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on TCP {addr}");
        let port = listener.local_addr()?.port();
        Ok(NfsTcpListener {
            listener,
            port,
            server,
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(TRANSACTION_RETENTION)),
        })
    }
}

#[async_trait]
impl NfsEndpoint for NfsTcpListener {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.listener.local_addr().map(|a| a.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }

    async fn handle_forever(&self) -> io::Result<()> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let context = rpc::Context {
                local_port: self.port,
                client_addr: peer,
                transport: rpc::Transport::Tcp,
                auth: xdr::rpc::auth_unix::default(),
                rq_vers: 0,
                server: self.server.clone(),
                transaction_tracker: self.transaction_tracker.clone(),
            };
            info!("accepting connection from {peer}");
            tokio::spawn(async move {
                let _ = process_socket(socket, context).await;
            });
        }
    }
}
