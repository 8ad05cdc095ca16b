//! RPC record handling: program dispatch, record-marking framing for TCP
//! (RFC 5531 record marking standard), and the per-connection FIFO worker
//! that keeps replies in request order.

use std::io::{Cursor, Read, Write};

use anyhow::anyhow;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::protocol::xdr::{self, deserialize, mount, nfs3, Serialize};
use crate::protocol::{nfs, rpc};

/// Dispatches a single decoded RPC record.
///
/// Returns `Ok(true)` when a reply was written, `Ok(false)` when the record
/// was a retransmission and must be dropped silently.
pub async fn handle_rpc(
    input: &mut impl Read,
    output: &mut impl Write,
    mut context: rpc::Context,
) -> Result<bool, anyhow::Error> {
    let recv = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = recv.xid;
    let xdr::rpc::rpc_body::CALL(call) = recv.body else {
        error!("unexpectedly received a Reply instead of a Call");
        return Err(anyhow!("bad RPC call format"));
    };

    if call.cred.flavor == xdr::rpc::auth_flavor::AUTH_UNIX {
        context.auth = deserialize(&mut Cursor::new(&call.cred.body))?;
    }
    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!("invalid RPC version {} != {}", call.rpcvers, xdr::rpc::RPC_VERSION);
        xdr::rpc::rpc_vers_mismatch(xid).serialize(output)?;
        return Ok(true);
    }

    let client = context.client_addr.to_string();
    if context.transaction_tracker.is_retransmission(xid, &client) {
        debug!("dropping retransmission, xid: {xid}, client: {client}");
        return Ok(false);
    }

    context.rq_vers = call.vers;
    let result = match call.prog {
        nfs3::PROGRAM => match call.vers {
            nfs3::VERSION => nfs::v3::handle_nfs(xid, call, input, output, &context).await,
            vers => {
                warn!("unsupported NFS version {} (supported {})", vers, nfs3::VERSION);
                xdr::rpc::prog_mismatch_reply_message(xid, nfs3::VERSION).serialize(output)?;
                Ok(())
            }
        },
        mount::PROGRAM => nfs::mount::handle_mount(xid, call, input, output, &context).await,
        prog => {
            warn!("unknown RPC program number {prog}");
            xdr::rpc::prog_unavail_reply_message(xid).serialize(output)?;
            Ok(())
        }
    }
    .map(|()| true);

    context.transaction_tracker.mark_processed(xid, &client);
    result
}

/// Reads one record-marked fragment, appending its payload. Returns whether
/// this was the record's last fragment.
async fn read_fragment(
    socket: &mut DuplexStream,
    append_to: &mut Vec<u8>,
) -> Result<bool, anyhow::Error> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) > 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    trace!("reading fragment, length: {length}, last: {is_last}");
    if append_to.len().saturating_add(length) > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(anyhow!(
            "RPC record length {} exceeds maximum {}",
            append_to.len().saturating_add(length),
            rpc::MAX_RPC_RECORD_LENGTH
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Writes `buf` as record-marked fragments.
pub async fn write_fragment(
    socket: &mut tokio::net::TcpStream,
    buf: &[u8],
) -> Result<(), anyhow::Error> {
    const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

    let mut offset = 0;
    while offset < buf.len() {
        let fragment_size = std::cmp::min(buf.len() - offset, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();
        let fragment_header =
            if is_last { fragment_size as u32 | (1 << 31) } else { fragment_size as u32 };

        socket.write_all(&fragment_header.to_be_bytes()).await?;
        trace!("writing fragment, length: {fragment_size}, last: {is_last}");
        socket.write_all(&buf[offset..offset + fragment_size]).await?;
        offset += fragment_size;
    }
    Ok(())
}

pub type SocketMessageType = Result<Vec<u8>, anyhow::Error>;

/// Reassembles records from a TCP stream and runs them through a FIFO worker
/// so replies leave in request order.
pub struct SocketMessageHandler {
    cur_fragment: Vec<u8>,
    socket_receive_channel: DuplexStream,
    work_sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl SocketMessageHandler {
    /// Sets up the handler. Returns the handler itself, the stream the
    /// socket task feeds raw bytes into, and the channel replies come out of.
    pub fn new(
        context: &rpc::Context,
    ) -> (Self, DuplexStream, mpsc::UnboundedReceiver<SocketMessageType>) {
        let (socksend, sockrecv) = tokio::io::duplex(256_000);
        let (msgsend, msgrecv) = mpsc::unbounded_channel::<SocketMessageType>();
        let (work_sender, mut work_receiver) = mpsc::unbounded_channel::<Vec<u8>>();

        let worker_context = context.clone();
        tokio::spawn(async move {
            while let Some(record) = work_receiver.recv().await {
                let mut input = Cursor::new(record);
                let mut reply = Vec::with_capacity(8192);
                match handle_rpc(&mut input, &mut reply, worker_context.clone()).await {
                    Ok(true) => {
                        let _ = msgsend.send(Ok(reply));
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("RPC error: {e:?}");
                        let _ = msgsend.send(Err(e));
                    }
                }
            }
            debug!("RPC worker finished");
        });

        (
            Self { cur_fragment: Vec::new(), socket_receive_channel: sockrecv, work_sender },
            socksend,
            msgrecv,
        )
    }

    /// Reads one fragment; when it completes a record, hands the record to
    /// the worker. Call in a loop.
    pub async fn read(&mut self) -> Result<(), anyhow::Error> {
        let is_last =
            read_fragment(&mut self.socket_receive_channel, &mut self.cur_fragment).await?;
        if is_last {
            let record = std::mem::take(&mut self.cur_fragment);
            self.work_sender
                .send(record)
                .map_err(|e| anyhow!("RPC worker is gone: {e}"))?;
        }
        Ok(())
    }
}
