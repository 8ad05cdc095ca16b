//! RPC dispatch behaviour: program routing, version gating, and
//! retransmission suppression.

mod support;

use std::io::Cursor;

use nfs_subtree::protocol::rpc::handle_rpc;
use nfs_subtree::xdr::{self, deserialize, nfs3, Serialize};
use support::test_fs;

fn call_record(xid: u32, prog: u32, vers: u32, proc: u32) -> Vec<u8> {
    let msg = xdr::rpc::rpc_msg {
        xid,
        body: xdr::rpc::rpc_body::CALL(xdr::rpc::call_body {
            rpcvers: 2,
            prog,
            vers,
            proc,
            cred: xdr::rpc::opaque_auth::default(),
            verf: xdr::rpc::opaque_auth::default(),
        }),
    };
    let mut buf = Vec::new();
    msg.serialize(&mut buf).expect("serialize call");
    buf
}

fn reply_of(bytes: &[u8]) -> xdr::rpc::rpc_msg {
    deserialize::<xdr::rpc::rpc_msg>(&mut &bytes[..]).expect("reply message")
}

#[tokio::test]
async fn unknown_programs_get_prog_unavail() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let record = call_record(5, 100099, 1, 0);
    let mut output = Vec::new();
    let sent = handle_rpc(&mut Cursor::new(record), &mut output, ctx)
        .await
        .expect("handle_rpc");
    assert!(sent);

    let msg = reply_of(&output);
    let xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(reply)) = msg.body else {
        panic!("expected accepted reply");
    };
    assert!(matches!(reply.reply_data, xdr::rpc::accept_body::PROG_UNAVAIL));
}

#[tokio::test]
async fn wrong_rpc_version_is_denied() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let msg = xdr::rpc::rpc_msg {
        xid: 6,
        body: xdr::rpc::rpc_body::CALL(xdr::rpc::call_body {
            rpcvers: 3,
            prog: nfs3::PROGRAM,
            vers: nfs3::VERSION,
            proc: 0,
            cred: xdr::rpc::opaque_auth::default(),
            verf: xdr::rpc::opaque_auth::default(),
        }),
    };
    let mut record = Vec::new();
    msg.serialize(&mut record).expect("serialize call");

    let mut output = Vec::new();
    handle_rpc(&mut Cursor::new(record), &mut output, ctx)
        .await
        .expect("handle_rpc");

    let msg = reply_of(&output);
    assert!(matches!(
        msg.body,
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(
            xdr::rpc::rejected_reply::RPC_MISMATCH(_)
        ))
    ));
}

#[tokio::test]
async fn retransmissions_are_dropped() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let record = call_record(9, nfs3::PROGRAM, nfs3::VERSION, 0);

    let mut output = Vec::new();
    let sent = handle_rpc(&mut Cursor::new(record.clone()), &mut output, ctx.clone())
        .await
        .expect("first call");
    assert!(sent);
    assert!(!output.is_empty());

    // Same xid from the same client: the tracker swallows it.
    let mut output = Vec::new();
    let sent = handle_rpc(&mut Cursor::new(record), &mut output, ctx)
        .await
        .expect("second call");
    assert!(!sent);
    assert!(output.is_empty());
}

#[tokio::test]
async fn wrong_nfs_version_reports_mismatch() {
    let fs = test_fs("/ (rw)").await;
    let ctx = fs.context("10.0.0.5");

    let record = call_record(11, nfs3::PROGRAM, 2, 0);
    let mut output = Vec::new();
    handle_rpc(&mut Cursor::new(record), &mut output, ctx)
        .await
        .expect("handle_rpc");

    let msg = reply_of(&output);
    let xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(reply)) = msg.body else {
        panic!("expected accepted reply");
    };
    let xdr::rpc::accept_body::PROG_MISMATCH(info) = reply.reply_data else {
        panic!("expected PROG_MISMATCH");
    };
    assert_eq!((info.low, info.high), (nfs3::VERSION, nfs3::VERSION));
}
