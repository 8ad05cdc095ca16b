//! RPC request handling: per-request context, program dispatch, TCP record
//! framing, and retransmission suppression.

mod context;
mod transaction_tracker;
mod wire;

pub use context::{Context, Transport};
pub use transaction_tracker::TransactionTracker;
pub use wire::{handle_rpc, write_fragment, SocketMessageHandler, SocketMessageType};

/// Upper bound on a reassembled RPC record; anything larger is a broken or
/// hostile peer.
pub const MAX_RPC_RECORD_LENGTH: usize = 1024 * 1024;
