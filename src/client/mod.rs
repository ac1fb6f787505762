pub mod rpc;
pub mod event_parser;

pub use rpc::{AccountSource, RpcClient, RpcError, TransactionSource};
pub use event_parser::{detect_create_instruction, parse_stream_message, LogsNotification, StreamMessage};
