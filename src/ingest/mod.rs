pub mod curve_decoder;
pub mod transaction;
pub mod websocket;

pub use curve_decoder::{decode_curve_state, DecodeError};
pub use transaction::{extract_launch, ResolveError, TransactionEnvelope};
pub use websocket::{ConnectionState, EventMonitor, MonitorStats};
