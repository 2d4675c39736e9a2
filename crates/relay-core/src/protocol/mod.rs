//! JSON envelope protocol spoken between clients and the relay.

pub mod codec;
pub mod envelope;

pub use codec::{decode_client_bytes, decode_client_envelope, encode_server_envelope, ProtocolError};
pub use envelope::{ClientEnvelope, ServerEnvelope};
