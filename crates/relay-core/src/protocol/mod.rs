//! Protocol module containing the JSON frame types and the codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_command, decode_server_message, encode_command, ProtocolError};
pub use messages::{CommandFrame, ServerMessage};
