//! Protocol module containing the token-group codec and typed messages.

pub mod codec;
pub mod messages;

pub use codec::{decode_group, encode_group, ProtocolError};
pub use messages::*;
