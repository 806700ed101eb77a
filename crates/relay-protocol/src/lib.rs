//! relay-protocol
//!
//! Wire-level encoding/decoding for the presence relay.
//!
//! This crate turns logical relay messages
//! (`relay_core::InputMessage` / `OutputMessage`) into JSON text frames
//! and back again.
//!
//! - [`wire_types`] : serde document shapes, one per event
//! - [`json_codec`] : encode/decode entry points used by server and clients

pub mod wire_types;
pub mod json_codec;

pub use json_codec::{
    ProtocolError,
    decode_client_event,
    decode_client_event_at,
    decode_server_event,
    encode_client_event,
    encode_server_event,
};
