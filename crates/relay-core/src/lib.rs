//! relay-core
//!
//! Pure presence relay logic:
//! - connection identity and lifecycle state
//! - profiles and roster entries
//! - logical input/output messages
//! - the connection registry (who is online)
//! - the relay state machine that turns events into deliveries

pub mod connection;
pub mod profile;
pub mod messages;
pub mod registry;
pub mod relay;
pub mod error;

pub use connection::{ConnectionId, ConnectionState};
pub use profile::{ConnectionEntry, Profile};

pub use messages::{
    ChatMessage,
    Delivery,
    InputMessage,
    MessageId,
    OutputMessage,
    Recipients,
};

pub use registry::Registry;
pub use relay::{DeliveryPolicy, Relay, RelayPolicy};
pub use error::RelayError;
