//! Message envelope: payload plus delivery metadata
//!
//! Payloads are protobuf messages that know their own fully-qualified type
//! name. On the wire the payload is boxed in a `google.protobuf.Any` next to
//! the metadata fields, so a consumer can verify it received the type it
//! expects before decoding the body.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ id             string        │
//! │ type           string        │
//! │ correlation_id string        │
//! │ timestamp      Timestamp     │
//! │ body           Any ──────────┼──▶ type_url + encoded payload
//! └──────────────────────────────┘
//! ```

mod codec;
mod metadata;

pub use codec::{decode, decode_into, encode, Envelope};
pub(crate) use codec::seal;
pub use metadata::{Metadata, MetadataOverrides};

/// A payload that can travel inside an envelope
pub trait Payload: prost::Message + prost::Name + Default + Send + Sync + 'static {}

impl<T> Payload for T where T: prost::Message + prost::Name + Default + Send + Sync + 'static {}

/// Fully-qualified type name of a payload, e.g. `orders.v1.OrderPlaced`
pub fn type_name<M: Payload>() -> String {
    M::full_name()
}

/// Message name with hyphen separation,
/// e.g. `orders.v1.OrderPlaced` -> `orders-v1-OrderPlaced`
pub fn message_name(type_name: &str) -> String {
    type_name.replace('.', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_name() {
        assert_eq!(message_name("orders.v1.OrderPlaced"), "orders-v1-OrderPlaced");
        assert_eq!(message_name("Plain"), "Plain");
    }
}
