//! Envelope encoding and decoding

use super::{Metadata, MetadataOverrides, Payload};
use crate::error::{MessagingError, MessagingResult};
use chrono::{DateTime, Utc};
use prost::Message;
use prost_types::{Any, Timestamp};

/// Wire representation of an envelope
#[derive(Clone, PartialEq, prost::Message)]
struct WireEnvelope {
    #[prost(string, tag = "1")]
    id: String,

    #[prost(string, tag = "2")]
    r#type: String,

    #[prost(string, tag = "3")]
    correlation_id: String,

    #[prost(message, optional, tag = "4")]
    timestamp: Option<Timestamp>,

    #[prost(message, optional, tag = "5")]
    body: Option<Any>,
}

/// Payload together with its delivery metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    /// Message payload
    pub payload: M,

    /// Message metadata
    pub metadata: Metadata,
}

impl<M: Payload> Envelope<M> {
    /// Wrap a payload, generating fresh metadata and applying the overrides
    pub fn wrap(payload: M, overrides: MetadataOverrides) -> Self {
        let metadata = new_metadata::<M>(overrides);
        Self { payload, metadata }
    }

    /// Serialize the envelope
    pub fn encode(&self) -> MessagingResult<Vec<u8>> {
        to_wire(&self.payload, &self.metadata).map(|wire| wire.encode_to_vec())
    }
}

/// Encode a payload into envelope bytes
pub fn encode<M: Payload>(payload: &M, overrides: MetadataOverrides) -> MessagingResult<Vec<u8>> {
    seal(payload, overrides).map(|(bytes, _)| bytes)
}

/// Decode envelope bytes into a default payload instance
pub fn decode<M: Payload>(bytes: &[u8]) -> MessagingResult<Envelope<M>> {
    decode_into(bytes, M::default())
}

/// Decode envelope bytes into `prototype`
///
/// The prototype is cleared first, so only the decoded fields survive. Fails if the bytes are malformed or the body was boxed from a different type.
pub fn decode_into<M: Payload>(bytes: &[u8], mut prototype: M) -> MessagingResult<Envelope<M>> {
    let wire = WireEnvelope::decode(bytes)?;

    let body = wire
        .body
        .ok_or_else(|| MessagingError::Decode("envelope has no body".to_string()))?;

    let expected = M::full_name();
    if type_url_name(&body.type_url) != expected {
        return Err(MessagingError::Decode(format!(
            "expected payload type {}, found {}",
            expected, body.type_url
        )));
    }

    prototype.clear();
    prototype.merge(body.value.as_slice())?;

    let timestamp = wire
        .timestamp
        .ok_or_else(|| MessagingError::Decode("envelope has no timestamp".to_string()))
        .and_then(from_timestamp)?;

    Ok(Envelope {
        payload: prototype,
        metadata: Metadata {
            id: wire.id,
            message_type: wire.r#type,
            correlation_id: wire.correlation_id,
            timestamp,
        },
    })
}

/// Encode a payload and return the metadata it was sent with
pub(crate) fn seal<M: Payload>(
    payload: &M,
    overrides: MetadataOverrides,
) -> MessagingResult<(Vec<u8>, Metadata)> {
    let metadata = new_metadata::<M>(overrides);
    let wire = to_wire(payload, &metadata)?;
    Ok((wire.encode_to_vec(), metadata))
}

fn new_metadata<M: Payload>(overrides: MetadataOverrides) -> Metadata {
    let mut metadata = Metadata::new(M::full_name());
    overrides.apply(&mut metadata);
    metadata
}

fn to_wire<M: Payload>(payload: &M, metadata: &Metadata) -> MessagingResult<WireEnvelope> {
    let body = Any::from_msg(payload)?;

    Ok(WireEnvelope {
        id: metadata.id.clone(),
        r#type: metadata.message_type.clone(),
        correlation_id: metadata.correlation_id.clone(),
        timestamp: Some(Timestamp {
            seconds: metadata.timestamp.timestamp(),
            nanos: metadata.timestamp.timestamp_subsec_nanos() as i32,
        }),
        body: Some(body),
    })
}

fn from_timestamp(timestamp: Timestamp) -> MessagingResult<DateTime<Utc>> {
    let nanos = u32::try_from(timestamp.nanos)
        .map_err(|_| MessagingError::Decode(format!("invalid timestamp nanos {}", timestamp.nanos)))?;

    DateTime::from_timestamp(timestamp.seconds, nanos).ok_or_else(|| {
        MessagingError::Decode(format!("timestamp out of range: {}s", timestamp.seconds))
    })
}

// Type URLs look like `type.googleapis.com/pkg.Name` or `/pkg.Name`
fn type_url_name(type_url: &str) -> &str {
    type_url.rsplit('/').next().unwrap_or(type_url)
}
